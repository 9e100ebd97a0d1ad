pub mod client;
pub mod error;
pub mod platform;

pub use client::GitHubClient;
pub use deployhub_api;
pub use error::PlatformError;
pub use platform::{CreatedRepository, HostingPlatform, PagesSource, RepositoryOwner};
