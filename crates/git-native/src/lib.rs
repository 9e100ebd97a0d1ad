pub mod cli;
pub mod error;
pub mod ops;
pub mod publish;
pub mod url;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cli::GitCli;
pub use error::{GitPublishError, Result};
pub use publish::{Committer, PublishOutcome, PublishRequest, PublishStep, publish_directory};
pub use url::{AuthenticatedRemote, redact_userinfo};
