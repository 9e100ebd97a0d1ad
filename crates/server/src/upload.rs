use std::collections::HashSet;
use std::path::Path;

use axum::body::Bytes;
use axum::extract::Multipart;

use deployhub_api::deploy;

use crate::pipeline::DeployError;

/// Multipart field carrying uploaded files.
pub const FILES_FIELD: &str = "files";

const NO_FILES: &str = "No files were uploaded.";

/// One uploaded file, addressed by its normalized relative path.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub path: String,
    pub bytes: Bytes,
}

/// A non-empty set of files with distinct, non-overlapping paths.
#[derive(Debug, Clone)]
pub struct UploadBatch {
    files: Vec<UploadedFile>,
}

impl UploadBatch {
    pub fn new(files: Vec<UploadedFile>) -> Result<Self, DeployError> {
        if files.is_empty() {
            return Err(DeployError::InvalidUpload(NO_FILES.into()));
        }

        let mut seen = HashSet::with_capacity(files.len());
        for file in &files {
            if !seen.insert(file.path.as_str()) {
                return Err(DeployError::InvalidUpload(format!(
                    "duplicate file path: {}",
                    file.path
                )));
            }
        }
        // "a" and "a/b" cannot both exist on disk.
        for file in &files {
            let mut prefix = file.path.as_str();
            while let Some((parent, _)) = prefix.rsplit_once('/') {
                if seen.contains(parent) {
                    return Err(DeployError::InvalidUpload(format!(
                        "file path {parent} is also used as a directory"
                    )));
                }
                prefix = parent;
            }
        }

        Ok(Self { files })
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.bytes.len()).sum()
    }
}

/// Collect every `files` part of a multipart body.
///
/// The part's filename is the file's relative path. Parts without a
/// filename (an empty file input) and other fields are skipped.
pub async fn read_multipart(mut multipart: Multipart) -> Result<UploadBatch, DeployError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DeployError::InvalidUpload(e.body_text()))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let Some(raw_name) = field.file_name().filter(|n| !n.is_empty()).map(str::to_owned)
        else {
            continue;
        };
        let path = deploy::normalize_upload_path(&raw_name)
            .map_err(|e| DeployError::InvalidUpload(e.message().to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| DeployError::InvalidUpload(e.body_text()))?;
        files.push(UploadedFile { path, bytes });
    }
    UploadBatch::new(files)
}

/// Write every file of `batch` under `root`, concurrently.
///
/// Fails on the first write error; the caller owns `root` and its cleanup.
pub async fn stage_batch(root: &Path, batch: &UploadBatch) -> Result<(), DeployError> {
    let writes = batch.files().iter().map(|file| async move {
        let target = root.join(&file.path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &file.bytes).await
    });

    futures::future::try_join_all(writes)
        .await
        .map_err(|e| DeployError::Upload(e.to_string()))?;
    Ok(())
}
