use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// One uploaded file as delivered by the transport layer: the client-side
/// original filename plus the transient on-disk location it was spooled to.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub original_name: String,
    pub path: PathBuf,
}

impl StagedUpload {
    pub fn new(original_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            original_name: original_name.into(),
            path: path.into(),
        }
    }

    /// The on-disk filename, used for content links and pin labels.
    pub fn stored_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.original_name)
    }
}

/// The full set of staged uploads attached to one request.
///
/// A batch is acquired at pipeline entry and discarded on every exit path,
/// so temp files never outlive the request regardless of where it
/// terminated. Discarding tolerates files the ingestor already removed.
#[derive(Debug, Default)]
pub struct UploadBatch {
    uploads: Vec<StagedUpload>,
}

impl UploadBatch {
    pub fn new(uploads: Vec<StagedUpload>) -> Self {
        Self { uploads }
    }

    pub fn files(&self) -> &[StagedUpload] {
        &self.uploads
    }

    /// Remove every staged file from local storage.
    pub async fn discard(self) {
        for upload in &self.uploads {
            remove_staged(&upload.path).await;
        }
    }
}

/// Remove one staged file, logging the outcome. An already-absent file is a
/// no-op.
pub(crate) async fn remove_staged(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!(path = %path.display(), "staged upload removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove staged upload"),
    }
}
