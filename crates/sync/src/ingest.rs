use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use curio_content::{Cid, ContentStore, ContentStoreError};
use curio_core::IngestedUpload;

use crate::upload::{StagedUpload, remove_staged};

/// Why one file failed to make it into the content store.
#[derive(Debug, Error)]
enum TransferError {
    #[error("reading staged file: {0}")]
    Read(std::io::Error),

    #[error("content store: {0}")]
    Store(ContentStoreError),
}

/// Transfers staged uploads into the content store.
///
/// Each file is read from its temporary location, added to the store, pinned
/// under its stored filename, and given a `{gateway}/{cid}/{filename}`
/// content link. The temporary copy is removed before the file's ingest
/// completes, whether or not the transfer succeeded; a failure on one file
/// is logged and excludes only that file from the result set. Files share no
/// mutable state, so they are transferred concurrently.
pub struct UploadIngestor {
    store: Arc<dyn ContentStore>,
    gateway: String,
}

impl UploadIngestor {
    pub fn new(store: Arc<dyn ContentStore>, gateway: impl Into<String>) -> Self {
        let gateway = gateway.into();
        Self {
            store,
            gateway: gateway.trim_end_matches('/').to_owned(),
        }
    }

    /// Ingest every staged upload, returning the subset that made it into
    /// the content store.
    pub async fn ingest(&self, uploads: &[StagedUpload]) -> Vec<IngestedUpload> {
        let outcomes = join_all(uploads.iter().map(|upload| self.ingest_one(upload))).await;
        outcomes.into_iter().flatten().collect()
    }

    async fn ingest_one(&self, upload: &StagedUpload) -> Option<IngestedUpload> {
        let outcome = self.transfer(upload).await;
        // The temp copy goes away no matter how the transfer went.
        remove_staged(&upload.path).await;

        match outcome {
            Ok(link) => {
                debug!(file = upload.stored_name(), link = %link, "upload added to content store");
                Some(IngestedUpload::new(upload.original_name.clone(), link))
            }
            Err(err) => {
                warn!(
                    file = upload.stored_name(),
                    error = %err,
                    "upload transfer failed; excluding file from the edit"
                );
                None
            }
        }
    }

    async fn transfer(&self, upload: &StagedUpload) -> Result<String, TransferError> {
        let data = tokio::fs::read(&upload.path)
            .await
            .map_err(TransferError::Read)?;
        let stored_name = upload.stored_name();

        let cid = self
            .store
            .add_file(stored_name, Bytes::from(data))
            .await
            .map_err(TransferError::Store)?;
        self.store
            .add_pin(&cid, stored_name)
            .await
            .map_err(TransferError::Store)?;

        Ok(self.content_link(&cid, stored_name))
    }

    fn content_link(&self, cid: &Cid, filename: &str) -> String {
        format!("{}/{cid}/{filename}", self.gateway)
    }
}
