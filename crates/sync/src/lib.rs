pub mod config;
pub mod error;
pub mod ingest;
pub mod sync;
pub mod upload;

pub use config::SyncConfig;
pub use error::SyncError;
pub use ingest::UploadIngestor;
pub use sync::TokenSync;
pub use upload::{StagedUpload, UploadBatch};
