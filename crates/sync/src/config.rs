use serde::Deserialize;

/// Configuration for the token metadata synchronization pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Public gateway base URL content links are built against.
    pub gateway: String,
    /// Maximum number of uploads accepted per edit request.
    pub max_uploads: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gateway: String::from("https://gateway.pinata.cloud/ipfs"),
            max_uploads: 2,
        }
    }
}

impl SyncConfig {
    /// The gateway base without a trailing slash.
    pub(crate) fn gateway_base(&self) -> &str {
        self.gateway.trim_end_matches('/')
    }
}
