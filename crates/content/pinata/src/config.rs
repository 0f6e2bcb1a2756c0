use std::time::Duration;

use serde::Deserialize;

fn default_api_base() -> String {
    "https://api.pinata.cloud".to_owned()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Configuration for the Pinata pinning-service client.
#[derive(Debug, Clone, Deserialize)]
pub struct PinataConfig {
    /// Base URL of the pinning API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// JWT sent as a bearer token on every request.
    pub jwt: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl PinataConfig {
    pub fn new(jwt: impl Into<String>) -> Self {
        Self {
            api_base: default_api_base(),
            jwt: jwt.into(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_minimal_config() {
        let config: PinataConfig = serde_json::from_str(r#"{"jwt": "token"}"#).unwrap();
        assert_eq!(config.api_base, "https://api.pinata.cloud");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }
}
