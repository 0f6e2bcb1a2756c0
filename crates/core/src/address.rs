use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A blockchain account address.
///
/// Addresses are normalized to lowercase on construction so that equality
/// checks (in particular the contract-owner permission check) are
/// case-insensitive, matching how wallets render the same account with
/// varying checksum casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Create an address from its string form, trimming and lowercasing it.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_compare_case_insensitively() {
        assert_eq!(Address::new("0xAbCd01"), Address::new("0xabcd01"));
        assert_ne!(Address::new("0xabcd01"), Address::new("0xabcd02"));
    }

    #[test]
    fn deserialization_normalizes() {
        let addr: Address = serde_json::from_str("\" 0xABCD \"").unwrap();
        assert_eq!(addr.as_str(), "0xabcd");
    }
}
