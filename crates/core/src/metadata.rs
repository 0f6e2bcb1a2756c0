use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Pattern a published metadata pointer must match before its trailing path
/// segment is treated as a content identifier. Mirrors the URL shape accepted
/// by the marketplace: optional scheme, dotted host, non-empty path.
static CONTENT_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?[\w.-]+(?:\.[\w.-]+)+[\w\-._~:/?#\[\]@!$&'()*+,;=.]+$")
        .expect("content URL regex is valid")
});

/// One entry of a token's ordered attribute list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitAttribute {
    pub trait_type: String,
    pub value: serde_json::Value,
}

impl TraitAttribute {
    pub fn new(trait_type: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            trait_type: trait_type.into(),
            value: value.into(),
        }
    }
}

/// The mutable display metadata of a token.
///
/// This is the document that eventually gets published to content-addressed
/// storage, so serialization skips unset fields to keep the pinned JSON
/// object clean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<TraitAttribute>,
}

impl TokenMetadata {
    /// Whether no display field has ever been set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.artist.is_none()
            && self.external_url.is_none()
            && self.image.is_none()
            && self.animation_url.is_none()
            && self.attributes.is_empty()
    }

    /// The token's display name, or `"none"` when unnamed. Used for pin labels.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("none")
    }
}

/// Pointer to a token's last published, content-addressed metadata.
///
/// Either the sentinel `"none"` (never published) or a syntactically valid
/// URL. Only the pin synchronizer writes this field, and only after the new
/// content has been pinned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MetadataUri {
    /// Never published; stored as the literal string `"none"`.
    #[default]
    None,
    /// Gateway URL of the last published metadata object.
    Url(String),
}

impl MetadataUri {
    /// Parse the stored string form, treating `"none"` as the sentinel.
    pub fn parse(raw: &str) -> Self {
        if raw == "none" {
            Self::None
        } else {
            Self::Url(raw.to_owned())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Url(url) => url,
        }
    }

    /// Extract the content identifier from a recognized content-addressed URL.
    ///
    /// Returns the trailing path segment when the pointer looks like a URL,
    /// `None` for the sentinel or anything unrecognized. This is what decides
    /// whether a superseded pointer gets an unpin issued for it.
    pub fn cid(&self) -> Option<&str> {
        let Self::Url(url) = self else {
            return None;
        };
        if !CONTENT_URL_RE.is_match(url) {
            return None;
        }
        url.rsplit('/').next().filter(|segment| !segment.is_empty())
    }
}

impl fmt::Display for MetadataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MetadataUri {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MetadataUri {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}
