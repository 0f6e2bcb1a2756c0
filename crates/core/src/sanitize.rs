//! Edit-payload sanitization.
//!
//! Raw edit payloads arrive as arbitrary JSON mappings from the transport
//! layer. Before anything is persisted they are filtered to the allow-listed
//! display fields, have their link fields rewritten to freshly ingested
//! content links, and have their free-text fields purged of HTML markup.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::metadata::{TokenMetadata, TraitAttribute};

/// `<script>` elements are removed together with their content.
static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script regex is valid")
});

/// `<style>` elements are removed together with their content.
static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("style regex is valid")
});

/// Any remaining markup tag is stripped, keeping its inner text.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex is valid"));

/// Strip script and style elements (including their content), then any
/// remaining markup, from a free-text field.
pub fn purify(text: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(text, "");
    let without_styles = STYLE_RE.replace_all(&without_scripts, "");
    TAG_RE.replace_all(&without_styles, "").into_owned()
}

/// The allow-listed set of editable metadata fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataField {
    Name,
    Description,
    Artist,
    ExternalUrl,
    Image,
    AnimationUrl,
    Attributes,
}

impl MetadataField {
    /// Map a raw payload key onto the allow-list; anything else is dropped.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(Self::Name),
            "description" => Some(Self::Description),
            "artist" => Some(Self::Artist),
            "external_url" => Some(Self::ExternalUrl),
            "image" => Some(Self::Image),
            "animation_url" => Some(Self::AnimationUrl),
            "attributes" => Some(Self::Attributes),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Artist => "artist",
            Self::ExternalUrl => "external_url",
            Self::Image => "image",
            Self::AnimationUrl => "animation_url",
            Self::Attributes => "attributes",
        }
    }

    /// Link fields get their value rewritten to an ingested content link.
    pub fn is_link(self) -> bool {
        matches!(self, Self::Image | Self::AnimationUrl)
    }

    /// Structured or URL data that is stored verbatim, never purified.
    pub fn is_verbatim(self) -> bool {
        matches!(
            self,
            Self::Image | Self::AnimationUrl | Self::ExternalUrl | Self::Attributes
        )
    }
}

/// A successfully ingested upload: the client-side original filename and the
/// content-addressed link it now resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedUpload {
    pub original_name: String,
    pub link: String,
}

impl IngestedUpload {
    pub fn new(original_name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            link: link.into(),
        }
    }
}

/// Sanitization rejected the whole edit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SanitizeError {
    /// The payload contained no allow-listed fields at all.
    #[error("Nothing to update.")]
    NothingToUpdate,
}

/// A sanitized, storage-ready set of metadata field updates.
///
/// Stores apply the entries under the token's nested `metadata` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    entries: Vec<(MetadataField, Value)>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, field: MetadataField) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .map(|(_, value)| value)
    }

    /// Iterate the sanitized field/value pairs.
    pub fn fields(&self) -> impl Iterator<Item = (MetadataField, &Value)> {
        self.entries.iter().map(|(field, value)| (*field, value))
    }

    /// Render the flat, `metadata.`-prefixed key shape document stores use
    /// for partial updates of the nested metadata document.
    pub fn update_document(&self) -> serde_json::Map<String, Value> {
        self.entries
            .iter()
            .map(|(field, value)| (format!("metadata.{}", field.as_str()), value.clone()))
            .collect()
    }

    /// Merge the patch into a token's metadata in place.
    pub fn apply_to(&self, metadata: &mut TokenMetadata) {
        for (field, value) in &self.entries {
            match field {
                MetadataField::Name => metadata.name = value.as_str().map(ToOwned::to_owned),
                MetadataField::Description => {
                    metadata.description = value.as_str().map(ToOwned::to_owned);
                }
                MetadataField::Artist => metadata.artist = value.as_str().map(ToOwned::to_owned),
                MetadataField::ExternalUrl => {
                    metadata.external_url = value.as_str().map(ToOwned::to_owned);
                }
                MetadataField::Image => metadata.image = value.as_str().map(ToOwned::to_owned),
                MetadataField::AnimationUrl => {
                    metadata.animation_url = value.as_str().map(ToOwned::to_owned);
                }
                MetadataField::Attributes => {
                    metadata.attributes =
                        serde_json::from_value(value.clone()).unwrap_or_default();
                }
            }
        }
    }
}

/// Sanitize a raw edit payload against the set of ingested uploads.
///
/// Drops everything outside the allow-list (failing with
/// [`SanitizeError::NothingToUpdate`] when nothing survives that filter),
/// substitutes link fields with their ingested content links -- a link field
/// naming a file that never made it into the content store is dropped, not
/// stored as a literal string -- and purifies every remaining free-text
/// field. Attribute lists must deserialize as trait records or are dropped.
pub fn sanitize_edit(
    raw: &serde_json::Map<String, Value>,
    ingested: &[IngestedUpload],
) -> Result<MetadataPatch, SanitizeError> {
    let picked: Vec<(MetadataField, Value)> = raw
        .iter()
        .filter_map(|(key, value)| MetadataField::from_key(key).map(|field| (field, value.clone())))
        .collect();

    if picked.is_empty() {
        return Err(SanitizeError::NothingToUpdate);
    }

    let mut entries = Vec::with_capacity(picked.len());
    for (field, value) in picked {
        if field.is_link() {
            let Some(filename) = value.as_str() else {
                continue;
            };
            match ingested.iter().find(|u| u.original_name == filename) {
                Some(upload) => entries.push((field, Value::String(upload.link.clone()))),
                None => continue,
            }
        } else if field == MetadataField::Attributes {
            if serde_json::from_value::<Vec<TraitAttribute>>(value.clone()).is_err() {
                continue;
            }
            entries.push((field, value));
        } else if field.is_verbatim() {
            if value.is_string() {
                entries.push((field, value));
            }
        } else {
            let Some(text) = value.as_str() else {
                continue;
            };
            entries.push((field, Value::String(purify(text))));
        }
    }

    Ok(MetadataPatch { entries })
}
