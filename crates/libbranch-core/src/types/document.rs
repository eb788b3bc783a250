use serde::Serialize;

use crate::types::ids::{id_to_hex, ContentHash};

/// Prefix of the in-text marker that stands in for an extracted asset
pub const PLACEHOLDER_PREFIX: &str = "branch-asset:";

/// Links a position in the canonical text to a blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetReference {
    #[serde(serialize_with = "serialize_hash")]
    pub content_hash: ContentHash,
    pub mime_type: String,
    pub byte_length: u64,
    /// The exact token written into the canonical text
    pub placeholder_id: String,
}

impl AssetReference {
    pub fn hash_hex(&self) -> String {
        id_to_hex(&self.content_hash)
    }
}

/// Build the stable placeholder token for an asset
pub fn placeholder_token(content_hash: &ContentHash, mime_type: &str) -> String {
    format!("{}{}:{}", PLACEHOLDER_PREFIX, mime_type, id_to_hex(content_hash))
}

/// Asset bytes pulled out of a payload, waiting to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAsset {
    pub reference: AssetReference,
    pub bytes: Vec<u8>,
}

/// Non-fatal: the payload was over the size cap, so assets stayed inline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OversizeWarning {
    pub payload_bytes: u64,
    pub size_cap_bytes: u64,
}

impl std::fmt::Display for OversizeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "payload is {} bytes, over the {} byte cap; assets left inline",
            self.payload_bytes, self.size_cap_bytes
        )
    }
}

/// Canonical text plus the assets extracted from it.
///
/// Built once by the normalizer and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    canonical_text: String,
    assets: Vec<ExtractedAsset>,
    oversize: Option<OversizeWarning>,
}

impl NormalizedDocument {
    pub fn new(
        canonical_text: String,
        assets: Vec<ExtractedAsset>,
        oversize: Option<OversizeWarning>,
    ) -> Self {
        Self {
            canonical_text,
            assets,
            oversize,
        }
    }

    pub fn canonical_text(&self) -> &str {
        &self.canonical_text
    }

    pub fn assets(&self) -> &[ExtractedAsset] {
        &self.assets
    }

    /// Asset references in first-appearance order
    pub fn asset_references(&self) -> impl Iterator<Item = &AssetReference> {
        self.assets.iter().map(|a| &a.reference)
    }

    pub fn oversize(&self) -> Option<&OversizeWarning> {
        self.oversize.as_ref()
    }
}

fn serialize_hash<S: serde::Serializer>(hash: &ContentHash, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&id_to_hex(hash))
}
