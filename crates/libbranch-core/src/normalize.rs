//! Content normalization
//!
//! Turns a raw exported revision (HTML markup) into canonical text plus the
//! binary assets that were embedded in it as base64 `data:` URIs. Every
//! extracted asset is replaced in the text by a placeholder token that is
//! resolved to a blob path when the snapshot is materialized.
//!
//! Normalization is a pure function of the payload bytes and the size cap:
//! the same input always produces byte-identical text and the same asset
//! order, which is what lets an unchanged revision collapse into a no-op
//! commit.

use std::collections::HashSet;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::{Captures, Regex};

use crate::error::BranchError;
use crate::types::document::{
    placeholder_token, AssetReference, ExtractedAsset, NormalizedDocument, OversizeWarning,
};
use crate::types::ids::content_hash;

/// Default payload size above which assets stay inline (10 MiB)
pub const DEFAULT_SIZE_CAP_BYTES: u64 = 10 * 1024 * 1024;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn data_uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i:data:)([A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*/[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*)(?:;[A-Za-z0-9_.+-]+=[A-Za-z0-9_.+-]+)*(?i:;base64,)([A-Za-z0-9+/]+={0,2})",
        )
        .expect("data URI pattern is valid")
    })
}

/// Normalize a raw payload.
///
/// Payloads larger than `size_cap_bytes` keep their assets inline and carry
/// an [`OversizeWarning`]. Fails with `CorruptPayload` only when the bytes
/// are not readable as markup text at all.
pub fn normalize(raw: &[u8], size_cap_bytes: u64) -> Result<NormalizedDocument, BranchError> {
    let text = decode_markup(raw)?;
    let canonical = canonicalize_line_endings(text);

    let payload_bytes = raw.len() as u64;
    if payload_bytes > size_cap_bytes {
        let warning = OversizeWarning {
            payload_bytes,
            size_cap_bytes,
        };
        return Ok(NormalizedDocument::new(canonical, Vec::new(), Some(warning)));
    }

    let mut assets: Vec<ExtractedAsset> = Vec::new();
    let mut seen = HashSet::new();

    let replaced = data_uri_regex().replace_all(&canonical, |caps: &Captures| {
        let whole = caps[0].to_string();
        let bytes = match STANDARD.decode(&caps[2]) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            // Undecodable or empty: leave the original text untouched
            _ => return whole,
        };
        let mime_type = caps[1].to_ascii_lowercase();
        let hash = content_hash(&bytes);
        let token = placeholder_token(&hash, &mime_type);

        if seen.insert(token.clone()) {
            assets.push(ExtractedAsset {
                reference: AssetReference {
                    content_hash: hash,
                    mime_type,
                    byte_length: bytes.len() as u64,
                    placeholder_id: token.clone(),
                },
                bytes,
            });
        }
        token
    });
    let canonical_text = replaced.into_owned();

    Ok(NormalizedDocument::new(canonical_text, assets, None))
}

/// Decode the payload as UTF-8 markup, dropping a leading byte-order mark
fn decode_markup(raw: &[u8]) -> Result<&str, BranchError> {
    let body = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
    let text = std::str::from_utf8(body).map_err(|e| {
        BranchError::CorruptPayload(format!(
            "payload is not UTF-8 text (invalid byte at offset {})",
            e.valid_up_to()
        ))
    })?;
    if let Some(pos) = text.find('\0') {
        return Err(BranchError::CorruptPayload(format!(
            "payload contains a NUL byte at offset {}",
            pos
        )));
    }
    Ok(text)
}

fn canonicalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}
