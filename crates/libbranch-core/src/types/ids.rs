use sha2::{Digest, Sha256};
use thiserror::Error;

/// 256-bit content hash (SHA-256 of the raw asset bytes)
pub type ContentHash = [u8; 32];

#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Hash raw bytes into a content address
pub fn content_hash(bytes: &[u8]) -> ContentHash {
    Sha256::digest(bytes).into()
}

/// Convert a fixed-size byte array to lowercase hex string
pub fn id_to_hex<const N: usize>(id: &[u8; N]) -> String {
    hex::encode(id)
}

/// Parse a hex string into a fixed-size byte array
pub fn hex_to_id<const N: usize>(hex_str: &str) -> Result<[u8; N], IdParseError> {
    let bytes = hex::decode(hex_str)?;
    if bytes.len() != N {
        return Err(IdParseError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// Parse a content hash from hex string
pub fn parse_content_hash(hex_str: &str) -> Result<ContentHash, IdParseError> {
    hex_to_id::<32>(hex_str)
}

/// Document ids become directory names under the branch home, so only
/// `[A-Za-z0-9_.-]` is accepted and `.`/`..` are refused.
pub fn is_valid_document_id(document_id: &str) -> bool {
    !document_id.is_empty()
        && document_id != "."
        && document_id != ".."
        && document_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_sha256() {
        let hash = content_hash(b"abc");
        assert_eq!(
            id_to_hex(&hash),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_identical_bytes_same_hash() {
        assert_eq!(content_hash(b"same"), content_hash(b"same"));
        assert_ne!(content_hash(b"same"), content_hash(b"other"));
    }

    #[test]
    fn test_hex_to_id_invalid_length() {
        let result: Result<[u8; 32], _> = hex_to_id("0001020304");
        assert!(matches!(result, Err(IdParseError::InvalidLength { .. })));
    }

    #[test]
    fn test_hex_to_id_invalid_hex() {
        let result = parse_content_hash("not_valid_hex!");
        assert!(matches!(result, Err(IdParseError::InvalidHex(_))));
    }

    #[test]
    fn test_parse_content_hash() {
        let hash = content_hash(b"payload");
        let parsed = parse_content_hash(&id_to_hex(&hash)).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn test_document_id_validation() {
        assert!(is_valid_document_id("1AbC_def-9.x"));
        assert!(!is_valid_document_id(""));
        assert!(!is_valid_document_id(".."));
        assert!(!is_valid_document_id("a/b"));
        assert!(!is_valid_document_id("doc id"));
    }
}
