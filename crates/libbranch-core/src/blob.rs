//! Content-addressed, append-only asset store
//!
//! Blobs live at `<root>/<sha256-hex>`. A blob is written once, on the first
//! `put` of its bytes, and never modified or deleted afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::atomic::write_atomic_new;
use crate::error::BranchError;
use crate::types::ids::{content_hash, id_to_hex, parse_content_hash, ContentHash};

/// Directory name of the blob store inside a repository
pub const BLOBS_DIR: &str = "blobs";

/// Result of storing bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobPut {
    pub hash: ContentHash,
    /// False when a blob with this hash was already present
    pub written: bool,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open or create a store rooted at the given directory
    pub fn open(root: &Path) -> Result<Self, BranchError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Open the store that lives inside a repository working tree
    pub fn for_repo(repo_root: &Path) -> Result<Self, BranchError> {
        Self::open(&repo_root.join(BLOBS_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store bytes and return their content hash. Idempotent.
    pub fn put(&self, bytes: &[u8]) -> Result<ContentHash, BranchError> {
        Ok(self.store(bytes)?.hash)
    }

    /// Store bytes, reporting whether this call wrote the blob
    pub fn store(&self, bytes: &[u8]) -> Result<BlobPut, BranchError> {
        let hash = content_hash(bytes);
        let written = write_atomic_new(&self.path(&hash), bytes)?;
        if written {
            debug!(hash = %id_to_hex(&hash), len = bytes.len(), "blob written");
        } else {
            debug!(hash = %id_to_hex(&hash), "blob already stored");
        }
        Ok(BlobPut { hash, written })
    }

    pub fn exists(&self, hash: &ContentHash) -> bool {
        self.path(hash).is_file()
    }

    /// Filesystem location of a blob
    pub fn path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(id_to_hex(hash))
    }

    /// Location of a blob relative to the repository root
    pub fn relative_path(hash: &ContentHash) -> String {
        format!("{}/{}", BLOBS_DIR, id_to_hex(hash))
    }

    pub fn read(&self, hash: &ContentHash) -> Result<Vec<u8>, BranchError> {
        let path = self.path(hash);
        if !path.is_file() {
            return Err(BranchError::NotFound(format!("blob {}", id_to_hex(hash))));
        }
        Ok(fs::read(path)?)
    }

    /// All stored hashes, sorted. Temporary files are skipped.
    pub fn list(&self) -> Result<Vec<ContentHash>, BranchError> {
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Ok(hash) = parse_content_hash(&name.to_string_lossy()) {
                hashes.push(hash);
            }
        }
        hashes.sort();
        Ok(hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::open(&temp.path().join("blobs")).unwrap();

        let first = store.store(b"image bytes").unwrap();
        let second = store.store(b"image bytes").unwrap();

        assert!(first.written);
        assert!(!second.written);
        assert_eq!(first.hash, second.hash);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_put_read_exists() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::for_repo(temp.path()).unwrap();

        let hash = store.put(b"abc").unwrap();
        assert!(store.exists(&hash));
        assert_eq!(store.read(&hash).unwrap(), b"abc");
        assert_eq!(store.path(&hash), temp.path().join("blobs").join(id_to_hex(&hash)));
        assert_eq!(
            BlobStore::relative_path(&hash),
            format!("blobs/{}", id_to_hex(&hash))
        );
    }

    #[test]
    fn test_missing_blob() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::open(temp.path()).unwrap();
        let hash = content_hash(b"never stored");

        assert!(!store.exists(&hash));
        assert!(matches!(store.read(&hash), Err(BranchError::NotFound(_))));
    }

    #[test]
    fn test_existing_blob_is_not_rewritten() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::open(temp.path()).unwrap();
        let hash = store.put(b"original").unwrap();
        let before = fs::metadata(store.path(&hash)).unwrap().modified().unwrap();

        store.put(b"original").unwrap();

        let after = fs::metadata(store.path(&hash)).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_list_ignores_foreign_files() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::open(temp.path()).unwrap();
        store.put(b"one").unwrap();
        store.put(b"two").unwrap();
        fs::write(temp.path().join("README"), "not a blob").unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
    }
}
