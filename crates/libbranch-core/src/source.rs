//! Revision sources
//!
//! A [`RevisionSource`] enumerates the revisions of a remote document and
//! hands out their raw payloads. Implementations report failures as
//! `TransientSource` (worth retrying) or `PermanentSource` (will not get
//! better by waiting); the engine handles retries.
//!
//! [`ExportDirSource`] reads revisions that were exported to disk:
//!
//! ```text
//! <root>/<document_id>/manifest.json
//! <root>/<document_id>/revisions/<revision_id>.html
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_AUTHOR;
use crate::error::BranchError;
use crate::types::ids::is_valid_document_id;
use crate::types::revision::RevisionDescriptor;

/// Read-only access to a document's remote revision history
pub trait RevisionSource {
    /// Human title of the document, used to derive its directory name
    fn document_title(&self, document_id: &str) -> Result<String, BranchError>;

    /// All revisions of the document, oldest first
    fn list_revisions(&self, document_id: &str) -> Result<Vec<RevisionDescriptor>, BranchError>;

    /// Raw payload bytes of one revision
    fn fetch_payload(&self, document_id: &str, revision_id: &str) -> Result<Vec<u8>, BranchError>;
}

impl<S: RevisionSource + ?Sized> RevisionSource for &S {
    fn document_title(&self, document_id: &str) -> Result<String, BranchError> {
        (**self).document_title(document_id)
    }

    fn list_revisions(&self, document_id: &str) -> Result<Vec<RevisionDescriptor>, BranchError> {
        (**self).list_revisions(document_id)
    }

    fn fetch_payload(&self, document_id: &str, revision_id: &str) -> Result<Vec<u8>, BranchError> {
        (**self).fetch_payload(document_id, revision_id)
    }
}

/// `manifest.json` of an exported document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub title: String,
    #[serde(default)]
    pub revisions: Vec<ExportRevision>,
}

/// One revision entry in an export manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRevision {
    pub id: String,
    pub modified_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Revision source backed by an export directory
#[derive(Debug, Clone)]
pub struct ExportDirSource {
    root: PathBuf,
}

impl ExportDirSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_root(&self, document_id: &str) -> Result<PathBuf, BranchError> {
        if !is_valid_document_id(document_id) {
            return Err(BranchError::InvalidArgs(format!(
                "invalid document id '{}'",
                document_id
            )));
        }
        Ok(self.root.join(document_id))
    }

    fn payload_path(&self, document_id: &str, revision_id: &str) -> Result<PathBuf, BranchError> {
        if !is_valid_document_id(revision_id) {
            return Err(BranchError::PermanentSource(format!(
                "revision id '{}' of {} is not a valid file name",
                revision_id, document_id
            )));
        }
        Ok(self
            .document_root(document_id)?
            .join("revisions")
            .join(format!("{}.html", revision_id)))
    }

    fn read_manifest(&self, document_id: &str) -> Result<ExportManifest, BranchError> {
        let path = self.document_root(document_id)?.join("manifest.json");
        let content = fs::read(&path)
            .map_err(|e| classify_io(e, &format!("manifest of {}", document_id)))?;
        serde_json::from_slice(&content).map_err(|e| {
            BranchError::PermanentSource(format!("manifest of {} is invalid: {}", document_id, e))
        })
    }

    /// Write a manifest; used to build exports and fixtures
    pub fn write_manifest(
        &self,
        document_id: &str,
        manifest: &ExportManifest,
    ) -> Result<(), BranchError> {
        let dir = self.document_root(document_id)?;
        fs::create_dir_all(dir.join("revisions"))?;
        fs::write(dir.join("manifest.json"), serde_json::to_vec_pretty(manifest)?)?;
        Ok(())
    }

    /// Write one revision payload; used to build exports and fixtures
    pub fn write_payload(
        &self,
        document_id: &str,
        revision_id: &str,
        payload: &[u8],
    ) -> Result<(), BranchError> {
        let path = self.payload_path(document_id, revision_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, payload)?;
        Ok(())
    }
}

impl RevisionSource for ExportDirSource {
    fn document_title(&self, document_id: &str) -> Result<String, BranchError> {
        Ok(self.read_manifest(document_id)?.title)
    }

    fn list_revisions(&self, document_id: &str) -> Result<Vec<RevisionDescriptor>, BranchError> {
        let manifest = self.read_manifest(document_id)?;
        let mut revisions: Vec<RevisionDescriptor> = manifest
            .revisions
            .into_iter()
            .map(|rev| RevisionDescriptor {
                size_bytes: rev.size_bytes.unwrap_or(0),
                author: rev
                    .author
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
                timestamp: rev.modified_time,
                revision_id: rev.id,
            })
            .collect();
        revisions.sort_by_key(|r| r.key());
        Ok(revisions)
    }

    fn fetch_payload(&self, document_id: &str, revision_id: &str) -> Result<Vec<u8>, BranchError> {
        let path = self.payload_path(document_id, revision_id)?;
        fs::read(&path).map_err(|e| {
            classify_io(e, &format!("revision {} of {}", revision_id, document_id))
        })
    }
}

/// Missing or forbidden files will not come back by retrying; anything
/// else (interrupted reads, network filesystems) might.
fn classify_io(err: std::io::Error, what: &str) -> BranchError {
    match err.kind() {
        ErrorKind::NotFound => BranchError::PermanentSource(format!("{} not found", what)),
        ErrorKind::PermissionDenied => {
            BranchError::PermanentSource(format!("{}: permission denied", what))
        }
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            BranchError::PermanentSource(format!("{}: {}", what, err))
        }
        _ => BranchError::TransientSource(format!("{}: {}", what, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn manifest() -> ExportManifest {
        ExportManifest {
            title: "Design Notes".to_string(),
            revisions: vec![
                ExportRevision {
                    id: "10".to_string(),
                    modified_time: Utc.timestamp_opt(200, 0).unwrap(),
                    author: Some("b@example.com".to_string()),
                    size_bytes: Some(5),
                },
                ExportRevision {
                    id: "9".to_string(),
                    modified_time: Utc.timestamp_opt(100, 0).unwrap(),
                    author: None,
                    size_bytes: None,
                },
            ],
        }
    }

    #[test]
    fn test_list_sorted_oldest_first() {
        let temp = TempDir::new().unwrap();
        let source = ExportDirSource::new(temp.path());
        source.write_manifest("doc1", &manifest()).unwrap();

        let revisions = source.list_revisions("doc1").unwrap();

        let ids: Vec<_> = revisions.iter().map(|r| r.revision_id.as_str()).collect();
        assert_eq!(ids, vec!["9", "10"]);
        assert_eq!(revisions[0].author, DEFAULT_AUTHOR);
        assert_eq!(revisions[1].size_bytes, 5);
        assert_eq!(source.document_title("doc1").unwrap(), "Design Notes");
    }

    #[test]
    fn test_list_mixed_ids_ascending() {
        let temp = TempDir::new().unwrap();
        let source = ExportDirSource::new(temp.path());
        let ids: Vec<String> = (0..200)
            .map(|i| match i % 4 {
                0 => i.to_string(),
                1 => format!("{}a", i),
                2 => format!("0{}", i),
                _ => format!("r{}", i),
            })
            .collect();
        let manifest = ExportManifest {
            title: "Mixed".to_string(),
            revisions: ids
                .iter()
                .map(|id| ExportRevision {
                    id: id.clone(),
                    modified_time: Utc.timestamp_opt(100, 0).unwrap(),
                    author: None,
                    size_bytes: None,
                })
                .collect(),
        };
        source.write_manifest("doc1", &manifest).unwrap();

        let revisions = source.list_revisions("doc1").unwrap();

        assert_eq!(revisions.len(), 200);
        assert!(revisions.windows(2).all(|w| w[0].key() < w[1].key()));
    }

    #[test]
    fn test_fetch_payload() {
        let temp = TempDir::new().unwrap();
        let source = ExportDirSource::new(temp.path());
        source.write_manifest("doc1", &manifest()).unwrap();
        source.write_payload("doc1", "9", b"<p>hi</p>").unwrap();

        assert_eq!(source.fetch_payload("doc1", "9").unwrap(), b"<p>hi</p>");
    }

    #[test]
    fn test_missing_payload_is_permanent() {
        let temp = TempDir::new().unwrap();
        let source = ExportDirSource::new(temp.path());
        source.write_manifest("doc1", &manifest()).unwrap();

        let err = source.fetch_payload("doc1", "10").unwrap_err();
        assert!(matches!(err, BranchError::PermanentSource(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_document_is_permanent() {
        let temp = TempDir::new().unwrap();
        let source = ExportDirSource::new(temp.path());
        assert!(matches!(
            source.list_revisions("nope"),
            Err(BranchError::PermanentSource(_))
        ));
    }

    #[test]
    fn test_bad_manifest_is_permanent() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("doc1")).unwrap();
        std::fs::write(temp.path().join("doc1/manifest.json"), "{not json").unwrap();
        let source = ExportDirSource::new(temp.path());

        assert!(matches!(
            source.list_revisions("doc1"),
            Err(BranchError::PermanentSource(_))
        ));
    }

    #[test]
    fn test_revision_id_cannot_escape() {
        let temp = TempDir::new().unwrap();
        let source = ExportDirSource::new(temp.path());
        assert!(matches!(
            source.fetch_payload("doc1", "../../secret"),
            Err(BranchError::PermanentSource(_))
        ));
    }

    #[test]
    fn test_io_classification() {
        let transient = classify_io(std::io::Error::from(ErrorKind::TimedOut), "x");
        assert!(transient.is_retryable());
        let permanent = classify_io(std::io::Error::from(ErrorKind::PermissionDenied), "x");
        assert!(!permanent.is_retryable());
    }
}
