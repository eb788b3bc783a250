//! Snapshot materialization and the version-control seam
//!
//! A snapshot is the normalized text with every placeholder resolved to the
//! relative path of its blob, plus the blobs it references. A
//! [`SnapshotWriter`] records it as one commit.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::blob::BlobStore;
use crate::error::BranchError;
use crate::types::document::NormalizedDocument;
use crate::types::ids::id_to_hex;
use crate::types::revision::RevisionDescriptor;

/// Name of the working file inside a document directory
pub const DOCUMENT_FILE: &str = "doc.html";

/// How the working file reaches the repository-level blob store
pub const ASSET_LINK_PREFIX: &str = "../blobs/";

/// A blob the snapshot references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    /// Path relative to the repository root, `/`-separated
    pub repo_path: String,
    /// Where the bytes are on disk
    pub fs_path: PathBuf,
}

/// Fully resolved tree for one revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedTree {
    /// Working file contents with all placeholders resolved
    pub content: Vec<u8>,
    pub assets: Vec<AssetFile>,
}

impl MaterializedTree {
    /// Resolve placeholders against a blob store. Every referenced blob must
    /// already be stored.
    pub fn resolve(doc: &NormalizedDocument, blobs: &BlobStore) -> Result<Self, BranchError> {
        let mut text = doc.canonical_text().to_string();
        let mut assets = Vec::with_capacity(doc.assets().len());

        for reference in doc.asset_references() {
            let hash = &reference.content_hash;
            if !blobs.exists(hash) {
                return Err(BranchError::Internal(format!(
                    "blob {} referenced before it was stored",
                    id_to_hex(hash)
                )));
            }
            let link = format!("{}{}", ASSET_LINK_PREFIX, id_to_hex(hash));
            text = text.replace(&reference.placeholder_id, &link);
            assets.push(AssetFile {
                repo_path: BlobStore::relative_path(hash),
                fs_path: blobs.path(hash),
            });
        }

        Ok(Self {
            content: text.into_bytes(),
            assets,
        })
    }
}

/// Result of recording a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new commit, identified by the backend's native id
    Committed(String),
    /// The tree matched the current head; nothing was recorded
    NoOp,
}

impl CommitOutcome {
    pub fn commit_id(&self) -> Option<&str> {
        match self {
            CommitOutcome::Committed(id) => Some(id),
            CommitOutcome::NoOp => None,
        }
    }
}

/// Records snapshots in a version-control repository
pub trait SnapshotWriter {
    /// Working tree root of the repository
    fn repo_root(&self) -> &Path;

    /// Record `tree` as the new state of `<subpath>/doc.html`.
    ///
    /// Must return [`CommitOutcome::NoOp`] instead of creating an empty
    /// commit when the tree is identical to the current head.
    fn commit(
        &self,
        subpath: &str,
        tree: &MaterializedTree,
        author: &str,
        timestamp: DateTime<Utc>,
        message: &str,
    ) -> Result<CommitOutcome, BranchError>;
}

impl<W: SnapshotWriter + ?Sized> SnapshotWriter for &W {
    fn repo_root(&self) -> &Path {
        (**self).repo_root()
    }

    fn commit(
        &self,
        subpath: &str,
        tree: &MaterializedTree,
        author: &str,
        timestamp: DateTime<Utc>,
        message: &str,
    ) -> Result<CommitOutcome, BranchError> {
        (**self).commit(subpath, tree, author, timestamp, message)
    }
}

/// Commit message carrying the upstream revision id for provenance
pub fn commit_message(title: &str, descriptor: &RevisionDescriptor) -> String {
    format!(
        "{}: import revision {} at {}",
        title,
        descriptor.revision_id,
        descriptor
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}
