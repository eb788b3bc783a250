//! Single-revision import: normalize, store blobs, commit
//!
//! Shared by the sync engine and the offline `import` command. Nothing here
//! touches sync state; the engine decides when a revision counts as done.

use std::fs;

use tracing::{debug, warn};

use crate::blob::BlobStore;
use crate::error::BranchError;
use crate::normalize::normalize;
use crate::snapshot::{commit_message, CommitOutcome, MaterializedTree, SnapshotWriter};
use crate::types::document::OversizeWarning;
use crate::types::revision::RevisionDescriptor;

/// Where a document lives in the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTarget {
    pub title: String,
    /// Directory under the repository root
    pub slug: String,
}

/// What importing one revision did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedRevision {
    pub outcome: CommitOutcome,
    /// Distinct assets referenced by the snapshot
    pub assets: usize,
    /// Assets whose bytes were new to the blob store
    pub blobs_written: usize,
    pub oversize: Option<OversizeWarning>,
}

/// Runs revisions through normalize → blob store → snapshot writer
pub struct RevisionImporter<W> {
    writer: W,
    blobs: BlobStore,
    size_cap_bytes: u64,
}

impl<W: SnapshotWriter> RevisionImporter<W> {
    /// Create an importer whose blob store lives in the writer's repository
    pub fn new(writer: W, size_cap_bytes: u64) -> Result<Self, BranchError> {
        let blobs = BlobStore::for_repo(writer.repo_root())?;
        Ok(Self {
            writer,
            blobs,
            size_cap_bytes,
        })
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Make sure the document directory exists in the working tree
    pub fn prepare(&self, target: &DocumentTarget) -> Result<(), BranchError> {
        fs::create_dir_all(self.writer.repo_root().join(&target.slug))?;
        Ok(())
    }

    /// Import one payload as the snapshot for `descriptor`
    pub fn import(
        &self,
        target: &DocumentTarget,
        descriptor: &RevisionDescriptor,
        payload: &[u8],
    ) -> Result<ImportedRevision, BranchError> {
        let doc = normalize(payload, self.size_cap_bytes)?;
        if let Some(warning) = doc.oversize() {
            warn!(
                revision_id = %descriptor.revision_id,
                payload_bytes = warning.payload_bytes,
                size_cap_bytes = warning.size_cap_bytes,
                "payload over size cap, importing without asset extraction"
            );
        }

        let mut blobs_written = 0;
        for asset in doc.assets() {
            if self.blobs.store(&asset.bytes)?.written {
                blobs_written += 1;
            }
        }

        let tree = MaterializedTree::resolve(&doc, &self.blobs)?;
        let message = commit_message(&target.title, descriptor);
        let outcome = self.writer.commit(
            &target.slug,
            &tree,
            &descriptor.author,
            descriptor.timestamp,
            &message,
        )?;

        match &outcome {
            CommitOutcome::Committed(id) => {
                debug!(revision_id = %descriptor.revision_id, commit = %id, "snapshot committed")
            }
            CommitOutcome::NoOp => {
                debug!(revision_id = %descriptor.revision_id, "snapshot unchanged, no commit")
            }
        }

        Ok(ImportedRevision {
            outcome,
            assets: doc.assets().len(),
            blobs_written,
            oversize: doc.oversize().cloned(),
        })
    }
}
