//! Read side of the snapshot history

use std::path::Path;

use chrono::{DateTime, Utc};
use git2::{Oid, Sort};
use libbranch_core::snapshot::DOCUMENT_FILE;

use crate::writer::GitSnapshotWriter;
use crate::GitError;

/// One commit that changed a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub commit_id: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl GitSnapshotWriter {
    /// Commits that changed `<subpath>/doc.html`, oldest first
    pub fn document_history(&self, subpath: &str) -> Result<Vec<HistoryEntry>, GitError> {
        if self.head_commit()?.is_none() {
            return Ok(Vec::new());
        }
        let repo = self.repository();
        let path = Path::new(subpath).join(DOCUMENT_FILE);

        let mut walk = repo.revwalk()?;
        walk.push_head()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

        let mut entries = Vec::new();
        for oid in walk {
            let commit = repo.find_commit(oid?)?;
            let current = blob_at(&commit, &path)?;
            let previous = match commit.parents().next() {
                Some(parent) => blob_at(&parent, &path)?,
                None => None,
            };
            if current.is_none() || current == previous {
                continue;
            }

            let author = commit.author();
            entries.push(HistoryEntry {
                commit_id: commit.id().to_string(),
                author_name: author.name().unwrap_or_default().to_string(),
                author_email: author.email().unwrap_or_default().to_string(),
                timestamp: DateTime::from_timestamp(author.when().seconds(), 0).unwrap_or_default(),
                message: commit.message().unwrap_or_default().to_string(),
            });
        }
        Ok(entries)
    }

    /// The document file as recorded in `commit_id`
    pub fn document_at(&self, commit_id: &str, subpath: &str) -> Result<Option<Vec<u8>>, GitError> {
        let repo = self.repository();
        let commit = repo.find_commit(Oid::from_str(commit_id)?)?;
        let path = Path::new(subpath).join(DOCUMENT_FILE);
        match blob_at(&commit, &path)? {
            Some(oid) => Ok(Some(repo.find_blob(oid)?.content().to_vec())),
            None => Ok(None),
        }
    }

    /// Number of commits reachable from HEAD
    pub fn commit_count(&self) -> Result<usize, GitError> {
        if self.head_commit()?.is_none() {
            return Ok(0);
        }
        let mut walk = self.repository().revwalk()?;
        walk.push_head()?;
        Ok(walk.count())
    }
}

fn blob_at(commit: &git2::Commit, path: &Path) -> Result<Option<Oid>, GitError> {
    match commit.tree()?.get_path(path) {
        Ok(entry) => Ok(Some(entry.id())),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
