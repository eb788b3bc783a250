//! Durable per-document sync marker
//!
//! One record per tracked document at
//! `<home>/documents/<document_id>/state.toml`. The marker only moves forward
//! and is written atomically, strictly after the snapshot for the revision
//! it names has been committed (or found unchanged).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::atomic::write_atomic;
use crate::config::{document_dir, documents_dir};
use crate::error::BranchError;
use crate::types::revision::{RevisionDescriptor, RevisionKey};

/// Lifecycle phase of a document, as last persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// A run is in progress, or crashed while in progress
    Syncing,
    /// Last run finished without a halting error
    Idle,
    /// Last run halted; the marker sits just before the failing revision
    Error,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Syncing => "syncing",
            SyncPhase::Idle => "idle",
            SyncPhase::Error => "error",
        }
    }
}

/// Persisted sync record for one document. A document without a record
/// has never been synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub document_id: String,
    /// Title at first import; the slug is derived from it once and kept
    pub document_title: String,
    pub document_slug: String,
    pub repo_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_imported_revision_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_imported_timestamp: Option<DateTime<Utc>>,
    pub phase: SyncPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    /// Fresh record for a document that has never been imported
    pub fn new(
        document_id: &str,
        document_title: &str,
        document_slug: &str,
        repo_path: &Path,
    ) -> Self {
        Self {
            document_id: document_id.to_string(),
            document_title: document_title.to_string(),
            document_slug: document_slug.to_string(),
            repo_path: repo_path.to_path_buf(),
            last_imported_revision_id: None,
            last_imported_timestamp: None,
            phase: SyncPhase::Idle,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// Position of the last imported revision, if any
    pub fn marker(&self) -> Option<RevisionKey> {
        match (&self.last_imported_revision_id, self.last_imported_timestamp) {
            (Some(id), Some(ts)) => Some(RevisionKey::new(ts, id.clone())),
            _ => None,
        }
    }

    /// Whether a revision lies beyond the marker
    pub fn is_pending(&self, descriptor: &RevisionDescriptor) -> bool {
        match self.marker() {
            Some(marker) => descriptor.key() > marker,
            None => true,
        }
    }

    /// Move the marker to a revision. Refuses to move backwards.
    pub fn advance(&mut self, descriptor: &RevisionDescriptor) -> Result<(), BranchError> {
        if let Some(marker) = self.marker() {
            if descriptor.key() < marker {
                return Err(BranchError::Internal(format!(
                    "refusing to move sync marker back from {} to {}",
                    marker,
                    descriptor.key()
                )));
            }
        }
        self.last_imported_revision_id = Some(descriptor.revision_id.clone());
        self.last_imported_timestamp = Some(descriptor.timestamp);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_phase(&mut self, phase: SyncPhase, last_error: Option<String>) {
        self.phase = phase;
        self.last_error = last_error;
        self.updated_at = Utc::now();
    }
}

/// Reads and writes [`SyncState`] records under a home directory
#[derive(Debug, Clone)]
pub struct StateStore {
    home: PathBuf,
}

impl StateStore {
    pub fn new(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Record directory of a document
    pub fn document_dir(&self, document_id: &str) -> Result<PathBuf, BranchError> {
        document_dir(&self.home, document_id)
    }

    fn state_path(&self, document_id: &str) -> Result<PathBuf, BranchError> {
        Ok(self.document_dir(document_id)?.join("state.toml"))
    }

    /// Load a document's record, if it has one
    pub fn load(&self, document_id: &str) -> Result<Option<SyncState>, BranchError> {
        let path = self.state_path(document_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let state: SyncState = toml::from_str(&content)?;
        Ok(Some(state))
    }

    /// Durably replace a document's record
    pub fn save(&self, state: &SyncState) -> Result<(), BranchError> {
        let dir = self.document_dir(&state.document_id)?;
        fs::create_dir_all(&dir)?;
        let content = toml::to_string_pretty(state)?;
        write_atomic(&dir.join("state.toml"), content.as_bytes())?;
        Ok(())
    }

    /// All tracked documents, sorted by document id
    pub fn list(&self) -> Result<Vec<SyncState>, BranchError> {
        let dir = documents_dir(&self.home);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut states = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let document_id = entry.file_name().to_string_lossy().into_owned();
            match self.load(&document_id) {
                Ok(Some(state)) => states.push(state),
                // Directories without a readable record are skipped
                Ok(None) | Err(_) => continue,
            }
        }

        states.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn rev(id: &str, secs: i64) -> RevisionDescriptor {
        RevisionDescriptor::new(id, Utc.timestamp_opt(secs, 0).unwrap(), "a@example.com", 1)
    }

    #[test]
    fn test_state_roundtrip() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());

        let mut state = SyncState::new("doc1", "My Doc", "My-Doc", Path::new("/repo"));
        state.advance(&rev("7", 1_700_000_000)).unwrap();
        store.save(&state).unwrap();

        let loaded = store.load("doc1").unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.last_imported_revision_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_missing_state() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert!(store.load("nothing").unwrap().is_none());
    }

    #[test]
    fn test_marker_and_pending() {
        let mut state = SyncState::new("doc1", "doc", "doc", Path::new("/repo"));
        assert!(state.marker().is_none());
        assert!(state.is_pending(&rev("1", 100)));

        state.advance(&rev("2", 200)).unwrap();

        assert!(!state.is_pending(&rev("1", 100)));
        assert!(!state.is_pending(&rev("2", 200)));
        assert!(state.is_pending(&rev("3", 200)));
        assert!(state.is_pending(&rev("0", 300)));
    }

    #[test]
    fn test_marker_never_moves_backwards() {
        let mut state = SyncState::new("doc1", "doc", "doc", Path::new("/repo"));
        state.advance(&rev("2", 200)).unwrap();

        assert!(state.advance(&rev("1", 100)).is_err());
        assert_eq!(state.last_imported_revision_id.as_deref(), Some("2"));

        // Re-recording the same revision is allowed
        state.advance(&rev("2", 200)).unwrap();
    }

    #[test]
    fn test_list_states() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        store.save(&SyncState::new("b", "B", "B", Path::new("/r"))).unwrap();
        store.save(&SyncState::new("a", "A", "A", Path::new("/r"))).unwrap();
        std::fs::create_dir_all(documents_dir(dir.path()).join("empty")).unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|s| s.document_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_phase_persists() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let mut state = SyncState::new("doc1", "doc", "doc", Path::new("/repo"));
        state.set_phase(SyncPhase::Error, Some("permanent source error: gone".into()));
        store.save(&state).unwrap();

        let loaded = store.load("doc1").unwrap().unwrap();
        assert_eq!(loaded.phase, SyncPhase::Error);
        assert_eq!(loaded.last_error.as_deref(), Some("permanent source error: gone"));
    }
}
