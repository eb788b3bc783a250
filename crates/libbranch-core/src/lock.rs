//! Per-document sync lock
//!
//! Only one run may import a given document at a time. The lock is an
//! exclusive `flock` on `<document dir>/sync.lock`, held for the lifetime of
//! [`DocumentLock`] and released on drop. The operating system drops the
//! `flock` when its holder dies, so a lock left behind by a crashed run is
//! stale by construction: the file still carries the dead holder's record,
//! which is reported and overwritten when the next run acquires it.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BranchError;

/// Holder record written into the lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Process ID of the lock holder
    pub pid: u32,
    /// When the lock was taken (Unix timestamp in ms)
    pub acquired_ts: u64,
    /// Document being synced
    pub document_id: String,
}

impl LockRecord {
    fn current(document_id: &str) -> Self {
        Self {
            pid: std::process::id(),
            acquired_ts: current_time_ms(),
            document_id: document_id.to_string(),
        }
    }
}

/// Exclusive sync lock on one document's record directory
pub struct DocumentLock {
    /// Lock file handle - flock released on drop
    file: File,
    path: PathBuf,
    record: LockRecord,
    /// Record left behind by a holder that no longer holds the flock
    reclaimed: Option<LockRecord>,
}

impl std::fmt::Debug for DocumentLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLock")
            .field("path", &self.path)
            .field("record", &self.record)
            .finish()
    }
}

impl DocumentLock {
    /// Get the lock file path for a document directory
    pub fn lock_path(document_dir: &Path) -> PathBuf {
        document_dir.join("sync.lock")
    }

    /// Try to take the lock without blocking.
    ///
    /// Returns `BranchError::Locked` if another live run holds it.
    pub fn acquire(document_dir: &Path, document_id: &str) -> Result<Self, BranchError> {
        fs::create_dir_all(document_dir)?;
        let path = Self::lock_path(document_dir);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            let details = read_record(&mut file)
                .map(|holder| format!("held by PID {} since {}", holder.pid, holder.acquired_ts));
            return Err(BranchError::document_locked(document_id, details.as_deref()));
        }

        let reclaimed = read_record(&mut file);
        if let Some(stale) = &reclaimed {
            warn!(
                document_id,
                stale_pid = stale.pid,
                "reclaiming lock left by a run that is no longer alive"
            );
        }

        let record = LockRecord::current(document_id);
        write_record(&mut file, &record)?;
        debug!(document_id, path = %path.display(), "document lock acquired");

        Ok(Self {
            file,
            path,
            record,
            reclaimed,
        })
    }

    /// Read the holder record without taking the lock
    pub fn read(document_dir: &Path) -> Result<Option<LockRecord>, BranchError> {
        let path = Self::lock_path(document_dir);
        if !path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&path)?;
        Ok(read_record(&mut file))
    }

    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    /// The dead holder's record, if this acquisition replaced one
    pub fn reclaimed(&self) -> Option<&LockRecord> {
        self.reclaimed.as_ref()
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        // An empty file means "released cleanly"; a record means "crashed"
        if let Err(e) = self.file.set_len(0) {
            warn!(path = %self.path.display(), "failed to clear lock record: {}", e);
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), "failed to release lock: {}", e);
        }
    }
}

fn read_record(file: &mut File) -> Option<LockRecord> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;
    if contents.trim().is_empty() {
        return None;
    }
    serde_json::from_str(&contents).ok()
}

fn write_record(file: &mut File, record: &LockRecord) -> Result<(), BranchError> {
    let contents = serde_json::to_string_pretty(record)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Get current time in milliseconds since Unix epoch
fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_release() {
        let temp = TempDir::new().unwrap();

        let lock = DocumentLock::acquire(temp.path(), "doc1").unwrap();
        assert_eq!(lock.record().pid, std::process::id());
        assert_eq!(
            DocumentLock::read(temp.path()).unwrap().unwrap().document_id,
            "doc1"
        );

        drop(lock);

        assert!(DocumentLock::read(temp.path()).unwrap().is_none());
    }

    #[test]
    fn test_second_acquire_is_refused() {
        let temp = TempDir::new().unwrap();

        let _held = DocumentLock::acquire(temp.path(), "doc1").unwrap();
        let second = DocumentLock::acquire(temp.path(), "doc1");

        match second {
            Err(BranchError::Locked(msg)) => assert!(msg.contains("PID")),
            other => panic!("expected Locked, got {:?}", other),
        }
    }

    #[test]
    fn test_released_lock_can_be_retaken() {
        let temp = TempDir::new().unwrap();

        drop(DocumentLock::acquire(temp.path(), "doc1").unwrap());
        let again = DocumentLock::acquire(temp.path(), "doc1").unwrap();

        assert!(again.reclaimed().is_none());
    }

    #[test]
    fn test_stale_record_is_reclaimed() {
        let temp = TempDir::new().unwrap();
        let stale = LockRecord {
            pid: 999_999,
            acquired_ts: 1,
            document_id: "doc1".to_string(),
        };
        fs::write(
            DocumentLock::lock_path(temp.path()),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let lock = DocumentLock::acquire(temp.path(), "doc1").unwrap();

        assert_eq!(lock.reclaimed(), Some(&stale));
        assert_eq!(lock.record().pid, std::process::id());
    }
}
