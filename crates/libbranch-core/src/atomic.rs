//! Crash-safe file replacement
//!
//! Writers never expose a partially written file: bytes go to a uniquely
//! named temporary sibling, are fsynced, then renamed over the target.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::Rng;

/// Atomically replace `path` with `bytes`
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = temp_sibling(path);
    let result = write_and_rename(&tmp, path, bytes);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Like [`write_atomic`], but never replaces an existing file.
///
/// Returns `false` when the target already existed. Callers only use this
/// for content-addressed files, so two racing writers carry identical bytes
/// and either rename may win.
pub fn write_atomic_new(path: &Path, bytes: &[u8]) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let tmp = temp_sibling(path);
    let written = write_and_sync(&tmp, bytes).and_then(|()| {
        match fs::rename(&tmp, path) {
            Ok(()) => Ok(true),
            // Windows refuses to rename over an existing file
            Err(_) if path.exists() => Ok(false),
            Err(e) => Err(e),
        }
    });
    if !matches!(written, Ok(true)) {
        let _ = fs::remove_file(&tmp);
    }
    if matches!(written, Ok(true)) {
        sync_parent(path);
    }
    written
}

fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    write_and_sync(tmp, bytes)?;
    fs::rename(tmp, path)?;
    sync_parent(path);
    Ok(())
}

fn write_and_sync(tmp: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let nonce: u64 = rand::thread_rng().gen();
    path.with_file_name(format!(".{}.tmp-{}-{:016x}", name, std::process::id(), nonce))
}

/// Persist the rename itself (best effort)
#[cfg(unix)]
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_temps(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .contains(".tmp-")
            })
            .count()
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.toml");

        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert_eq!(leftover_temps(temp.path()), 0);
    }

    #[test]
    fn test_write_atomic_new_keeps_existing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blob");

        assert!(write_atomic_new(&path, b"first").unwrap());
        assert!(!write_atomic_new(&path, b"second").unwrap());

        assert_eq!(fs::read(&path).unwrap(), b"first");
        assert_eq!(leftover_temps(temp.path()), 0);
    }
}
