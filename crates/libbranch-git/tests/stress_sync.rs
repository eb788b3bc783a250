//! Concurrent runs against one repository
//!
//! Each thread opens its own writer since git2::Repository is not Sync.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{TimeZone, Utc};
use libbranch_core::source::{ExportManifest, ExportRevision};
use libbranch_core::{
    BlobStore, BranchError, EngineOptions, ExportDirSource, RetryPolicy, StateStore, SyncEngine,
};
use libbranch_git::GitSnapshotWriter;
use tempfile::tempdir;

fn export_document(root: &Path, document_id: &str, title: &str, revisions: usize) {
    let source = ExportDirSource::new(root);
    let logo = STANDARD.encode(b"shared logo bytes");
    let manifest = ExportManifest {
        title: title.to_string(),
        revisions: (0..revisions)
            .map(|i| ExportRevision {
                id: (i + 1).to_string(),
                modified_time: Utc.timestamp_opt(1_000 + i as i64, 0).unwrap(),
                author: Some(format!("{}@example.com", document_id)),
                size_bytes: None,
            })
            .collect(),
    };
    source.write_manifest(document_id, &manifest).unwrap();
    for i in 0..revisions {
        let html = format!(
            r#"<h1>{}</h1><p>revision {}</p><img src="data:image/png;base64,{}">"#,
            title,
            i + 1,
            logo
        );
        source
            .write_payload(document_id, &(i + 1).to_string(), html.as_bytes())
            .unwrap();
    }
}

fn run_once(home: &Path, repo: &Path, export: &Path, document_id: &str) -> Result<usize, BranchError> {
    let writer = GitSnapshotWriter::open(repo)?;
    let engine = SyncEngine::new(
        ExportDirSource::new(export),
        writer,
        home,
        EngineOptions {
            size_cap_bytes: 1024 * 1024,
            retry: RetryPolicy::immediate(2),
        },
    )?;
    let report = engine.run(document_id)?;
    assert!(report.halted.is_none(), "{:?}", report.halted);
    Ok(report.imported())
}

#[test]
fn test_distinct_documents_in_parallel() {
    let home = tempdir().unwrap();
    let repo = tempdir().unwrap();
    let export = tempdir().unwrap();
    GitSnapshotWriter::open_or_init(repo.path()).unwrap();

    let num_docs = 6;
    let revisions = 5;
    for d in 0..num_docs {
        export_document(export.path(), &format!("doc{}", d), &format!("Doc {}", d), revisions);
    }

    let paths: Arc<(PathBuf, PathBuf, PathBuf)> = Arc::new((
        home.path().to_path_buf(),
        repo.path().to_path_buf(),
        export.path().to_path_buf(),
    ));
    let barrier = Arc::new(Barrier::new(num_docs));

    let handles: Vec<_> = (0..num_docs)
        .map(|d| {
            let paths = Arc::clone(&paths);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                run_once(&paths.0, &paths.1, &paths.2, &format!("doc{}", d)).unwrap()
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), revisions);
    }

    let writer = GitSnapshotWriter::open(repo.path()).unwrap();
    assert_eq!(writer.commit_count().unwrap(), num_docs * revisions);
    for d in 0..num_docs {
        let history = writer.document_history(&format!("Doc-{}", d)).unwrap();
        assert_eq!(history.len(), revisions);
        let stamps: Vec<_> = history.iter().map(|h| h.timestamp).collect();
        let mut sorted = stamps.clone();
        sorted.sort();
        assert_eq!(stamps, sorted, "commits for Doc-{} out of order", d);
    }

    let blobs = BlobStore::for_repo(repo.path()).unwrap();
    assert_eq!(blobs.list().unwrap().len(), 1);
}

#[test]
fn test_same_document_is_never_synced_twice_at_once() {
    let home = tempdir().unwrap();
    let repo = tempdir().unwrap();
    let export = tempdir().unwrap();
    GitSnapshotWriter::open_or_init(repo.path()).unwrap();
    let revisions = 8;
    export_document(export.path(), "doc1", "Contended", revisions);

    let paths: Arc<(PathBuf, PathBuf, PathBuf)> = Arc::new((
        home.path().to_path_buf(),
        repo.path().to_path_buf(),
        export.path().to_path_buf(),
    ));
    let num_threads = 6;
    let barrier = Arc::new(Barrier::new(num_threads));
    let imported = Arc::new(AtomicUsize::new(0));
    let locked = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let paths = Arc::clone(&paths);
            let barrier = Arc::clone(&barrier);
            let imported = Arc::clone(&imported);
            let locked = Arc::clone(&locked);
            thread::spawn(move || {
                barrier.wait();
                match run_once(&paths.0, &paths.1, &paths.2, "doc1") {
                    Ok(n) => {
                        imported.fetch_add(n, Ordering::SeqCst);
                    }
                    Err(BranchError::Locked(_)) => {
                        locked.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => panic!("unexpected error: {}", e),
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    // Every revision imported exactly once, however the runs interleaved
    assert_eq!(imported.load(Ordering::SeqCst), revisions);
    let writer = GitSnapshotWriter::open(repo.path()).unwrap();
    assert_eq!(writer.commit_count().unwrap(), revisions);
    let state = StateStore::new(home.path()).load("doc1").unwrap().unwrap();
    assert_eq!(state.last_imported_revision_id.as_deref(), Some("8"));
}
