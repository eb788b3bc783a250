//! Revision synchronization engine
//!
//! One [`SyncEngine::run`] imports every revision of a document that lies
//! beyond its sync marker, oldest first, and advances the marker after each
//! snapshot is recorded. Runs are blocking and re-entrant; everything that
//! survives between runs lives in the [`SyncState`] record.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::BranchConfig;
use crate::error::BranchError;
use crate::lock::DocumentLock;
use crate::normalize::DEFAULT_SIZE_CAP_BYTES;
use crate::pipeline::{DocumentTarget, RevisionImporter};
use crate::retry::RetryPolicy;
use crate::slug::slugify;
use crate::snapshot::SnapshotWriter;
use crate::source::RevisionSource;
use crate::state::{StateStore, SyncPhase, SyncState};
use crate::types::document::OversizeWarning;
use crate::types::ids::is_valid_document_id;
use crate::types::revision::{RevisionDescriptor, RevisionKey};

/// Shared flag for stopping a run at the next revision boundary
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tunables for a [`SyncEngine`]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub size_cap_bytes: u64,
    pub retry: RetryPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            size_cap_bytes: DEFAULT_SIZE_CAP_BYTES,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&BranchConfig> for EngineOptions {
    fn from(config: &BranchConfig) -> Self {
        Self {
            size_cap_bytes: config.size_cap_bytes,
            retry: config.retry.clone(),
        }
    }
}

/// A revision the run got through, in processing order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedRevision {
    pub revision_id: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    /// `None` when the snapshot matched the previous one
    pub commit_id: Option<String>,
}

/// Oversize warning raised while importing a revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionWarning {
    pub revision_id: String,
    pub warning: OversizeWarning,
}

/// Why a run stopped before the end of its delta
#[derive(Debug)]
pub struct SyncHalt {
    /// Revision being processed, if the halt is tied to one
    pub revision_id: Option<String>,
    pub error: BranchError,
}

/// Outcome of one engine run
#[derive(Debug)]
pub struct SyncReport {
    pub document_id: String,
    pub slug: String,
    /// Revisions the source listed
    pub listed: usize,
    /// Revisions beyond the marker when the run started
    pub delta: usize,
    pub revisions: Vec<ProcessedRevision>,
    pub blobs_written: usize,
    pub warnings: Vec<RevisionWarning>,
    pub halted: Option<SyncHalt>,
    pub cancelled: bool,
    /// Marker after the run
    pub marker: Option<RevisionKey>,
}

impl SyncReport {
    fn new(document_id: &str, slug: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            slug: slug.to_string(),
            listed: 0,
            delta: 0,
            revisions: Vec::new(),
            blobs_written: 0,
            warnings: Vec::new(),
            halted: None,
            cancelled: false,
            marker: None,
        }
    }

    /// Revisions whose marker was advanced in this run
    pub fn imported(&self) -> usize {
        self.revisions.len()
    }

    /// Revisions that produced a new commit
    pub fn committed(&self) -> impl Iterator<Item = &ProcessedRevision> {
        self.revisions.iter().filter(|r| r.commit_id.is_some())
    }

    /// Revisions whose snapshot was identical to the previous one
    pub fn unchanged(&self) -> impl Iterator<Item = &ProcessedRevision> {
        self.revisions.iter().filter(|r| r.commit_id.is_none())
    }

    /// 0 when complete, 2 when some revisions landed before a halt, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match &self.halted {
            None => 0,
            Some(_) if self.imported() > 0 => 2,
            Some(_) => 1,
        }
    }
}

/// Drives source → normalize → blob store → snapshot → marker for one
/// document at a time
pub struct SyncEngine<S, W> {
    source: S,
    importer: RevisionImporter<W>,
    states: StateStore,
    retry: RetryPolicy,
    cancel: CancelToken,
}

impl<S: RevisionSource, W: SnapshotWriter> SyncEngine<S, W> {
    pub fn new(source: S, writer: W, home: &Path, options: EngineOptions) -> Result<Self, BranchError> {
        Ok(Self {
            source,
            importer: RevisionImporter::new(writer, options.size_cap_bytes)?,
            states: StateStore::new(home),
            retry: options.retry,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn importer(&self) -> &RevisionImporter<W> {
        &self.importer
    }

    pub fn states(&self) -> &StateStore {
        &self.states
    }

    /// Import every pending revision of a document.
    ///
    /// Setup failures (bad id, lock held, title lookup on first run) are
    /// returned as errors. A failed listing or a failure on an individual
    /// revision halts the run and is recorded in the report; the marker stays
    /// on the last revision that was recorded.
    pub fn run(&self, document_id: &str) -> Result<SyncReport, BranchError> {
        if !is_valid_document_id(document_id) {
            return Err(BranchError::InvalidArgs(format!(
                "invalid document id '{}'",
                document_id
            )));
        }

        let document_dir = self.states.document_dir(document_id)?;
        let _lock = DocumentLock::acquire(&document_dir, document_id)?;

        let mut state = self.load_or_init(document_id)?;
        let target = DocumentTarget {
            title: state.document_title.clone(),
            slug: state.document_slug.clone(),
        };
        self.importer.prepare(&target)?;

        state.set_phase(SyncPhase::Syncing, None);
        self.states.save(&state)?;

        let mut report = SyncReport::new(document_id, &state.document_slug);
        match self
            .retry
            .run("listing revisions", || self.source.list_revisions(document_id))
        {
            Ok(listing) => self.import_delta(&target, &mut state, listing, &mut report)?,
            Err(error) => report.halted = Some(SyncHalt { revision_id: None, error }),
        }

        match &report.halted {
            Some(halt) => {
                let context = match &halt.revision_id {
                    Some(id) => format!("revision {}: {}", id, halt.error),
                    None => halt.error.to_string(),
                };
                warn!(
                    document_id,
                    imported = report.imported(),
                    error_code = halt.error.error_code(),
                    "sync halted at {}",
                    context
                );
                state.set_phase(SyncPhase::Error, Some(context));
            }
            None => state.set_phase(SyncPhase::Idle, None),
        }
        self.states.save(&state)?;

        report.marker = state.marker();
        info!(
            document_id,
            listed = report.listed,
            imported = report.imported(),
            committed = report.committed().count(),
            cancelled = report.cancelled,
            "sync finished"
        );
        Ok(report)
    }

    fn load_or_init(&self, document_id: &str) -> Result<SyncState, BranchError> {
        let repo_root = canonical(self.importer.writer().repo_root());

        if let Some(state) = self.states.load(document_id)? {
            if state.phase == SyncPhase::Syncing {
                warn!(
                    document_id,
                    marker = ?state.last_imported_revision_id,
                    "previous run did not finish, resuming from the recorded marker"
                );
            }
            if canonical(&state.repo_path) != repo_root {
                return Err(BranchError::InvalidArgs(format!(
                    "document {} is tracked in {}, not {}",
                    document_id,
                    state.repo_path.display(),
                    repo_root.display()
                )));
            }
            return Ok(state);
        }

        let title = self
            .retry
            .run("fetching document title", || self.source.document_title(document_id))?;
        let slug = slugify(&title);
        info!(document_id, title = %title, slug = %slug, "tracking new document");
        Ok(SyncState::new(document_id, &title, &slug, &repo_root))
    }

    fn import_delta(
        &self,
        target: &DocumentTarget,
        state: &mut SyncState,
        listing: Vec<RevisionDescriptor>,
        report: &mut SyncReport,
    ) -> Result<(), BranchError> {
        let document_id = state.document_id.clone();
        report.listed = listing.len();
        let delta: Vec<RevisionDescriptor> =
            listing.into_iter().filter(|d| state.is_pending(d)).collect();
        report.delta = delta.len();
        debug!(document_id = %document_id, listed = report.listed, delta = report.delta, "computed delta");

        let mut previous = state.marker();
        for descriptor in &delta {
            if self.cancel.is_cancelled() {
                info!(document_id = %document_id, "sync cancelled at revision boundary");
                report.cancelled = true;
                break;
            }

            let key = descriptor.key();
            if let Some(prev) = &previous {
                if key <= *prev {
                    report.halted = Some(SyncHalt {
                        revision_id: Some(descriptor.revision_id.clone()),
                        error: BranchError::OrderingViolation {
                            previous: prev.to_string(),
                            next: key.to_string(),
                        },
                    });
                    break;
                }
            }

            let imported = self
                .retry
                .run("fetching revision", || {
                    self.source.fetch_payload(&document_id, &descriptor.revision_id)
                })
                .and_then(|payload| self.importer.import(target, descriptor, &payload));
            let imported = match imported {
                Ok(imported) => imported,
                Err(error) => {
                    report.halted = Some(SyncHalt {
                        revision_id: Some(descriptor.revision_id.clone()),
                        error,
                    });
                    break;
                }
            };

            // The snapshot is recorded; only now may the marker move
            state.advance(descriptor)?;
            self.states.save(state)?;

            if let Some(warning) = imported.oversize {
                report.warnings.push(RevisionWarning {
                    revision_id: descriptor.revision_id.clone(),
                    warning,
                });
            }
            report.blobs_written += imported.blobs_written;
            let commit_id = imported.outcome.commit_id().map(str::to_string);
            info!(
                document_id = %document_id,
                revision_id = %descriptor.revision_id,
                commit = commit_id.as_deref().unwrap_or("unchanged"),
                assets = imported.assets,
                "imported revision"
            );
            report.revisions.push(ProcessedRevision {
                revision_id: descriptor.revision_id.clone(),
                timestamp: descriptor.timestamp,
                author: descriptor.author.clone(),
                commit_id,
            });
            previous = Some(key);
        }
        Ok(())
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
