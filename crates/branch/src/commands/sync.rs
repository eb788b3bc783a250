//! One-shot sync of one or more documents

use libbranch_core::{
    BranchError, CancelToken, ExportDirSource, ProcessedRevision, SyncEngine, SyncReport,
};
use serde::Serialize;

use crate::cli::{Cli, SourceArgs};
use crate::commands::import::short;
use crate::context::BranchContext;
use crate::output::{output_success, print_human, warn_human};

#[derive(Serialize)]
pub struct WarningOutput {
    pub revision_id: String,
    pub payload_bytes: u64,
    pub size_cap_bytes: u64,
}

#[derive(Serialize)]
pub struct HaltOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    pub code: String,
    pub message: String,
}

/// JSON view of a [`SyncReport`]
#[derive(Serialize)]
pub struct DocumentOutput {
    pub document_id: String,
    pub slug: String,
    pub listed: usize,
    pub delta: usize,
    pub imported: usize,
    pub committed: usize,
    pub unchanged: usize,
    pub blobs_written: usize,
    pub revisions: Vec<ProcessedRevision>,
    pub warnings: Vec<WarningOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<HaltOutput>,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_imported_revision_id: Option<String>,
    pub exit_code: i32,
}

impl From<&SyncReport> for DocumentOutput {
    fn from(report: &SyncReport) -> Self {
        Self {
            document_id: report.document_id.clone(),
            slug: report.slug.clone(),
            listed: report.listed,
            delta: report.delta,
            imported: report.imported(),
            committed: report.committed().count(),
            unchanged: report.unchanged().count(),
            blobs_written: report.blobs_written,
            revisions: report.revisions.clone(),
            warnings: report
                .warnings
                .iter()
                .map(|w| WarningOutput {
                    revision_id: w.revision_id.clone(),
                    payload_bytes: w.warning.payload_bytes,
                    size_cap_bytes: w.warning.size_cap_bytes,
                })
                .collect(),
            halted: report.halted.as_ref().map(|h| HaltOutput {
                revision_id: h.revision_id.clone(),
                code: h.error.error_code().to_string(),
                message: h.error.to_string(),
            }),
            cancelled: report.cancelled,
            last_imported_revision_id: report.marker.as_ref().map(|m| m.revision_id.clone()),
            exit_code: report.exit_code(),
        }
    }
}

/// A document whose run failed before it got going
#[derive(Serialize)]
pub struct FailedOutput {
    pub document_id: String,
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct SyncOutput {
    pub documents: Vec<DocumentOutput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedOutput>,
}

/// Run the engine once for one document
pub fn run_document(
    ctx: &BranchContext,
    source: &SourceArgs,
    document_id: &str,
    cancel: &CancelToken,
) -> Result<SyncReport, BranchError> {
    let repo = ctx.resolve_repo(source.repo.as_deref(), Some(document_id))?;
    let writer = ctx.open_writer(&repo)?;
    let engine = SyncEngine::new(
        ExportDirSource::new(&source.export_dir),
        writer,
        &ctx.home,
        ctx.engine_options(),
    )?
    .with_cancel_token(cancel.clone());
    engine.run(document_id)
}

/// Human summary of one run
pub fn print_report(cli: &Cli, report: &SyncReport) {
    for w in &report.warnings {
        warn_human(cli, &format!("revision {}: {}", w.revision_id, w.warning));
    }

    let committed = report.committed().count();
    let unchanged = report.unchanged().count();
    if report.delta == 0 {
        print_human(
            cli,
            &format!("{} ({}): up to date", report.document_id, report.slug),
        );
    } else {
        print_human(
            cli,
            &format!(
                "{} ({}): imported {} of {} new revisions, {} commits, {} unchanged",
                report.document_id,
                report.slug,
                report.imported(),
                report.delta,
                committed,
                unchanged
            ),
        );
    }

    if let Some(halt) = &report.halted {
        let at = halt
            .revision_id
            .as_deref()
            .map(|id| format!(" at revision {}", id))
            .unwrap_or_default();
        warn_human(
            cli,
            &format!("{} halted{}: {}", report.document_id, at, halt.error),
        );
    }
    if report.cancelled {
        print_human(cli, &format!("{}: cancelled", report.document_id));
    }
}

/// Print every processed revision of a run
pub fn print_revisions(cli: &Cli, report: &SyncReport) {
    for rev in &report.revisions {
        let outcome = match &rev.commit_id {
            Some(id) => format!("commit {}", short(id)),
            None => "unchanged".to_string(),
        };
        print_human(
            cli,
            &format!(
                "  {} {} {} -> {}",
                rev.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                rev.revision_id,
                rev.author,
                outcome
            ),
        );
    }
}

/// Sync several documents in turn. A document that fails to start does not
/// stop the others; the exit code reflects the worst outcome.
pub fn sync_documents(
    cli: &Cli,
    ctx: &BranchContext,
    source: &SourceArgs,
    document_ids: &[String],
    cancel: &CancelToken,
) -> SyncOutput {
    let mut output = SyncOutput {
        documents: Vec::new(),
        failed: Vec::new(),
    };
    for document_id in document_ids {
        if cancel.is_cancelled() {
            break;
        }
        match run_document(ctx, source, document_id, cancel) {
            Ok(report) => {
                print_report(cli, &report);
                output.documents.push(DocumentOutput::from(&report));
            }
            Err(e) => {
                warn_human(cli, &format!("{}: {}", document_id, e));
                output.failed.push(FailedOutput {
                    document_id: document_id.clone(),
                    code: e.error_code().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
    output
}

impl SyncOutput {
    /// 1 if anything failed outright, else 2 if anything was partial, else 0
    pub fn exit_code(&self) -> i32 {
        let codes = self.documents.iter().map(|d| d.exit_code);
        if !self.failed.is_empty() || codes.clone().any(|c| c == 1) {
            1
        } else if codes.clone().any(|c| c == 2) {
            2
        } else {
            0
        }
    }
}

pub fn run(cli: &Cli, document_ids: &[String], source: &SourceArgs) -> Result<i32, BranchError> {
    let ctx = BranchContext::resolve(cli)?;

    if let [document_id] = document_ids {
        // A single document reports setup failures as the command's error
        let report = run_document(&ctx, source, document_id, &CancelToken::new())?;
        print_report(cli, &report);
        let code = report.exit_code();
        output_success(
            cli,
            SyncOutput {
                documents: vec![DocumentOutput::from(&report)],
                failed: Vec::new(),
            },
        );
        return Ok(code);
    }

    let output = sync_documents(cli, &ctx, source, document_ids, &CancelToken::new());
    let code = output.exit_code();
    output_success(cli, output);
    Ok(code)
}
