use libbranch_core::{BranchError, CancelToken};

use crate::cli::{Cli, SourceArgs};
use crate::commands::sync::{print_report, print_revisions, run_document, DocumentOutput};
use crate::context::BranchContext;
use crate::output::output_success;

/// Import every revision of one document not yet imported. On a fresh
/// document this is the full history; afterwards it behaves like `sync`
/// but lists each revision it processed.
pub fn run(cli: &Cli, document_id: &str, source: &SourceArgs) -> Result<i32, BranchError> {
    let ctx = BranchContext::resolve(cli)?;
    let report = run_document(&ctx, source, document_id, &CancelToken::new())?;

    print_revisions(cli, &report);
    print_report(cli, &report);

    let code = report.exit_code();
    output_success(cli, DocumentOutput::from(&report));
    Ok(code)
}
