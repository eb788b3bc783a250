use comfy_table::Table;
use libbranch_core::{BranchError, SyncState};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::BranchContext;
use crate::output::{output_success, print_human};

#[derive(Serialize)]
pub struct StatusOutput {
    pub documents: Vec<SyncState>,
}

pub fn run(cli: &Cli) -> Result<i32, BranchError> {
    let ctx = BranchContext::resolve(cli)?;
    let documents = ctx.states().list()?;

    if documents.is_empty() {
        print_human(cli, "No tracked documents");
    } else {
        print_human(cli, &render_table(&documents).to_string());
    }

    output_success(cli, StatusOutput { documents });
    Ok(0)
}

fn render_table(documents: &[SyncState]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Document",
        "Slug",
        "Repository",
        "Last revision",
        "Last imported",
        "Phase",
        "Error",
    ]);
    for state in documents {
        table.add_row(vec![
            state.document_id.clone(),
            state.document_slug.clone(),
            state.repo_path.display().to_string(),
            state
                .last_imported_revision_id
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            state
                .last_imported_timestamp
                .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
                .unwrap_or_else(|| "-".to_string()),
            state.phase.as_str().to_string(),
            state.last_error.clone().unwrap_or_default(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_table_lists_every_document() {
        let mut synced = SyncState::new("doc1", "Notes", "Notes", Path::new("/tmp/repo"));
        synced.last_imported_revision_id = Some("r7".to_string());
        let fresh = SyncState::new("doc2", "Plan", "Plan", Path::new("/tmp/repo"));

        let rendered = render_table(&[synced, fresh]).to_string();

        assert!(rendered.contains("doc1"));
        assert!(rendered.contains("r7"));
        assert!(rendered.contains("doc2"));
        assert!(rendered.contains("idle"));
    }
}
