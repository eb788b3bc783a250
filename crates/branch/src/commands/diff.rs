use std::path::Path;

use libbranch_core::{markup_to_text, unified_diff, BranchError};
use serde::Serialize;

use crate::cli::Cli;
use crate::commands::import::short;
use crate::context::BranchContext;
use crate::output::{output_success, print_human};

#[derive(Serialize)]
struct DiffOutput {
    document_id: String,
    slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<String>,
    diff: String,
}

/// Diff the two latest commits that changed a tracked document
pub fn run(
    cli: &Cli,
    document_id: &str,
    markup: bool,
    repo: Option<&Path>,
) -> Result<i32, BranchError> {
    let ctx = BranchContext::resolve(cli)?;
    let state = ctx.states().load(document_id)?.ok_or_else(|| {
        BranchError::NotFound(format!(
            "document {} has not been synced; run 'branch sync {}' first",
            document_id, document_id
        ))
    })?;
    let repo = ctx.resolve_repo(repo, Some(document_id))?;
    let writer = ctx.open_writer(&repo)?;
    let slug = state.document_slug;

    let history = writer.document_history(&slug)?;
    let [.., previous, latest] = history.as_slice() else {
        print_human(cli, "(nothing to diff yet)");
        output_success(
            cli,
            DiffOutput {
                document_id: document_id.to_string(),
                slug,
                from: None,
                to: None,
                diff: String::new(),
            },
        );
        return Ok(0);
    };

    let render = |commit_id: &str| -> Result<String, BranchError> {
        let bytes = writer.document_at(commit_id, &slug)?.unwrap_or_default();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(if markup { text } else { markup_to_text(&text) })
    };
    let old = render(&previous.commit_id)?;
    let new = render(&latest.commit_id)?;
    let diff = unified_diff(
        &old,
        &new,
        short(&previous.commit_id),
        short(&latest.commit_id),
    );

    if diff.is_empty() {
        print_human(cli, "(no visible text changes)");
    } else {
        print_human(cli, diff.trim_end());
    }
    output_success(
        cli,
        DiffOutput {
            document_id: document_id.to_string(),
            slug,
            from: Some(previous.commit_id.clone()),
            to: Some(latest.commit_id.clone()),
            diff,
        },
    );
    Ok(0)
}
