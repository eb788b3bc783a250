//! Offline import of a single payload

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use libbranch_core::{
    slugify, BranchError, DocumentTarget, RevisionDescriptor, RevisionImporter,
};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::BranchContext;
use crate::output::{output_success, print_human, warn_human};

pub struct ImportArgs {
    pub file: PathBuf,
    pub title: String,
    pub author: Option<String>,
    pub timestamp: Option<String>,
    pub revision: Option<String>,
    pub repo: Option<PathBuf>,
}

#[derive(Serialize)]
struct ImportOutput {
    slug: String,
    revision_id: String,
    timestamp: DateTime<Utc>,
    author: String,
    commit_id: Option<String>,
    assets: usize,
    blobs_written: usize,
    oversize: bool,
}

pub fn run(cli: &Cli, args: ImportArgs) -> Result<i32, BranchError> {
    let ctx = BranchContext::resolve(cli)?;
    let repo = ctx.resolve_repo(args.repo.as_deref(), None)?;
    let writer = ctx.open_writer(&repo)?;

    let payload = fs::read(&args.file).map_err(|e| {
        BranchError::InvalidArgs(format!("cannot read {}: {}", args.file.display(), e))
    })?;
    let timestamp = match &args.timestamp {
        Some(raw) => parse_timestamp(raw)?,
        None => Utc::now(),
    };
    let author = args
        .author
        .clone()
        .unwrap_or_else(|| ctx.config.default_author.clone());
    let revision_id = args.revision.clone().unwrap_or_else(|| {
        args.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local".to_string())
    });

    let descriptor =
        RevisionDescriptor::new(&revision_id, timestamp, &author, payload.len() as u64);
    let target = DocumentTarget {
        title: args.title.clone(),
        slug: slugify(&args.title),
    };

    let importer = RevisionImporter::new(&writer, ctx.config.size_cap_bytes)?;
    importer.prepare(&target)?;
    let imported = importer.import(&target, &descriptor, &payload)?;

    if let Some(warning) = &imported.oversize {
        warn_human(cli, &warning.to_string());
    }
    let commit_id = imported.outcome.commit_id().map(str::to_string);
    match &commit_id {
        Some(id) => print_human(
            cli,
            &format!(
                "Committed {}/doc.html as {} ({} assets, {} new)",
                target.slug,
                short(id),
                imported.assets,
                imported.blobs_written
            ),
        ),
        None => print_human(
            cli,
            &format!("{}/doc.html unchanged, nothing committed", target.slug),
        ),
    }

    output_success(
        cli,
        ImportOutput {
            slug: target.slug,
            revision_id,
            timestamp,
            author,
            commit_id,
            assets: imported.assets,
            blobs_written: imported.blobs_written,
            oversize: imported.oversize.is_some(),
        },
    );
    Ok(0)
}

/// POSIX seconds or an RFC 3339 timestamp
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, BranchError> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| BranchError::InvalidArgs(format!("timestamp out of range: {}", raw)));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            BranchError::InvalidArgs(format!(
                "invalid timestamp '{}': expected POSIX seconds or RFC 3339",
                raw
            ))
        })
}

pub fn short(commit_id: &str) -> &str {
    &commit_id[..commit_id.len().min(8)]
}
