use std::path::Path;

use libbranch_core::config::config_path;
use libbranch_core::{BlobStore, BranchError, SnapshotWriter};
use libbranch_git::{open_or_init, GitSnapshotWriter};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::BranchContext;
use crate::output::{output_success, print_human};

#[derive(Serialize)]
struct InitOutput {
    repo: String,
    created: bool,
    commits: usize,
    home: String,
    config: String,
}

pub fn run(cli: &Cli, path: &Path) -> Result<i32, BranchError> {
    let ctx = BranchContext::resolve(cli)?;

    let (_, created) = open_or_init(path)?;
    let writer = GitSnapshotWriter::open(path)?;
    BlobStore::for_repo(writer.repo_root())?;

    let commits = writer.commit_count()?;
    let repo = writer.repo_root().display().to_string();
    let config = config_path(&ctx.home).display().to_string();
    if created {
        print_human(cli, &format!("Initialized repository at {}", repo));
    } else {
        print_human(
            cli,
            &format!("Using existing repository at {} ({} commits)", repo, commits),
        );
    }
    print_human(cli, &format!("Configuration: {}", config));

    output_success(
        cli,
        InitOutput {
            repo,
            created,
            commits,
            home: ctx.home.display().to_string(),
            config,
        },
    );
    Ok(0)
}
