use std::fs;
use std::path::{Path, PathBuf};

use libbranch_core::{
    load_or_create_config, resolve_home, BranchConfig, BranchError, EngineOptions, StateStore,
};
use libbranch_git::{discover_root, GitSnapshotWriter};

use crate::cli::Cli;

/// Resolved configuration root and settings for a command
#[derive(Debug, Clone)]
pub struct BranchContext {
    pub home: PathBuf,
    pub config: BranchConfig,
}

impl BranchContext {
    /// Resolution order: `--home`, then `BRANCH_HOME`, then `~/.branch`.
    /// The config file is created with defaults on first use.
    pub fn resolve(cli: &Cli) -> Result<Self, BranchError> {
        let home = resolve_home(cli.home.as_deref())?;
        fs::create_dir_all(&home)?;
        let config = load_or_create_config(&home)?;
        Ok(Self { home, config })
    }

    pub fn states(&self) -> StateStore {
        StateStore::new(&self.home)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::from(&self.config)
    }

    /// Pick the repository for a command: `--repo`, then the repository the
    /// document is already tracked in, then the one around the current
    /// directory
    pub fn resolve_repo(
        &self,
        explicit: Option<&Path>,
        document_id: Option<&str>,
    ) -> Result<PathBuf, BranchError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Some(id) = document_id {
            if let Some(state) = self.states().load(id)? {
                return Ok(state.repo_path);
            }
        }
        let cwd = std::env::current_dir()?;
        discover_root(&cwd).map_err(|_| {
            BranchError::NotFound(
                "not inside a git repository; pass --repo or run 'branch init'".to_string(),
            )
        })
    }

    pub fn open_writer(&self, repo: &Path) -> Result<GitSnapshotWriter, BranchError> {
        Ok(GitSnapshotWriter::open(repo)?)
    }
}
