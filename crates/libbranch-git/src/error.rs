use std::path::PathBuf;

use libbranch_core::BranchError;
use thiserror::Error;

/// Errors that can occur during Git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a git repository: {}", .0.display())]
    NotARepo(PathBuf),

    #[error("Repository has no working tree: {}", .0.display())]
    BareRepository(PathBuf),

    #[error("Invalid repository path: {0}")]
    InvalidPath(String),

    #[error("HEAD kept moving while committing {0}")]
    HeadContention(String),
}

impl From<GitError> for BranchError {
    fn from(err: GitError) -> Self {
        BranchError::VersionControl(err.to_string())
    }
}
