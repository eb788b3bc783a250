//! Opening and creating the target repository

use std::fs;
use std::path::{Path, PathBuf};

use git2::{ErrorCode, Repository};
use tracing::info;

use crate::GitError;

/// Open the repository whose working tree is `path`, creating it if needed.
///
/// Returns the repository and whether it was created by this call.
pub fn open_or_init(path: &Path) -> Result<(Repository, bool), GitError> {
    match Repository::open(path) {
        Ok(repo) => {
            if repo.is_bare() {
                return Err(GitError::BareRepository(path.to_path_buf()));
            }
            Ok((repo, false))
        }
        Err(e) if e.code() == ErrorCode::NotFound => {
            fs::create_dir_all(path)?;
            let repo = Repository::init(path)?;
            info!(path = %path.display(), "initialized repository");
            Ok((repo, true))
        }
        Err(e) => Err(e.into()),
    }
}

/// Open an existing non-bare repository at exactly `path`
pub fn open_repo(path: &Path) -> Result<Repository, GitError> {
    let repo = Repository::open(path).map_err(|e| match e.code() {
        ErrorCode::NotFound => GitError::NotARepo(path.to_path_buf()),
        _ => GitError::Git(e),
    })?;
    if repo.is_bare() {
        return Err(GitError::BareRepository(path.to_path_buf()));
    }
    Ok(repo)
}

/// Find the working tree root of the repository containing `start`
pub fn discover_root(start: &Path) -> Result<PathBuf, GitError> {
    let repo = Repository::discover(start).map_err(|_| GitError::NotARepo(start.to_path_buf()))?;
    repo.workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| GitError::BareRepository(start.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_or_init_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history");

        let (_, created) = open_or_init(&path).unwrap();
        assert!(created);
        assert!(path.join(".git").is_dir());

        let (_, created) = open_or_init(&path).unwrap();
        assert!(!created);
    }

    #[test]
    fn test_open_repo_requires_repository() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(open_repo(temp.path()), Err(GitError::NotARepo(_))));
    }

    #[test]
    fn test_bare_repository_rejected() {
        let temp = TempDir::new().unwrap();
        Repository::init_bare(temp.path()).unwrap();
        assert!(matches!(
            open_repo(temp.path()),
            Err(GitError::BareRepository(_))
        ));
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        open_or_init(temp.path()).unwrap();
        let nested = temp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        let root = discover_root(&nested).unwrap();
        assert_eq!(
            fs::canonicalize(root).unwrap(),
            fs::canonicalize(temp.path()).unwrap()
        );
    }
}
