//! Snapshot commits on the repository's current branch
//!
//! Each document owns `<slug>/doc.html`; assets live in the shared `blobs/`
//! directory that the blob store already populated inside the working tree.
//! A commit's tree is the HEAD tree with those paths replaced, so documents
//! imported into the same repository never clobber each other.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use git2::{Commit, ErrorCode, ObjectType, Oid, Repository, Signature, Time, Tree};
use libbranch_core::atomic::write_atomic;
use libbranch_core::blob::BLOBS_DIR;
use libbranch_core::config::DEFAULT_AUTHOR;
use libbranch_core::snapshot::DOCUMENT_FILE;
use libbranch_core::{BranchError, CommitOutcome, MaterializedTree, SnapshotWriter};
use tracing::{debug, warn};

use crate::repo::{open_or_init, open_repo};
use crate::GitError;

const FILE_MODE: i32 = 0o100644;
const DIR_MODE: i32 = 0o040000;

/// How often to rebuild and retry when another writer moves or holds HEAD
const HEAD_RACE_ATTEMPTS: u64 = 32;

/// [`SnapshotWriter`] backed by a git working tree
pub struct GitSnapshotWriter {
    repo: Repository,
    root: PathBuf,
}

impl GitSnapshotWriter {
    /// Open an existing repository whose working tree is `path`
    pub fn open(path: &Path) -> Result<Self, GitError> {
        Self::from_repo(open_repo(path)?, path)
    }

    /// Open the repository at `path`, creating it first if needed
    pub fn open_or_init(path: &Path) -> Result<Self, GitError> {
        let (repo, _) = open_or_init(path)?;
        Self::from_repo(repo, path)
    }

    fn from_repo(repo: Repository, path: &Path) -> Result<Self, GitError> {
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::BareRepository(path.to_path_buf()))?;
        let root = fs::canonicalize(workdir)?;
        Ok(Self { repo, root })
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub(crate) fn head_commit(&self) -> Result<Option<Commit<'_>>, GitError> {
        match self.repo.head() {
            Ok(reference) => Ok(Some(reference.peel_to_commit()?)),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn record(
        &self,
        subpath: &str,
        tree: &MaterializedTree,
        author: &str,
        timestamp: DateTime<Utc>,
        message: &str,
    ) -> Result<CommitOutcome, GitError> {
        validate_subpath(subpath)?;
        self.write_working_file(subpath, tree)?;
        let signature = signature(author, timestamp)?;

        for attempt in 0..HEAD_RACE_ATTEMPTS {
            let parent = self.head_commit()?;
            let base = parent.as_ref().map(|c| c.tree()).transpose()?;
            let tree_oid = self.build_tree(base.as_ref(), subpath, tree)?;

            if base.as_ref().map(|b| b.id()) == Some(tree_oid) {
                debug!(subpath, "tree matches HEAD, nothing to commit");
                return Ok(CommitOutcome::NoOp);
            }

            let new_tree = self.repo.find_tree(tree_oid)?;
            let parents: Vec<&Commit> = parent.iter().collect();
            match self
                .repo
                .commit(Some("HEAD"), &signature, &signature, message, &new_tree, &parents)
            {
                Ok(oid) => {
                    self.refresh_index(subpath, tree);
                    debug!(subpath, commit = %oid, "recorded snapshot");
                    return Ok(CommitOutcome::Committed(oid.to_string()));
                }
                Err(e) if e.code() == ErrorCode::Modified => {
                    debug!(subpath, "HEAD moved during commit, rebuilding tree");
                }
                Err(e) if e.code() == ErrorCode::Locked => {
                    debug!(subpath, attempt, "branch ref locked by another writer");
                    thread::sleep(Duration::from_millis(5 * (attempt + 1)));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(GitError::HeadContention(subpath.to_string()))
    }

    fn write_working_file(&self, subpath: &str, tree: &MaterializedTree) -> Result<(), GitError> {
        let dir = self.root.join(subpath);
        fs::create_dir_all(&dir)?;
        write_atomic(&dir.join(DOCUMENT_FILE), &tree.content)?;
        Ok(())
    }

    /// HEAD tree with the document file and its assets replaced
    fn build_tree(
        &self,
        base: Option<&Tree>,
        subpath: &str,
        tree: &MaterializedTree,
    ) -> Result<Oid, GitError> {
        let doc_blob = self.repo.blob(&tree.content)?;
        let mut oid = self.upsert(base, &[subpath, DOCUMENT_FILE], doc_blob)?;

        for asset in &tree.assets {
            let blob = self.repo.blob_path(&asset.fs_path)?;
            let parts: Vec<&str> = asset.repo_path.split('/').collect();
            let current = self.repo.find_tree(oid)?;
            oid = self.upsert(Some(&current), &parts, blob)?;
        }
        Ok(oid)
    }

    /// Insert a blob at a nested path, creating intermediate trees
    fn upsert(&self, base: Option<&Tree>, parts: &[&str], blob: Oid) -> Result<Oid, GitError> {
        let mut builder = self.repo.treebuilder(base)?;
        match parts {
            [] => return Err(GitError::InvalidPath("empty path".to_string())),
            [name] => {
                builder.insert(*name, blob, FILE_MODE)?;
            }
            [dir, rest @ ..] => {
                let existing = match base.and_then(|t| t.get_name(dir)) {
                    Some(entry) if entry.kind() == Some(ObjectType::Tree) => {
                        Some(self.repo.find_tree(entry.id())?)
                    }
                    _ => None,
                };
                let sub_tree = self.upsert(existing.as_ref(), rest, blob)?;
                builder.insert(*dir, sub_tree, DIR_MODE)?;
            }
        }
        Ok(builder.write()?)
    }

    /// Stage the paths this commit wrote so `git status` stays clean. Other
    /// index entries, including anything the user staged, are left alone.
    fn refresh_index(&self, subpath: &str, tree: &MaterializedTree) {
        let doc_path = Path::new(subpath).join(DOCUMENT_FILE);
        let result = self.repo.index().and_then(|mut index| {
            index.read(false)?;
            index.add_path(&doc_path)?;
            for asset in &tree.assets {
                index.add_path(Path::new(&asset.repo_path))?;
            }
            index.write()
        });
        if let Err(e) = result {
            warn!("commit recorded but index not refreshed: {}", e);
        }
    }
}

impl SnapshotWriter for GitSnapshotWriter {
    fn repo_root(&self) -> &Path {
        &self.root
    }

    fn commit(
        &self,
        subpath: &str,
        tree: &MaterializedTree,
        author: &str,
        timestamp: DateTime<Utc>,
        message: &str,
    ) -> Result<CommitOutcome, BranchError> {
        Ok(self.record(subpath, tree, author, timestamp, message)?)
    }
}

fn validate_subpath(subpath: &str) -> Result<(), GitError> {
    let reserved = subpath.is_empty()
        || subpath == "."
        || subpath == ".."
        || subpath.eq_ignore_ascii_case(".git")
        || subpath.eq_ignore_ascii_case(BLOBS_DIR)
        || subpath.contains(['/', '\\']);
    if reserved {
        return Err(GitError::InvalidPath(format!(
            "'{}' cannot be a document directory",
            subpath
        )));
    }
    Ok(())
}

/// Author and committer signature stamped with the revision's own time
fn signature(author: &str, timestamp: DateTime<Utc>) -> Result<Signature<'static>, GitError> {
    let (name, email) = split_identity(author);
    Ok(Signature::new(&name, &email, &Time::new(timestamp.timestamp(), 0))?)
}

/// Split `Name <email>` or a bare identity into name and email
pub fn split_identity(author: &str) -> (String, String) {
    let clean = |s: &str| s.replace(['<', '>', '\n'], "").trim().to_string();

    if let Some((name, rest)) = author.split_once('<') {
        if let Some(email) = rest.trim().strip_suffix('>') {
            let email = clean(email);
            let email = if email.is_empty() {
                DEFAULT_AUTHOR.to_string()
            } else {
                email
            };
            let name = clean(name);
            let name = if name.is_empty() { email.clone() } else { name };
            return (name, email);
        }
    }

    let identity = clean(author);
    if identity.is_empty() {
        (DEFAULT_AUTHOR.to_string(), DEFAULT_AUTHOR.to_string())
    } else {
        (identity.clone(), identity)
    }
}
