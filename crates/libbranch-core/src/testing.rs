//! In-memory source and writer for unit tests

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};

use crate::error::BranchError;
use crate::snapshot::{CommitOutcome, MaterializedTree, SnapshotWriter};
use crate::source::RevisionSource;
use crate::types::revision::RevisionDescriptor;

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn rev(id: &str, secs: i64) -> RevisionDescriptor {
    RevisionDescriptor::new(id, ts(secs), format!("{}@example.com", id), 0)
}

/// Revision source driven entirely by the test
pub struct ScriptedSource {
    pub title: String,
    pub revisions: RefCell<Vec<RevisionDescriptor>>,
    pub payloads: RefCell<HashMap<String, Vec<u8>>>,
    /// Errors returned (front first) before a revision's payload is served
    pub failures: RefCell<HashMap<String, VecDeque<BranchError>>>,
    pub list_failures: RefCell<VecDeque<BranchError>>,
    pub fetched: RefCell<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            revisions: RefCell::new(Vec::new()),
            payloads: RefCell::new(HashMap::new()),
            failures: RefCell::new(HashMap::new()),
            list_failures: RefCell::new(VecDeque::new()),
            fetched: RefCell::new(Vec::new()),
        }
    }

    pub fn push(&self, descriptor: RevisionDescriptor, payload: &[u8]) {
        self.payloads
            .borrow_mut()
            .insert(descriptor.revision_id.clone(), payload.to_vec());
        self.revisions.borrow_mut().push(descriptor);
    }

    pub fn fail(&self, revision_id: &str, error: BranchError) {
        self.failures
            .borrow_mut()
            .entry(revision_id.to_string())
            .or_default()
            .push_back(error);
    }
}

impl RevisionSource for ScriptedSource {
    fn document_title(&self, _document_id: &str) -> Result<String, BranchError> {
        Ok(self.title.clone())
    }

    fn list_revisions(&self, _document_id: &str) -> Result<Vec<RevisionDescriptor>, BranchError> {
        if let Some(err) = self.list_failures.borrow_mut().pop_front() {
            return Err(err);
        }
        Ok(self.revisions.borrow().clone())
    }

    fn fetch_payload(&self, _document_id: &str, revision_id: &str) -> Result<Vec<u8>, BranchError> {
        self.fetched.borrow_mut().push(revision_id.to_string());
        if let Some(queue) = self.failures.borrow_mut().get_mut(revision_id) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }
        self.payloads
            .borrow()
            .get(revision_id)
            .cloned()
            .ok_or_else(|| BranchError::PermanentSource(format!("{} deleted", revision_id)))
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCommit {
    pub id: String,
    pub subpath: String,
    pub content: Vec<u8>,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Snapshot writer that keeps its history in memory
pub struct MemoryWriter {
    root: PathBuf,
    pub commits: RefCell<Vec<RecordedCommit>>,
    heads: RefCell<HashMap<String, (Vec<u8>, HashSet<String>)>>,
    /// Fail commits whose message contains this text
    pub fail_when: RefCell<Option<String>>,
}

impl MemoryWriter {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            commits: RefCell::new(Vec::new()),
            heads: RefCell::new(HashMap::new()),
            fail_when: RefCell::new(None),
        }
    }

    pub fn commit_count(&self) -> usize {
        self.commits.borrow().len()
    }

    pub fn head_text(&self, subpath: &str) -> Option<String> {
        self.heads
            .borrow()
            .get(subpath)
            .map(|(content, _)| String::from_utf8_lossy(content).into_owned())
    }
}

impl SnapshotWriter for MemoryWriter {
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
        if let Some(needle) = self.fail_when.borrow().as_deref() {
            if message.contains(needle) {
                return Err(BranchError::VersionControl("disk full".to_string()));
            }
        }

        let assets: HashSet<String> = tree.assets.iter().map(|a| a.repo_path.clone()).collect();
        let mut heads = self.heads.borrow_mut();
        if let Some((content, head_assets)) = heads.get(subpath) {
            if *content == tree.content && assets.is_subset(head_assets) {
                return Ok(CommitOutcome::NoOp);
            }
        }
        let mut all_assets = heads
            .get(subpath)
            .map(|(_, a)| a.clone())
            .unwrap_or_default();
        all_assets.extend(assets);
        heads.insert(subpath.to_string(), (tree.content.clone(), all_assets));

        let mut commits = self.commits.borrow_mut();
        let id = format!("c{}", commits.len() + 1);
        commits.push(RecordedCommit {
            id: id.clone(),
            subpath: subpath.to_string(),
            content: tree.content.clone(),
            author: author.to_string(),
            timestamp,
            message: message.to_string(),
        });
        Ok(CommitOutcome::Committed(id))
    }
}
