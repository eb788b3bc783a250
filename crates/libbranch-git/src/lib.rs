//! Git backend for branch snapshots
//!
//! - [`GitSnapshotWriter`] records each imported revision as one commit on
//!   the current branch, authored with the revision's identity and time
//! - history queries over the commits that touched a document

mod error;
mod history;
mod repo;
mod writer;

pub use error::GitError;
pub use history::HistoryEntry;
pub use repo::{discover_root, open_or_init, open_repo};
pub use writer::{split_identity, GitSnapshotWriter};
