//! Revision synchronization and snapshot engine for branch
//!
//! Turns the revision history of a remotely hosted document into a local,
//! content-addressed snapshot history:
//! - `normalize` extracts inline assets into placeholders
//! - `blob` stores asset bytes once per content hash
//! - `engine` walks the unimported revisions and advances the sync marker
//!
//! The version-control backend lives behind [`SnapshotWriter`]; the git
//! implementation is in `libbranch-git`.

pub mod atomic;
pub mod blob;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod lock;
pub mod normalize;
pub mod pipeline;
pub mod retry;
pub mod slug;
pub mod snapshot;
pub mod source;
pub mod state;
pub mod types;

#[cfg(test)]
mod testing;

pub use blob::BlobStore;
pub use config::{load_config, load_or_create_config, resolve_home, save_config, BranchConfig};
pub use diff::{markup_to_text, unified_diff};
pub use engine::{CancelToken, EngineOptions, ProcessedRevision, SyncEngine, SyncHalt, SyncReport};
pub use error::BranchError;
pub use lock::DocumentLock;
pub use normalize::{normalize, DEFAULT_SIZE_CAP_BYTES};
pub use pipeline::{DocumentTarget, ImportedRevision, RevisionImporter};
pub use retry::RetryPolicy;
pub use slug::slugify;
pub use snapshot::{commit_message, CommitOutcome, MaterializedTree, SnapshotWriter};
pub use source::{ExportDirSource, ExportManifest, ExportRevision, RevisionSource};
pub use state::{StateStore, SyncPhase, SyncState};
pub use types::document::{AssetReference, NormalizedDocument, OversizeWarning};
pub use types::ids::ContentHash;
pub use types::revision::{RevisionDescriptor, RevisionKey};
