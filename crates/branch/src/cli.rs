use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Clone)]
#[command(
    name = "branch",
    about = "Import the revision history of a document into git",
    version
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Configuration root (default: $BRANCH_HOME, then ~/.branch)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Create the snapshot repository, or reuse an existing one
    Init {
        /// Repository directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Import a single local payload as one snapshot (does not touch sync state)
    Import {
        /// HTML payload to import
        file: PathBuf,

        /// Document title; decides the directory the snapshot lands in
        #[arg(long)]
        title: String,

        /// Author identity, `Name <email>` or an email (default from config)
        #[arg(long)]
        author: Option<String>,

        /// Revision time as POSIX seconds or RFC 3339 (default: now)
        #[arg(long)]
        timestamp: Option<String>,

        /// Revision id recorded in the commit message (default: file name)
        #[arg(long)]
        revision: Option<String>,

        /// Repository to commit into (default: repository of the current directory)
        #[arg(long)]
        repo: Option<PathBuf>,
    },

    /// Import the full history of a document
    ImportAll {
        document_id: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Import revisions added since the last run
    Sync {
        /// Documents to sync
        #[arg(required = true)]
        document_ids: Vec<String>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Run sync on a timer until interrupted
    Watch {
        /// Documents to sync
        #[arg(required = true)]
        document_ids: Vec<String>,

        #[command(flatten)]
        source: SourceArgs,

        /// Seconds between runs (default from config)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show every tracked document and its sync marker
    Status,

    /// Show what changed between the two latest snapshots of a document
    Diff {
        document_id: String,

        /// Compare the stored markup instead of its visible text
        #[arg(long)]
        markup: bool,

        /// Repository the document is tracked in (default: from sync state)
        #[arg(long)]
        repo: Option<PathBuf>,
    },
}

/// Where revisions come from and where snapshots go
#[derive(Args, Clone, Debug)]
pub struct SourceArgs {
    /// Directory of exported revisions (`<dir>/<document_id>/manifest.json`)
    #[arg(long)]
    pub export_dir: PathBuf,

    /// Repository to commit into (default: the one the document is tracked
    /// in, then the repository of the current directory)
    #[arg(long)]
    pub repo: Option<PathBuf>,
}
