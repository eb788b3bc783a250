use thiserror::Error;

/// Main error type for branch operations
#[derive(Debug, Error)]
pub enum BranchError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("document locked: {0}")]
    Locked(String),

    /// Network hiccup or rate limit; retried before it ever surfaces
    #[error("transient source error: {0}")]
    TransientSource(String),

    /// Revision deleted, access revoked, or otherwise gone for good
    #[error("permanent source error: {0}")]
    PermanentSource(String),

    #[error("source still failing after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("revision order violated: {next} does not follow {previous}")]
    OrderingViolation { previous: String, next: String },

    #[error("version control error: {0}")]
    VersionControl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BranchError {
    /// Whether the engine should retry the failed source call
    pub fn is_retryable(&self) -> bool {
        matches!(self, BranchError::TransientSource(_))
    }

    /// Get the error code for JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            BranchError::InvalidArgs(_) => "invalid_args",
            BranchError::NotFound(_) => "not_found",
            BranchError::Locked(_) => "locked",
            BranchError::TransientSource(_) => "transient_source",
            BranchError::PermanentSource(_) => "permanent_source",
            BranchError::RetriesExhausted { .. } => "retries_exhausted",
            BranchError::CorruptPayload(_) => "corrupt_payload",
            BranchError::OrderingViolation { .. } => "ordering_violation",
            BranchError::VersionControl(_) => "version_control",
            BranchError::Io(_) => "io_error",
            BranchError::Json(_) => "internal_error",
            BranchError::TomlParse(_) => "invalid_config",
            BranchError::TomlSerialize(_) => "internal_error",
            BranchError::Internal(_) => "internal_error",
        }
    }

    /// Get the exit code for the CLI. Partial imports are reported
    /// separately by the sync report, so every error here is fatal.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Get actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            BranchError::Locked(_) => vec![
                "Another sync of this document is running; wait for it to finish",
                "Run 'branch status' to see the last recorded state",
            ],
            BranchError::PermanentSource(_) | BranchError::CorruptPayload(_) => vec![
                "Revisions before the failing one were imported and recorded",
                "Fix or restore the revision upstream, then run 'branch sync' again",
            ],
            BranchError::RetriesExhausted { .. } => vec![
                "The source kept failing; run 'branch sync' again later",
            ],
            BranchError::OrderingViolation { .. } => vec![
                "The revision source returned revisions out of order",
            ],
            BranchError::VersionControl(_) => vec![
                "Check that the repository is writable and not mid-rebase",
                "The failing revision will be retried on the next run",
            ],
            BranchError::TomlParse(_) => vec![
                "Check config.toml and state.toml under the branch home directory",
            ],
            _ => vec![],
        }
    }

    /// Create a Locked error with holder details
    pub fn document_locked(document_id: &str, details: Option<&str>) -> Self {
        let msg = match details {
            Some(d) => format!("{} ({})", document_id, d),
            None => format!("{} is being synced by another process", document_id),
        };
        BranchError::Locked(msg)
    }
}
