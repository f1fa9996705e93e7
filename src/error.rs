//! Error taxonomy for the publish pipeline
//!
//! Most functions in the crate return `anyhow::Result`; the variants below are
//! raised where the pipeline driver needs to tell an expected alternate path
//! or a recoverable hiccup apart from a fatal failure.

use thiserror::Error;

/// Failure reported by a hosting provider request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "remote request failed (status {}): {body}",
    .status.map_or_else(|| "none".to_string(), |s| s.to_string())
)]
pub struct RemoteError {
    /// HTTP status, `None` when the request never got a response
    pub status: Option<u16>,
    pub body: String,
}

impl RemoteError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self {
            status: None,
            body: err.to_string(),
        }
    }
}

/// How the pipeline driver treats an error raised by a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abort the run
    Fatal,
    /// Log, record and continue
    Recoverable,
    /// Not a failure at all, an alternate path
    Expected,
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("{0} is not configured")]
    ConfigMissing(&'static str),

    #[error("remote repository {login}/{name} does not exist")]
    RemoteNotFound { login: String, name: String },

    #[error(transparent)]
    RemoteApi(#[from] RemoteError),

    #[error("unresolved conflicts, fix them manually before publishing: {}", .0.join(", "))]
    ConflictDetected(Vec<String>),

    #[error("a commit message is required")]
    CommitMessageRequired,

    #[error("failed to restore stashed changes: {0}")]
    StashRestoreFailed(String),

    #[error("pull of {remote}/{branch} failed: {reason}")]
    PullFailed {
        remote: String,
        branch: String,
        reason: String,
    },

    #[error("push to {remote}/{branch} failed: {reason}")]
    PushFailed {
        remote: String,
        branch: String,
        reason: String,
    },

    #[error("invalid project manifest: {0}")]
    Manifest(String),
}

impl PublishError {
    pub fn severity(&self) -> Severity {
        match self {
            PublishError::ConfigMissing(_) | PublishError::RemoteNotFound { .. } => {
                Severity::Expected
            }
            PublishError::StashRestoreFailed(_) | PublishError::PullFailed { .. } => {
                Severity::Recoverable
            }
            PublishError::RemoteApi(_)
            | PublishError::ConflictDetected(_)
            | PublishError::CommitMessageRequired
            | PublishError::PushFailed { .. }
            | PublishError::Manifest(_) => Severity::Fatal,
        }
    }

    /// Classify an arbitrary error; anything untyped is fatal
    pub fn severity_of(err: &anyhow::Error) -> Severity {
        err.downcast_ref::<PublishError>()
            .map(PublishError::severity)
            .unwrap_or(Severity::Fatal)
    }
}
