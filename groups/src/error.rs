use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by the background index collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The authoritative index is mid-rebuild. Always retryable by waiting
    /// for it to report ready; never surfaced to the user as failure.
    #[error("background index is not ready")]
    NotReady,

    #[error("index query failed: {0}")]
    Failed(String),
}

/// Failures that can unwind out of group resolution.
///
/// `IndexNotReady` is the only condition allowed to reach the refresh
/// orchestrator, which is the sole retry point. Everything else is caught
/// inside the engine and converted to a warning plus a partial or empty
/// result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("background index is not ready")]
    IndexNotReady,

    #[error("resolution failed: {0}")]
    Internal(String),
}

impl From<IndexError> for ResolveError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotReady => ResolveError::IndexNotReady,
            IndexError::Failed(message) => ResolveError::Internal(message),
        }
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        ResolveError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Non-fatal conditions surfaced alongside a resolution result. The host
/// renders these as dismissible notifications; none of them aborts a
/// refresh cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveWarning {
    /// A pattern or regex expansion exceeded the configured size cap. The
    /// partial result collected so far is kept.
    #[error("group for {owner:?} exceeds the {limit}-file limit; extra files were dropped")]
    TooManyFiles { owner: PathBuf, limit: usize },

    /// More than one declared group claims exclusive ownership of a path.
    #[error("groups {group_ids:?} all claim ownership of {path:?}")]
    DuplicateOwners {
        path: PathBuf,
        group_ids: Vec<String>,
    },

    /// A declared root override does not exist on disk; it is used as-is.
    #[error("root {root:?} declared by {owner:?} does not exist")]
    MissingRoot { owner: PathBuf, root: PathBuf },

    /// A declared related path does not exist on disk.
    #[error("related path {pattern:?} does not match any file")]
    MissingFile { pattern: String },

    /// A configured regex group pattern failed to compile.
    #[error("regex pattern {pattern:?} is invalid: {message}")]
    InvalidPattern { pattern: String, message: String },
}
