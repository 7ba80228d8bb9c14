//! Typed errors for hash and verification operations.
//!
//! Variants are stable identifiers callers match on; `code()` gives the short
//! machine identifier and `Display` the human-readable message. OS-level
//! details (errno, backtraces) are logged where they occur and carried only
//! as message text, never as part of the error's identity.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure of a single-file hash or a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum HashCalcError {
    /// The path did not exist at open time.
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The OS denied read access.
    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// Any other OS/I/O failure during streaming.
    #[error("i/o error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// The per-file result-retrieval cap expired in parallel mode.
    #[error("hashing timed out: {}", path.display())]
    Timeout { path: PathBuf },

    /// Cooperative cancellation was observed.
    #[error("hash operation cancelled")]
    Cancelled,

    /// Every file in the batch failed.
    #[error("all {count} hash operations failed")]
    AllFailed { count: u64 },

    /// Discovery produced no files at all.
    #[error("no files found to hash")]
    NoFiles,
}

impl HashCalcError {
    /// Short machine identifier, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            HashCalcError::NotFound { .. } => "not_found",
            HashCalcError::PermissionDenied { .. } => "permission_denied",
            HashCalcError::Io { .. } => "io",
            HashCalcError::Timeout { .. } => "timeout",
            HashCalcError::Cancelled => "cancelled",
            HashCalcError::AllFailed { .. } => "all_failed",
            HashCalcError::NoFiles => "no_files",
        }
    }

    /// Map an `io::Error` raised while opening or reading `path` to the
    /// matching variant.
    pub fn from_io(path: &Path, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => HashCalcError::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => HashCalcError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => HashCalcError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        }
    }
}

/// Failure of a bidirectional verification run. Mismatched or one-sided
/// entries are outcomes, not errors; only true failures land here.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum HashVerifyError {
    /// Cooperative cancellation was observed on either side.
    #[error("verification cancelled")]
    Cancelled,

    /// The source-side hashing pass failed.
    #[error("source hashing failed: {0}")]
    SourceFailed(HashCalcError),

    /// The target-side hashing pass failed.
    #[error("target hashing failed: {0}")]
    TargetFailed(HashCalcError),

    /// Source expansion produced no files.
    #[error("no source files found to verify")]
    NoSourceFiles,

    /// Target expansion produced no files.
    #[error("no target files found to verify")]
    NoTargetFiles,
}

impl HashVerifyError {
    /// Short machine identifier, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            HashVerifyError::Cancelled => "cancelled",
            HashVerifyError::SourceFailed(_) => "source_failed",
            HashVerifyError::TargetFailed(_) => "target_failed",
            HashVerifyError::NoSourceFiles => "no_source_files",
            HashVerifyError::NoTargetFiles => "no_target_files",
        }
    }
}
