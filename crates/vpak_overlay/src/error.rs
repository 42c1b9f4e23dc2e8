//! Error types for overlay operations.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses
//! [`Error`] as the error type. Callers sitting behind a C-style boundary can
//! map each variant onto a status code; nothing in this crate panics on bad
//! input or bad archive data.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving virtual files.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested path or pattern matched nothing on either side of the
    /// overlay.
    #[error("no matching virtual file")]
    NotFound,

    /// The operation is valid for real files but not for a read-only overlay.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The archive directory or an entry payload did not decode.
    #[error("corrupt archive data: {0}")]
    Corrupt(String),

    /// Filesystem I/O failed (reading the archive, loose files, cache).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A handle value that was never issued, or whose slot has since been
    /// closed and reused.
    #[error("invalid handle: {0:#018x}")]
    InvalidHandle(u64),

    /// Failed to parse or serialize JSON (overlay configuration).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invariant violation inside the engine, such as a poisoned lock.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<vpak::VpakError> for Error {
    fn from(error: vpak::VpakError) -> Self {
        match error {
            vpak::VpakError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                Error::Corrupt("truncated archive".to_string())
            }
            vpak::VpakError::Io(io) => Error::Io(io),
            other => Error::Corrupt(other.to_string()),
        }
    }
}
