//! Error types for container operations.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses
//! [`VpakError`] as the error type. `std::io::Error` converts automatically
//! via `From`.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VpakError>;

/// Errors that can occur while reading or writing a vpak container.
#[derive(Error, Debug)]
pub enum VpakError {
    /// Filesystem or stream I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The directory header declares an impossible record count.
    #[error("invalid entry count: {0}")]
    InvalidEntryCount(i32),

    /// A directory record carries sizes or a path length that cannot be
    /// valid.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Decompressed output did not match the size declared by the record.
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}
