//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Blob does not exist
    #[display("blob not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Access denied (expired or under-privileged SAS token, filesystem permissions)
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Blob name is empty, too long, or contains characters we refuse to store
    #[display("invalid blob name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// Container reference could not be parsed, or names a container that
    /// does not exist
    #[display("invalid container reference: {_0}")]
    InvalidContainer(#[error(not(source))] String),
    /// Storage endpoint unreachable, timed out, or failing on its side
    #[display("storage unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Unavailable(_) | Self::BackendError(_))
    }

    /// Returns `true` if the error means the blob simply isn't there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
