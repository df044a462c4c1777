//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Storage errors are raised underneath
//! these kinds, so the full tree still shows what the container said.

use derive_more::{Display, Error};
use docshelf_storage::error::{ErrorKind as StorageErrorKind, Result as StorageResult};
use exn::ResultExt;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The container could not be listed, read from or deleted from.
    #[display("document storage is unavailable")]
    StorageUnavailable,
    /// Writing one uploaded document failed.
    #[display("could not store {_0:?}")]
    StorageWriteFailed(#[error(not(source))] String),
    /// The requested document name can never exist in the container.
    #[display("invalid document name {_0:?}")]
    InvalidName(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable | Self::StorageWriteFailed(_))
    }
}

/// Raise a storage failure for `name` as [`InvalidName`](ErrorKind::InvalidName)
/// when the name was at fault, or as `otherwise` for anything else.
pub(crate) fn raise_storage<T>(result: StorageResult<T>, name: &str, otherwise: impl FnOnce() -> ErrorKind) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if matches!(&*e, StorageErrorKind::InvalidName(_)) => {
            Err(e).or_raise(|| ErrorKind::InvalidName(name.to_string()))
        },
        Err(e) => Err(e).or_raise(otherwise),
    }
}
