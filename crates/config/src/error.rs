//! Configuration Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A configuration source could not be read or did not deserialize
    #[display("could not load configuration: {_0}")]
    Load(#[error(not(source))] String),
    /// Configuration loaded, but describes something we cannot run with
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Configuration problems need a human to fix a file or an environment
    /// variable, never a retry.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
