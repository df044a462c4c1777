//! Web Error Types
//!
//! Startup failures ([`Config`](ErrorKind::Config), [`Bind`](ErrorKind::Bind),
//! ...) end the process. Request failures are turned into an HTML error page
//! with the status from [`ErrorKind::status()`]; none of them take the server
//! down.

use axum::http::StatusCode;
use derive_more::{Display, Error};
use docshelf_library::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use exn::ResultExt;

/// A web error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for the web layer.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("document storage failed")]
    Storage,
    #[display("could not render page")]
    Template,
    #[display("could not bind listener")]
    Bind,
    #[display("server error")]
    Serve,
    #[display("invalid document name {_0:?}")]
    InvalidName(#[error(not(source))] String),
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Bind)
    }

    /// HTTP status for a failure that happened while handling a request.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidName(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage => StatusCode::BAD_GATEWAY,
            Self::Config | Self::Template | Self::Bind | Self::Serve => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Raise a library failure into the web error tree, keeping bad names
/// distinguishable from storage outages.
pub(crate) fn from_library<T>(result: LibraryResult<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            let kind = match &*e {
                LibraryErrorKind::InvalidName(name) => ErrorKind::InvalidName(name.clone()),
                LibraryErrorKind::StorageUnavailable | LibraryErrorKind::StorageWriteFailed(_) => ErrorKind::Storage,
            };
            Err(e).or_raise(|| kind)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::InvalidName("..".into()), StatusCode::BAD_REQUEST)]
    #[case(ErrorKind::NotFound("/nope".into()), StatusCode::NOT_FOUND)]
    #[case(ErrorKind::Storage, StatusCode::BAD_GATEWAY)]
    #[case(ErrorKind::Template, StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_status(#[case] kind: ErrorKind, #[case] status: StatusCode) {
        assert_eq!(kind.status(), status);
    }

    #[test]
    fn test_from_library() {
        let invalid: LibraryResult<()> = Err(exn::Exn::from(LibraryErrorKind::InvalidName("..".into())));
        assert!(matches!(&*from_library(invalid).unwrap_err(), ErrorKind::InvalidName(name) if name == ".."));
        let down: LibraryResult<()> = Err(exn::Exn::from(LibraryErrorKind::StorageUnavailable));
        assert!(matches!(&*from_library(down).unwrap_err(), ErrorKind::Storage));
    }
}
