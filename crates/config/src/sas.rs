use crate::error::{ErrorKind, Result};
use serde::Deserialize;
use std::fmt;
use url::Url;

/// A container URI carrying a shared access signature.
///
/// The query string is a credential, so [`Debug`] and [`Display`](fmt::Display)
/// only ever show the part before the `?`. Use [`expose()`](Self::expose) to
/// hand the full URI to the storage client.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SasUri(String);

impl SasUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// The full URI, signature included.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// The URI with the signature stripped.
    pub fn redacted(&self) -> &str {
        self.0.split_once('?').map_or(self.0.as_str(), |(base, _)| base)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| ErrorKind::Invalid(format!("storage.sas_uri {}: {reason}", self.redacted()));
        let Ok(url) = Url::parse(self.0.trim()) else {
            exn::bail!(invalid("not a URI"));
        };
        if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
            exn::bail!(invalid("must be an http(s) URI"));
        }
        if url.path_segments().is_none_or(|mut segments| segments.all(str::is_empty)) {
            exn::bail!(invalid("missing container name"));
        }
        if url.query().is_none_or(str::is_empty) {
            exn::bail!(invalid("missing shared access signature"));
        }
        Ok(())
    }
}

impl fmt::Debug for SasUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SasUri({:?})", self.redacted())
    }
}

impl fmt::Display for SasUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.redacted())
    }
}
