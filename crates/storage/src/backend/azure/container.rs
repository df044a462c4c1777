//! Pre-signed container URI handling.
//!
//! A shared access signature (SAS) container URI looks like
//! `https://account.blob.core.windows.net/container?sv=...&sp=rwdl&sig=...`.
//! Every request against the container reuses that query string verbatim and
//! adds its own parameters after it.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fmt;
use url::Url;

/// A validated SAS container URI.
///
/// The signature is a credential: [`Debug`] and [`redacted()`](Self::redacted)
/// never include the query string.
#[derive(Clone)]
pub(crate) struct ContainerUrl {
    url: Url,
}

impl ContainerUrl {
    pub(crate) fn parse(sas_uri: &str) -> Result<Self> {
        let redacted = redact(sas_uri);
        let mut url = Url::parse(sas_uri.trim()).or_raise(|| ErrorKind::InvalidContainer(redacted.clone()))?;
        if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
            exn::bail!(ErrorKind::InvalidContainer(redacted));
        }
        if url.query().is_none_or(str::is_empty) {
            exn::bail!(ErrorKind::InvalidContainer(format!("{redacted} (missing shared access signature)")));
        }
        if url.path_segments().is_none_or(|mut segments| segments.all(str::is_empty)) {
            exn::bail!(ErrorKind::InvalidContainer(format!("{redacted} (missing container name)")));
        }
        url.set_fragment(None);
        // Drop any trailing slash so blob names join onto the container path.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
        }
        Ok(Self { url })
    }

    /// Container name (last path segment).
    pub(crate) fn container(&self) -> &str {
        self.url.path_segments().and_then(|mut segments| segments.next_back()).unwrap_or_default()
    }

    /// The container URI without its signature, safe for logs.
    pub(crate) fn redacted(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.to_string()
    }

    /// List Blobs request URL, optionally continuing from a page marker.
    pub(crate) fn list(&self, marker: Option<&str>) -> Url {
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("restype", "container").append_pair("comp", "list");
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }
        url
    }

    /// Blob URL; each `/`-separated segment of the name is percent-encoded.
    pub(crate) fn blob(&self, name: &str) -> Url {
        let mut url = self.url.clone();
        // Infallible: parse() only accepts http(s) URLs, which can be a base.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(name.split('/'));
        }
        url
    }

    /// Put Block request URL.
    pub(crate) fn block(&self, name: &str, block_id: &str) -> Url {
        let mut url = self.blob(name);
        url.query_pairs_mut().append_pair("comp", "block").append_pair("blockid", block_id);
        url
    }

    /// Put Block List request URL.
    pub(crate) fn block_list(&self, name: &str) -> Url {
        let mut url = self.blob(name);
        url.query_pairs_mut().append_pair("comp", "blocklist");
        url
    }
}

impl fmt::Debug for ContainerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContainerUrl").field(&self.redacted()).finish()
    }
}

fn redact(uri: &str) -> String {
    uri.trim().split_once('?').map_or(uri.trim(), |(base, _)| base).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAS: &str = "https://acct.blob.core.windows.net/docs?sv=2022-11-02&sp=rwdl&sig=abc%2Bdef%3D";

    #[test]
    fn test_parse_and_redact() {
        let container = ContainerUrl::parse(SAS).unwrap();
        assert_eq!(container.container(), "docs");
        assert_eq!(container.redacted(), "https://acct.blob.core.windows.net/docs");
        assert!(!format!("{container:?}").contains("sig"));
    }

    #[test]
    fn test_trailing_slash_is_dropped() {
        let container = ContainerUrl::parse("https://acct.blob.core.windows.net/docs/?sig=x").unwrap();
        assert_eq!(container.blob("a.pdf").as_str(), "https://acct.blob.core.windows.net/docs/a.pdf?sig=x");
    }

    #[test]
    fn test_emulator_style_uri() {
        let container = ContainerUrl::parse("http://127.0.0.1:10000/devstoreaccount1/docs?sig=x").unwrap();
        assert_eq!(container.container(), "docs");
        assert_eq!(container.blob("a.pdf").path(), "/devstoreaccount1/docs/a.pdf");
    }

    #[rstest]
    #[case("not a url")]
    #[case("ftp://acct.blob.core.windows.net/docs?sig=x")]
    #[case("https://acct.blob.core.windows.net/docs")]
    #[case("https://acct.blob.core.windows.net/docs?")]
    #[case("https://acct.blob.core.windows.net/?sig=x")]
    #[case("https://acct.blob.core.windows.net?sig=x")]
    fn test_parse_rejects(#[case] uri: &str) {
        let err = ContainerUrl::parse(uri).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidContainer(msg) if !msg.contains("sig=")));
    }

    #[test]
    fn test_signature_is_preserved_verbatim() {
        let container = ContainerUrl::parse(SAS).unwrap();
        let url = container.blob("report.pdf");
        assert_eq!(url.query(), Some("sv=2022-11-02&sp=rwdl&sig=abc%2Bdef%3D"));
    }

    #[test]
    fn test_list_url() {
        let container = ContainerUrl::parse(SAS).unwrap();
        let first = container.list(None);
        assert_eq!(first.path(), "/docs");
        assert!(first.query().unwrap().ends_with("&restype=container&comp=list"));
        let next = container.list(Some("2!96!MDAw"));
        assert!(next.query().unwrap().ends_with("&comp=list&marker=2%2196%21MDAw"));
    }

    #[test]
    fn test_blob_names_are_encoded() {
        let container = ContainerUrl::parse(SAS).unwrap();
        let url = container.blob("Q1 report #2?.pdf");
        assert_eq!(url.path(), "/docs/Q1%20report%20%232%3F.pdf");
        let nested = container.blob("2024/q1.pdf");
        assert_eq!(nested.path(), "/docs/2024/q1.pdf");
    }

    #[test]
    fn test_block_urls() {
        let container = ContainerUrl::parse(SAS).unwrap();
        let block = container.block("a.pdf", "YmxvY2s=");
        assert!(block.query().unwrap().ends_with("&comp=block&blockid=YmxvY2s%3D"));
        let list = container.block_list("a.pdf");
        assert!(list.query().unwrap().ends_with("&comp=blocklist"));
    }
}
