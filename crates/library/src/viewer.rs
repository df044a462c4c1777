//! Document viewer support.
//!
//! The viewer page is addressed as `/document?fn=<name>`, with the name
//! form-urlencoded exactly once. The page embeds the raw document, which is
//! served by name through [`fetch_document()`].

use crate::error::{ErrorKind, Result, raise_storage};
use crate::listing::is_pdf;
use docshelf_storage::BackendHandle;
use tracing::instrument;
use url::form_urlencoded;

/// Query parameter carrying the document name.
pub const DOCUMENT_PARAM: &str = "fn";

/// Extract the document name from a raw (still encoded) query string.
///
/// Decodes once: `%XX` escapes and `+` as a space. A missing parameter or a
/// missing query yields an empty string. The first `fn` wins if repeated.
///
/// ```
/// use docshelf_library::document_reference;
///
/// assert_eq!(document_reference(Some("fn=Q1+report%232.pdf")), "Q1 report#2.pdf");
/// assert_eq!(document_reference(None), "");
/// ```
pub fn document_reference(raw_query: Option<&str>) -> String {
    raw_query
        .and_then(|query| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == DOCUMENT_PARAM)
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_default()
}

/// The viewer page link for a document, the inverse of [`document_reference()`].
pub fn document_link(name: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new()).append_pair(DOCUMENT_PARAM, name).finish();
    format!("/document?{query}")
}

/// Read a document's bytes for the viewer.
///
/// Returns `Ok(None)` when no such document exists, including names that are
/// not PDFs: only documents that appear in the listing can be fetched.
#[instrument(skip(backend), fields(backend = backend.name()))]
pub async fn fetch_document(backend: &BackendHandle, name: &str) -> Result<Option<Vec<u8>>> {
    if !is_pdf(name) {
        return Ok(None);
    }
    match backend.read(name).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => raise_storage(Err(e), name, || ErrorKind::StorageUnavailable),
    }
}
