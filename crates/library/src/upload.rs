//! Storing uploaded documents.
//!
//! Every uploaded file is stored under its bare filename with a PDF content
//! type, overwriting any existing document of the same name. A batch keeps
//! going when one file fails; the [`UploadReport`] says what happened to each.

use crate::error::{ErrorKind, Result, raise_storage};
use docshelf_storage::{BackendHandle, ByteStream};
use std::fmt;
use tracing::instrument;

/// Content type recorded for every uploaded document, whatever the client sent.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// The last component of a client-declared filename.
///
/// Browsers on some platforms send the full local path; both `/` and `\` are
/// treated as separators.
///
/// ```
/// use docshelf_library::bare_file_name;
///
/// assert_eq!(bare_file_name(r"C:\Users\me\report.pdf"), "report.pdf");
/// assert_eq!(bare_file_name("report.pdf"), "report.pdf");
/// ```
pub fn bare_file_name(declared: &str) -> &str {
    declared.rsplit(['/', '\\']).next().unwrap_or(declared)
}

/// A document that was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub name: String,
    pub size: u64,
}

/// Store one uploaded file.
///
/// Returns `Ok(None)` without touching storage when the declared filename has
/// no usable name in it (the browser sends an empty part when no file was
/// chosen).
///
/// # Errors
/// - [`InvalidName`](ErrorKind::InvalidName) if the bare filename is not a
///   valid blob name.
/// - [`StorageWriteFailed`](ErrorKind::StorageWriteFailed) if the write (or
///   reading the body) fails.
#[instrument(skip(backend, body), fields(backend = backend.name()))]
pub async fn upload_document(backend: &BackendHandle, declared_name: &str, body: ByteStream<'_>) -> Result<Option<Uploaded>> {
    let name = bare_file_name(declared_name);
    if name.is_empty() {
        tracing::debug!("Skipping part without a filename");
        return Ok(None);
    }
    let size = raise_storage(backend.write_stream(name, body, PDF_CONTENT_TYPE).await, name, || {
        ErrorKind::StorageWriteFailed(name.to_string())
    })?;
    tracing::info!(name, size, "Stored document");
    Ok(Some(Uploaded { name: name.to_string(), size }))
}

/// What happened to one file of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(Uploaded),
    Failed { name: String, reason: String },
    /// The request body broke off before every file could be read. Files
    /// recorded before this one were stored.
    Interrupted { reason: String },
}

impl UploadOutcome {
    /// The stored file name, if the outcome is about one file.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Uploaded(uploaded) => Some(&uploaded.name),
            Self::Failed { name, .. } => Some(name),
            Self::Interrupted { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Interrupted { .. })
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uploaded(uploaded) => write!(f, "{} uploaded.", uploaded.name),
            Self::Failed { name, reason } => write!(f, "{name} could not be uploaded: {reason}."),
            Self::Interrupted { reason } => write!(f, "The rest of the upload could not be read: {reason}."),
        }
    }
}

/// Per-file outcomes of one upload request, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    outcomes: Vec<UploadOutcome>,
}

impl UploadReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of [`upload_document()`] for `declared_name`.
    ///
    /// Skipped parts leave no trace; failures are logged and kept.
    pub fn record(&mut self, declared_name: &str, result: Result<Option<Uploaded>>) {
        match result {
            Ok(Some(uploaded)) => self.outcomes.push(UploadOutcome::Uploaded(uploaded)),
            Ok(None) => {},
            Err(e) => {
                tracing::warn!(name = declared_name, error = ?e, "Upload failed");
                self.outcomes.push(UploadOutcome::Failed {
                    name: bare_file_name(declared_name).to_string(),
                    reason: (*e).to_string(),
                });
            },
        }
    }

    /// Record that the request body could not be read any further, such as
    /// a malformed multipart body.
    pub fn interrupted(&mut self, reason: impl Into<String>) {
        self.outcomes.push(UploadOutcome::Interrupted { reason: reason.into() });
    }

    pub fn outcomes(&self) -> &[UploadOutcome] {
        &self.outcomes
    }

    pub fn notes(&self) -> Vec<String> {
        self.outcomes.iter().map(ToString::to_string).collect()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_failure()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
