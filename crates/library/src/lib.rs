//! Document operations over a blob container.
//!
//! Everything here takes a [`BackendHandle`](docshelf_storage::BackendHandle)
//! and holds no state of its own: the container is the only source of truth
//! and is asked afresh on every call.

mod delete;
pub mod error;
mod listing;
mod size;
mod upload;
mod viewer;

pub use crate::delete::delete_document;
pub use crate::listing::{BlobRecord, is_pdf, list_documents};
pub use crate::size::{ByteSize, format_size};
pub use crate::upload::{PDF_CONTENT_TYPE, UploadOutcome, UploadReport, Uploaded, bare_file_name, upload_document};
pub use crate::viewer::{DOCUMENT_PARAM, document_link, document_reference, fetch_document};
