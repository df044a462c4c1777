use crate::error::{ErrorKind, Result};
use crate::size::ByteSize;
use docshelf_storage::{BackendHandle, BlobInfo};
use exn::ResultExt;
use time::OffsetDateTime;
use tracing::instrument;

/// One document as shown in the listing.
///
/// Built fresh for every listing request; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    pub name: String,
    pub last_modified: OffsetDateTime,
    pub size_bytes: u64,
}

impl BlobRecord {
    /// Human-readable size, e.g. `"1.5 KB"`.
    pub fn size_display(&self) -> String {
        ByteSize(self.size_bytes).to_string()
    }
}

impl From<BlobInfo> for BlobRecord {
    fn from(info: BlobInfo) -> Self {
        Self {
            name: info.name,
            last_modified: info.modified,
            size_bytes: info.size,
        }
    }
}

/// Whether a blob name looks like a PDF document (case-insensitive `.pdf`).
pub fn is_pdf(name: &str) -> bool {
    name.to_lowercase().ends_with(".pdf")
}

/// List every PDF in the container, most recently modified first.
///
/// Documents with equal timestamps keep the order the backend enumerated
/// them in.
///
/// # Errors
/// Returns [`StorageUnavailable`](ErrorKind::StorageUnavailable) if the
/// container cannot be listed.
#[instrument(skip_all, fields(backend = backend.name()))]
pub async fn list_documents(backend: &BackendHandle) -> Result<Vec<BlobRecord>> {
    let blobs = backend.list().await.or_raise(|| ErrorKind::StorageUnavailable)?;
    let total = blobs.len();
    let mut records: Vec<BlobRecord> =
        blobs.into_iter().filter(|blob| is_pdf(&blob.name)).map(BlobRecord::from).collect();
    // Stable, so ties stay in enumeration order.
    records.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    tracing::debug!(total, documents = records.len(), "Listed container");
    Ok(records)
}
