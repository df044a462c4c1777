//! Storage models.

use time::OffsetDateTime;

/// Blob metadata returned by storage backends.
///
/// One entry per object in the container, as reported by the listing or stat
/// operations. Contents are never part of this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    /// Object key within the container
    pub name: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modified timestamp, set by the storage service
    pub modified: OffsetDateTime,
}
impl BlobInfo {
    pub fn new(name: impl Into<String>, size: u64, modified: OffsetDateTime) -> Self {
        Self { name: name.into(), size, modified }
    }
}
