//! In-memory storage backend for testing.

use super::BlobInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::BlobInfo;
use crate::name::validate as validate_name;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Clone)]
struct StoredBlob {
    modified: OffsetDateTime,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// In-memory storage backend for testing.
///
/// Blobs are stored in a `BTreeMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation and listings come
/// back in name order. Failures can be injected per blob name (writes) or for
/// the whole container (every operation), to exercise error paths without a
/// network.
///
/// # Examples
///
/// ```
/// use docshelf_storage::backend::{MockBackend, StorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("manual.pdf", b"%PDF-1.7"),
/// ]);
/// assert!(backend.exists("manual.pdf").await?);
///
/// backend.write("notes.pdf", b"%PDF-1.4", "application/pdf").await?;
/// assert!(backend.exists("notes.pdf").await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<BTreeMap<String, StoredBlob>>,
    failing_writes: HashSet<String>,
    unavailable: bool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with blobs, all stamped with the
    /// current time.
    ///
    /// Panics if any name fails validation. If test setup is wrong, then test
    /// should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self::with_files_at(files.into_iter().map(|(name, data)| (name, data, now)))
    }

    /// Create a mock backend pre-populated with blobs carrying explicit
    /// last-modified timestamps.
    ///
    /// # Example
    ///
    /// ```
    /// use docshelf_storage::backend::MockBackend;
    /// use time::macros::datetime;
    ///
    /// let backend = MockBackend::with_files_at([
    ///     ("old.pdf", b"data file 1", datetime!(2020-01-01 0:00 UTC)),
    ///     ("new.pdf", b"data file 2", datetime!(2024-01-01 0:00 UTC)),
    /// ]);
    /// ```
    pub fn with_files_at(
        files: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>, OffsetDateTime)>,
    ) -> Self {
        let mut map = BTreeMap::new();
        for (name, data, modified) in files {
            let name = name.into();
            let Ok(validated) = validate_name(&name) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files_at: invalid name {name:?}");
            };
            map.insert(validated, StoredBlob { modified, content_type: None, data: data.into() });
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            failing_writes: HashSet::new(),
            unavailable: false,
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every write to the given blob names fail with
    /// [`Unavailable`](ErrorKind::Unavailable).
    pub fn with_failing_writes(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.failing_writes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Make every operation fail as though the container were unreachable.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// The content type recorded by the last write to `name`, if any.
    pub async fn content_type(&self, name: &str) -> Option<String> {
        self.storage.read().await.get(name).and_then(|blob| blob.content_type.clone())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            exn::bail!(ErrorKind::Unavailable(format!("mock backend `{}` is offline", self.name)));
        }
        Ok(())
    }

    fn blob_info(name: &str, blob: &StoredBlob) -> BlobInfo {
        BlobInfo::new(name, blob.data.len() as u64, blob.modified)
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> BlobInfoStream<'_> {
        if let Err(e) = self.check_available() {
            return Box::pin(futures::stream::once(async { Err(e) }));
        }
        Box::pin(stream! {
            // Snapshot entries under the read lock, then drop it before
            // yielding to avoid holding the lock across yield points.
            let entries: Vec<BlobInfo> = {
                let guard = self.storage.read().await;
                guard.iter().map(|(name, blob)| Self::blob_info(name, blob)).collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        self.check_available()?;
        let name = validate_name(name)?;
        Ok(self.storage.read().await.contains_key(&name))
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.check_available()?;
        let name = validate_name(name)?;
        let blob = self.storage.read().await.get(&name).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(name)))?;
        Ok(blob.data)
    }

    async fn stat(&self, name: &str) -> Result<BlobInfo> {
        self.check_available()?;
        let name = validate_name(name)?;
        let guard = self.storage.read().await;
        let blob = guard.get(&name).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(name.clone())))?;
        Ok(Self::blob_info(&name, blob))
    }

    async fn write(&self, name: &str, data: &[u8], content_type: &str) -> Result<()> {
        self.check_available()?;
        let name = validate_name(name)?;
        if self.failing_writes.contains(&name) {
            exn::bail!(ErrorKind::Unavailable(format!("injected write failure for {name}")));
        }
        let blob = StoredBlob {
            modified: OffsetDateTime::now_utc(),
            content_type: Some(content_type.to_string()),
            data: data.to_vec(),
        };
        self.storage.write().await.insert(name, blob);
        Ok(())
    }

    async fn delete_if_exists(&self, name: &str) -> Result<bool> {
        self.check_available()?;
        let name = validate_name(name)?;
        Ok(self.storage.write().await.remove(&name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write("test.pdf", b"hello", "application/pdf").await.unwrap();
        assert_eq!(backend.read("test.pdf").await.unwrap(), b"hello");
        assert_eq!(backend.content_type("test.pdf").await.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn test_with_files() {
        let backend = MockBackend::with_files([("a.pdf", Vec::from(*b"one")), ("b/c.pdf", Vec::from(*b"two"))]);
        assert!(backend.exists("a.pdf").await.unwrap());
        assert!(backend.exists("b/c.pdf").await.unwrap());
        assert!(!backend.exists("nope.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_with_files_at_keeps_timestamps() {
        let modified = datetime!(2021-06-01 12:00 UTC);
        let backend = MockBackend::with_files_at([("a.pdf", Vec::from(*b"one"), modified)]);
        assert_eq!(backend.stat("a.pdf").await.unwrap(), BlobInfo::new("a.pdf", 3, modified));
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let backend = MockBackend::default();
        let err = backend.read("missing.pdf").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_if_exists() {
        let backend = MockBackend::default();
        backend.write("file.pdf", b"data", "application/pdf").await.unwrap();
        assert!(backend.delete_if_exists("file.pdf").await.unwrap());
        assert!(!backend.exists("file.pdf").await.unwrap());
        assert!(!backend.delete_if_exists("file.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_is_name_ordered() {
        let backend = MockBackend::with_files([("b.pdf", Vec::from(*b"2")), ("a.pdf", Vec::from(*b"1"))]);
        let names: Vec<_> = backend.list().await.unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, ["a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let backend = MockBackend::default().with_failing_writes(["bad.pdf"]);
        let err = backend.write("bad.pdf", b"data", "application/pdf").await.unwrap_err();
        assert!(err.is_retryable());
        backend.write("good.pdf", b"data", "application/pdf").await.unwrap();
        assert!(!backend.exists("bad.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let backend = MockBackend::with_files([("a.pdf", Vec::from(*b"1"))]).unavailable();
        assert!(matches!(&*backend.list().await.unwrap_err(), ErrorKind::Unavailable(_)));
        assert!(matches!(&*backend.delete_if_exists("a.pdf").await.unwrap_err(), ErrorKind::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_name_validation() {
        let backend = MockBackend::default();
        assert!(backend.read("../etc/passwd").await.is_err());
        assert!(backend.write("../escape", b"bad", "application/pdf").await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid name")]
    fn test_with_files_panics_on_bad_name() {
        MockBackend::with_files([("../escape", Vec::from(*b"bad"))]);
    }
}
