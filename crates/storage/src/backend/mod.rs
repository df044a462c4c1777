//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for blob container operations across different backends (Azure
//! Blob Storage via a pre-signed container URI, a local directory, etc.).
//!

#[cfg(feature = "azure")]
mod azure;
mod local;
#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "azure")]
pub use self::azure::AzureBackend;
pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::{ErrorKind, Result};
use crate::models::BlobInfo;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

type BlobInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<BlobInfo>> + Send + 'a>>;

/// A request body (or any other byte source) handed to
/// [`write_stream()`](StorageBackend::write_stream).
pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + 'a>>;

/// Unified interface for blob containers.
///
/// All storage operations are asynchronous since the primary backend is a
/// remote service. Every backend addresses exactly one container; blob names
/// are keys within that container.
///
/// # Name Handling
/// Names must be validated using [`validate_name`](crate::validate_name)
/// before use. Implementations enforce this validation.
///
/// # Examples
///
/// ```
/// use docshelf_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of_hardcoded_blob(backend: &dyn StorageBackend) -> Result<u64> {
///     if backend.exists("manual.pdf").await? {
///         Ok(backend.stat("manual.pdf").await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List every blob in the container.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self) -> Result<Vec<BlobInfo>> {
        self.list_stream().try_collect().await
    }

    /// Stream blob metadata for the whole container.
    ///
    /// Results are yielded in the backend's enumeration order as soon as they
    /// are known (remote backends page through the listing lazily). An error
    /// item ends the listing.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use docshelf_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream();
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.name, info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream(&self) -> BlobInfoStream<'_>;

    /// Check if a blob exists.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Read blob contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the blob
    /// does not exist.
    async fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Get blob metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the blob
    /// does not exist.
    async fn stat(&self, name: &str) -> Result<BlobInfo>;

    /// Write blob contents.
    ///
    /// Creates a new blob or overwrites an existing one (last writer wins),
    /// recording `content_type` where the backend supports it.
    ///
    /// ```no_run
    /// # use docshelf_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// backend.write("hello.pdf", b"%PDF-1.7 ...", "application/pdf").await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn write(&self, name: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Write blob contents from a stream, returning the number of bytes
    /// written.
    ///
    /// Same semantics as [`write()`](Self::write). The default implementation
    /// buffers the whole stream in memory first; backends that can do better
    /// (staged block uploads, appending to a file) override it.
    ///
    /// Returns [`Io`](crate::error::ErrorKind::Io) if the stream itself fails.
    async fn write_stream(&self, name: &str, mut body: ByteStream<'_>, content_type: &str) -> Result<u64> {
        let mut buffer = Vec::new();
        while let Some(chunk) = body.try_next().await.map_err(ErrorKind::Io)? {
            buffer.extend_from_slice(&chunk);
        }
        self.write(name, &buffer, content_type).await?;
        Ok(buffer.len() as u64)
    }

    /// Delete a blob if it exists.
    ///
    /// Returns `true` if a blob was removed and `false` if there was nothing
    /// to remove. Absence is never an error.
    ///
    /// ```no_run
    /// # use docshelf_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// if !backend.delete_if_exists("old.pdf").await? {
    ///     println!("Already gone");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    async fn delete_if_exists(&self, name: &str) -> Result<bool>;
}
