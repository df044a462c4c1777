//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local filesystem.
//! Blobs are stored as files in a configured directory and accessed using
//! standard filesystem operations via `tokio::fs` for async I/O. Handy for
//! development when no cloud container is at hand.

use crate::backend::{BlobInfoStream, ByteStream};
use crate::error::ErrorKind;
use crate::{BlobInfo, StorageBackend, error::Result, name::validate as validate_name};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use futures::TryStreamExt;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use bytes::Bytes;
use tempfile::TempPath;
use tokio::fs::{self, DirEntry};
use tokio::io::AsyncWriteExt;

const STAGED_SUFFIX: &str = ".partial";

enum WalkEntry {
    File(BlobInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// Stores blobs in a directory on the local filesystem. Blob names containing
/// `/` map onto subdirectories. Content types are not persisted.
///
/// # Examples
///
/// ```no_run
/// use docshelf_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/srv/docshelf")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory standing in for the container
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidContainer(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidContainer(root.display().to_string()));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.display().to_string()))?;
        }

        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for a blob name.
    ///
    /// Validates the name and joins it with the root directory.
    fn absolute_path(&self, name: &str) -> Result<PathBuf> {
        let validated = validate_name(name)?;
        Ok(self.root.join(validated))
    }

    /// Convert an absolute path back to a blob name.
    fn blob_name(&self, absolute: &Path) -> Result<String> {
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        let components = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ErrorKind::InvalidName(relative.to_string_lossy().into_owned()))?;
        validate_name(components.join("/"))
    }

    /// Re-use same data collection from file metadata for both list and stat functions
    fn metadata(name: &str, metadata: Metadata) -> Result<BlobInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        Ok(BlobInfo::new(name, metadata.len(), modified))
    }

    /// An upload still in progress (or abandoned by a crash).
    fn is_staged(path: &Path) -> bool {
        path.file_name()
            .and_then(|f| f.to_str())
            .is_some_and(|f| f.starts_with('.') && f.ends_with(STAGED_SUFFIX))
    }

    fn map_io_error(e: std::io::Error, name: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(name.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(name.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Pulled out of the listing stream so that errors can be `?`-ed here and
    /// yielded once over there.
    async fn process_entry(&self, entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path.display().to_string()))?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if metadata.is_file() {
            if Self::is_staged(&path) {
                return Ok(WalkEntry::Skip);
            }
            let name = self.blob_name(&path)?;
            return Ok(WalkEntry::File(Self::metadata(&name, metadata)?));
        }
        // Note: silently drop what is most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }

    /// Open a hidden file next to `path` to write into. It only replaces
    /// `path` once persisted, and is removed if dropped before then.
    async fn stage(path: &Path, name: &str) -> Result<(fs::File, TempPath)> {
        let parent = path.parent().ok_or_else(|| ErrorKind::InvalidName(name.to_string()))?;
        fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, name))?;
        let staged = tempfile::Builder::new()
            .prefix(".")
            .suffix(STAGED_SUFFIX)
            .tempfile_in(parent)
            .map_err(|e| Self::map_io_error(e, name))?;
        let (file, path) = staged.into_parts();
        Ok((fs::File::from_std(file), path))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> BlobInfoStream<'_> {
        let mut stack = vec![self.root.clone()];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // Consistent with remote containers: a directory that
                    // vanished mid-walk is simply empty.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current.display().to_string())));
                        continue 'dirs;
                    }
                };

                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => {
                            yield Err(exn::Exn::from(Self::map_io_error(e, &current.display().to_string())));
                            continue 'entries;
                        },
                    };
                    match self.process_entry(entry).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let abs_path = self.absolute_path(name)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)? && abs_path.is_file())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(name)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, name))?)
    }

    async fn stat(&self, name: &str) -> Result<BlobInfo> {
        let abs_path = self.absolute_path(name)?;
        let metadata = fs::metadata(&abs_path).await.map_err(|e| Self::map_io_error(e, name))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(name.to_string()));
        }
        Self::metadata(name, metadata)
    }

    async fn write(&self, name: &str, data: &[u8], content_type: &str) -> Result<()> {
        tracing::debug!(name, bytes = data.len(), content_type, "Writing blob to local directory");
        let body = futures::stream::once(async { Ok::<_, std::io::Error>(Bytes::copy_from_slice(data)) });
        self.write_stream(name, Box::pin(body), content_type).await?;
        Ok(())
    }

    async fn write_stream(&self, name: &str, mut body: ByteStream<'_>, content_type: &str) -> Result<u64> {
        let abs_path = self.absolute_path(name)?;
        let (mut file, staged) = Self::stage(&abs_path, name).await?;
        tracing::debug!(name, content_type, staged = %staged.display(), "Streaming blob to local directory");
        let mut written = 0u64;
        let copied: std::io::Result<()> = async {
            while let Some(chunk) = body.try_next().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await
        }
        .await;
        drop(file);
        // Dropping `staged` on failure removes it; the stored blob is untouched.
        copied.map_err(ErrorKind::Io)?;
        staged.persist(&abs_path).map_err(|e| Self::map_io_error(e.error, name))?;
        Ok(written)
    }

    async fn delete_if_exists(&self, name: &str) -> Result<bool> {
        let abs_path = self.absolute_path(name)?;
        match fs::remove_file(&abs_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => exn::bail!(Self::map_io_error(e, name)),
        }
    }
}
