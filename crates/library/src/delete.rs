use crate::error::{ErrorKind, Result, raise_storage};
use docshelf_storage::BackendHandle;
use tracing::instrument;

/// Delete a document by name.
///
/// Returns `true` if the document existed and was removed, `false` if there
/// was nothing to remove. Deleting twice is not an error.
///
/// # Errors
/// - [`InvalidName`](ErrorKind::InvalidName) if `name` can never exist.
/// - [`StorageUnavailable`](ErrorKind::StorageUnavailable) for anything the
///   container reports other than absence.
#[instrument(skip(backend), fields(backend = backend.name()))]
pub async fn delete_document(backend: &BackendHandle, name: &str) -> Result<bool> {
    let removed = raise_storage(backend.delete_if_exists(name).await, name, || ErrorKind::StorageUnavailable)?;
    if removed {
        tracing::info!("Deleted document");
    } else {
        tracing::debug!("Nothing to delete");
    }
    Ok(removed)
}
