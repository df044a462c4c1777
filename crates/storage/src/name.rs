//! Blob name validation.
//!
//! Blob keys arrive from users (upload filenames, delete forms, query
//! strings) and end up in request URLs or filesystem paths, so every backend
//! runs them through [`validate`] before use.

use crate::error::{ErrorKind, Result};

/// Maximum blob name length accepted by Azure Blob Storage.
const MAX_NAME_CHARS: usize = 1024;

/// Validates a blob name for security and correctness.
///
/// Names may contain `/` (virtual directories), but every segment must be
/// non-empty and must not be `.` or `..`, so a name can never escape the
/// container root on backends that map names onto a filesystem.
///
/// # Returns
/// Returns the name unchanged if valid, or [`InvalidName`](crate::error::ErrorKind::InvalidName)
/// if invalid.
///
/// # Examples
///
/// ```
/// use docshelf_storage::validate_name;
/// // Valid names
/// assert!(validate_name("report.pdf").is_ok());
/// assert!(validate_name("2024/q1/report.pdf").is_ok());
/// assert!(validate_name("Quarterly Report (final).PDF").is_ok());
/// // Invalid names
/// assert!(validate_name("").is_err());
/// assert!(validate_name("../etc/passwd").is_err());
/// assert!(validate_name("a//b.pdf").is_err());
/// assert!(validate_name("/leading.pdf").is_err());
/// assert!(validate_name("a\0b.pdf").is_err());
/// ```
pub fn validate(name: impl AsRef<str>) -> Result<String> {
    let name = name.as_ref();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        exn::bail!(ErrorKind::InvalidName(name.to_string()));
    }
    // Null bytes truncate C-based syscalls and other control characters have
    // no business in a document name.
    if name.chars().any(|c| c.is_control() || c == '\\') {
        exn::bail!(ErrorKind::InvalidName(name.to_string()));
    }
    if name.split('/').any(|segment| matches!(segment, "" | "." | "..")) {
        exn::bail!(ErrorKind::InvalidName(name.to_string()));
    }
    Ok(name.to_string())
}
