pub mod backend;
pub mod error;
mod models;
mod name;

pub use crate::backend::{ByteStream, StorageBackend};
pub use crate::models::BlobInfo;
pub use crate::name::validate as validate_name;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
