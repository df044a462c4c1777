//! HTTP surface for docshelf.
//!
//! | Method | Path              | Page                                         |
//! |--------|-------------------|----------------------------------------------|
//! | GET    | `/`, `/explore`   | document listing                             |
//! | POST   | `/explore/delete` | delete `fileName`, then back to the listing  |
//! | GET    | `/upload`         | upload form                                  |
//! | POST   | `/upload`         | store every posted file, show what happened  |
//! | GET    | `/document?fn=`   | viewer page                                  |
//! | GET    | `/blobs/{*name}`  | raw PDF bytes                                |
//! | GET    | `/static/{file}`  | embedded stylesheet                          |

pub mod error;
mod handlers;
mod views;

pub use crate::views::{Views, blob_path};
use crate::error::{ErrorKind, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use docshelf_config::{Config, StorageConfig};
#[cfg(feature = "azure")]
use docshelf_storage::backend::AzureBackend;
use docshelf_storage::BackendHandle;
use docshelf_storage::backend::LocalBackend;
use exn::ResultExt;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Everything a request handler needs. Built once at startup; never mutated.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: BackendHandle,
    pub views: Arc<Views>,
}

impl AppState {
    pub fn new(config: Config, backend: BackendHandle) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            backend,
            views: Arc::new(Views::new()?),
        })
    }
}

/// Build the storage backend the configuration asks for.
pub fn connect(storage: &StorageConfig) -> Result<BackendHandle> {
    let backend: BackendHandle = match storage {
        #[cfg(feature = "azure")]
        StorageConfig::Azure { sas_uri, .. } => Arc::new(
            AzureBackend::new("azure", sas_uri.expose(), storage.timeout().unwrap_or_default())
                .or_raise(|| ErrorKind::Config)?,
        ),
        #[cfg(not(feature = "azure"))]
        StorageConfig::Azure { .. } => {
            tracing::error!("Azure storage is configured, but this build was compiled without the `azure` feature");
            exn::bail!(ErrorKind::Config);
        },
        StorageConfig::Local { root } => Arc::new(LocalBackend::new("local", root).or_raise(|| ErrorKind::Config)?),
    };
    tracing::info!(backend = backend.name(), "Storage configured");
    Ok(backend)
}

/// The application router.
pub fn router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.config.server.upload_limit).unwrap_or(usize::MAX);
    Router::new()
        .route("/", get(handlers::explore))
        .route("/explore", get(handlers::explore))
        .route("/explore/delete", post(handlers::delete))
        .route("/upload", get(handlers::upload_form).post(handlers::upload))
        .route("/document", get(handlers::document))
        .route("/blobs/{*name}", get(handlers::raw_document))
        .route("/static/{file}", get(handlers::static_file))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

/// Connect to storage, bind, and serve until `shutdown` resolves.
pub async fn serve(config: Config, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let backend = connect(&config.storage)?;
    let listen = config.server.listen;
    let app = router(AppState::new(config, backend)?);
    let listener = TcpListener::bind(listen).await.or_raise(|| ErrorKind::Bind)?;
    tracing::info!(address = %listen, "Listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await.or_raise(|| ErrorKind::Serve)?;
    tracing::info!("Shut down");
    Ok(())
}
