//! Layered configuration for docshelf.
//!
//! One [`Config`] is built at startup and never changes afterwards. Sources,
//! later ones overriding earlier ones:
//!
//! 1. built-in defaults (server section only; storage must be configured),
//! 2. a configuration file: the explicit path if one is given, otherwise the
//!    first of `docshelf.{toml,yaml,yml,json}` found in the platform config
//!    directory,
//! 3. environment variables prefixed `DOCSHELF_`, with `__` separating nested
//!    keys (`DOCSHELF_STORAGE__SAS_URI`).
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8080"
//! upload_limit = 268435456
//!
//! [storage]
//! type = "azure"
//! sas_uri = "https://account.blob.core.windows.net/docs?sv=...&sig=..."
//! timeout = 30
//! ```

pub mod error;
mod sas;

pub use crate::sas::SasUri;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "DOCSHELF_";
/// File stem searched for in the platform config directory.
pub const FILE_STEM: &str = "docshelf";
const FILE_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

/// Default request body cap for uploads: 256 MiB.
pub const DEFAULT_UPLOAD_LIMIT: u64 = 256 * 1024 * 1024;
/// Default per-request storage timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub listen: SocketAddr,
    /// Maximum size of a request body, in bytes. Applies to the whole
    /// multipart upload, not to each file in it.
    pub upload_limit: u64,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            upload_limit: DEFAULT_UPLOAD_LIMIT,
        }
    }
}

/// Where documents live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// An Azure Blob Storage container addressed by a SAS URI.
    Azure {
        sas_uri: SasUri,
        /// Per-request timeout in seconds.
        #[serde(default = "default_timeout")]
        timeout: u64,
    },
    /// A directory on the local filesystem.
    Local { root: PathBuf },
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl StorageConfig {
    /// Per-request timeout for remote backends.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Azure { timeout, .. } => Some(Duration::from_secs(*timeout)),
            Self::Local { .. } => None,
        }
    }
}

impl Config {
    /// Load, merge and validate configuration from every source.
    ///
    /// An explicit `file` must exist; without one, a missing file in the
    /// platform config directory is not an error.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(path) if path.is_file() => Some(path.to_path_buf()),
            Some(path) => exn::bail!(ErrorKind::Load(format!("{} is not a file", path.display()))),
            None => default_dir().and_then(|dir| find_in(&dir)),
        };
        Self::from_figment(Self::figment(file.as_deref())?)
    }

    /// Build the layered figment without extracting it.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::default("server", ServerConfig::default()));
        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "Reading configuration file");
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::Load(format!(
                    "{} has an unsupported extension (expected one of {})",
                    path.display(),
                    FILE_EXTENSIONS.join(", ")
                ))),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a configuration from an already-built figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .or_raise(|| ErrorKind::Load("configuration sources did not deserialize".to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.upload_limit == 0 {
            exn::bail!(ErrorKind::Invalid("server.upload_limit must be greater than zero".to_string()));
        }
        match &self.storage {
            StorageConfig::Azure { sas_uri, timeout } => {
                sas_uri.validate()?;
                if *timeout == 0 {
                    exn::bail!(ErrorKind::Invalid("storage.timeout must be greater than zero".to_string()));
                }
            },
            StorageConfig::Local { root } => {
                if !root.is_absolute() {
                    exn::bail!(ErrorKind::Invalid(format!("storage.root {} must be absolute", root.display())));
                }
            },
        }
        Ok(())
    }
}

/// Platform configuration directory (`~/.config/docshelf` on Linux).
pub fn default_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", FILE_STEM).map(|dirs| dirs.config_dir().to_path_buf())
}

/// First `docshelf.<ext>` in `dir`, in extension preference order.
pub fn find_in(dir: &Path) -> Option<PathBuf> {
    FILE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{FILE_STEM}.{ext}")))
        .find(|candidate| candidate.is_file())
}
