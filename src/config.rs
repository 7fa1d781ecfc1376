//! Server configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file,
//! then `IMGD_*` environment variables. CLI flags are applied on top by
//! the binary.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "IMGD_";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Serve from `production_root` instead of `development_root`
    pub production: bool,
    pub production_root: PathBuf,
    pub development_root: PathBuf,
    /// Explicit storage root, overrides both of the above
    pub root: Option<PathBuf>,
    /// Request body limit for uploads
    pub max_upload_bytes: usize,
    /// Largest edge a resize may produce
    pub max_dimension: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8004)),
            production: false,
            production_root: PathBuf::from("/resource/images"),
            development_root: PathBuf::from("/tmp/imgd/images"),
            root: None,
            max_upload_bytes: 32 * 1024 * 1024,
            max_dimension: 10_000,
        }
    }
}

impl Config {
    /// Load defaults, an optional TOML file, and `IMGD_*` env vars
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = file {
            if !path.is_file() {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    /// Effective storage root
    pub fn image_root(&self) -> &Path {
        match &self.root {
            Some(root) => root,
            None if self.production => &self.production_root,
            None => &self.development_root,
        }
    }
}
