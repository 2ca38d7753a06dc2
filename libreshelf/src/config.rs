///! Configuration file handling
///!
///! Settings live in a TOML file. Every key is optional: a missing file or a
///! missing section falls back to the built-in defaults.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive::MAX_ENTRY_SIZE;
use crate::image_processor::{CoverConfig, ResizeFilter};
use crate::remote::{NetworkSource, Timeouts};
use crate::utils::error::ConfigError;

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV: &str = "LIBRESHELF_CONFIG";

/// Document reader settings (`[reader]`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Largest archive entry a comic reader will extract, in bytes
    pub max_entry_size: u64,
    pub cover_width: u32,
    pub cover_height: u32,
    pub resize_filter: ResizeFilter,
    /// Scale used when rendering PDF pages without an explicit one
    pub default_scale: f32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_entry_size: MAX_ENTRY_SIZE,
            cover_width: 300,
            cover_height: 450,
            resize_filter: ResizeFilter::default(),
            default_scale: 1.0,
        }
    }
}

impl ReaderConfig {
    pub fn cover_config(&self) -> CoverConfig {
        CoverConfig {
            resize_filter: self.resize_filter,
            ..CoverConfig::with_size(self.cover_width, self.cover_height)
        }
    }
}

/// Network client settings (`[network]`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
        }
    }
}

impl NetworkConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs.max(1)),
            read: Duration::from_secs(self.read_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    pub reader: ReaderConfig,
    pub network: NetworkConfig,
    pub sources: Vec<NetworkSource>,
}

impl ShelfConfig {
    /// Parse a configuration file
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No configuration at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            "Loaded configuration from {:?}: {} sources",
            path,
            config.sources.len()
        );
        Ok(config)
    }

    /// Load from `path` or the default location, falling back to the
    /// defaults on any error
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("{}, using default configuration", e);
                    return Self::default();
                }
            },
        };

        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("{}, using default configuration", e);
            Self::default()
        })
    }

    /// Look up a source by id, or by name when no id matches
    pub fn source(&self, key: &str) -> Option<&NetworkSource> {
        self.sources
            .iter()
            .find(|s| s.id == key)
            .or_else(|| self.sources.iter().find(|s| s.name == key))
    }
}

/// `$LIBRESHELF_CONFIG`, or `config.toml` in the platform config directory
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("libreshelf").join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}
