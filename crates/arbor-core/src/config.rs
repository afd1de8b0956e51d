//! Client configuration.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::Category;

/// Environment variable overriding the configured backend URL.
pub const BASE_URL_ENV: &str = "ARBOR_BASE_URL";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value failed validation.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration for talking to the folder backend.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ClientConfig {
    /// Base URL of the folder API, e.g. `http://localhost:3000/api`.
    #[builder(default = "default_base_url()")]
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[builder(default = "30")]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Category given to new root folders when none is chosen.
    #[builder(default)]
    #[serde(default)]
    pub default_category: Category,

    /// Skip update calls for persisted folders whose name did not change.
    #[builder(default = "false")]
    #[serde(default)]
    pub skip_unchanged_updates: bool,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn check_base_url(url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Err("Base URL cannot be empty".to_string());
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(format!("Base URL must start with http:// or https://, got '{url}'"));
    }
    Ok(())
}

impl ClientConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref url) = self.base_url {
            check_base_url(url)?;
        }
        if self.timeout_secs == Some(0) {
            return Err("Timeout must be at least one second".to_string());
        }
        Ok(())
    }
}

impl ClientConfig {
    /// Create a new config builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Create a config pointing at `base_url` with defaults elsewhere.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Default location: `<config dir>/arbor/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("arbor").join("config.toml"))
    }

    /// Load from `path` (or the default location), apply the environment
    /// override, and validate. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(url) = std::env::var(BASE_URL_ENV).ok().filter(|url| !url.is_empty()) {
            config.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_base_url(&self.base_url).map_err(|message| ConfigError::Invalid { message })?;
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "Timeout must be at least one second".to_string(),
            });
        }
        Ok(())
    }

    /// Join an API path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            default_category: Category::default(),
            skip_unchanged_updates: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::builder()
            .base_url("https://files.example.com/api")
            .timeout_secs(5u64)
            .default_category(Category::Media)
            .build()
            .unwrap();

        assert_eq!(config.base_url, "https://files.example.com/api");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.default_category, Category::Media);
        assert!(!config.skip_unchanged_updates);
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        assert!(ClientConfig::builder().base_url("ftp://x").build().is_err());
        assert!(ClientConfig::builder().timeout_secs(0u64).build().is_err());
    }

    #[test]
    fn test_endpoint_joining() {
        let config = ClientConfig::new("http://localhost:3000/api/");
        assert_eq!(
            config.endpoint("/folder/create"),
            "http://localhost:3000/api/folder/create"
        );
    }

    #[test]
    fn test_toml_defaults() {
        let config: ClientConfig = toml::from_str("base_url = \"https://a.b\"").unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.default_category, Category::General);
    }
}
