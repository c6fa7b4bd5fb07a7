//! config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Explicit overrides by the embedding program (not handled here)
//!
//! # Config Locations
//!
//! Searched in order, first hit wins:
//! 1. `$CMS_FACADE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/cms-facade/config.toml`
//! 3. `~/.cms-facade/config.toml`
//!
//! A missing file is not an error; defaults are used.
//!
//! # Example
//!
//! ```no_run
//! use cms_facade::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("Datastore: {}", config.default_datastore());
//! println!("Timeout: {:?}", config.http_timeout());
//! ```

pub mod schema;

pub use schema::{FacadeConfig, HttpConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::credentials::DEFAULT_CREDENTIALS_DIR;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "CMS_FACADE_CONFIG";

/// Datastore used when none is configured.
pub const DEFAULT_DATASTORE: &str = "content";

/// Request timeout used when none is configured.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// User-Agent used when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("cms-facade/", env!("CARGO_PKG_VERSION"));

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied by the accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: FacadeConfig,
    /// Path the file was loaded from (if any)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: FacadeConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: FacadeConfig = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;
        file.validate()?;
        Ok(Self { file, path: None })
    }

    /// Wrap an already-built schema value.
    pub fn from_file(file: FacadeConfig) -> Result<Self, ConfigError> {
        file.validate()?;
        Ok(Self { file, path: None })
    }

    /// Find the first existing config file.
    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("cms-facade/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".cms-facade/config.toml"))
            .filter(|path| path.exists())
    }

    /// Path the configuration was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Get the credentials directory.
    ///
    /// Defaults to `credentials` (relative to the working directory).
    pub fn credentials_dir(&self) -> PathBuf {
        self.file
            .credentials_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_DIR))
    }

    /// Get the datastore used for branch enumeration.
    ///
    /// Defaults to "content".
    pub fn default_datastore(&self) -> &str {
        self.file
            .default_datastore
            .as_deref()
            .unwrap_or(DEFAULT_DATASTORE)
    }

    /// Get the HTTP request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(
            self.file
                .http
                .as_ref()
                .and_then(|h| h.timeout_secs)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        )
    }

    /// Get the HTTP User-Agent.
    pub fn user_agent(&self) -> &str {
        self.file
            .http
            .as_ref()
            .and_then(|h| h.user_agent.as_deref())
            .unwrap_or(DEFAULT_USER_AGENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.default_datastore(), "content");
        assert_eq!(config.credentials_dir(), PathBuf::from("credentials"));
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert!(config.user_agent().starts_with("cms-facade/"));
        assert!(config.path().is_none());
    }

    #[test]
    fn load_from_file() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "default_datastore = \"archive\"\n[http]\ntimeout_secs = 5\n",
        )
        .expect("write config");

        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.default_datastore(), "archive");
        assert_eq!(config.http_timeout(), Duration::from_secs(5));
        assert_eq!(config.path(), Some(path.as_path()));
    }

    #[test]
    fn load_from_missing_file_is_read_error() {
        let temp = TempDir::new().expect("temp dir");
        let result = Config::load_from(&temp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn parse_error_names_path() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "default_datastore = [").expect("write config");

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn validation_runs_on_inline_config() {
        assert!(Config::from_toml_str("default_datastore = \"\"").is_err());
        let config = Config::from_toml_str("credentials_dir = \"/srv/creds\"").expect("parse");
        assert_eq!(config.credentials_dir(), PathBuf::from("/srv/creds"));
    }

    #[test]
    fn from_file_validates() {
        let file = FacadeConfig {
            http: Some(HttpConfig {
                timeout_secs: Some(0),
                user_agent: None,
            }),
            ..Default::default()
        };
        assert!(Config::from_file(file).is_err());
    }
}
