//! config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Values are validated after parsing (e.g., the default datastore name
//! must be non-empty, the HTTP timeout must be positive).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Facade configuration file.
///
/// # Example
///
/// ```toml
/// credentials_dir = "/etc/cms-facade/credentials"
/// default_datastore = "content"
///
/// [http]
/// timeout_secs = 30
/// user_agent = "cms-facade"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FacadeConfig {
    /// Directory holding `<project>.json` credential records
    pub credentials_dir: Option<PathBuf>,

    /// Datastore used for branch enumeration
    pub default_datastore: Option<String>,

    /// HTTP transport settings
    pub http: Option<HttpConfig>,
}

impl FacadeConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(datastore) = &self.default_datastore {
            if datastore.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "default_datastore must not be empty".into(),
                ));
            }
        }

        if let Some(dir) = &self.credentials_dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "credentials_dir must not be empty".into(),
                ));
            }
        }

        if let Some(http) = &self.http {
            http.validate()?;
        }

        Ok(())
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// User-Agent header value
    pub user_agent: Option<String>,
}

impl HttpConfig {
    /// Validate the HTTP settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "http.timeout_secs must be greater than zero".into(),
            ));
        }
        if let Some(agent) = &self.user_agent {
            if agent.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "http.user_agent must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}
