//! credentials::traits
//!
//! Credential record and source trait.
//!
//! # Design
//!
//! A [`CredentialSource`] maps a project identifier to the [`Credentials`]
//! needed to authenticate a session for it. Sources are synchronous: they
//! read local state only, the network handshake happens in the connector.
//!
//! # Security
//!
//! Implementations MUST:
//! - Never log, print, or include secret values in error messages
//! - Be thread-safe (Send + Sync)

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from credential sources.
///
/// Note: Error messages intentionally do not include secret values.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No credential record exists for the project.
    #[error("no credentials found for project '{0}'")]
    NotFound(String),

    /// The project identifier is empty or cannot name a record.
    #[error("invalid project identifier: {0}")]
    InvalidProject(String),

    /// The record exists but cannot be read.
    #[error("failed to read credentials: {0}")]
    ReadError(String),

    /// The record was read but does not parse or misses required fields.
    #[error("malformed credentials for project '{project}': {message}")]
    Malformed {
        /// Project identifier
        project: String,
        /// What is wrong with the record
        message: String,
    },
}

/// Credential record for one project.
///
/// Field names on disk follow the backend console's export format
/// (`clientKey`, `clientSecret`, `baseURL`, ...).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// OAuth client key
    pub client_key: String,
    /// OAuth client secret
    pub client_secret: String,
    /// API user name
    pub username: String,
    /// API user password
    pub password: String,
    /// Backend API base URL
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Application the datastores hang off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
}

impl Credentials {
    /// Check that required fields are non-empty.
    ///
    /// Returns the name of the first empty field.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("clientKey", &self.client_key),
            ("clientSecret", &self.client_secret),
            ("username", &self.username),
            ("password", &self.password),
            ("baseURL", &self.base_url),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

// Custom Debug to avoid exposing secrets
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_key", &self.client_key)
            .field("client_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("application", &self.application)
            .finish()
    }
}

/// Trait for credential sources.
///
/// Implementations must be thread-safe (Send + Sync) and must never
/// log, print, or include secret values in error messages.
pub trait CredentialSource: Send + Sync {
    /// Load the credential record for `project`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no record exists
    /// - `InvalidProject` if the identifier is empty
    /// - `ReadError` / `Malformed` if the record cannot be used
    fn load(&self, project: &str) -> Result<Credentials, CredentialError>;
}
