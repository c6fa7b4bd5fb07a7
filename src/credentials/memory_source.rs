//! credentials::memory_source
//!
//! In-memory credential source for embedding and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::traits::{CredentialError, CredentialSource, Credentials};

/// Credential records held in memory, shared across clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialSource {
    records: Arc<Mutex<HashMap<String, Credentials>>>,
}

impl MemoryCredentialSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the record for `project`.
    pub fn insert(&self, project: impl Into<String>, credentials: Credentials) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(project.into(), credentials);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(self, project: impl Into<String>, credentials: Credentials) -> Self {
        self.insert(project, credentials);
        self
    }
}

impl CredentialSource for MemoryCredentialSource {
    fn load(&self, project: &str) -> Result<Credentials, CredentialError> {
        if project.trim().is_empty() {
            return Err(CredentialError::InvalidProject(
                "project identifier must not be empty".into(),
            ));
        }
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(project)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(project.to_string()))
    }
}
