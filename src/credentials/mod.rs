//! credentials
//!
//! Per-project credential records used to open backend sessions.
//!
//! # Architecture
//!
//! Records are loaded through the [`CredentialSource`] trait, which has
//! two implementations:
//!
//! - [`FileCredentialSource`]: one JSON file per project under a directory
//!   (default `./credentials/<project>.json`)
//! - [`MemoryCredentialSource`]: records held in memory
//!
//! # Security
//!
//! - Secrets are **never** logged or included in error messages
//! - [`Credentials`] redacts the client secret and password in `Debug`
//!
//! # Example
//!
//! ```ignore
//! use cms_facade::credentials::{create_source, CredentialSource};
//!
//! let source = create_source(None)?;
//! let creds = source.load("acme")?;
//! ```

mod file_source;
mod memory_source;
mod traits;

use std::path::Path;

pub use file_source::{FileCredentialSource, DEFAULT_CREDENTIALS_DIR};
pub use memory_source::MemoryCredentialSource;
pub use traits::{CredentialError, CredentialSource, Credentials};

/// Create the file credential source.
///
/// Uses `dir` when given, otherwise `./credentials`.
///
/// # Errors
///
/// Returns an error if the working directory cannot be determined.
pub fn create_source(dir: Option<&Path>) -> Result<Box<dyn CredentialSource>, CredentialError> {
    match dir {
        Some(dir) => Ok(Box::new(FileCredentialSource::with_dir(dir))),
        None => Ok(Box::new(FileCredentialSource::new()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_source_with_dir() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let source = create_source(Some(temp.path())).expect("create source");
        assert!(matches!(
            source.load("nobody"),
            Err(CredentialError::NotFound(_))
        ));
    }

    #[test]
    fn create_default_source() {
        let source = create_source(None).expect("create source");
        // Empty identifiers are rejected before touching the filesystem
        assert!(matches!(
            source.load(""),
            Err(CredentialError::InvalidProject(_))
        ));
    }
}
