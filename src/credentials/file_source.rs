//! credentials::file_source
//!
//! File-based credential source.
//!
//! # Layout
//!
//! One JSON record per project at `<dir>/<project>.json`. The default
//! directory is `credentials/` under the current working directory.
//!
//! # Example
//!
//! ```ignore
//! use cms_facade::credentials::{CredentialSource, FileCredentialSource};
//!
//! let source = FileCredentialSource::new()?;
//! let creds = source.load("acme")?; // reads ./credentials/acme.json
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::traits::{CredentialError, CredentialSource, Credentials};

/// Default credentials directory, relative to the working directory.
pub const DEFAULT_CREDENTIALS_DIR: &str = "credentials";

/// Reads `<dir>/<project>.json` on every load.
#[derive(Debug, Clone)]
pub struct FileCredentialSource {
    /// Directory holding one record per project
    dir: PathBuf,
}

impl FileCredentialSource {
    /// Create a source rooted at `./credentials`.
    ///
    /// # Errors
    ///
    /// Returns an error if the working directory cannot be determined.
    pub fn new() -> Result<Self, CredentialError> {
        let cwd = std::env::current_dir().map_err(|e| {
            CredentialError::ReadError(format!("cannot determine working directory: {}", e))
        })?;
        Ok(Self {
            dir: cwd.join(DEFAULT_CREDENTIALS_DIR),
        })
    }

    /// Create a source rooted at a custom directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the credentials directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `project`.
    ///
    /// # Errors
    ///
    /// Rejects empty identifiers and identifiers that would escape the
    /// directory.
    pub fn record_path(&self, project: &str) -> Result<PathBuf, CredentialError> {
        if project.trim().is_empty() {
            return Err(CredentialError::InvalidProject(
                "project identifier must not be empty".into(),
            ));
        }
        if project.contains(|c: char| c == '/' || c == '\\') || project == "." || project == ".." {
            return Err(CredentialError::InvalidProject(format!(
                "'{}' is not a plain project identifier",
                project
            )));
        }
        Ok(self.dir.join(format!("{}.json", project)))
    }
}

impl CredentialSource for FileCredentialSource {
    fn load(&self, project: &str) -> Result<Credentials, CredentialError> {
        let path = self.record_path(project)?;

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CredentialError::NotFound(project.to_string()))
            }
            Err(e) => {
                return Err(CredentialError::ReadError(format!(
                    "cannot read '{}': {}",
                    path.display(),
                    e
                )))
            }
        };

        let credentials: Credentials =
            serde_json::from_str(&content).map_err(|e| CredentialError::Malformed {
                project: project.to_string(),
                message: format!("cannot parse: {}", e),
            })?;

        if let Some(field) = credentials.missing_field() {
            return Err(CredentialError::Malformed {
                project: project.to_string(),
                message: format!("field '{}' is empty", field),
            });
        }

        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RECORD: &str = r#"{
        "clientKey": "ck",
        "clientSecret": "cs",
        "username": "api-user",
        "password": "pw",
        "baseURL": "https://api.example.com",
        "application": "app-1"
    }"#;

    fn create_test_source() -> (TempDir, FileCredentialSource) {
        let temp = TempDir::new().expect("create temp dir");
        let source = FileCredentialSource::with_dir(temp.path());
        (temp, source)
    }

    #[test]
    fn loads_record_by_project_name() {
        let (temp, source) = create_test_source();
        fs::write(temp.path().join("acme.json"), RECORD).expect("write record");

        let creds = source.load("acme").expect("load");
        assert_eq!(creds.username, "api-user");
        assert_eq!(creds.base_url, "https://api.example.com");
        assert_eq!(creds.application.as_deref(), Some("app-1"));
    }

    #[test]
    fn missing_record_is_not_found() {
        let (_temp, source) = create_test_source();

        match source.load("ghost") {
            Err(CredentialError::NotFound(project)) => assert_eq!(project, "ghost"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn malformed_record_is_reported() {
        let (temp, source) = create_test_source();
        fs::write(temp.path().join("acme.json"), "{ not json").expect("write record");

        let err = source.load("acme").unwrap_err();
        assert!(matches!(err, CredentialError::Malformed { .. }));
        assert!(err.to_string().contains("acme"));
    }

    #[test]
    fn empty_required_field_is_malformed() {
        let (temp, source) = create_test_source();
        let record = RECORD.replace("\"pw\"", "\"\"");
        fs::write(temp.path().join("acme.json"), record).expect("write record");

        let err = source.load("acme").unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn empty_project_is_rejected() {
        let (_temp, source) = create_test_source();
        assert!(matches!(
            source.load(""),
            Err(CredentialError::InvalidProject(_))
        ));
    }

    #[test]
    fn path_traversal_is_rejected() {
        let (_temp, source) = create_test_source();
        assert!(matches!(
            source.record_path("../etc/passwd"),
            Err(CredentialError::InvalidProject(_))
        ));
        assert!(matches!(
            source.record_path(".."),
            Err(CredentialError::InvalidProject(_))
        ));
    }

    #[test]
    fn record_path_layout() {
        let source = FileCredentialSource::with_dir("/srv/creds");
        assert_eq!(
            source.record_path("acme").expect("path"),
            PathBuf::from("/srv/creds/acme.json")
        );
    }

    #[test]
    fn default_dir_is_under_working_directory() {
        let source = FileCredentialSource::new().expect("new");
        assert!(source.dir().ends_with(DEFAULT_CREDENTIALS_DIR));
    }
}
