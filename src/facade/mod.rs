//! facade
//!
//! Entry point for consumers: sessions, datastores, branch resolution and
//! node queries for a project.
//!
//! # Design
//!
//! [`CmsFacade`] owns its collaborators explicitly:
//!
//! - a [`Connector`] that opens backend sessions
//! - a [`CredentialSource`] that supplies per-project credentials
//! - a [`Config`] (default datastore name, HTTP settings)
//! - a [`BranchCache`] shared by every clone of the facade
//!
//! Sessions are never cached; every operation re-authenticates. Branches are
//! cached for the lifetime of the facade and are never refreshed, so a branch
//! created remotely after the first enumeration of a project is only seen
//! when its identifier was not cached yet.
//!
//! # Example
//!
//! ```
//! use cms_facade::facade::CmsFacade;
//! use cms_facade::remote::mock::{MockBranch, MockCms};
//! use cms_facade::remote::Pagination;
//! use cms_facade::credentials::MemoryCredentialSource;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let cms = MockCms::new()
//!     .with_branch("acme", MockBranch::new("b1", "master"))
//!     .with_nodes("acme", "b1", [("n1".to_string(), serde_json::json!({"title": "Hello"}))]);
//! let creds = MemoryCredentialSource::new().with("acme", MockCms::credentials());
//!
//! let facade = CmsFacade::new(Arc::new(cms), Arc::new(creds));
//! let master = facade.get_branch("acme", "master").await.unwrap();
//! assert_eq!(master.id, "b1");
//!
//! let nodes = facade
//!     .query_nodes("acme", "master", &serde_json::json!({}), &Pagination::new().limit(5))
//!     .await
//!     .unwrap();
//! assert_eq!(nodes["n1"]["title"], "Hello");
//! # });
//! ```

mod cache;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, instrument};

pub use cache::{BranchCache, BranchKey, MASTER_ALIAS};

use crate::config::Config;
use crate::credentials::{create_source, CredentialError, CredentialSource};
use crate::remote::http::HttpConnector;
use crate::remote::{
    active_branch_filter, Branch, BranchMap, CmsError, Connector, Datastore, NodeMap,
    Pagination, Session,
};

impl From<CredentialError> for CmsError {
    fn from(err: CredentialError) -> Self {
        CmsError::Connection(err.to_string())
    }
}

/// Facade over a remote content backend.
///
/// Cheap to clone; clones share the branch cache.
#[derive(Clone)]
pub struct CmsFacade {
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialSource>,
    config: Arc<Config>,
    cache: Arc<BranchCache>,
}

impl CmsFacade {
    /// Create a facade with default configuration.
    pub fn new(connector: Arc<dyn Connector>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self::with_config(connector, credentials, Config::default())
    }

    /// Create a facade with explicit configuration.
    pub fn with_config(
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialSource>,
        config: Config,
    ) -> Self {
        Self {
            connector,
            credentials,
            config: Arc::new(config),
            cache: Arc::new(BranchCache::new()),
        }
    }

    /// Create a facade talking HTTP, with credentials read from
    /// `config.credentials_dir()`.
    ///
    /// # Errors
    ///
    /// Returns `CmsError::Connection` if the HTTP client cannot be built.
    pub fn from_config(config: Config) -> Result<Self, CmsError> {
        let connector = HttpConnector::from_config(&config)?;
        let credentials: Arc<dyn CredentialSource> =
            Arc::from(create_source(Some(&config.credentials_dir()))?);
        Ok(Self::with_config(Arc::new(connector), credentials, config))
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The branch cache.
    pub fn cache(&self) -> &BranchCache {
        &self.cache
    }

    /// Open an authenticated session for `project`.
    ///
    /// # Errors
    ///
    /// Returns `CmsError::Connection` for an empty project, missing or
    /// malformed credentials, or a rejected handshake.
    #[instrument(skip(self))]
    pub async fn connect(&self, project: &str) -> Result<Arc<dyn Session>, CmsError> {
        match self.open_session(project).await {
            Ok(session) => {
                debug!(project, connector = self.connector.name(), "connected");
                Ok(session)
            }
            Err(e) => {
                error!(project, error = %e, "failed to open session");
                Err(e)
            }
        }
    }

    async fn open_session(&self, project: &str) -> Result<Arc<dyn Session>, CmsError> {
        if project.is_empty() {
            return Err(CmsError::Connection("project identifier is empty".into()));
        }

        let credentials = self.credentials.load(project)?;
        self.connector.connect(project, &credentials).await
    }

    /// Resolve a named datastore of `project`.
    #[instrument(skip(self))]
    pub async fn get_datastore(
        &self,
        project: &str,
        name: &str,
    ) -> Result<Arc<dyn Datastore>, CmsError> {
        let session = self.connect(project).await?;
        session.datastore(name).await.inspect_err(|e| {
            error!(project, datastore = name, error = %e, "failed to resolve datastore");
        })
    }

    /// Resolve the datastore branches live in (`content` unless configured).
    pub async fn get_content_datastore(
        &self,
        project: &str,
    ) -> Result<Arc<dyn Datastore>, CmsError> {
        self.get_datastore(project, self.config.default_datastore())
            .await
    }

    /// Enumerate the branches of `project` that are neither archived nor
    /// snapshots.
    ///
    /// Does not touch the branch cache.
    #[instrument(skip(self))]
    pub async fn get_active_branches(&self, project: &str) -> Result<BranchMap, CmsError> {
        match self.query_active_branches(project).await {
            Ok(branches) => {
                info!(project, count = branches.len(), "enumerated active branches");
                Ok(branches)
            }
            Err(e) => {
                error!(project, error = %e, "failed to enumerate branches");
                Err(e)
            }
        }
    }

    async fn query_active_branches(&self, project: &str) -> Result<BranchMap, CmsError> {
        let datastore = self.get_content_datastore(project).await?;
        datastore.query_branches(&active_branch_filter()).await
    }

    /// Resolve a branch by identifier, or `master` for the master branch.
    ///
    /// A cached branch is returned without any remote call. On a miss the
    /// active branches of the project are enumerated once, all of them are
    /// cached, and the request is answered from the cache.
    ///
    /// # Errors
    ///
    /// Returns `CmsError::BranchNotFound` when no active branch matches, or
    /// the enumeration error unchanged. Nothing is cached when enumeration
    /// fails.
    #[instrument(skip(self))]
    pub async fn get_branch(&self, project: &str, branch_id: &str) -> Result<Branch, CmsError> {
        if let Some(branch) = self.cache.get(project, branch_id) {
            debug!(project, branch = branch_id, "branch cache hit");
            return Ok(branch);
        }

        let _guard = self.cache.resolution_guard(project).await;

        // Another caller may have populated the project while we waited
        if let Some(branch) = self.cache.get(project, branch_id) {
            debug!(project, branch = branch_id, "branch cache filled while waiting");
            return Ok(branch);
        }

        debug!(project, branch = branch_id, "branch cache miss, enumerating");
        let branches = self.get_active_branches(project).await?;
        self.cache.populate(project, &branches);

        match self.cache.get(project, branch_id) {
            Some(branch) => Ok(branch),
            None => {
                error!(project, branch = branch_id, "no active branch matched");
                Err(CmsError::BranchNotFound {
                    branch: branch_id.to_string(),
                    project: project.to_string(),
                })
            }
        }
    }

    /// Peek at the branch cache without any remote call.
    pub fn cached_branch(&self, project: &str, branch_id: &str) -> Option<Branch> {
        self.cache.get(project, branch_id)
    }

    /// Run a node query on a branch.
    ///
    /// `query` and `pagination` are forwarded to the backend unchanged. No
    /// query is issued when the branch cannot be resolved.
    #[instrument(skip(self, query, pagination))]
    pub async fn query_nodes(
        &self,
        project: &str,
        branch_id: &str,
        query: &Value,
        pagination: &Pagination,
    ) -> Result<NodeMap, CmsError> {
        let branch = self.get_branch(project, branch_id).await?;

        match branch.query_nodes(query, pagination).await {
            Ok(nodes) => {
                debug!(project, branch = %branch.id, count = nodes.len(), "node query returned");
                Ok(nodes)
            }
            Err(e) => {
                error!(project, branch = branch_id, error = %e, "node query failed");
                Err(e)
            }
        }
    }
}

impl fmt::Debug for CmsFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsFacade")
            .field("connector", &self.connector.name())
            .field("default_datastore", &self.config.default_datastore())
            .field("cache", &self.cache)
            .finish()
    }
}
