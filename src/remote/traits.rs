//! remote::traits
//!
//! Collaborator contract for the remote content backend.
//!
//! # Design
//!
//! The backend is reached through three object-safe async traits, one per
//! handle the facade walks through on every call chain:
//!
//! - [`Connector`] authenticates a project and yields a [`Session`]
//! - [`Session`] resolves a named [`Datastore`]
//! - [`Datastore`] enumerates branches and runs node queries on a branch
//!
//! Handles are shared as `Arc<dyn ...>` so a cached [`Branch`] can keep the
//! datastore it was enumerated from and run queries later without
//! re-authenticating.
//!
//! Queries and pagination are opaque JSON. This module never interprets
//! their contents.
//!
//! # Example
//!
//! ```ignore
//! use cms_facade::remote::{Connector, Pagination};
//!
//! async fn first_page(connector: &dyn Connector, creds: &Credentials) -> Result<(), CmsError> {
//!     let session = connector.connect("acme", creds).await?;
//!     let datastore = session.datastore("content").await?;
//!     let branches = datastore.query_branches(&active_branch_filter()).await?;
//!     for branch in branches.values() {
//!         let nodes = branch
//!             .query_nodes(&serde_json::json!({"_type": "n:article"}), &Pagination::new().limit(10))
//!             .await?;
//!         println!("{}: {} nodes", branch.id, nodes.len());
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::credentials::Credentials;

/// Branch type tag carried by the one master branch of a project.
pub const MASTER_BRANCH_TYPE: &str = "master";

/// Errors from the remote backend and from branch resolution.
///
/// `Clone` so that test doubles can hand out the same configured failure
/// more than once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CmsError {
    /// Authentication, transport, or credential failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The named datastore does not exist in the project.
    #[error("datastore '{datastore}' not found in project '{project}'")]
    DatastoreNotFound {
        /// Project identifier
        project: String,
        /// Requested datastore name
        datastore: String,
    },

    /// Remote query execution failed.
    #[error("query error: {0}")]
    Query(String),

    /// No active branch matched after a full enumeration.
    #[error("Branch: {branch} in project: {project} was not found")]
    BranchNotFound {
        /// Requested branch identifier
        branch: String,
        /// Project identifier
        project: String,
    },
}

impl CmsError {
    /// Check if this error reports a missing datastore or branch.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CmsError::DatastoreNotFound { .. } | CmsError::BranchNotFound { .. }
        )
    }

    /// Check if this error came from authentication or transport.
    pub fn is_connection(&self) -> bool {
        matches!(self, CmsError::Connection(_))
    }
}

/// Mapping from branch identifier to branch.
pub type BranchMap = HashMap<String, Branch>;

/// Mapping from node identifier to node record, as returned by the backend.
pub type NodeMap = HashMap<String, Value>;

/// Pagination options forwarded verbatim to the backend.
///
/// Keys are kept in a JSON object; the builders cover the common ones and
/// [`Pagination::with`] accepts anything else the backend understands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pagination(Map<String, Value>);

impl Pagination {
    /// Empty pagination (backend defaults apply).
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of results.
    pub fn limit(self, limit: u64) -> Self {
        self.with("limit", limit)
    }

    /// Number of results to skip.
    pub fn skip(self, skip: u64) -> Self {
        self.with("skip", skip)
    }

    /// Sort specification, e.g. `{"_system.modified_on.ms": -1}`.
    pub fn sort(self, sort: Value) -> Self {
        self.with("sort", sort)
    }

    /// Set an arbitrary pagination key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get a pagination value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Iterate the options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Check if no options are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Pagination {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A branch of a project's content datastore.
///
/// Carries the datastore handle it was enumerated from so node queries can
/// run against it directly.
#[derive(Clone)]
pub struct Branch {
    /// Real branch identifier
    pub id: String,
    /// Branch type tag (`"master"` for the master branch, any case)
    pub branch_type: String,
    /// Archived flag, absent on branches that predate the field
    pub archived: Option<bool>,
    /// Snapshot flag
    pub snapshot: Option<bool>,
    /// Display title
    pub title: Option<String>,
    datastore: Arc<dyn Datastore>,
}

impl Branch {
    /// Create a branch bound to the datastore that owns it.
    pub fn new(
        id: impl Into<String>,
        branch_type: impl Into<String>,
        datastore: Arc<dyn Datastore>,
    ) -> Self {
        Self {
            id: id.into(),
            branch_type: branch_type.into(),
            archived: None,
            snapshot: None,
            title: None,
            datastore,
        }
    }

    /// Set the archived flag.
    pub fn with_archived(mut self, archived: bool) -> Self {
        self.archived = Some(archived);
        self
    }

    /// Set the snapshot flag.
    pub fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Set the display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Check if this is the project's master branch (type compared case-insensitively).
    pub fn is_master(&self) -> bool {
        self.branch_type.eq_ignore_ascii_case(MASTER_BRANCH_TYPE)
    }

    /// Check if this branch is neither archived nor a snapshot.
    ///
    /// Absent flags count as false.
    pub fn is_active(&self) -> bool {
        !self.archived.unwrap_or(false) && !self.snapshot.unwrap_or(false)
    }

    /// Run a node query against this branch.
    pub async fn query_nodes(
        &self,
        query: &Value,
        pagination: &Pagination,
    ) -> Result<NodeMap, CmsError> {
        self.datastore.query_nodes(&self.id, query, pagination).await
    }
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("id", &self.id)
            .field("branch_type", &self.branch_type)
            .field("archived", &self.archived)
            .field("snapshot", &self.snapshot)
            .field("title", &self.title)
            .field("datastore", &self.datastore.name())
            .finish()
    }
}

/// Filter selecting active branches.
///
/// The second clause matches branches created before the `archived` field
/// existed.
pub fn active_branch_filter() -> Value {
    serde_json::json!({
        "$or": [
            { "archived": false, "snapshot": false },
            { "archived": { "$exists": false }, "snapshot": false }
        ]
    })
}

/// Establishes authenticated sessions with the backend.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one connector serves every
/// project the facade talks to.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Get the connector name (e.g., "http", "mock").
    fn name(&self) -> &'static str;

    /// Authenticate `project` with its credentials.
    ///
    /// # Errors
    ///
    /// - `Connection` if the handshake is rejected or the transport fails
    async fn connect(
        &self,
        project: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn Session>, CmsError>;
}

/// An authenticated context bound to one project.
#[async_trait]
pub trait Session: Send + Sync {
    /// Project this session is bound to.
    fn project(&self) -> &str;

    /// Resolve a datastore by name.
    ///
    /// # Errors
    ///
    /// - `DatastoreNotFound` if the project has no datastore with that name
    /// - `Connection` on transport failure
    async fn datastore(&self, name: &str) -> Result<Arc<dyn Datastore>, CmsError>;
}

/// A datastore handle scoped to a session.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Datastore name (e.g., "content").
    fn name(&self) -> &str;

    /// Query the branches matching `filter`.
    ///
    /// # Errors
    ///
    /// - `Query` if the backend rejects or fails the query
    async fn query_branches(&self, filter: &Value) -> Result<BranchMap, CmsError>;

    /// Run a node query on one branch.
    ///
    /// # Errors
    ///
    /// - `Query` if the backend rejects or fails the query
    async fn query_nodes(
        &self,
        branch_id: &str,
        query: &Value,
        pagination: &Pagination,
    ) -> Result<NodeMap, CmsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullDatastore;

    #[async_trait]
    impl Datastore for NullDatastore {
        fn name(&self) -> &str {
            "content"
        }

        async fn query_branches(&self, _filter: &Value) -> Result<BranchMap, CmsError> {
            Ok(BranchMap::new())
        }

        async fn query_nodes(
            &self,
            _branch_id: &str,
            _query: &Value,
            _pagination: &Pagination,
        ) -> Result<NodeMap, CmsError> {
            Ok(NodeMap::new())
        }
    }

    fn branch(id: &str, branch_type: &str) -> Branch {
        Branch::new(id, branch_type, Arc::new(NullDatastore))
    }

    #[test]
    fn master_type_is_case_insensitive() {
        assert!(branch("b1", "MASTER").is_master());
        assert!(branch("b1", "Master").is_master());
        assert!(branch("b1", "master").is_master());
        assert!(!branch("master", "custom").is_master());
    }

    #[test]
    fn absent_flags_are_active() {
        assert!(branch("b1", "custom").is_active());
        assert!(branch("b1", "custom").with_archived(false).with_snapshot(false).is_active());
        assert!(!branch("b1", "custom").with_archived(true).is_active());
        assert!(!branch("b1", "custom").with_snapshot(true).is_active());
    }

    #[test]
    fn active_filter_shape() {
        let filter = active_branch_filter();
        let clauses = filter["$or"].as_array().expect("or clauses");
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0]["archived"], Value::Bool(false));
        assert_eq!(clauses[0]["snapshot"], Value::Bool(false));
        assert_eq!(clauses[1]["archived"]["$exists"], Value::Bool(false));
        assert_eq!(clauses[1]["snapshot"], Value::Bool(false));
    }

    #[test]
    fn pagination_builders() {
        let p = Pagination::new()
            .limit(25)
            .skip(50)
            .sort(serde_json::json!({"title": 1}));
        assert_eq!(p.get("limit"), Some(&Value::from(25)));
        assert_eq!(p.get("skip"), Some(&Value::from(50)));
        assert_eq!(p.get("sort"), Some(&serde_json::json!({"title": 1})));
        assert!(Pagination::default().is_empty());
    }

    #[test]
    fn pagination_serializes_as_plain_object() {
        let p = Pagination::new().limit(5).with("metadata", true);
        let json = serde_json::to_value(&p).expect("serialize");
        assert_eq!(json, serde_json::json!({"limit": 5, "metadata": true}));
    }

    #[test]
    fn branch_debug_omits_handle_internals() {
        let debug = format!("{:?}", branch("b1", "master").with_title("Main"));
        assert!(debug.contains("b1"));
        assert!(debug.contains("Main"));
        assert!(debug.contains("content"));
    }

    #[test]
    fn cms_error_display() {
        assert_eq!(
            CmsError::Connection("handshake rejected".into()).to_string(),
            "connection error: handshake rejected"
        );
        assert_eq!(
            CmsError::DatastoreNotFound {
                project: "acme".into(),
                datastore: "content".into()
            }
            .to_string(),
            "datastore 'content' not found in project 'acme'"
        );
        assert_eq!(
            CmsError::Query("bad filter".into()).to_string(),
            "query error: bad filter"
        );
        assert_eq!(
            CmsError::BranchNotFound {
                branch: "b9".into(),
                project: "acme".into()
            }
            .to_string(),
            "Branch: b9 in project: acme was not found"
        );
    }

    #[test]
    fn cms_error_classification() {
        assert!(CmsError::Connection("x".into()).is_connection());
        assert!(!CmsError::Query("x".into()).is_connection());
        assert!(CmsError::BranchNotFound {
            branch: "b".into(),
            project: "p".into()
        }
        .is_not_found());
        assert!(!CmsError::Query("x".into()).is_not_found());
    }
}
