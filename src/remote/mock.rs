//! remote::mock
//!
//! Mock backend for deterministic testing.
//!
//! # Design
//!
//! `MockCms` implements [`Connector`] over in-memory projects. Each project
//! owns named datastores holding branches and per-branch nodes. Failures can
//! be injected per operation and every call is recorded, so tests can assert
//! that a code path made no remote call at all.
//!
//! Branch enumeration applies the active-branch rule from
//! [`Branch::is_active`] rather than evaluating the filter document; the
//! filter it received is recorded for inspection.
//!
//! # Example
//!
//! ```
//! use cms_facade::remote::mock::{MockBranch, MockCms};
//! use cms_facade::remote::{active_branch_filter, Connector};
//!
//! # tokio_test::block_on(async {
//! let cms = MockCms::new()
//!     .with_branch("acme", MockBranch::new("b1", "master"))
//!     .with_branch("acme", MockBranch::new("b2", "custom").archived(true));
//!
//! let session = cms.connect("acme", &MockCms::credentials()).await.unwrap();
//! let datastore = session.datastore("content").await.unwrap();
//! let branches = datastore.query_branches(&active_branch_filter()).await.unwrap();
//!
//! assert_eq!(branches.len(), 1);
//! assert!(branches["b1"].is_master());
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::traits::{
    Branch, BranchMap, CmsError, Connector, Datastore, NodeMap, Pagination, Session,
};
use crate::config::DEFAULT_DATASTORE;
use crate::credentials::Credentials;

/// Mock backend for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockCms {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockCmsInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockCmsInner {
    /// Projects by identifier.
    projects: HashMap<String, MockProject>,
    /// Operation to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Delay applied to branch enumeration.
    branch_query_delay: Option<Duration>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

#[derive(Debug, Default)]
struct MockProject {
    datastores: HashMap<String, MockDatastoreData>,
}

#[derive(Debug, Default)]
struct MockDatastoreData {
    branches: Vec<MockBranch>,
    nodes: HashMap<String, NodeMap>,
}

/// A branch as stored by the mock backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockBranch {
    /// Real branch identifier
    pub id: String,
    /// Branch type tag
    pub branch_type: String,
    /// Archived flag
    pub archived: Option<bool>,
    /// Snapshot flag
    pub snapshot: Option<bool>,
    /// Display title
    pub title: Option<String>,
}

impl MockBranch {
    /// Create a branch with no archived/snapshot flags set.
    pub fn new(id: impl Into<String>, branch_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            branch_type: branch_type.into(),
            archived: None,
            snapshot: None,
            title: None,
        }
    }

    /// Set the archived flag.
    pub fn archived(mut self, archived: bool) -> Self {
        self.archived = Some(archived);
        self
    }

    /// Set the snapshot flag.
    pub fn snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Set the display title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn to_branch(&self, datastore: Arc<dyn Datastore>) -> Branch {
        let mut branch = Branch::new(self.id.clone(), self.branch_type.clone(), datastore);
        branch.archived = self.archived;
        branch.snapshot = self.snapshot;
        branch.title = self.title.clone();
        branch
    }
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail connect with the given error.
    Connect(CmsError),
    /// Fail datastore resolution with the given error.
    Datastore(CmsError),
    /// Fail branch enumeration with the given error.
    QueryBranches(CmsError),
    /// Fail node queries with the given error.
    QueryNodes(CmsError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOperation {
    Connect {
        project: String,
    },
    Datastore {
        project: String,
        name: String,
    },
    QueryBranches {
        project: String,
        datastore: String,
        filter: Value,
    },
    QueryNodes {
        project: String,
        datastore: String,
        branch: String,
        query: Value,
        pagination: Pagination,
    },
}

impl MockCms {
    /// Create a new empty mock backend.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockCmsInner::default())),
        }
    }

    /// Placeholder credentials accepted by the mock.
    pub fn credentials() -> Credentials {
        Credentials {
            client_key: "mock-client".into(),
            client_secret: "mock-secret".into(),
            username: "mock-user".into(),
            password: "mock-password".into(),
            base_url: "mock://cms".into(),
            application: Some("mock-app".into()),
        }
    }

    /// Register a project with an empty content datastore.
    pub fn with_project(self, project: &str) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner
                .projects
                .entry(project.to_string())
                .or_default()
                .datastores
                .entry(DEFAULT_DATASTORE.to_string())
                .or_default();
        }
        self
    }

    /// Add a branch to the project's content datastore.
    pub fn with_branch(self, project: &str, branch: MockBranch) -> Self {
        self.with_datastore_branch(project, DEFAULT_DATASTORE, branch)
    }

    /// Add a branch to a named datastore.
    pub fn with_datastore_branch(self, project: &str, datastore: &str, branch: MockBranch) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner
                .projects
                .entry(project.to_string())
                .or_default()
                .datastores
                .entry(datastore.to_string())
                .or_default()
                .branches
                .push(branch);
        }
        self
    }

    /// Add nodes to a branch of the project's content datastore.
    pub fn with_nodes(
        self,
        project: &str,
        branch_id: &str,
        nodes: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner
                .projects
                .entry(project.to_string())
                .or_default()
                .datastores
                .entry(DEFAULT_DATASTORE.to_string())
                .or_default()
                .nodes
                .entry(branch_id.to_string())
                .or_default()
                .extend(nodes);
        }
        self
    }

    /// Replace the branches of the project's content datastore.
    ///
    /// Simulates the remote branch set changing after a first enumeration.
    pub fn set_branches(&self, project: &str, branches: Vec<MockBranch>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .projects
            .entry(project.to_string())
            .or_default()
            .datastores
            .entry(DEFAULT_DATASTORE.to_string())
            .or_default()
            .branches = branches;
    }

    /// Delay every branch enumeration, so concurrent callers overlap.
    pub fn with_branch_query_delay(self, delay: Duration) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.branch_query_delay = Some(delay);
        }
        self
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use cms_facade::remote::mock::{FailOn, MockCms};
    /// use cms_facade::remote::CmsError;
    ///
    /// let cms = MockCms::new()
    ///     .fail_on(FailOn::QueryBranches(CmsError::Query("timeout".into())));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = Some(fail_on);
        }
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.clear();
    }

    /// Number of connect calls recorded.
    pub fn connect_count(&self) -> usize {
        self.count(|op| matches!(op, MockOperation::Connect { .. }))
    }

    /// Number of branch enumerations recorded.
    pub fn branch_query_count(&self) -> usize {
        self.count(|op| matches!(op, MockOperation::QueryBranches { .. }))
    }

    /// Number of node queries recorded.
    pub fn node_query_count(&self) -> usize {
        self.count(|op| matches!(op, MockOperation::QueryNodes { .. }))
    }

    fn count(&self, pred: impl Fn(&MockOperation) -> bool) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.operations.iter().filter(|op| pred(op)).count()
    }

    /// Record an operation.
    fn record(&self, op: MockOperation) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, expected: &str) -> Option<CmsError> {
        let inner = self.inner.lock().unwrap();
        match &inner.fail_on {
            Some(FailOn::Connect(e)) if expected == "connect" => Some(e.clone()),
            Some(FailOn::Datastore(e)) if expected == "datastore" => Some(e.clone()),
            Some(FailOn::QueryBranches(e)) if expected == "query_branches" => Some(e.clone()),
            Some(FailOn::QueryNodes(e)) if expected == "query_nodes" => Some(e.clone()),
            _ => None,
        }
    }
}

impl Default for MockCms {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockCms {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(
        &self,
        project: &str,
        _credentials: &Credentials,
    ) -> Result<Arc<dyn Session>, CmsError> {
        self.record(MockOperation::Connect {
            project: project.to_string(),
        });

        if let Some(err) = self.check_fail("connect") {
            return Err(err);
        }

        let known = self.inner.lock().unwrap().projects.contains_key(project);
        if !known {
            return Err(CmsError::Connection(format!(
                "handshake rejected for project '{}'",
                project
            )));
        }

        Ok(Arc::new(MockSession {
            cms: self.clone(),
            project: project.to_string(),
        }))
    }
}

/// Session handed out by [`MockCms`].
#[derive(Debug)]
struct MockSession {
    cms: MockCms,
    project: String,
}

#[async_trait]
impl Session for MockSession {
    fn project(&self) -> &str {
        &self.project
    }

    async fn datastore(&self, name: &str) -> Result<Arc<dyn Datastore>, CmsError> {
        self.cms.record(MockOperation::Datastore {
            project: self.project.clone(),
            name: name.to_string(),
        });

        if let Some(err) = self.cms.check_fail("datastore") {
            return Err(err);
        }

        let exists = self
            .cms
            .inner
            .lock()
            .unwrap()
            .projects
            .get(&self.project)
            .is_some_and(|p| p.datastores.contains_key(name));
        if !exists {
            return Err(CmsError::DatastoreNotFound {
                project: self.project.clone(),
                datastore: name.to_string(),
            });
        }

        Ok(Arc::new(MockDatastore {
            cms: self.cms.clone(),
            project: self.project.clone(),
            name: name.to_string(),
        }))
    }
}

/// Datastore handed out by [`MockSession`].
#[derive(Debug, Clone)]
struct MockDatastore {
    cms: MockCms,
    project: String,
    name: String,
}

#[async_trait]
impl Datastore for MockDatastore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query_branches(&self, filter: &Value) -> Result<BranchMap, CmsError> {
        self.cms.record(MockOperation::QueryBranches {
            project: self.project.clone(),
            datastore: self.name.clone(),
            filter: filter.clone(),
        });

        let delay = self.cms.inner.lock().unwrap().branch_query_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.cms.check_fail("query_branches") {
            return Err(err);
        }

        let branches: Vec<MockBranch> = {
            let inner = self.cms.inner.lock().unwrap();
            inner
                .projects
                .get(&self.project)
                .and_then(|p| p.datastores.get(&self.name))
                .map(|d| d.branches.clone())
                .unwrap_or_default()
        };

        let handle: Arc<dyn Datastore> = Arc::new(self.clone());
        Ok(branches
            .iter()
            .map(|b| b.to_branch(Arc::clone(&handle)))
            .filter(Branch::is_active)
            .map(|b| (b.id.clone(), b))
            .collect())
    }

    async fn query_nodes(
        &self,
        branch_id: &str,
        query: &Value,
        pagination: &Pagination,
    ) -> Result<NodeMap, CmsError> {
        self.cms.record(MockOperation::QueryNodes {
            project: self.project.clone(),
            datastore: self.name.clone(),
            branch: branch_id.to_string(),
            query: query.clone(),
            pagination: pagination.clone(),
        });

        if let Some(err) = self.cms.check_fail("query_nodes") {
            return Err(err);
        }

        let inner = self.cms.inner.lock().unwrap();
        let datastore = inner
            .projects
            .get(&self.project)
            .and_then(|p| p.datastores.get(&self.name))
            .ok_or_else(|| CmsError::Query(format!("datastore '{}' is gone", self.name)))?;

        if !datastore.branches.iter().any(|b| b.id == branch_id) {
            return Err(CmsError::Query(format!("unknown branch '{}'", branch_id)));
        }

        Ok(datastore.nodes.get(branch_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::active_branch_filter;
    use serde_json::json;

    async fn content(cms: &MockCms, project: &str) -> Arc<dyn Datastore> {
        let session = cms
            .connect(project, &MockCms::credentials())
            .await
            .expect("connect");
        session.datastore("content").await.expect("datastore")
    }

    #[tokio::test]
    async fn unknown_project_fails_handshake() {
        let cms = MockCms::new();
        let err = cms
            .connect("ghost", &MockCms::credentials())
            .await
            .err()
            .expect("should fail");
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn missing_datastore_is_not_found() {
        let cms = MockCms::new().with_project("acme");
        let session = cms
            .connect("acme", &MockCms::credentials())
            .await
            .expect("connect");
        let err = session.datastore("archive").await.err().expect("should fail");
        assert_eq!(
            err,
            CmsError::DatastoreNotFound {
                project: "acme".into(),
                datastore: "archive".into()
            }
        );
    }

    #[tokio::test]
    async fn enumeration_skips_archived_and_snapshots() {
        let cms = MockCms::new()
            .with_branch("acme", MockBranch::new("m", "MASTER").archived(false).snapshot(false))
            .with_branch("acme", MockBranch::new("legacy", "custom"))
            .with_branch("acme", MockBranch::new("old", "custom").archived(true))
            .with_branch("acme", MockBranch::new("snap", "custom").snapshot(true));

        let branches = content(&cms, "acme")
            .await
            .query_branches(&active_branch_filter())
            .await
            .expect("query");

        let mut ids: Vec<_> = branches.keys().cloned().collect();
        ids.sort();
        assert_eq!(ids, vec!["legacy".to_string(), "m".to_string()]);
    }

    #[tokio::test]
    async fn records_filter_and_operations() {
        let cms = MockCms::new().with_project("acme");
        let datastore = content(&cms, "acme").await;
        datastore
            .query_branches(&active_branch_filter())
            .await
            .expect("query");

        let ops = cms.operations();
        assert_eq!(ops.len(), 3);
        assert_eq!(
            ops[0],
            MockOperation::Connect {
                project: "acme".into()
            }
        );
        match &ops[2] {
            MockOperation::QueryBranches { filter, .. } => {
                assert_eq!(filter, &active_branch_filter())
            }
            other => panic!("unexpected operation: {:?}", other),
        }
    }

    #[tokio::test]
    async fn branch_queries_nodes_through_its_datastore() {
        let cms = MockCms::new()
            .with_branch("acme", MockBranch::new("b1", "master"))
            .with_nodes("acme", "b1", vec![("n1".to_string(), json!({"title": "Hello"}))]);

        let branches = content(&cms, "acme")
            .await
            .query_branches(&active_branch_filter())
            .await
            .expect("query");
        let nodes = branches["b1"]
            .query_nodes(&json!({"_type": "n:article"}), &Pagination::new().limit(1))
            .await
            .expect("nodes");

        assert_eq!(nodes["n1"]["title"], "Hello");
        assert_eq!(cms.node_query_count(), 1);
    }

    #[tokio::test]
    async fn fail_on_returns_configured_error() {
        let cms = MockCms::new()
            .with_project("acme")
            .fail_on(FailOn::QueryBranches(CmsError::Query("boom".into())));
        let datastore = content(&cms, "acme").await;

        let err = datastore
            .query_branches(&active_branch_filter())
            .await
            .err()
            .expect("should fail");
        assert_eq!(err, CmsError::Query("boom".into()));

        cms.clear_fail_on();
        assert!(datastore.query_branches(&active_branch_filter()).await.is_ok());
    }

    #[tokio::test]
    async fn set_branches_replaces_remote_state() {
        let cms = MockCms::new().with_branch("acme", MockBranch::new("b1", "master"));
        cms.set_branches("acme", vec![MockBranch::new("b2", "master")]);

        let branches = content(&cms, "acme")
            .await
            .query_branches(&active_branch_filter())
            .await
            .expect("query");
        assert!(branches.contains_key("b2"));
        assert!(!branches.contains_key("b1"));
    }
}
