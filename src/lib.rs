//! cms-facade - Session, branch resolution and node queries over a remote
//! content-management backend
//!
//! The crate hides the backend's session handshake, datastore lookup and
//! branch bookkeeping behind one [`CmsFacade`]. Callers name a project and a
//! branch (or `master`) and get back branches or query results.
//!
//! # Architecture
//!
//! - [`facade`] - Public operations and the branch cache
//! - [`remote`] - Backend abstraction (HTTP and mock implementations)
//! - [`credentials`] - Per-project credential records
//! - [`config`] - Configuration file loading and defaults
//!
//! # Invariants
//!
//! 1. A cached branch is returned without any remote call
//! 2. A branch is only cached after a successful enumeration
//! 3. At most one enumeration per project is in flight at a time
//! 4. Errors from the backend reach the caller unchanged

pub mod config;
pub mod credentials;
pub mod facade;
pub mod remote;

pub use config::Config;
pub use facade::{BranchCache, BranchKey, CmsFacade};
pub use remote::{Branch, BranchMap, CmsError, NodeMap, Pagination};
