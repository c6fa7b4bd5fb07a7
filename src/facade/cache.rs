//! facade::cache
//!
//! Branch cache owned by a facade instance.
//!
//! # Design
//!
//! The cache maps `(project, branch id)` to a [`Branch`]. Entries are added
//! and never invalidated or expired: once a key is present it is
//! authoritative and the remote branch set is not consulted again for it.
//!
//! # Aliasing
//!
//! Every enumerated branch is cached under its real identifier. The branch
//! whose type is `master` (any case) is additionally cached under the alias
//! `master`, so callers can ask for the master branch without knowing its
//! real identifier. The master-typed branch owns the alias even when another
//! branch's real identifier is literally `master`. Should an enumeration
//! return several master-typed branches, the smallest identifier wins and a
//! warning is logged.
//!
//! # Concurrency
//!
//! Entries sit behind a `std::sync::Mutex` that is never held across an
//! await point. Misses are serialised per project through an async guard
//! from [`BranchCache::resolution_guard`]: the holder enumerates and
//! populates, later holders re-check the cache before enumerating again.
//! Different projects never wait on each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::warn;

use crate::remote::{Branch, BranchMap, MASTER_BRANCH_TYPE};

/// Alias under which the master-typed branch is cached.
pub const MASTER_ALIAS: &str = MASTER_BRANCH_TYPE;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchKey {
    /// Project identifier
    pub project: String,
    /// Branch identifier or alias
    pub branch_id: String,
}

impl BranchKey {
    /// Create a key for `project` and `branch_id`.
    pub fn new(project: impl Into<String>, branch_id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            branch_id: branch_id.into(),
        }
    }
}

impl fmt::Display for BranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project, self.branch_id)
    }
}

/// Process-lifetime branch cache with per-project single-flight resolution.
#[derive(Default)]
pub struct BranchCache {
    /// Cached branches
    entries: Mutex<HashMap<BranchKey, Branch>>,
    /// One resolution guard per project
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl BranchCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<BranchKey, Branch>> {
        // Entries are plain inserts, so a poisoned map is still consistent
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a cached branch.
    pub fn get(&self, project: &str, branch_id: &str) -> Option<Branch> {
        self.entries()
            .get(&BranchKey::new(project, branch_id))
            .cloned()
    }

    /// Check if a key is present.
    pub fn contains(&self, project: &str, branch_id: &str) -> bool {
        self.entries()
            .contains_key(&BranchKey::new(project, branch_id))
    }

    /// Cache every enumerated branch of `project`.
    ///
    /// Each branch lands under its real identifier; the master-typed branch
    /// also lands under [`MASTER_ALIAS`]. If several branches are
    /// master-typed, the one with the smallest identifier gets the alias.
    /// Returns the number of keys written.
    pub fn populate(&self, project: &str, branches: &BranchMap) -> usize {
        let mut entries = self.entries();
        let mut written = 0;
        let mut masters: Vec<&Branch> = Vec::new();

        for (id, branch) in branches {
            entries.insert(BranchKey::new(project, id.as_str()), branch.clone());
            written += 1;
            if branch.is_master() {
                masters.push(branch);
            }
        }

        if masters.len() > 1 {
            let ids: Vec<&str> = masters.iter().map(|b| b.id.as_str()).collect();
            warn!(project, masters = ?ids, "several master branches enumerated");
        }

        if let Some(branch) = masters.into_iter().min_by(|a, b| a.id.cmp(&b.id)) {
            entries.insert(BranchKey::new(project, MASTER_ALIAS), branch.clone());
            written += 1;
        }

        written
    }

    /// Get the resolution guard for `project`.
    ///
    /// Hold the returned guard while enumerating and populating the cache
    /// for that project.
    pub async fn resolution_guard(&self, project: &str) -> OwnedMutexGuard<()> {
        let guard = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(in_flight.entry(project.to_string()).or_default())
        };
        guard.lock_owned().await
    }

    /// Number of cached keys (aliases included).
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// All cached keys, sorted.
    pub fn keys(&self) -> Vec<BranchKey> {
        let mut keys: Vec<BranchKey> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for BranchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchCache")
            .field("keys", &self.keys())
            .finish()
    }
}
