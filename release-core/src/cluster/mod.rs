//! Cluster - Remote object API used by the secret and config-object drivers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ClusterApi Trait                        │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                              ↑
//!          │                              │
//! ┌────────┴────────┐           ┌────────┴────────┐
//! │   SimCluster    │           │ (transport impl) │
//! │   (testing)     │           │   (caller's)     │
//! └─────────────────┘           └─────────────────┘
//! ```
//!
//! Drivers never hold a `ClusterApi` directly; they go through a
//! [`LazyClient`], which builds the client on first use.

mod lazy;
mod sim;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

use crate::storage::StorageResult;

pub use lazy::{ClientFactory, LazyClient};
pub use sim::SimCluster;

// =============================================================================
// Object Kind
// =============================================================================

/// Remote object kinds a release can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    /// Opaque secret object
    Secret,
    /// Plain configuration object
    ConfigMap,
}

impl ObjectKind {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secret => "Secret",
            Self::ConfigMap => "ConfigMap",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Cluster Object
// =============================================================================

/// A namespaced remote object: labels plus string data fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterObject {
    /// Object name, unique per (kind, namespace)
    pub name: String,
    /// Owning namespace
    pub namespace: String,
    /// Labels, used for selection
    pub labels: BTreeMap<String, String>,
    /// Data fields
    pub data: BTreeMap<String, String>,
}

impl ClusterObject {
    /// True when every selector pair is present in the labels.
    #[must_use]
    pub fn matches_selector(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(k).is_some_and(|have| have == v))
    }
}

// =============================================================================
// ClusterApi Trait
// =============================================================================

/// Object-level access to a remote cluster.
///
/// An empty namespace in `list` means all namespaces. `create` fails with
/// `AlreadyExists`, `update` with `NotFound`.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch one object.
    async fn get(
        &self,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> StorageResult<Option<ClusterObject>>;

    /// List objects carrying every selector label.
    async fn list(
        &self,
        kind: ObjectKind,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> StorageResult<Vec<ClusterObject>>;

    /// Create an object.
    async fn create(&self, kind: ObjectKind, object: ClusterObject) -> StorageResult<()>;

    /// Replace an existing object.
    async fn update(&self, kind: ObjectKind, object: ClusterObject) -> StorageResult<()>;

    /// Delete an object, returning it if it existed.
    async fn delete(
        &self,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> StorageResult<Option<ClusterObject>>;
}
