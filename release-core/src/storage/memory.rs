//! `MemoryDriver` - Process-local release storage
//!
//! Records live only in the process heap. Identity is
//! (namespace, name, version); the driver's namespace is a filter that can
//! be swapped at any time without touching stored records.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock as StdRwLock};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::driver::{Driver, ReleaseFilter, Releases};
use super::error::{StorageError, StorageResult};
use super::release::{Release, ReleaseKey};

type NamespaceRecords = BTreeMap<ReleaseKey, Release>;

/// In-memory release storage.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    /// Records by namespace, then key
    records: RwLock<HashMap<String, NamespaceRecords>>,
    /// Current namespace filter; empty means all namespaces
    namespace: StdRwLock<String>,
}

impl MemoryDriver {
    /// Driver name reported in logs.
    pub const NAME: &'static str = "Memory";

    /// Create an empty driver scoped to `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            namespace: StdRwLock::new(namespace.into()),
        }
    }

    /// Replace the namespace filter. Stored records are untouched.
    pub fn set_namespace(&self, namespace: impl Into<String>) {
        let mut current = self
            .namespace
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = namespace.into();
    }

    /// Number of stored records across all namespaces.
    pub async fn len(&self) -> usize {
        self.records.read().await.values().map(|ns| ns.len()).sum()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn current_namespace(&self) -> String {
        self.namespace
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Namespace a written release lands in.
    fn target_namespace(&self, release: &Release) -> String {
        if release.namespace.is_empty() {
            self.current_namespace()
        } else {
            release.namespace.clone()
        }
    }

    /// Namespace holding `key` under the current filter.
    ///
    /// With an empty filter, the first namespace (in sorted order) holding the
    /// key wins.
    fn locate(
        records: &HashMap<String, NamespaceRecords>,
        current: &str,
        key: &ReleaseKey,
    ) -> Option<String> {
        if !current.is_empty() {
            return records
                .get(current)
                .filter(|ns| ns.contains_key(key))
                .map(|_| current.to_string());
        }
        let mut namespaces: Vec<&String> = records
            .iter()
            .filter(|(_, ns)| ns.contains_key(key))
            .map(|(name, _)| name)
            .collect();
        namespaces.sort();
        namespaces.first().map(|ns| (*ns).clone())
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn namespace(&self) -> String {
        self.current_namespace()
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &ReleaseKey) -> StorageResult<Release> {
        let records = self.records.read().await;
        let current = self.current_namespace();
        Self::locate(&records, &current, key)
            .and_then(|ns| records.get(&ns).and_then(|ns| ns.get(key)).cloned())
            .ok_or_else(|| StorageError::not_found(key.object_name()))
    }

    async fn list(&self, filter: &ReleaseFilter) -> StorageResult<Releases> {
        let current = self.current_namespace();
        let records = self.records.read().await;

        let mut namespaces: Vec<&String> = records.keys().collect();
        namespaces.sort();

        let found: Vec<Release> = namespaces
            .into_iter()
            .filter_map(|ns| records.get(ns))
            .flat_map(|ns| ns.values())
            .filter(|release| filter.matches(release, &current))
            .cloned()
            .collect();

        tracing::debug!(count = found.len(), namespace = %current, "memory: list");
        Ok(Releases::from(found))
    }

    #[tracing::instrument(skip(self, release), fields(key = %release.key()))]
    async fn create(&self, release: &Release) -> StorageResult<()> {
        release.validate()?;

        let namespace = self.target_namespace(release);
        let key = release.key();
        let mut records = self.records.write().await;
        let bucket = records.entry(namespace.clone()).or_default();
        if bucket.contains_key(&key) {
            return Err(StorageError::already_exists(key.object_name()));
        }

        let mut stored = release.clone();
        stored.namespace = namespace;
        bucket.insert(key, stored);
        Ok(())
    }

    #[tracing::instrument(skip(self, release), fields(key = %release.key()))]
    async fn update(&self, release: &Release) -> StorageResult<()> {
        release.validate()?;

        let key = release.key();
        let mut records = self.records.write().await;
        let mut namespace = self.target_namespace(release);
        if namespace.is_empty() {
            namespace = Self::locate(&records, "", &key)
                .ok_or_else(|| StorageError::not_found(key.object_name()))?;
        }
        let slot = records
            .get_mut(&namespace)
            .and_then(|bucket| bucket.get_mut(&key))
            .ok_or_else(|| StorageError::not_found(key.object_name()))?;

        let mut stored = release.clone();
        stored.namespace = namespace;
        *slot = stored;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &ReleaseKey) -> StorageResult<Release> {
        let current = self.current_namespace();
        let mut records = self.records.write().await;
        let namespace = Self::locate(&records, &current, key)
            .ok_or_else(|| StorageError::not_found(key.object_name()))?;

        let bucket = records
            .get_mut(&namespace)
            .ok_or_else(|| StorageError::not_found(key.object_name()))?;
        let removed = bucket
            .remove(key)
            .ok_or_else(|| StorageError::not_found(key.object_name()))?;
        if bucket.is_empty() {
            records.remove(&namespace);
        }
        Ok(removed)
    }

    fn as_memory(&self) -> Option<&MemoryDriver> {
        Some(self)
    }
}

// =============================================================================
// Tests
// =============================================================================
