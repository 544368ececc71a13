//! `SimCluster` - Process-local cluster for testing
//!
//! `TigerStyle`: Same contract as a real cluster API, no network.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ClusterApi, ClusterObject, ObjectKind};
use crate::storage::{StorageError, StorageResult};

type ObjectId = (ObjectKind, String, String);

/// In-memory cluster objects keyed by (kind, namespace, name).
#[derive(Debug, Default)]
pub struct SimCluster {
    objects: RwLock<HashMap<ObjectId, ClusterObject>>,
    requests: AtomicUsize,
}

impl SimCluster {
    /// Create an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of API calls served (for testing).
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of stored objects of `kind` (for testing).
    pub async fn object_count(&self, kind: ObjectKind) -> usize {
        self.objects
            .read()
            .await
            .keys()
            .filter(|(k, _, _)| *k == kind)
            .count()
    }

    fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn id(kind: ObjectKind, namespace: &str, name: &str) -> ObjectId {
        (kind, namespace.to_string(), name.to_string())
    }
}

#[async_trait]
impl ClusterApi for SimCluster {
    async fn get(
        &self,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> StorageResult<Option<ClusterObject>> {
        self.record_request();
        let objects = self.objects.read().await;
        Ok(objects.get(&Self::id(kind, namespace, name)).cloned())
    }

    async fn list(
        &self,
        kind: ObjectKind,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> StorageResult<Vec<ClusterObject>> {
        self.record_request();
        let objects = self.objects.read().await;
        let mut found: Vec<ClusterObject> = objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && (namespace.is_empty() || ns == namespace))
            .filter(|(_, object)| object.matches_selector(selector))
            .map(|(_, object)| object.clone())
            .collect();
        found.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        Ok(found)
    }

    async fn create(&self, kind: ObjectKind, object: ClusterObject) -> StorageResult<()> {
        self.record_request();
        let id = Self::id(kind, &object.namespace, &object.name);
        let mut objects = self.objects.write().await;
        if objects.contains_key(&id) {
            return Err(StorageError::already_exists(object.name));
        }
        objects.insert(id, object);
        Ok(())
    }

    async fn update(&self, kind: ObjectKind, object: ClusterObject) -> StorageResult<()> {
        self.record_request();
        let id = Self::id(kind, &object.namespace, &object.name);
        let mut objects = self.objects.write().await;
        match objects.get_mut(&id) {
            Some(slot) => {
                *slot = object;
                Ok(())
            }
            None => Err(StorageError::not_found(object.name)),
        }
    }

    async fn delete(
        &self,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> StorageResult<Option<ClusterObject>> {
        self.record_request();
        let mut objects = self.objects.write().await;
        Ok(objects.remove(&Self::id(kind, namespace, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(namespace: &str, name: &str, owner: &str) -> ClusterObject {
        let mut labels = BTreeMap::new();
        labels.insert("owner".to_string(), owner.to_string());
        ClusterObject {
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels,
            data: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_kinds_are_separate() {
        let cluster = SimCluster::new();
        cluster
            .create(ObjectKind::Secret, object("default", "a", "helm"))
            .await
            .unwrap();

        assert!(cluster
            .get(ObjectKind::ConfigMap, "default", "a")
            .await
            .unwrap()
            .is_none());
        assert_eq!(cluster.object_count(ObjectKind::Secret).await, 1);
        assert_eq!(cluster.object_count(ObjectKind::ConfigMap).await, 0);
    }

    #[tokio::test]
    async fn test_create_conflict_and_update_missing() {
        let cluster = SimCluster::new();
        cluster
            .create(ObjectKind::Secret, object("default", "a", "helm"))
            .await
            .unwrap();

        let err = cluster
            .create(ObjectKind::Secret, object("default", "a", "helm"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));

        let err = cluster
            .update(ObjectKind::Secret, object("default", "b", "helm"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_namespace_and_selector() {
        let cluster = SimCluster::new();
        for (ns, name, owner) in [("a", "x", "helm"), ("b", "y", "helm"), ("a", "z", "other")] {
            cluster
                .create(ObjectKind::ConfigMap, object(ns, name, owner))
                .await
                .unwrap();
        }

        let mut selector = BTreeMap::new();
        selector.insert("owner".to_string(), "helm".to_string());

        let in_a = cluster
            .list(ObjectKind::ConfigMap, "a", &selector)
            .await
            .unwrap();
        assert_eq!(in_a.len(), 1);
        assert_eq!(in_a[0].name, "x");

        let everywhere = cluster
            .list(ObjectKind::ConfigMap, "", &selector)
            .await
            .unwrap();
        assert_eq!(everywhere.len(), 2);
        assert_eq!(cluster.request_count(), 5);
    }
}
