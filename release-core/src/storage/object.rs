//! `ObjectDriver` - Releases stored as remote cluster objects
//!
//! One object per revision, named after the release key, labeled with the
//! managed label set and carrying the encoded release in its `release` data
//! field. Backs both the secret and the config-object drivers; they differ
//! only in the object kind.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cluster::{ClusterApi, ClusterObject, LazyClient, ObjectKind};
use crate::constants::{LABEL_NAME, LABEL_OWNER, RELEASE_DATA_FIELD, RELEASE_OWNER};

use super::codec::{decode_release, encode_release};
use super::driver::{storage_labels, Driver, ReleaseFilter, Releases};
use super::error::{StorageError, StorageResult};
use super::release::{Release, ReleaseKey};

/// Release storage in secret or config objects.
#[derive(Debug)]
pub struct ObjectDriver {
    kind: ObjectKind,
    client: Arc<LazyClient>,
}

impl ObjectDriver {
    /// Driver name for secret storage.
    pub const SECRETS_NAME: &'static str = "Secret";
    /// Driver name for config-object storage.
    pub const CONFIG_MAPS_NAME: &'static str = "ConfigMap";

    /// Store releases in secret objects.
    #[must_use]
    pub fn secrets(client: Arc<LazyClient>) -> Self {
        Self {
            kind: ObjectKind::Secret,
            client,
        }
    }

    /// Store releases in config objects.
    #[must_use]
    pub fn config_maps(client: Arc<LazyClient>) -> Self {
        Self {
            kind: ObjectKind::ConfigMap,
            client,
        }
    }

    /// Object kind this driver writes.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    async fn api(&self) -> StorageResult<Arc<dyn ClusterApi>> {
        self.client.client().await
    }

    /// Namespace a written release lands in: the client's, else the release's own.
    fn target_namespace<'a>(&'a self, release: &'a Release) -> &'a str {
        if self.client.namespace().is_empty() {
            &release.namespace
        } else {
            self.client.namespace()
        }
    }

    fn to_object(&self, release: &Release) -> StorageResult<ClusterObject> {
        let namespace = self.target_namespace(release).to_string();
        let mut stored = release.clone();
        stored.namespace.clone_from(&namespace);

        let mut data = BTreeMap::new();
        data.insert(RELEASE_DATA_FIELD.to_string(), encode_release(&stored)?);

        Ok(ClusterObject {
            name: release.key().object_name(),
            namespace,
            labels: storage_labels(&stored),
            data,
        })
    }

    fn from_object(object: &ClusterObject) -> StorageResult<Release> {
        let encoded = object.data.get(RELEASE_DATA_FIELD).ok_or_else(|| {
            StorageError::serialization(format!(
                "object {} has no {RELEASE_DATA_FIELD} field",
                object.name
            ))
        })?;
        let mut release = decode_release(encoded)?;
        if release.namespace.is_empty() {
            release.namespace.clone_from(&object.namespace);
        }
        Ok(release)
    }
}

#[async_trait]
impl Driver for ObjectDriver {
    fn name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Secret => Self::SECRETS_NAME,
            ObjectKind::ConfigMap => Self::CONFIG_MAPS_NAME,
        }
    }

    fn namespace(&self) -> String {
        self.client.namespace().to_string()
    }

    #[tracing::instrument(skip(self), fields(kind = %self.kind, key = %key))]
    async fn get(&self, key: &ReleaseKey) -> StorageResult<Release> {
        let object = self
            .api()
            .await?
            .get(self.kind, self.client.namespace(), &key.object_name())
            .await?
            .ok_or_else(|| StorageError::not_found(key.object_name()))?;
        Self::from_object(&object)
    }

    async fn list(&self, filter: &ReleaseFilter) -> StorageResult<Releases> {
        let current = self.client.namespace().to_string();
        let namespace = filter.namespace.resolve(&current).unwrap_or_default();

        let mut selector = filter.labels.clone();
        selector.insert(LABEL_OWNER.to_string(), RELEASE_OWNER.to_string());
        if let Some(name) = &filter.name {
            selector.insert(LABEL_NAME.to_string(), name.clone());
        }

        let objects = self
            .api()
            .await?
            .list(self.kind, &namespace, &selector)
            .await?;
        tracing::debug!(kind = %self.kind, count = objects.len(), namespace = %namespace, "list");

        let kind = self.kind;
        let filter = filter.clone();
        let releases = objects
            .into_iter()
            .filter_map(move |object| match Self::from_object(&object) {
                Ok(release) => Some(release),
                Err(e) => {
                    tracing::warn!(%kind, object = %object.name, error = %e, "list: failed to decode release");
                    None
                }
            })
            .filter(move |release| filter.matches(release, &current));
        Ok(Releases::new(releases))
    }

    #[tracing::instrument(skip(self, release), fields(kind = %self.kind, key = %release.key()))]
    async fn create(&self, release: &Release) -> StorageResult<()> {
        release.validate()?;
        let object = self.to_object(release)?;
        self.api()
            .await?
            .create(self.kind, object)
            .await
            .map_err(|e| match e {
                StorageError::AlreadyExists { .. } => {
                    StorageError::already_exists(release.key().object_name())
                }
                other => other,
            })
    }

    #[tracing::instrument(skip(self, release), fields(kind = %self.kind, key = %release.key()))]
    async fn update(&self, release: &Release) -> StorageResult<()> {
        release.validate()?;
        let object = self.to_object(release)?;
        self.api()
            .await?
            .update(self.kind, object)
            .await
            .map_err(|e| match e {
                StorageError::NotFound { .. } => StorageError::not_found(release.key().object_name()),
                other => other,
            })
    }

    #[tracing::instrument(skip(self), fields(kind = %self.kind, key = %key))]
    async fn delete(&self, key: &ReleaseKey) -> StorageResult<Release> {
        let object = self
            .api()
            .await?
            .delete(self.kind, self.client.namespace(), &key.object_name())
            .await?
            .ok_or_else(|| StorageError::not_found(key.object_name()))?;
        Self::from_object(&object)
    }
}

// =============================================================================
// Tests
// =============================================================================
