//! `LazyClient` - Build the cluster client once, on first use
//!
//! The factory result is cached whether it succeeds or fails: a failed
//! construction is not retried against the same target. Callers that want
//! another attempt build a new context or call [`LazyClient::reset`].

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use super::ClusterApi;
use crate::storage::{StorageError, StorageResult};

/// Builds a cluster client. Called at most once per [`LazyClient`].
pub type ClientFactory =
    Arc<dyn Fn() -> BoxFuture<'static, StorageResult<Arc<dyn ClusterApi>>> + Send + Sync>;

/// Deferred cluster client scoped to one namespace.
pub struct LazyClient {
    namespace: String,
    factory: ClientFactory,
    client: OnceCell<StorageResult<Arc<dyn ClusterApi>>>,
}

impl LazyClient {
    /// Create a lazy client. Nothing is constructed until [`LazyClient::client`].
    #[must_use]
    pub fn new(namespace: impl Into<String>, factory: ClientFactory) -> Self {
        Self {
            namespace: namespace.into(),
            factory,
            client: OnceCell::new(),
        }
    }

    /// Namespace every driver call through this client is scoped to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get the client, constructing it on the first call.
    ///
    /// Concurrent first callers wait on the single construction without
    /// holding a worker thread.
    ///
    /// # Errors
    /// Returns `ClusterClient` if the factory failed, now or on an earlier call.
    pub async fn client(&self) -> StorageResult<Arc<dyn ClusterApi>> {
        self.client
            .get_or_init(|| async {
                tracing::debug!(namespace = %self.namespace, "constructing cluster client");
                (self.factory)().await.map_err(|e| match e {
                    StorageError::ClusterClient { .. } => e,
                    other => StorageError::cluster_client(other.to_string()),
                })
            })
            .await
            .clone()
    }

    /// True once construction has finished, successfully or not.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    /// Forget the cached client or failure so the next call builds again.
    pub fn reset(&mut self) {
        self.client.take();
    }
}

impl fmt::Debug for LazyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyClient")
            .field("namespace", &self.namespace)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
