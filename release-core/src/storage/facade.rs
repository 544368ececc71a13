//! Storage - the handle the rest of the program works with
//!
//! Wraps whichever driver was selected, attaches logging, and layers the
//! release-history helpers on top of the driver capability set. Callers
//! never branch on backend kind.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use super::driver::{Driver, ReleaseFilter, Releases};
use super::error::{StorageError, StorageResult};
use super::release::{Release, ReleaseKey, Status};

/// Release storage handle.
pub struct Storage {
    driver: Arc<dyn Driver>,
    /// Revisions kept per release; 0 keeps everything
    max_history: usize,
    op_timeout: Option<Duration>,
    span: tracing::Span,
}

impl Storage {
    /// Wrap a driver.
    #[must_use]
    pub fn init(driver: Arc<dyn Driver>) -> Self {
        let span = tracing::debug_span!(
            "storage",
            driver = driver.name(),
            namespace = %driver.namespace()
        );
        span.in_scope(|| tracing::debug!("storage initialized"));
        Self {
            driver,
            max_history: 0,
            op_timeout: None,
            span,
        }
    }

    /// Keep at most `max_history` revisions per release on `create`.
    #[must_use]
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Fail any single operation that runs longer than `timeout`.
    #[must_use]
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    /// The wrapped driver.
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Name of the wrapped driver.
    #[must_use]
    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    /// Namespace the wrapped driver is scoped to.
    #[must_use]
    pub fn namespace(&self) -> String {
        self.driver.namespace()
    }

    /// Configured history limit.
    #[must_use]
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    async fn run<T, F>(&self, op: &'static str, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        let fut = fut.instrument(self.span.clone());
        let result = match self.op_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
                Err(StorageError::timeout(
                    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                ))
            }),
            None => fut.await,
        };
        if let Err(e) = &result {
            self.span
                .in_scope(|| tracing::debug!(op, error = %e, "storage operation failed"));
        }
        result
    }

    // =========================================================================
    // Capability set
    // =========================================================================

    /// Get one revision.
    ///
    /// # Errors
    /// `NotFound` if the revision does not exist.
    pub async fn get(&self, name: &str, version: u32) -> StorageResult<Release> {
        let key = ReleaseKey::new(name, version);
        self.span
            .in_scope(|| tracing::debug!(%key, "getting release"));
        self.run("get", self.driver.get(&key)).await
    }

    /// List releases matching `filter`.
    ///
    /// # Errors
    /// Backend failures.
    pub async fn list(&self, filter: &ReleaseFilter) -> StorageResult<Releases> {
        self.run("list", self.driver.list(filter)).await
    }

    /// Releases in the current namespace carrying every given label.
    ///
    /// # Errors
    /// `NotFound` when nothing matches.
    pub async fn query(&self, labels: &BTreeMap<String, String>) -> StorageResult<Releases> {
        self.run("query", self.driver.query(labels)).await
    }

    /// Store a new revision, pruning history first when a limit is set.
    ///
    /// # Errors
    /// `AlreadyExists` for a duplicate revision; pruning failures.
    pub async fn create(&self, release: &Release) -> StorageResult<()> {
        self.span
            .in_scope(|| tracing::debug!(key = %release.key(), "creating release"));
        if self.max_history > 0 {
            // leave room for the revision being created
            self.remove_least_recent(&release.name, self.max_history - 1)
                .await?;
        }
        self.run("create", self.driver.create(release)).await
    }

    /// Replace an existing revision.
    ///
    /// # Errors
    /// `NotFound` if the revision does not exist.
    pub async fn update(&self, release: &Release) -> StorageResult<()> {
        self.span
            .in_scope(|| tracing::debug!(key = %release.key(), "updating release"));
        self.run("update", self.driver.update(release)).await
    }

    /// Remove a revision.
    ///
    /// # Errors
    /// `NotFound` if the revision does not exist.
    pub async fn delete(&self, name: &str, version: u32) -> StorageResult<Release> {
        let key = ReleaseKey::new(name, version);
        self.span
            .in_scope(|| tracing::debug!(%key, "deleting release"));
        self.run("delete", self.driver.delete(&key)).await
    }

    // =========================================================================
    // History helpers
    // =========================================================================

    /// Every release in the current namespace.
    ///
    /// # Errors
    /// Backend failures.
    pub async fn list_releases(&self) -> StorageResult<Vec<Release>> {
        Ok(self.list(&ReleaseFilter::current_namespace()).await?.collect())
    }

    /// Deployed releases in the current namespace.
    ///
    /// # Errors
    /// Backend failures.
    pub async fn list_deployed(&self) -> StorageResult<Vec<Release>> {
        let filter = ReleaseFilter::current_namespace().with_status(Status::Deployed);
        Ok(self.list(&filter).await?.collect())
    }

    /// Uninstalled releases in the current namespace.
    ///
    /// # Errors
    /// Backend failures.
    pub async fn list_uninstalled(&self) -> StorageResult<Vec<Release>> {
        let filter = ReleaseFilter::current_namespace().with_status(Status::Uninstalled);
        Ok(self.list(&filter).await?.collect())
    }

    /// All deployed revisions of `name`, newest first.
    ///
    /// # Errors
    /// `NotFound` if none is deployed.
    pub async fn deployed_all(&self, name: &str) -> StorageResult<Vec<Release>> {
        let filter = ReleaseFilter::current_namespace()
            .with_name(name)
            .with_status(Status::Deployed);
        let mut deployed: Vec<Release> = self.list(&filter).await?.collect();
        if deployed.is_empty() {
            return Err(StorageError::not_found(format!(
                "{name}: has no deployed releases"
            )));
        }
        deployed.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(deployed)
    }

    /// Newest deployed revision of `name`.
    ///
    /// # Errors
    /// `NotFound` if none is deployed.
    pub async fn deployed(&self, name: &str) -> StorageResult<Release> {
        let mut deployed = self.deployed_all(name).await?;
        Ok(deployed.swap_remove(0))
    }

    /// Every revision of `name`, oldest first.
    ///
    /// # Errors
    /// `NotFound` if the release has no revisions.
    pub async fn history(&self, name: &str) -> StorageResult<Vec<Release>> {
        let filter = ReleaseFilter::current_namespace().with_name(name);
        let mut history: Vec<Release> = self.list(&filter).await?.collect();
        if history.is_empty() {
            return Err(StorageError::not_found(name));
        }
        history.sort_by_key(|r| r.version);
        Ok(history)
    }

    /// Highest revision of `name`, whatever its status.
    ///
    /// # Errors
    /// `NotFound` if the release has no revisions.
    pub async fn last(&self, name: &str) -> StorageResult<Release> {
        let mut history = self.history(name).await?;
        history
            .pop()
            .ok_or_else(|| StorageError::not_found(name))
    }

    /// Delete the oldest revisions of `name` until at most `keep` remain.
    ///
    /// The newest deployed revision is never removed.
    async fn remove_least_recent(&self, name: &str, keep: usize) -> StorageResult<()> {
        let history = match self.history(name).await {
            Ok(history) => history,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        if history.len() <= keep {
            return Ok(());
        }

        let last_deployed = history
            .iter()
            .rev()
            .find(|r| r.status == Status::Deployed)
            .map(|r| r.version);

        let excess = history.len() - keep;
        let doomed: Vec<u32> = history
            .iter()
            .map(|r| r.version)
            .filter(|v| Some(*v) != last_deployed)
            .take(excess)
            .collect();

        let mut first_error = None;
        for version in &doomed {
            if let Err(e) = self.delete(name, *version).await {
                tracing::warn!(release = name, version, error = %e, "failed to prune revision");
                first_error.get_or_insert(e);
            }
        }
        self.span.in_scope(|| {
            tracing::debug!(release = name, pruned = doomed.len(), keep, "pruned release history");
        });

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("driver", &self.driver.name())
            .field("namespace", &self.driver.namespace())
            .field("max_history", &self.max_history)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;

    use super::*;
    use crate::storage::memory::MemoryDriver;

    fn release(name: &str, version: u32, status: Status) -> Release {
        Release::builder(name, version)
            .with_namespace("default")
            .with_status(status)
            .build()
            .unwrap()
    }

    async fn storage_with(releases: &[Release]) -> Storage {
        let storage = Storage::init(Arc::new(MemoryDriver::new("default")));
        for r in releases {
            storage.create(r).await.unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn test_pass_through() {
        let storage = storage_with(&[release("foo", 1, Status::Deployed)]).await;
        assert_eq!(storage.driver_name(), "Memory");
        assert_eq!(storage.namespace(), "default");

        let got = storage.get("foo", 1).await.unwrap();
        assert_eq!(got.status, Status::Deployed);

        let mut superseded = got.clone();
        superseded.set_status(Status::Superseded);
        storage.update(&superseded).await.unwrap();
        assert_eq!(
            storage.get("foo", 1).await.unwrap().status,
            Status::Superseded
        );

        storage.delete("foo", 1).await.unwrap();
        assert!(storage.get("foo", 1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_errors_are_returned() {
        let storage = storage_with(&[release("foo", 1, Status::Deployed)]).await;
        let err = storage
            .create(&release("foo", 1, Status::Deployed))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
        assert!(storage.delete("bar", 1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_history_helpers() {
        let storage = storage_with(&[
            release("foo", 1, Status::Superseded),
            release("foo", 3, Status::Failed),
            release("foo", 2, Status::Deployed),
            release("bar", 1, Status::Uninstalled),
        ])
        .await;

        let history: Vec<u32> = storage
            .history("foo")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(history, vec![1, 2, 3]);

        assert_eq!(storage.last("foo").await.unwrap().version, 3);
        assert_eq!(storage.deployed("foo").await.unwrap().version, 2);
        assert!(storage.deployed("bar").await.unwrap_err().is_not_found());
        assert!(storage.history("baz").await.unwrap_err().is_not_found());

        assert_eq!(storage.list_releases().await.unwrap().len(), 4);
        assert_eq!(storage.list_deployed().await.unwrap().len(), 1);
        assert_eq!(storage.list_uninstalled().await.unwrap()[0].name, "bar");
    }

    #[tokio::test]
    async fn test_query_through_facade() {
        let storage = storage_with(&[release("foo", 1, Status::Deployed)]).await;
        let mut labels = BTreeMap::new();
        labels.insert("status".to_string(), "deployed".to_string());
        assert_eq!(storage.query(&labels).await.unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_max_history_prunes_oldest() {
        let storage = Storage::init(Arc::new(MemoryDriver::new("default"))).with_max_history(3);
        storage.create(&release("foo", 1, Status::Superseded)).await.unwrap();
        storage.create(&release("foo", 2, Status::Superseded)).await.unwrap();
        storage.create(&release("foo", 3, Status::Deployed)).await.unwrap();
        storage.create(&release("foo", 4, Status::PendingUpgrade)).await.unwrap();

        let versions: Vec<u32> = storage
            .history("foo")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_max_history_keeps_last_deployed() {
        let storage = Storage::init(Arc::new(MemoryDriver::new("default"))).with_max_history(2);
        storage.create(&release("foo", 1, Status::Deployed)).await.unwrap();
        storage.create(&release("foo", 2, Status::Failed)).await.unwrap();
        storage.create(&release("foo", 3, Status::Failed)).await.unwrap();

        let versions: Vec<u32> = storage
            .history("foo")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec![1, 3]);
    }

    /// Driver whose reads never complete.
    struct StalledDriver;

    #[async_trait]
    impl Driver for StalledDriver {
        fn name(&self) -> &'static str {
            "Stalled"
        }

        fn namespace(&self) -> String {
            "default".to_string()
        }

        async fn get(&self, _key: &ReleaseKey) -> StorageResult<Release> {
            futures::future::pending().await
        }

        async fn list(&self, _filter: &ReleaseFilter) -> StorageResult<Releases> {
            futures::future::pending().await
        }

        async fn create(&self, _release: &Release) -> StorageResult<()> {
            Ok(())
        }

        async fn update(&self, _release: &Release) -> StorageResult<()> {
            Ok(())
        }

        async fn delete(&self, key: &ReleaseKey) -> StorageResult<Release> {
            Err(StorageError::not_found(key.object_name()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_op_timeout() {
        let storage =
            Storage::init(Arc::new(StalledDriver)).with_op_timeout(Duration::from_millis(250));

        let err = storage.get("foo", 1).await.unwrap_err();
        assert_eq!(err, StorageError::timeout(250));
        let err = storage.list(&ReleaseFilter::all()).await.unwrap_err();
        assert!(err.is_transient());
    }
}
