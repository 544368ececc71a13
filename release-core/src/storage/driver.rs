//! Driver Trait
//!
//! TigerStyle: Abstract interface for release storage.
//!
//! All implementations satisfy the same contract: `get`, `update` and
//! `delete` fail with `NotFound` on a missing revision, `create` fails with
//! `AlreadyExists` on a duplicate one.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

use crate::constants::{LABEL_NAME, LABEL_OWNER, LABEL_STATUS, LABEL_VERSION, RELEASE_OWNER};

use super::error::{StorageError, StorageResult};
use super::memory::MemoryDriver;
use super::release::{Release, ReleaseKey, Status};

/// Abstract storage backend for release records.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Short backend name, used in logs.
    fn name(&self) -> &'static str;

    /// Namespace this driver is currently scoped to. Empty means all namespaces.
    fn namespace(&self) -> String;

    /// Get one revision.
    async fn get(&self, key: &ReleaseKey) -> StorageResult<Release>;

    /// List releases matching the filter.
    ///
    /// Stored records that fail to decode are logged at `warn` and left out
    /// of the result, so one corrupt record does not hide the rest of the
    /// history. Backend failures still fail the whole call.
    async fn list(&self, filter: &ReleaseFilter) -> StorageResult<Releases>;

    /// Store a new revision.
    async fn create(&self, release: &Release) -> StorageResult<()>;

    /// Replace an existing revision.
    async fn update(&self, release: &Release) -> StorageResult<()>;

    /// Remove a revision, returning what was stored.
    async fn delete(&self, key: &ReleaseKey) -> StorageResult<Release>;

    /// Releases in the current namespace carrying every given label.
    ///
    /// Fails with `NotFound` when nothing matches.
    async fn query(&self, labels: &BTreeMap<String, String>) -> StorageResult<Releases> {
        let filter = ReleaseFilter::current_namespace().with_labels(labels.clone());
        let found: Vec<Release> = self.list(&filter).await?.collect();
        if found.is_empty() {
            return Err(StorageError::not_found(format_selector(labels)));
        }
        Ok(Releases::from(found))
    }

    /// Downcast hook for the in-memory backend, the only one the selector reuses.
    fn as_memory(&self) -> Option<&MemoryDriver> {
        None
    }
}

impl fmt::Debug for dyn Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.name())
            .field("namespace", &self.namespace())
            .finish()
    }
}

// =============================================================================
// Labels
// =============================================================================

/// Labels a stored release carries: user labels plus the managed set.
///
/// Managed labels win over user labels with the same key.
#[must_use]
pub fn storage_labels(release: &Release) -> BTreeMap<String, String> {
    let mut labels = release.labels.clone();
    labels.insert(LABEL_NAME.to_string(), release.name.clone());
    labels.insert(LABEL_OWNER.to_string(), RELEASE_OWNER.to_string());
    labels.insert(LABEL_STATUS.to_string(), release.status.as_str().to_string());
    labels.insert(LABEL_VERSION.to_string(), release.version.to_string());
    labels
}

fn format_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

// =============================================================================
// Filter
// =============================================================================

/// Which namespaces a listing covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NamespaceScope {
    /// Every namespace the driver can see
    #[default]
    All,
    /// The driver's current namespace filter
    Current,
    /// One explicit namespace
    Named(String),
}

impl NamespaceScope {
    /// Resolve to a concrete namespace, `None` meaning no restriction.
    #[must_use]
    pub fn resolve(&self, current: &str) -> Option<String> {
        let namespace = match self {
            Self::All => return None,
            Self::Current => current,
            Self::Named(namespace) => namespace.as_str(),
        };
        if namespace.is_empty() {
            None
        } else {
            Some(namespace.to_string())
        }
    }
}

/// Selection criteria for `Driver::list`.
///
/// The default filter matches everything in every namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseFilter {
    /// Namespace scope
    pub namespace: NamespaceScope,
    /// Exact release name
    pub name: Option<String>,
    /// Accepted statuses; empty accepts any
    pub statuses: Vec<Status>,
    /// Label equality selectors, matched against `storage_labels`
    pub labels: BTreeMap<String, String>,
}

impl ReleaseFilter {
    /// Match everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Match everything in the driver's current namespace.
    #[must_use]
    pub fn current_namespace() -> Self {
        Self {
            namespace: NamespaceScope::Current,
            ..Self::default()
        }
    }

    /// Restrict to one namespace.
    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = NamespaceScope::Named(namespace.into());
        self
    }

    /// Restrict to one release name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Accept an additional status.
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.statuses.push(status);
        self
    }

    /// Require labels.
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels.extend(labels);
        self
    }

    /// Check a release against this filter, resolving `Current` to `current_namespace`.
    #[must_use]
    pub fn matches(&self, release: &Release, current_namespace: &str) -> bool {
        if let Some(namespace) = self.namespace.resolve(current_namespace) {
            if release.namespace != namespace {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if &release.name != name {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&release.status) {
            return false;
        }
        if self.labels.is_empty() {
            return true;
        }
        let labels = storage_labels(release);
        self.labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|have| have == v))
    }
}

// =============================================================================
// Releases
// =============================================================================

/// Result of a listing: finite, consumed once.
pub struct Releases {
    inner: Box<dyn Iterator<Item = Release> + Send>,
}

impl Releases {
    /// Wrap an iterator.
    pub fn new(iter: impl Iterator<Item = Release> + Send + 'static) -> Self {
        Self {
            inner: Box::new(iter),
        }
    }

    /// An empty listing.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl From<Vec<Release>> for Releases {
    fn from(releases: Vec<Release>) -> Self {
        Self::new(releases.into_iter())
    }
}

impl Iterator for Releases {
    type Item = Release;

    fn next(&mut self) -> Option<Release> {
        self.inner.next()
    }
}

impl fmt::Debug for Releases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Releases").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(name: &str, namespace: &str, status: Status) -> Release {
        Release::builder(name, 1)
            .with_namespace(namespace)
            .with_status(status)
            .with_label("team", "infra")
            .build()
            .unwrap()
    }

    #[test]
    fn test_storage_labels_include_managed_set() {
        let labels = storage_labels(&release("foo", "ns-a", Status::Deployed));
        assert_eq!(labels.get("name").map(String::as_str), Some("foo"));
        assert_eq!(labels.get("owner").map(String::as_str), Some("helm"));
        assert_eq!(labels.get("status").map(String::as_str), Some("deployed"));
        assert_eq!(labels.get("version").map(String::as_str), Some("1"));
        assert_eq!(labels.get("team").map(String::as_str), Some("infra"));
    }

    #[test]
    fn test_default_filter_matches_every_namespace() {
        let filter = ReleaseFilter::all();
        assert!(filter.matches(&release("foo", "ns-a", Status::Deployed), "ns-b"));
        assert!(filter.matches(&release("bar", "", Status::Failed), "ns-b"));
    }

    #[test]
    fn test_current_namespace_scope() {
        let filter = ReleaseFilter::current_namespace();
        let foo = release("foo", "ns-a", Status::Deployed);
        assert!(filter.matches(&foo, "ns-a"));
        assert!(!filter.matches(&foo, "ns-b"));
        // empty namespace filter means all namespaces
        assert!(filter.matches(&foo, ""));
    }

    #[test]
    fn test_name_status_and_label_criteria() {
        let foo = release("foo", "ns-a", Status::Deployed);

        assert!(ReleaseFilter::all().with_name("foo").matches(&foo, ""));
        assert!(!ReleaseFilter::all().with_name("bar").matches(&foo, ""));

        let deployed_or_failed = ReleaseFilter::all()
            .with_status(Status::Deployed)
            .with_status(Status::Failed);
        assert!(deployed_or_failed.matches(&foo, ""));
        assert!(!ReleaseFilter::all()
            .with_status(Status::Superseded)
            .matches(&foo, ""));

        let mut labels = BTreeMap::new();
        labels.insert("team".to_string(), "infra".to_string());
        labels.insert("status".to_string(), "deployed".to_string());
        assert!(ReleaseFilter::all().with_labels(labels).matches(&foo, ""));

        let mut wrong = BTreeMap::new();
        wrong.insert("team".to_string(), "web".to_string());
        assert!(!ReleaseFilter::all().with_labels(wrong).matches(&foo, ""));
    }

    #[test]
    fn test_releases_is_consumed_once() {
        let mut releases = Releases::from(vec![release("foo", "", Status::Deployed)]);
        assert_eq!(releases.next().map(|r| r.name), Some("foo".to_string()));
        assert!(releases.next().is_none());
        assert_eq!(Releases::empty().count(), 0);
    }
}
