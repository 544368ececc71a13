//! Release - Persisted metadata for a deployed application instance
//!
//! TigerStyle: Explicit types, validation, builder pattern.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{RELEASE_NAME_BYTES_MAX, RELEASE_OBJECT_PREFIX, RELEASE_REVISION_MIN};

use super::error::{StorageError, StorageResult};

// =============================================================================
// Status
// =============================================================================

/// Lifecycle status label of a release revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Status could not be determined
    #[default]
    Unknown,
    /// Currently deployed
    Deployed,
    /// Deleted but history kept
    Uninstalled,
    /// Replaced by a newer revision
    Superseded,
    /// Install or upgrade failed
    Failed,
    /// Uninstall in progress
    Uninstalling,
    /// Install in progress
    PendingInstall,
    /// Upgrade in progress
    PendingUpgrade,
    /// Rollback in progress
    PendingRollback,
}

impl Status {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Deployed => "deployed",
            Self::Uninstalled => "uninstalled",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
            Self::Uninstalling => "uninstalling",
            Self::PendingInstall => "pending-install",
            Self::PendingUpgrade => "pending-upgrade",
            Self::PendingRollback => "pending-rollback",
        }
    }

    /// Get all statuses in order.
    #[must_use]
    pub fn all() -> &'static [Status] {
        &[
            Self::Unknown,
            Self::Deployed,
            Self::Uninstalled,
            Self::Superseded,
            Self::Failed,
            Self::Uninstalling,
            Self::PendingInstall,
            Self::PendingUpgrade,
            Self::PendingRollback,
        ]
    }

    /// True while an operation on the release is still in flight.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::PendingInstall | Self::PendingUpgrade | Self::PendingRollback
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StorageError::validation(format!("invalid release status: {s}")))
    }
}

// =============================================================================
// ReleaseKey
// =============================================================================

/// Identity of one release revision within a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReleaseKey {
    /// Release name
    pub name: String,
    /// Revision number
    pub version: u32,
}

impl ReleaseKey {
    /// Create a key.
    #[must_use]
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Name of the remote object or SQL row holding this revision.
    #[must_use]
    pub fn object_name(&self) -> String {
        format!("{RELEASE_OBJECT_PREFIX}.{}.v{}", self.name, self.version)
    }
}

impl fmt::Display for ReleaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{RELEASE_OBJECT_PREFIX}.{}.v{}", self.name, self.version)
    }
}

// =============================================================================
// Release
// =============================================================================

/// A release record.
///
/// Identified by (name, namespace, version). Drivers never mutate a stored
/// record except through `update` and `delete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Release name
    pub name: String,
    /// Namespace the release was installed into
    pub namespace: String,
    /// Revision number, starting at 1
    pub version: u32,
    /// Lifecycle status
    pub status: Status,
    /// Serialized configuration payload
    pub config: serde_json::Value,
    /// Free-form description of the last operation
    pub description: String,
    /// User labels, stored alongside the driver-managed ones
    pub labels: BTreeMap<String, String>,
    /// When revision 1 was deployed
    pub first_deployed: DateTime<Utc>,
    /// When this revision was deployed
    pub last_deployed: DateTime<Utc>,
}

impl Release {
    /// Create a builder.
    #[must_use]
    pub fn builder(name: impl Into<String>, version: u32) -> ReleaseBuilder {
        ReleaseBuilder::new(name.into(), version)
    }

    /// Key of this revision.
    #[must_use]
    pub fn key(&self) -> ReleaseKey {
        ReleaseKey::new(self.name.clone(), self.version)
    }

    /// Validate identity fields.
    ///
    /// # Errors
    /// Returns `Validation` if the name is empty or too long, or the version is 0.
    pub fn validate(&self) -> StorageResult<()> {
        if self.name.is_empty() {
            return Err(StorageError::validation("release name cannot be empty"));
        }
        if self.name.len() > RELEASE_NAME_BYTES_MAX {
            return Err(StorageError::validation(format!(
                "release name {} bytes exceeds max {}",
                self.name.len(),
                RELEASE_NAME_BYTES_MAX
            )));
        }
        if self.version < RELEASE_REVISION_MIN {
            return Err(StorageError::validation(format!(
                "release {} revision must be >= {RELEASE_REVISION_MIN}",
                self.name
            )));
        }
        Ok(())
    }

    /// Change status and stamp the deploy time.
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        self.last_deployed = Utc::now();
    }

    /// Get a user label.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

// =============================================================================
// Release Builder
// =============================================================================

/// Builder for Release with fluent API.
#[derive(Debug)]
pub struct ReleaseBuilder {
    name: String,
    version: u32,
    namespace: String,
    status: Status,
    config: serde_json::Value,
    description: String,
    labels: BTreeMap<String, String>,
    first_deployed: Option<DateTime<Utc>>,
    last_deployed: Option<DateTime<Utc>>,
}

impl ReleaseBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(name: String, version: u32) -> Self {
        Self {
            name,
            version,
            namespace: String::new(),
            status: Status::Unknown,
            config: serde_json::Value::Null,
            description: String::new(),
            labels: BTreeMap::new(),
            first_deployed: None,
            last_deployed: None,
        }
    }

    /// Set namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set status.
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Set configuration payload.
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Set description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a user label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Set first deploy timestamp.
    #[must_use]
    pub fn with_first_deployed(mut self, at: DateTime<Utc>) -> Self {
        self.first_deployed = Some(at);
        self
    }

    /// Set last deploy timestamp.
    #[must_use]
    pub fn with_last_deployed(mut self, at: DateTime<Utc>) -> Self {
        self.last_deployed = Some(at);
        self
    }

    /// Build the release.
    ///
    /// # Errors
    /// Returns `Validation` if the name or version is invalid.
    pub fn build(self) -> StorageResult<Release> {
        let now = Utc::now();
        let release = Release {
            name: self.name,
            namespace: self.namespace,
            version: self.version,
            status: self.status,
            config: self.config,
            description: self.description,
            labels: self.labels,
            first_deployed: self.first_deployed.unwrap_or(now),
            last_deployed: self.last_deployed.unwrap_or(now),
        };
        release.validate()?;
        Ok(release)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in Status::all() {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), *status);
        }
        assert!("Deployed".parse::<Status>().is_err());
    }

    #[test]
    fn test_status_serde_uses_labels() {
        let json = serde_json::to_string(&Status::PendingUpgrade).unwrap();
        assert_eq!(json, "\"pending-upgrade\"");
    }

    #[test]
    fn test_key_object_name() {
        let key = ReleaseKey::new("foo", 3);
        assert_eq!(key.object_name(), "sh.helm.release.v1.foo.v3");
        assert_eq!(key.to_string(), key.object_name());
    }

    #[test]
    fn test_builder() {
        let release = Release::builder("foo", 1)
            .with_namespace("ns-a")
            .with_status(Status::Deployed)
            .with_config(serde_json::json!({"replicas": 2}))
            .with_label("team", "infra")
            .build()
            .unwrap();

        assert_eq!(release.key(), ReleaseKey::new("foo", 1));
        assert_eq!(release.namespace, "ns-a");
        assert_eq!(release.status, Status::Deployed);
        assert_eq!(release.config["replicas"], 2);
        assert_eq!(release.label("team"), Some("infra"));
    }

    #[test]
    fn test_builder_rejects_bad_identity() {
        assert!(matches!(
            Release::builder("", 1).build(),
            Err(StorageError::Validation { .. })
        ));
        assert!(matches!(
            Release::builder("foo", 0).build(),
            Err(StorageError::Validation { .. })
        ));
        let long_name = "x".repeat(RELEASE_NAME_BYTES_MAX + 1);
        assert!(Release::builder(long_name, 1).build().is_err());
    }

    #[test]
    fn test_set_status_stamps_time() {
        let mut release = Release::builder("foo", 1).build().unwrap();
        let before = release.last_deployed;
        release.set_status(Status::Superseded);
        assert_eq!(release.status, Status::Superseded);
        assert!(release.last_deployed >= before);
    }
}
