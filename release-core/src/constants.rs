//! Constants
//!
//! TigerStyle: every limit and well-known name lives here, with units in the name.

// =============================================================================
// Release Limits
// =============================================================================

/// Maximum release name length in bytes (object names are capped at 63,
/// minus the `sh.helm.release.v1.` prefix and version suffix).
pub const RELEASE_NAME_BYTES_MAX: usize = 53;

/// Lowest valid release revision.
pub const RELEASE_REVISION_MIN: u32 = 1;

/// Maximum encoded release payload in bytes (remote objects cap at 1MiB).
pub const RELEASE_ENCODED_BYTES_MAX: usize = 1024 * 1024;

/// Maximum decompressed release payload in bytes.
pub const RELEASE_DECODED_BYTES_MAX: usize = 16 * 1024 * 1024;

// =============================================================================
// Remote Object Layout
// =============================================================================

/// Prefix of every stored release object name.
pub const RELEASE_OBJECT_PREFIX: &str = "sh.helm.release.v1";

/// Data field holding the encoded release.
pub const RELEASE_DATA_FIELD: &str = "release";

/// Owner label value stamped on every stored release.
pub const RELEASE_OWNER: &str = "helm";

/// Label keys managed by the drivers.
pub const LABEL_NAME: &str = "name";
/// Owner label key.
pub const LABEL_OWNER: &str = "owner";
/// Status label key.
pub const LABEL_STATUS: &str = "status";
/// Version label key.
pub const LABEL_VERSION: &str = "version";

// =============================================================================
// Environment
// =============================================================================

/// Driver kind selection.
pub const ENV_DRIVER: &str = "HELM_DRIVER";

/// SQL driver connection string.
pub const ENV_SQL_CONNECTION_STRING: &str = "HELM_DRIVER_SQL_CONNECTION_STRING";

/// Alternate cluster context override.
pub const ENV_KUBE_CONTEXT: &str = "HELM_KUBECONTEXT";

/// Namespace scope.
pub const ENV_NAMESPACE: &str = "HELM_NAMESPACE";

/// Maximum revisions kept per release.
pub const ENV_MAX_HISTORY: &str = "HELM_MAX_HISTORY";

// =============================================================================
// SQL
// =============================================================================

/// Release table name.
pub const SQL_TABLE_NAME: &str = "releases_v1";

/// Connection pool size.
pub const SQL_POOL_CONNECTIONS_MAX: u32 = 10;

/// Connect timeout in milliseconds.
pub const SQL_CONNECT_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// Defaults
// =============================================================================

/// Namespace used when none is given.
pub const NAMESPACE_DEFAULT: &str = "default";

/// Session key used by single-run callers of the driver selector.
pub const SESSION_DEFAULT: &str = "default";
