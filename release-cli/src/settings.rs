//! Environment settings shared by every subcommand.

use clap::Args;
use release_core::constants::{
    ENV_DRIVER, ENV_KUBE_CONTEXT, ENV_MAX_HISTORY, ENV_NAMESPACE, ENV_SQL_CONNECTION_STRING,
    NAMESPACE_DEFAULT,
};

/// Where releases live and how to reach them.
#[derive(Args, Debug, Clone)]
pub struct EnvSettings {
    /// Path to the kubeconfig file
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kubeconfig: Option<String>,

    /// Name of the kubeconfig context to use
    #[arg(long, env = ENV_KUBE_CONTEXT, global = true)]
    pub kube_context: Option<String>,

    /// Namespace scope of the release
    #[arg(short, long, env = ENV_NAMESPACE, default_value = NAMESPACE_DEFAULT, global = true)]
    pub namespace: String,

    /// Storage driver: secret(s), configmap(s), memory or sql
    #[arg(long, env = ENV_DRIVER, default_value = "", global = true)]
    pub driver: String,

    /// Connection string for the sql driver
    #[arg(long, env = ENV_SQL_CONNECTION_STRING, default_value = "", hide_env_values = true, global = true)]
    pub sql_connection_string: String,

    /// Revisions kept per release (0 = unlimited)
    #[arg(long, env = ENV_MAX_HISTORY, default_value_t = 0, global = true)]
    pub max_history: usize,
}

impl EnvSettings {
    /// Context name for log lines.
    #[must_use]
    pub fn context_name(&self) -> &str {
        self.kube_context.as_deref().unwrap_or("<current>")
    }
}
