//! helm-release
//!
//! Command-line interface for inspecting Helm release records.
//!
//! # Usage
//!
//! ```bash
//! # Show which storage backend is in use
//! helm-release view
//!
//! # List the revisions of a release held in memory
//! HELM_DRIVER=memory helm-release view my-app --namespace apps
//! ```

mod settings;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::FutureExt;
use release_core::cluster::ClientFactory;
use release_core::constants::SESSION_DEFAULT;
use release_core::storage::{DriverSelector, Storage, StorageError};

use settings::EnvSettings;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Application name
pub const APP_NAME: &str = "helm-release";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// CLI
// =============================================================================

/// helm release helps you manage Helm release objects
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    settings: EnvSettings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// View a named Helm release
    View {
        /// Release name
        name: Option<String>,
    },
}

// =============================================================================
// Storage Setup
// =============================================================================

/// Cluster client factory for the configured context.
///
/// No cluster transport ships with this binary; remote drivers report a
/// cluster client error on first use.
fn cluster_factory(settings: &EnvSettings) -> ClientFactory {
    let context = settings.context_name().to_string();
    let kubeconfig = settings.kubeconfig.clone();
    Arc::new(move || {
        tracing::debug!(context = %context, kubeconfig = ?kubeconfig, "building cluster client");
        let err = StorageError::cluster_client(format!(
            "no cluster transport available for context {context}"
        ));
        async move { Err(err) }.boxed()
    })
}

/// Select the configured driver and wrap it for use.
async fn setup_storage(
    selector: &DriverSelector,
    settings: &EnvSettings,
) -> Result<Storage, StorageError> {
    let driver = selector
        .open(SESSION_DEFAULT, &settings.driver, &settings.namespace)
        .await?;
    Ok(Storage::init(driver).with_max_history(settings.max_history))
}

async fn handle_view(
    selector: &DriverSelector,
    settings: &EnvSettings,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let storage = setup_storage(selector, settings).await?;
    println!(
        "store: driver={} namespace={}",
        storage.driver_name(),
        storage.namespace()
    );

    if let Some(name) = name {
        for release in storage.history(name).await? {
            println!(
                "{} v{} {} {}",
                release.name,
                release.version,
                release.status,
                release.last_deployed.to_rfc3339()
            );
        }
    }
    Ok(())
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("{} v{}", APP_NAME, APP_VERSION);
    tracing::debug!(driver = %cli.settings.driver, namespace = %cli.settings.namespace, "settings");

    let selector = DriverSelector::new(cluster_factory(&cli.settings))
        .with_sql_connection_string(cli.settings.sql_connection_string.clone());

    match &cli.command {
        Commands::View { name } => handle_view(&selector, &cli.settings, name.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once(APP_NAME).chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags() {
        let cli = parse(&["view", "foo", "--namespace", "apps", "--driver", "memory"]);
        assert_eq!(cli.settings.namespace, "apps");
        assert_eq!(cli.settings.driver, "memory");
        assert!(matches!(cli.command, Commands::View { name: Some(ref n) } if n == "foo"));
    }

    #[tokio::test]
    async fn test_setup_storage_reports_unknown_driver() {
        let mut cli = parse(&["view"]);
        cli.settings.driver = "bogus".to_string();
        let selector = DriverSelector::new(cluster_factory(&cli.settings));

        let err = setup_storage(&selector, &cli.settings).await.unwrap_err();
        assert_eq!(err, StorageError::unknown_driver("bogus"));
    }

    #[tokio::test]
    async fn test_remote_driver_fails_on_first_use() {
        let mut cli = parse(&["view"]);
        cli.settings.driver = "secrets".to_string();
        let selector = DriverSelector::new(cluster_factory(&cli.settings));

        let storage = setup_storage(&selector, &cli.settings).await.unwrap();
        assert_eq!(storage.driver_name(), "Secret");
        let err = storage.history("foo").await.unwrap_err();
        assert!(matches!(err, StorageError::ClusterClient { .. }));
    }
}
