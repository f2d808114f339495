//! Special resource operator - hardware enablement for Kubernetes nodes

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, CustomResourceExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sro_common::crd::SpecialResource;
use sro_common::kube_utils::create_client;
use sro_operator::controller::{error_policy, reconcile, Context};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Special resource operator - reconciles SpecialResources and labels nodes
/// as each hardware-enablement stage becomes ready
#[derive(Parser, Debug)]
#[command(name = "sro-operator", version, about, long_about = None)]
struct Cli {
    /// Print the SpecialResource CRD as YAML and exit
    #[arg(long)]
    crd: bool,

    /// Path to a kubeconfig file (defaults to in-cluster or KUBECONFIG)
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Root of the local recipes tree, read as `<dir>/<name>/manifests`
    #[arg(long, env = "SRO_RECIPES_DIR", default_value = "/opt/sro/recipes")]
    recipes_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&SpecialResource::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let client = create_client(cli.kubeconfig.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create kube client: {}", e))?;
    let ctx = Arc::new(Context::new(client.clone(), cli.recipes_dir.clone()));

    tracing::info!(recipes_dir = %cli.recipes_dir.display(), "Starting SpecialResource controller");

    let special_resources: Api<SpecialResource> = Api::all(client);
    Controller::new(
        special_resources,
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .shutdown_on_signal()
    .run(reconcile, error_policy, ctx)
    .for_each(|result| {
        match result {
            Ok(action) => tracing::debug!(?action, "SpecialResource reconciliation completed"),
            Err(e) => tracing::error!(error = ?e, "SpecialResource reconciliation error"),
        }
        std::future::ready(())
    })
    .await;

    tracing::info!("Controller stopped");
    Ok(())
}
