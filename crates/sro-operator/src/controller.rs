//! SpecialResource controller
//!
//! One reconcile is one reconciliation pass: make sure the target namespace
//! exists, resolve the hardware configuration, snapshot the runtime facts
//! and apply every stage. The node cache lives in the context behind an
//! async mutex held for the whole pass, so passes never interleave.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Node;
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use sro_common::crd::SpecialResource;
use sro_common::runtime::RuntimeInfo;
use sro_common::{Error, DEFAULT_WORKER_LABEL};

use crate::client::{ClusterClient, KubeClusterClient};
use crate::node_cache::NodeCache;
use crate::node_state::NodeStateMachine;
use crate::pipeline::{ensure_namespace, StagePipeline};
use crate::reconciler::Reconciler;
use crate::resolver::resolve;

/// Requeue interval after a successful pass (picks up node membership changes)
pub const REQUEUE_SUCCESS_SECS: u64 = 300;
/// Requeue interval after a retryable failure
pub const REQUEUE_RETRY_SECS: u64 = 5;

/// Controller context shared by all passes
pub struct Context {
    /// Cluster client (trait object for testability)
    pub client: Arc<dyn ClusterClient>,
    /// Root of the local fallback manifest tree
    pub recipes_dir: PathBuf,
    /// Selected node set, held for the duration of a pass
    pub nodes: Mutex<NodeCache>,
}

impl Context {
    /// Create a context talking to the API server through `client`
    pub fn new(client: Client, recipes_dir: impl Into<PathBuf>) -> Self {
        Self::with_client(Arc::new(KubeClusterClient::new(client)), recipes_dir)
    }

    /// Create a context with a custom cluster client
    pub fn with_client(client: Arc<dyn ClusterClient>, recipes_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            recipes_dir: recipes_dir.into(),
            nodes: Mutex::new(NodeCache::new()),
        }
    }
}

/// Reconcile a SpecialResource
#[instrument(skip(special_resource, ctx), fields(special_resource = %special_resource.name_any()))]
pub async fn reconcile(
    special_resource: Arc<SpecialResource>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let name = special_resource.name_any();
    let namespace = special_resource.target_namespace();
    let selector = special_resource.node_selector();
    let client = ctx.client.as_ref();

    info!(namespace = %namespace, "Reconciling SpecialResource");
    let mut cache = ctx.nodes.lock().await;

    ensure_namespace(client, &namespace).await?;
    let config = resolve(client, &namespace, &name, &ctx.recipes_dir).await?;
    if config.is_empty() {
        warn!(namespace = %namespace, "Hardware configuration has no stages");
    }

    let nodes: Vec<Node> = cache
        .get(client, selector, false)
        .await?
        .iter()
        .map(|view| view.node().clone())
        .collect();
    let runtime = RuntimeInfo::collect(
        &special_resource,
        &nodes,
        selector.unwrap_or(DEFAULT_WORKER_LABEL),
    );

    let reconciler = Reconciler::new(client, special_resource.owner_reference()?);
    let states = NodeStateMachine::new(
        client,
        name.as_str(),
        selector,
        special_resource
            .status
            .as_ref()
            .and_then(|status| status.state.clone()),
    );
    let summary = StagePipeline::new(&runtime, namespace.as_str(), reconciler, states)
        .run(&config, &mut cache)
        .await?;

    info!(
        stages = summary.stages.len(),
        created = summary.created,
        updated = summary.updated,
        unchanged = summary.unchanged,
        skipped = summary.skipped,
        advanced = summary.advanced,
        "SpecialResource reconciled"
    );
    Ok(Action::requeue(Duration::from_secs(REQUEUE_SUCCESS_SECS)))
}

/// Error policy for the controller.
///
/// Retryable errors (conflicts, transport failures) are re-driven shortly;
/// everything else waits for the SpecialResource to change.
pub fn error_policy(
    special_resource: Arc<SpecialResource>,
    error: &Error,
    _ctx: Arc<Context>,
) -> Action {
    if error.is_retryable() {
        warn!(
            special_resource = %special_resource.name_any(),
            error = %error,
            "Reconciliation failed, retrying"
        );
        return Action::requeue(Duration::from_secs(REQUEUE_RETRY_SECS));
    }

    error!(
        ?error,
        special_resource = %special_resource.name_any(),
        "reconciliation failed"
    );
    Action::await_change()
}
