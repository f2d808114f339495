//! Node-readiness state machine
//!
//! Each DaemonSet of a hardware configuration declares the pipeline stage it
//! implements through the state annotation. Once it has been reconciled,
//! every selected node is labeled with that stage's ready label so the next
//! stage's workloads can be scheduled. Labeling is check-then-set, which
//! makes a re-invocation after a conflict act only on the nodes still
//! missing the label.

use tracing::{debug, info, warn};

use sro_common::crd::SpecialResourceStatus;
use sro_common::manifest::ResourceObject;
use sro_common::{Error, STATE_ANNOTATION, STATE_READY};

use crate::client::ClusterClient;
use crate::node_cache::{NodeCache, NodeView};

/// Kind of the workloads that drive the state machine
pub const DAEMON_SET_KIND: &str = "DaemonSet";

/// One stage of the hardware-enablement pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineStage {
    /// Stage name as written in the state annotation
    pub name: &'static str,
    /// Node label key set when the stage is ready
    pub label: &'static str,
}

/// Pipeline stages in rollout order
pub const PIPELINE_STAGES: &[PipelineStage] = &[
    PipelineStage {
        name: "driver-container",
        label: "specialresource.openshift.io/driver-container",
    },
    PipelineStage {
        name: "runtime-enablement",
        label: "specialresource.openshift.io/runtime-enablement",
    },
    PipelineStage {
        name: "device-plugin",
        label: "specialresource.openshift.io/device-plugin",
    },
    PipelineStage {
        name: "device-monitoring",
        label: "specialresource.openshift.io/device-monitoring",
    },
];

/// Stage declared by a workload, if it is a DaemonSet with a known stage
pub fn stage_for(workload: &ResourceObject) -> Option<&'static PipelineStage> {
    if workload.kind() != DAEMON_SET_KIND {
        return None;
    }
    let name = workload.annotation(STATE_ANNOTATION)?;
    PIPELINE_STAGES.iter().find(|stage| stage.name == name)
}

/// Rollout position of the stage whose ready label is `label`
fn stage_index(label: &str) -> Option<usize> {
    PIPELINE_STAGES.iter().position(|stage| stage.label == label)
}

/// Drives node labels for one SpecialResource during a pass
pub struct NodeStateMachine<'a> {
    client: &'a dyn ClusterClient,
    special_resource: String,
    selector: Option<String>,
    state: Option<String>,
}

impl<'a> NodeStateMachine<'a> {
    /// Create a state machine for the named SpecialResource.
    ///
    /// `state` is the stage label currently recorded in its status.
    pub fn new(
        client: &'a dyn ClusterClient,
        special_resource: impl Into<String>,
        selector: Option<&str>,
        state: Option<String>,
    ) -> Self {
        Self {
            client,
            special_resource: special_resource.into(),
            selector: selector.map(String::from),
            state,
        }
    }

    /// Stage label last recorded in the SpecialResource status
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Label every selected node with the workload's stage.
    ///
    /// Returns the stage advanced, or `None` when the workload does not take
    /// part in gating.
    ///
    /// # Errors
    ///
    /// `Conflict` when a node changed concurrently; the cache has been
    /// refreshed and a re-invocation continues with the remaining nodes.
    /// `Forbidden` and any other update failure are returned as-is.
    pub async fn advance(
        &mut self,
        cache: &mut NodeCache,
        workload: &ResourceObject,
    ) -> Result<Option<&'static PipelineStage>, Error> {
        let Some(stage) = stage_for(workload) else {
            debug!(object = %workload.identity(), "workload declares no known pipeline stage");
            return Ok(None);
        };

        let nodes: Vec<NodeView> = cache
            .get(self.client, self.selector.as_deref(), true)
            .await?
            .to_vec();

        let mut labeled = 0usize;
        for view in &nodes {
            if view.has_label(stage.label) {
                debug!(node = %view.name(), stage = stage.name, "node already at stage");
                continue;
            }

            match self
                .client
                .update_node(&view.with_label(stage.label, STATE_READY))
                .await
            {
                Ok(()) => {
                    labeled += 1;
                    info!(node = %view.name(), label = stage.label, "Labeled node ready for stage");
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        node = %view.name(),
                        stage = stage.name,
                        error = %e,
                        "Node changed concurrently, refreshing node cache"
                    );
                    let refreshed = cache.get(self.client, self.selector.as_deref(), true).await;
                    if let Err(refresh) = refreshed {
                        warn!(error = %refresh, "Failed to refresh node cache");
                        cache.invalidate();
                    }
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        if nodes.is_empty() {
            debug!(stage = stage.name, "no selected nodes, stage not recorded");
        } else {
            self.record_state(stage).await?;
        }
        info!(
            special_resource = %self.special_resource,
            stage = stage.name,
            nodes = nodes.len(),
            labeled,
            "Stage ready on selected nodes"
        );
        Ok(Some(stage))
    }

    /// Record `stage` in the status when it is further along than the
    /// recorded one. An unrecognized recorded state is overwritten.
    async fn record_state(&mut self, stage: &PipelineStage) -> Result<(), Error> {
        let recorded = self.state.as_deref().and_then(stage_index);
        if recorded.is_some_and(|index| Some(index) >= stage_index(stage.label)) {
            return Ok(());
        }
        let status = SpecialResourceStatus {
            state: Some(stage.label.to_string()),
        };
        self.client
            .patch_status(&self.special_resource, &status)
            .await?;
        self.state = status.state;
        Ok(())
    }
}
