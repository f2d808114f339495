//! Stage pipeline for one reconciliation pass
//!
//! Stages are applied in sorted order and documents in stream order, one at
//! a time: split, render, parse, scope, build gate, reconcile, and for
//! DaemonSets, node gating. The first error ends the pass.

use tracing::{debug, info, instrument};

use sro_common::kube_utils::is_cluster_scoped;
use sro_common::manifest::{split, ResourceObject};
use sro_common::runtime::RuntimeInfo;
use sro_common::template::TemplateEngine;
use sro_common::yaml::parse_yaml;
use sro_common::Error;

use crate::build_gate::should_build;
use crate::client::{ClusterClient, ResourceKey};
use crate::node_cache::NodeCache;
use crate::node_state::{NodeStateMachine, DAEMON_SET_KIND};
use crate::reconciler::{ApplyOutcome, Reconciler};
use crate::resolver::HardwareConfiguration;

/// Counts of what a pass did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Stages processed, in order
    pub stages: Vec<String>,
    /// Objects created
    pub created: usize,
    /// Objects replaced
    pub updated: usize,
    /// Objects found and left untouched
    pub unchanged: usize,
    /// Build definitions skipped for a trusted vendor image
    pub skipped: usize,
    /// Pipeline stages advanced on the selected nodes
    pub advanced: usize,
}

impl PassSummary {
    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Created => self.created += 1,
            ApplyOutcome::Updated => self.updated += 1,
            ApplyOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Create the pass namespace if it does not exist yet.
///
/// An existing namespace is never updated.
pub async fn ensure_namespace(client: &dyn ClusterClient, namespace: &str) -> Result<(), Error> {
    match client.get(&ResourceKey::namespace(namespace)).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => {
            client
                .create(&ResourceObject::new("v1", "Namespace", None, namespace))
                .await?;
            info!(namespace = %namespace, "Created namespace");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Applies a hardware configuration's stages for one pass
pub struct StagePipeline<'a> {
    engine: TemplateEngine,
    runtime: &'a RuntimeInfo,
    namespace: String,
    reconciler: Reconciler<'a>,
    states: NodeStateMachine<'a>,
}

impl<'a> StagePipeline<'a> {
    /// Create a pipeline applying into `namespace`
    pub fn new(
        runtime: &'a RuntimeInfo,
        namespace: impl Into<String>,
        reconciler: Reconciler<'a>,
        states: NodeStateMachine<'a>,
    ) -> Self {
        Self {
            engine: TemplateEngine::new(),
            runtime,
            namespace: namespace.into(),
            reconciler,
            states,
        }
    }

    /// Apply every stage of `config` in sorted order
    #[instrument(skip_all, fields(config = %config.name()))]
    pub async fn run(
        &mut self,
        config: &HardwareConfiguration,
        cache: &mut NodeCache,
    ) -> Result<PassSummary, Error> {
        let mut summary = PassSummary::default();
        for (stage, manifest) in config.stages() {
            debug!(stage = %stage, "Applying stage");
            self.apply_stage(stage, manifest, cache, &mut summary).await?;
            summary.stages.push(stage.to_string());
        }
        Ok(summary)
    }

    async fn apply_stage(
        &mut self,
        stage: &str,
        manifest: &str,
        cache: &mut NodeCache,
        summary: &mut PassSummary,
    ) -> Result<(), Error> {
        for document in split(manifest) {
            let context = format!("{}[{}]", stage, document.index);
            let Some(obj) = self.prepare(&context, document.text)? else {
                debug!(document = %context, "Skipping empty document");
                continue;
            };

            // A trusted vendor image skips this build definition only; the
            // rest of the stage still applies.
            if !should_build(&obj, self.runtime)? {
                summary.skipped += 1;
                continue;
            }

            let workload = (obj.kind() == DAEMON_SET_KIND).then(|| obj.clone());
            summary.record(self.reconciler.apply(obj).await?);

            if let Some(workload) = workload {
                if self.states.advance(cache, &workload).await?.is_some() {
                    summary.advanced += 1;
                }
            }
        }
        Ok(())
    }

    /// Render and parse one document, scoped to the pass namespace.
    ///
    /// `None` for documents that parse to nothing (comments only).
    fn prepare(&self, context: &str, text: &str) -> Result<Option<ResourceObject>, Error> {
        let rendered = self
            .engine
            .render(text, self.runtime)
            .map_err(|e| Error::template(context, e.to_string()))?;

        let value = parse_yaml(&rendered)
            .map_err(|e| Error::serialization(format!("{}: {}", context, e)))?;
        if value.is_null() {
            return Ok(None);
        }

        let mut obj = ResourceObject::from_value(value)
            .map_err(|e| Error::serialization(format!("{}: {}", context, e)))?;
        if is_cluster_scoped(obj.kind()) {
            obj.set_namespace(None);
        } else {
            obj.set_namespace(Some(&self.namespace));
        }
        Ok(Some(obj))
    }
}
