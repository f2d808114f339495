//! Memoized view of the selected node set
//!
//! A cheap, best-effort cache: it carries no timestamps or versions. A cached
//! list is reused while the recorded node count still matches the cached
//! items and the selector is unchanged; a forced refresh or an invalidation
//! goes back to the API server. Readiness decisions always force a refresh.
//!
//! The cache is owned by the controller context and handed to each pass by
//! mutable reference, so passes never share it concurrently.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use tracing::debug;

use sro_common::{Error, DEFAULT_WORKER_LABEL};

use crate::client::ClusterClient;

/// Label selector expression for the configured selector key.
///
/// A configured key must carry the value `"true"`; without one, worker nodes
/// are selected.
pub fn label_selector(selector: Option<&str>) -> String {
    match selector.filter(|s| !s.is_empty()) {
        Some(key) => format!("{}=true", key),
        None => format!("{}=", DEFAULT_WORKER_LABEL),
    }
}

/// A cached node: identity plus label set
#[derive(Clone, Debug, PartialEq)]
pub struct NodeView {
    node: Node,
}

impl NodeView {
    /// Wrap a node returned by the API server
    pub fn new(node: Node) -> Self {
        Self { node }
    }

    /// Node name
    pub fn name(&self) -> String {
        self.node.name_any()
    }

    /// Node labels
    pub fn labels(&self) -> &BTreeMap<String, String> {
        self.node.labels()
    }

    /// Whether the node carries `key`, whatever its value
    pub fn has_label(&self, key: &str) -> bool {
        self.labels().contains_key(key)
    }

    /// A copy of the node with `key=value` set, keeping its resourceVersion
    pub fn with_label(&self, key: &str, value: &str) -> Node {
        let mut updated = self.node.clone();
        updated
            .labels_mut()
            .insert(key.to_string(), value.to_string());
        updated
    }

    /// The underlying node object
    pub fn node(&self) -> &Node {
        &self.node
    }
}

/// Cached node list for one selector
#[derive(Debug, Default)]
pub struct NodeCache {
    selector: Option<String>,
    nodes: Vec<NodeView>,
    observed_count: Option<usize>,
}

impl NodeCache {
    /// Create an empty cache; the first `get` always lists
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes matching `selector`, listing them when the cache is not usable.
    ///
    /// # Errors
    ///
    /// A failed list is returned as-is; the cache is left invalidated.
    pub async fn get(
        &mut self,
        client: &dyn ClusterClient,
        selector: Option<&str>,
        force: bool,
    ) -> Result<&[NodeView], Error> {
        let label_selector = label_selector(selector);

        // The default worker selector is reused like any other; every
        // readiness decision forces a refresh regardless.
        let reusable = !force
            && self.selector.as_deref() == Some(label_selector.as_str())
            && self.observed_count == Some(self.nodes.len());
        if reusable {
            debug!(selector = %label_selector, count = self.nodes.len(), "using cached nodes");
            return Ok(&self.nodes);
        }

        self.invalidate();
        let nodes = client.list_nodes(&label_selector).await?;
        self.nodes = nodes.into_iter().map(NodeView::new).collect();
        self.observed_count = Some(self.nodes.len());
        self.selector = Some(label_selector);
        debug!(
            selector = ?self.selector,
            count = self.nodes.len(),
            force,
            "cached nodes"
        );
        Ok(&self.nodes)
    }

    /// Drop the recorded count so the next `get` lists again
    pub fn invalidate(&mut self) {
        self.observed_count = None;
    }

    /// Currently cached nodes, possibly stale
    pub fn nodes(&self) -> &[NodeView] {
        &self.nodes
    }
}
