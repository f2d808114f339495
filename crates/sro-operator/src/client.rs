//! Cluster client for the reconciliation pass
//!
//! Provides a trait-based abstraction over the Kubernetes API so the
//! reconciler and the node state machine can be tested against mocks while
//! production code talks to the API server through kube-rs. Every failure is
//! classified (NotFound, Forbidden, Conflict, Unexpected) before it leaves
//! this module.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use sro_common::crd::{SpecialResource, SpecialResourceStatus};
use sro_common::kube_utils::build_api_resource;
use sro_common::manifest::ResourceObject;
use sro_common::{Error, FIELD_MANAGER};

/// Identity of a resource: `(apiVersion, kind, namespace, name)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceKey {
    /// apiVersion, e.g. `apps/v1`
    pub api_version: String,
    /// Kind, e.g. `DaemonSet`
    pub kind: String,
    /// Namespace for namespaced kinds
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ResourceKey {
    /// Key of an existing document
    pub fn of(obj: &ResourceObject) -> Self {
        Self {
            api_version: obj.api_version().to_string(),
            kind: obj.kind().to_string(),
            namespace: obj.namespace().map(String::from),
            name: obj.name().to_string(),
        }
    }

    /// Key of a core/v1 ConfigMap
    pub fn config_map(namespace: &str, name: &str) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    /// Key of a Namespace
    pub fn namespace(name: &str) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Namespace".to_string(),
            namespace: None,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.kind,
            self.namespace.as_deref().unwrap_or_default(),
            self.name
        )
    }
}

/// Trait abstracting the cluster operations used by a reconciliation pass
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch an object; `Error::NotFound` when it does not exist
    async fn get(&self, key: &ResourceKey) -> Result<ResourceObject, Error>;

    /// Create an object
    async fn create(&self, obj: &ResourceObject) -> Result<(), Error>;

    /// Replace an object; a stale resourceVersion yields `Error::Conflict`
    async fn update(&self, obj: &ResourceObject) -> Result<(), Error>;

    /// List nodes matching a label selector expression
    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<Node>, Error>;

    /// Replace a node; a stale resourceVersion yields `Error::Conflict`
    async fn update_node(&self, node: &Node) -> Result<(), Error>;

    /// Patch the status of a SpecialResource
    async fn patch_status(&self, name: &str, status: &SpecialResourceStatus)
        -> Result<(), Error>;
}

/// Real cluster client using DynamicObject for untyped manifests
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Create a new KubeClusterClient wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, api_version: &str, kind: &str, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = build_api_resource(api_version, kind);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

fn to_dynamic(obj: &ResourceObject) -> Result<DynamicObject, Error> {
    serde_json::from_value(obj.as_value().clone())
        .map_err(|e| Error::serialization_for_kind(obj.kind(), e.to_string()))
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get(&self, key: &ResourceKey) -> Result<ResourceObject, Error> {
        let api = self.dynamic_api(&key.api_version, &key.kind, key.namespace.as_deref());
        let found = api
            .get(&key.name)
            .await
            .map_err(|e| Error::from_kube(e, "get", key.to_string()))?;
        let mut value = serde_json::to_value(found)
            .map_err(|e| Error::serialization_for_kind(&key.kind, e.to_string()))?;
        // The API may omit type metadata on single-object reads
        value["apiVersion"] = serde_json::Value::String(key.api_version.clone());
        value["kind"] = serde_json::Value::String(key.kind.clone());
        ResourceObject::from_value(value)
    }

    async fn create(&self, obj: &ResourceObject) -> Result<(), Error> {
        let api = self.dynamic_api(obj.api_version(), obj.kind(), obj.namespace());
        api.create(&PostParams::default(), &to_dynamic(obj)?)
            .await
            .map_err(|e| Error::from_kube(e, "create", obj.identity()))?;
        debug!(object = %obj.identity(), "created");
        Ok(())
    }

    async fn update(&self, obj: &ResourceObject) -> Result<(), Error> {
        let api = self.dynamic_api(obj.api_version(), obj.kind(), obj.namespace());
        api.replace(obj.name(), &PostParams::default(), &to_dynamic(obj)?)
            .await
            .map_err(|e| Error::from_kube(e, "update", obj.identity()))?;
        debug!(object = %obj.identity(), "replaced");
        Ok(())
    }

    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<Node>, Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default().labels(label_selector))
            .await
            .map_err(|e| Error::from_kube(e, "list", format!("Node//?{}", label_selector)))?;
        Ok(list.items)
    }

    async fn update_node(&self, node: &Node) -> Result<(), Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        let name = node.name_any();
        api.replace(&name, &PostParams::default(), node)
            .await
            .map_err(|e| Error::from_kube(e, "update", format!("Node//{}", name)))?;
        Ok(())
    }

    async fn patch_status(
        &self,
        name: &str,
        status: &SpecialResourceStatus,
    ) -> Result<(), Error> {
        let api: Api<SpecialResource> = Api::all(self.client.clone());
        let patch = serde_json::json!({ "status": status });
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::from_kube(e, "patch-status", format!("SpecialResource//{}", name)))?;
        Ok(())
    }
}
