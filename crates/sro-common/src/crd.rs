//! SpecialResource custom resource definition
//!
//! A SpecialResource is the parent configuration object: it names the
//! hardware configuration to reconcile, the namespace the stage manifests run
//! in, and the nodes that take part in readiness gating. Every object applied
//! on its behalf carries an owner reference back to it.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Placement of the objects created for a SpecialResource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecialResourceMetadata {
    /// Namespace the stage manifests are applied in (defaults to the resource name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Node selection for readiness gating
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelectorSpec {
    /// Label key selecting target nodes; the value is always `"true"`.
    /// When empty, worker nodes are selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// Specification for a SpecialResource
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "sro.openshift.io",
    version = "v1alpha1",
    kind = "SpecialResource",
    plural = "specialresources",
    shortname = "sr",
    status = "SpecialResourceStatus",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SpecialResourceSpec {
    /// Placement of created objects
    #[serde(default)]
    pub metadata: SpecialResourceMetadata,

    /// Nodes taking part in readiness gating
    #[serde(default)]
    pub node: NodeSelectorSpec,

    /// Vendor whose pre-built driver images are trusted without building
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_vendor: Option<String>,

    /// Free-form values available to manifest templates as `Values.<key>`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: BTreeMap<String, String>,
}

/// Observed state of a SpecialResource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecialResourceStatus {
    /// Label key of the last pipeline stage reached on the selected nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl SpecialResource {
    /// Namespace the stage manifests run in.
    ///
    /// `spec.metadata.namespace` when set, otherwise the resource's own name.
    pub fn target_namespace(&self) -> String {
        self.spec
            .metadata
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| self.name_any())
    }

    /// Label key selecting target nodes, if one is configured
    pub fn node_selector(&self) -> Option<&str> {
        self.spec
            .node
            .selector
            .as_deref()
            .filter(|s| !s.is_empty())
    }

    /// Owner reference marking this resource as controller of applied objects
    pub fn owner_reference(&self) -> Result<OwnerReference, Error> {
        let owner = Resource::controller_owner_ref(self, &()).ok_or_else(|| {
            Error::validation_for(
                self.name_any(),
                "SpecialResource has no uid, cannot own applied objects",
            )
        })?;
        Ok(OwnerReference {
            block_owner_deletion: Some(true),
            ..owner
        })
    }
}
