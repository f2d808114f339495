//! Runtime facts about the target environment
//!
//! A snapshot taken once per reconciliation pass and used only as template
//! input. Field names are the template variable names, e.g.
//! `${KernelFullVersion}` or `${Values.driverVersion}`.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use serde::Serialize;

use crate::crd::SpecialResource;

/// Node Feature Discovery label carrying the OS id (e.g. `rhcos`)
pub const NFD_OS_ID: &str = "feature.node.kubernetes.io/system-os_release.ID";
/// NFD label carrying the full OS version (e.g. `4.6`)
pub const NFD_OS_VERSION: &str = "feature.node.kubernetes.io/system-os_release.VERSION_ID";
/// NFD label carrying the OS major version (e.g. `4`)
pub const NFD_OS_VERSION_MAJOR: &str =
    "feature.node.kubernetes.io/system-os_release.VERSION_ID.major";
/// NFD label carrying the full kernel version
pub const NFD_KERNEL_FULL: &str = "feature.node.kubernetes.io/kernel-version.full";

/// Template input for one reconciliation pass
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimeInfo {
    /// OS id of the selected nodes
    pub operating_system: String,
    /// OS major version
    pub operating_system_major: String,
    /// OS major.minor version
    pub operating_system_major_minor: String,
    /// Full kernel version of the selected nodes
    pub kernel_full_version: String,
    /// Kubelet version reported by the selected nodes
    pub cluster_version: String,
    /// Vendor whose pre-built images are trusted
    pub update_vendor: String,
    /// Node selector label key in effect
    pub node_selector: String,
    /// Namespace the stage manifests are applied in
    pub namespace: String,
    /// Name of the SpecialResource being reconciled
    pub special_resource_name: String,
    /// Free-form values from the SpecialResource
    pub values: BTreeMap<String, String>,
}

impl RuntimeInfo {
    /// Collect runtime facts for a pass.
    ///
    /// Node facts come from the first selected node's NFD labels and kubelet
    /// version; absent labels leave the field empty.
    pub fn collect(special_resource: &SpecialResource, nodes: &[Node], node_selector: &str) -> Self {
        let labels = nodes.first().map(|n| n.labels());
        let label = |key: &str| {
            labels
                .and_then(|l| l.get(key))
                .cloned()
                .unwrap_or_default()
        };
        let cluster_version = nodes
            .first()
            .and_then(|n| n.status.as_ref())
            .and_then(|s| s.node_info.as_ref())
            .map(|i| i.kubelet_version.clone())
            .unwrap_or_default();

        Self {
            operating_system: label(NFD_OS_ID),
            operating_system_major: label(NFD_OS_VERSION_MAJOR),
            operating_system_major_minor: label(NFD_OS_VERSION),
            kernel_full_version: label(NFD_KERNEL_FULL),
            cluster_version,
            update_vendor: special_resource.spec.update_vendor.clone().unwrap_or_default(),
            node_selector: node_selector.to_string(),
            namespace: special_resource.target_namespace(),
            special_resource_name: special_resource.name_any(),
            values: special_resource.spec.configuration.clone(),
        }
    }
}
