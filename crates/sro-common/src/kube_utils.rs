//! Shared Kubernetes utilities using kube-rs
//!
//! Manifests arrive as untyped documents, so API access goes through
//! `DynamicObject` with an `ApiResource` built from the document's
//! apiVersion and kind.

use std::path::Path;
use std::time::Duration;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path.
///
/// Without a path the configuration is inferred (in-cluster service account,
/// then `KUBECONFIG`/`~/.kube/config`).
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::asset(
                    path.display().to_string(),
                    format!("failed to read kubeconfig: {}", e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::asset(
                        path.display().to_string(),
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::asset("<inferred>", format!("failed to infer kube config: {}", e))
        })?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    Client::try_from(config).map_err(Error::from)
}

/// Build an ApiResource from a manifest's apiVersion and kind.
///
/// The version is used exactly as written in the manifest.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Parse apiVersion into (group, version)
///
/// # Examples
/// ```
/// use sro_common::kube_utils::parse_api_version;
///
/// let (group, version) = parse_api_version("apps/v1");
/// assert_eq!(group, "apps");
/// assert_eq!(version, "v1");
///
/// let (group, version) = parse_api_version("v1");
/// assert_eq!(group, "");
/// assert_eq!(version, "v1");
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Kinds whose plural is not derivable by the simple rules below
const KIND_PLURALS: &[(&str, &str)] = &[
    ("securitycontextconstraints", "securitycontextconstraints"),
    ("prometheusrule", "prometheusrules"),
    ("imagestream", "imagestreams"),
    ("ingress", "ingresses"),
    ("networkpolicy", "networkpolicies"),
    ("podsecuritypolicy", "podsecuritypolicies"),
    ("priorityclass", "priorityclasses"),
    ("storageclass", "storageclasses"),
    ("runtimeclass", "runtimeclasses"),
    ("endpoints", "endpoints"),
];

/// Pluralize a Kubernetes resource kind
///
/// Uses a lookup table for irregular kinds, falling back to simple
/// pluralization rules.
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();

    if let Some((_, plural)) = KIND_PLURALS.iter().find(|(singular, _)| *singular == lower) {
        return (*plural).to_string();
    }

    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Cluster-scoped kinds that may appear in stage manifests
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "Namespace",
    "Node",
    "ClusterRole",
    "ClusterRoleBinding",
    "SecurityContextConstraints",
    "CustomResourceDefinition",
    "PriorityClass",
    "StorageClass",
    "PersistentVolume",
    "RuntimeClass",
    "MutatingWebhookConfiguration",
    "ValidatingWebhookConfiguration",
    "SpecialResource",
];

/// Whether a kind is cluster-scoped (must not carry a namespace)
pub fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_api_resource_core_group() {
        let ar = build_api_resource("v1", "ServiceAccount");
        assert_eq!(ar.group, "");
        assert_eq!(ar.version, "v1");
        assert_eq!(ar.plural, "serviceaccounts");
    }

    #[test]
    fn test_build_api_resource_named_group() {
        let ar = build_api_resource("security.openshift.io/v1", "SecurityContextConstraints");
        assert_eq!(ar.group, "security.openshift.io");
        assert_eq!(ar.version, "v1");
        assert_eq!(ar.plural, "securitycontextconstraints");
    }

    #[test]
    fn test_pluralize_kind() {
        assert_eq!(pluralize_kind("DaemonSet"), "daemonsets");
        assert_eq!(pluralize_kind("BuildConfig"), "buildconfigs");
        assert_eq!(pluralize_kind("ImageStream"), "imagestreams");
        assert_eq!(pluralize_kind("PrometheusRule"), "prometheusrules");
        assert_eq!(pluralize_kind("ServiceMonitor"), "servicemonitors");
        assert_eq!(pluralize_kind("ClusterRoleBinding"), "clusterrolebindings");
        assert_eq!(pluralize_kind("NetworkPolicy"), "networkpolicies");
        assert_eq!(pluralize_kind("Route"), "routes");
        assert_eq!(pluralize_kind("Ingress"), "ingresses");
    }

    #[test]
    fn test_cluster_scope() {
        assert!(is_cluster_scoped("Namespace"));
        assert!(is_cluster_scoped("SecurityContextConstraints"));
        assert!(is_cluster_scoped("ClusterRole"));
        assert!(!is_cluster_scoped("DaemonSet"));
        assert!(!is_cluster_scoped("Service"));
    }
}
