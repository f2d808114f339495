//! Hardware configuration resolution
//!
//! A SpecialResource's stage manifests come from a ConfigMap named after it
//! in the target namespace. When no such ConfigMap exists the manifests are
//! read from the local recipes tree instead, so a configuration can be
//! overridden in-cluster or developed on disk without code changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use sro_common::manifest::ResourceObject;
use sro_common::Error;

use crate::client::{ClusterClient, ResourceKey};

/// File extensions treated as stage manifests in the local tree
const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Stage name to raw multi-document manifest text
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HardwareConfiguration {
    name: String,
    stages: BTreeMap<String, String>,
}

impl HardwareConfiguration {
    /// Build a configuration from stage entries
    pub fn new(
        name: impl Into<String>,
        stages: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            name: name.into(),
            stages: stages.into_iter().collect(),
        }
    }

    /// Read the stages from a ConfigMap's `data`.
    ///
    /// # Errors
    ///
    /// `Serialization` when a data value is not a string.
    pub fn from_config_map(config_map: &ResourceObject) -> Result<Self, Error> {
        let mut stages = BTreeMap::new();
        if let Some(data) = config_map.nested(&["data"]).and_then(|d| d.as_object()) {
            for (stage, manifest) in data {
                let manifest = manifest.as_str().ok_or_else(|| {
                    Error::serialization_for_kind(
                        "ConfigMap",
                        format!(
                            "{}: stage {} is not a string",
                            config_map.identity(),
                            stage
                        ),
                    )
                })?;
                stages.insert(stage.clone(), manifest.to_string());
            }
        }
        Ok(Self {
            name: config_map.name().to_string(),
            stages,
        })
    }

    /// Read the stages from `<recipes_dir>/<name>/manifests`, one stage per
    /// manifest file, named by file name.
    ///
    /// # Errors
    ///
    /// `Asset` when the directory or one of its manifest files cannot be read.
    pub fn load_local(recipes_dir: &Path, name: &str) -> Result<Self, Error> {
        let dir = local_manifest_dir(recipes_dir, name);
        let entries = std::fs::read_dir(&dir).map_err(|e| {
            Error::asset(
                dir.display().to_string(),
                format!("failed to read manifest dir: {}", e),
            )
        })?;

        let mut stages = BTreeMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !is_manifest_file(&path) {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::asset(path.display().to_string(), format!("failed to read: {}", e))
            })?;
            stages.insert(entry.file_name().to_string_lossy().to_string(), content);
        }

        Ok(Self {
            name: name.to_string(),
            stages,
        })
    }

    /// Name of the configuration
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stages in lexicographic order of their names
    pub fn stages(&self) -> impl Iterator<Item = (&str, &str)> {
        self.stages.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Stage names in processing order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.keys().map(String::as_str).collect()
    }

    /// Whether there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Local fallback directory for a configuration
pub fn local_manifest_dir(recipes_dir: &Path, name: &str) -> PathBuf {
    recipes_dir.join(name).join("manifests")
}

fn is_manifest_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
}

/// Resolve the hardware configuration `name` for `namespace`.
///
/// # Errors
///
/// Any ConfigMap read failure other than NotFound, or a failure reading the
/// local fallback.
pub async fn resolve(
    client: &dyn ClusterClient,
    namespace: &str,
    name: &str,
    recipes_dir: &Path,
) -> Result<HardwareConfiguration, Error> {
    match client.get(&ResourceKey::config_map(namespace, name)).await {
        Ok(config_map) => {
            let config = HardwareConfiguration::from_config_map(&config_map)?;
            info!(
                namespace = %namespace,
                name = %name,
                stages = config.stages.len(),
                "Using hardware configuration ConfigMap"
            );
            Ok(config)
        }
        Err(e) if e.is_not_found() => {
            let dir = local_manifest_dir(recipes_dir, name);
            info!(
                namespace = %namespace,
                name = %name,
                dir = %dir.display(),
                "Hardware configuration ConfigMap not found, using local recipes"
            );
            HardwareConfiguration::load_local(recipes_dir, name)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClusterClient;
    use serde_json::json;

    fn recipes(files: &[(&str, &str)]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let dir = local_manifest_dir(root.path(), "nvidia-gpu");
        std::fs::create_dir_all(&dir).unwrap();
        for (name, content) in files {
            std::fs::write(dir.join(name), content).unwrap();
        }
        root
    }

    #[test]
    fn test_stages_are_sorted() {
        let config = HardwareConfiguration::new(
            "nvidia-gpu",
            [
                ("b-stage".to_string(), "b".to_string()),
                ("a-stage".to_string(), "a".to_string()),
            ],
        );
        assert_eq!(config.stage_names(), vec!["a-stage", "b-stage"]);
    }

    #[test]
    fn test_from_config_map() {
        let cm = ResourceObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "nvidia-gpu", "namespace": "gpu" },
            "data": {
                "1-runtime": "kind: DaemonSet",
                "0-driver": "kind: BuildConfig"
            }
        }))
        .unwrap();
        let config = HardwareConfiguration::from_config_map(&cm).unwrap();
        assert_eq!(config.name(), "nvidia-gpu");
        assert_eq!(config.stage_names(), vec!["0-driver", "1-runtime"]);
    }

    #[test]
    fn test_from_config_map_rejects_non_string_stage() {
        let cm = ResourceObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "nvidia-gpu", "namespace": "gpu" },
            "data": { "0-driver": 3 }
        }))
        .unwrap();
        let err = HardwareConfiguration::from_config_map(&cm).unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn test_load_local_reads_manifest_files_only() {
        let root = recipes(&[
            ("0000-state-driver.yaml", "kind: DaemonSet"),
            ("0001-state-runtime.json", "{}"),
            ("README.md", "docs"),
        ]);
        let config = HardwareConfiguration::load_local(root.path(), "nvidia-gpu").unwrap();
        assert_eq!(
            config.stage_names(),
            vec!["0000-state-driver.yaml", "0001-state-runtime.json"]
        );
    }

    #[test]
    fn test_load_local_missing_dir_is_asset_error() {
        let root = tempfile::tempdir().unwrap();
        let err = HardwareConfiguration::load_local(root.path(), "absent").unwrap_err();
        assert!(matches!(err, Error::Asset { .. }));
    }

    /// Story: without a ConfigMap the local recipes are used
    #[tokio::test]
    async fn story_missing_config_map_falls_back_to_local() {
        let root = recipes(&[("0000-state-driver.yaml", "kind: DaemonSet")]);
        let mut mock = MockClusterClient::new();
        mock.expect_get()
            .returning(|key| Err(Error::not_found("get", key.to_string())));

        let config = resolve(&mock, "gpu", "nvidia-gpu", root.path())
            .await
            .unwrap();
        assert_eq!(config.stage_names(), vec!["0000-state-driver.yaml"]);
    }

    #[tokio::test]
    async fn test_config_map_takes_precedence() {
        let root = recipes(&[("0000-state-driver.yaml", "kind: DaemonSet")]);
        let mut mock = MockClusterClient::new();
        mock.expect_get().returning(|key| {
            assert_eq!(key.to_string(), "ConfigMap/gpu/nvidia-gpu");
            Ok(ResourceObject::from_value(json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": { "name": "nvidia-gpu", "namespace": "gpu" },
                "data": { "override": "kind: Pod" }
            }))
            .unwrap())
        });

        let config = resolve(&mock, "gpu", "nvidia-gpu", root.path())
            .await
            .unwrap();
        assert_eq!(config.stage_names(), vec!["override"]);
    }

    #[tokio::test]
    async fn test_other_fetch_errors_are_fatal() {
        let root = recipes(&[("0000-state-driver.yaml", "kind: DaemonSet")]);
        let mut mock = MockClusterClient::new();
        mock.expect_get()
            .returning(|key| Err(Error::forbidden("get", key.to_string(), "denied")));

        let err = resolve(&mock, "gpu", "nvidia-gpu", root.path())
            .await
            .unwrap_err();
        assert!(err.is_forbidden());
    }
}
