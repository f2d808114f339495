//! Per-kind merge policy for updates
//!
//! A declarative table consulted by the reconciler when an object already
//! exists: whether the kind may be updated at all, and which fields of the
//! existing object must be carried into the desired object before the
//! update is submitted.

use tracing::debug;

use sro_common::manifest::{FieldPath, ResourceObject, RESOURCE_VERSION_PATH};
use sro_common::Error;

/// Path of a Service's cluster-assigned virtual IP
pub const CLUSTER_IP_PATH: FieldPath = &["spec", "clusterIP"];

/// How an existing object of a kind is updated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergePolicy {
    /// Whether a found object is updated at all
    pub update: bool,
    /// Fields copied from the existing object into the desired object
    pub carry_forward: &'static [FieldPath],
}

/// Plain update: the desired object replaces the existing one
pub const REPLACE: MergePolicy = MergePolicy {
    update: true,
    carry_forward: &[],
};

/// Found objects are left untouched
pub const NO_UPDATE: MergePolicy = MergePolicy {
    update: false,
    carry_forward: &[],
};

/// Update guarded by the existing concurrency token
pub const CARRY_RESOURCE_VERSION: MergePolicy = MergePolicy {
    update: true,
    carry_forward: &[RESOURCE_VERSION_PATH],
};

/// Update guarded by the concurrency token, keeping the allocated virtual IP
pub const CARRY_RESOURCE_VERSION_AND_CLUSTER_IP: MergePolicy = MergePolicy {
    update: true,
    carry_forward: &[RESOURCE_VERSION_PATH, CLUSTER_IP_PATH],
};

/// Kinds with a policy other than [`REPLACE`]
const MERGE_POLICIES: &[(&str, MergePolicy)] = &[
    // Pods only accept changes to a handful of fields; ServiceAccounts
    // accumulate token secrets that a blind overwrite drops.
    ("Pod", NO_UPDATE),
    ("ServiceAccount", NO_UPDATE),
    ("SecurityContextConstraints", CARRY_RESOURCE_VERSION),
    ("Service", CARRY_RESOURCE_VERSION_AND_CLUSTER_IP),
    ("ServiceMonitor", CARRY_RESOURCE_VERSION),
    ("Route", CARRY_RESOURCE_VERSION),
    ("BuildConfig", CARRY_RESOURCE_VERSION),
    ("ImageStream", CARRY_RESOURCE_VERSION),
    ("PrometheusRule", CARRY_RESOURCE_VERSION),
];

/// Merge policy for a kind
pub fn merge_policy(kind: &str) -> MergePolicy {
    MERGE_POLICIES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, policy)| *policy)
        .unwrap_or(REPLACE)
}

impl MergePolicy {
    /// Copy the carried fields from `existing` into `desired`.
    ///
    /// A carried field absent from the existing object is left as the desired
    /// object has it.
    pub fn merge(&self, desired: &mut ResourceObject, existing: &ResourceObject) -> Result<(), Error> {
        for path in self.carry_forward {
            match existing.nested(path) {
                Some(value) if !value.is_null() => {
                    desired.set_nested(path, value.clone())?;
                }
                _ => {
                    debug!(
                        object = %existing.identity(),
                        field = %path.join("."),
                        "carried field absent on existing object"
                    );
                }
            }
        }
        Ok(())
    }
}
