//! Idempotent resource reconciler
//!
//! Applies one document against the cluster: create when absent, leave alone
//! when the kind is never updated, otherwise update after carrying forward
//! the fields the merge-policy table names. Conflicts are surfaced to the
//! caller unchanged; nothing is retried here.

mod merge_policy;

pub use merge_policy::{merge_policy, MergePolicy, CLUSTER_IP_PATH};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use tracing::{debug, info};

use sro_common::manifest::ResourceObject;
use sro_common::Error;

use crate::client::{ClusterClient, ResourceKey};

/// Kinds that never receive an owner reference
const UNOWNED_KINDS: &[&str] = &["Namespace"];

/// What `apply` did to the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The object did not exist and was created
    Created,
    /// The object existed and was replaced
    Updated,
    /// The object existed and its kind is never updated
    Unchanged,
}

/// Applies documents on behalf of one owning SpecialResource
pub struct Reconciler<'a> {
    client: &'a dyn ClusterClient,
    owner: OwnerReference,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler injecting `owner` into every applied object
    pub fn new(client: &'a dyn ClusterClient, owner: OwnerReference) -> Self {
        Self { client, owner }
    }

    /// Apply `obj` to the cluster.
    ///
    /// # Errors
    ///
    /// `Forbidden` when the operator may not read the object, `Conflict` when
    /// the update raced another writer, `Unexpected` for any other API
    /// failure.
    pub async fn apply(&self, mut obj: ResourceObject) -> Result<ApplyOutcome, Error> {
        if !UNOWNED_KINDS.contains(&obj.kind()) {
            obj.set_controller_reference(self.owner.clone())?;
        }

        let key = ResourceKey::of(&obj);
        let existing = match self.client.get(&key).await {
            Ok(existing) => existing,
            Err(e) if e.is_not_found() => {
                self.client.create(&obj).await?;
                info!(
                    kind = %key.kind,
                    namespace = key.namespace.as_deref().unwrap_or_default(),
                    name = %key.name,
                    "Created resource"
                );
                return Ok(ApplyOutcome::Created);
            }
            // API failures arrive classified; transport failures stay `Kube`
            // so the controller retries them.
            Err(e) => return Err(e),
        };

        let policy = merge_policy(obj.kind());
        if !policy.update {
            debug!(
                kind = %key.kind,
                namespace = key.namespace.as_deref().unwrap_or_default(),
                name = %key.name,
                "Resource exists and its kind is never updated"
            );
            return Ok(ApplyOutcome::Unchanged);
        }

        policy.merge(&mut obj, &existing)?;
        self.client.update(&obj).await?;
        info!(
            kind = %key.kind,
            namespace = key.namespace.as_deref().unwrap_or_default(),
            name = %key.name,
            resource_version = existing.resource_version().unwrap_or_default(),
            "Updated resource"
        );
        Ok(ApplyOutcome::Updated)
    }
}
