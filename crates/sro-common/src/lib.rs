//! Common types for the special resource operator: CRD, errors, manifest
//! documents, templating and kube helpers

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod manifest;
pub mod runtime;
pub mod template;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Annotation on build definitions naming the vendor of a pre-built image
pub const DRIVER_CONTAINER_VENDOR_ANNOTATION: &str =
    "specialresource.openshift.io/driver-container-vendor";

/// Annotation on DaemonSets naming the pipeline stage they belong to
pub const STATE_ANNOTATION: &str = "specialresource.openshift.io/state";

/// Label value set on nodes that reached a pipeline stage
pub const STATE_READY: &str = "ready";

/// Default node selector label when the SpecialResource names none
pub const DEFAULT_WORKER_LABEL: &str = "node-role.kubernetes.io/worker";

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "special-resource-operator";
