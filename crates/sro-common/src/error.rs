//! Error types for the special resource operator
//!
//! Errors are classified so the controller can decide between retrying at the
//! next scheduling opportunity and waiting for the configuration to change.
//! Almost nothing is recovered locally: cluster API failures are mapped to a
//! precise kind and surfaced with the verb and object they concern.

use thiserror::Error;

/// Main error type for operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// The object does not exist (triggers create in the reconciler)
    #[error("{verb} {object}: not found")]
    NotFound {
        /// API verb that was attempted (get, update, ...)
        verb: String,
        /// Object identity as `kind/namespace/name`
        object: String,
    },

    /// The operator lacks RBAC permission for the operation
    #[error("{verb} {object}: forbidden, check Role, ClusterRole and Bindings for the operator: {message}")]
    Forbidden {
        /// API verb that was attempted
        verb: String,
        /// Object identity as `kind/namespace/name`
        object: String,
        /// Message returned by the API server
        message: String,
    },

    /// Optimistic concurrency failure: another writer changed the object
    #[error("{verb} {object}: conflict: {message}")]
    Conflict {
        /// API verb that was attempted
        verb: String,
        /// Object identity as `kind/namespace/name`
        object: String,
        /// Message returned by the API server
        message: String,
    },

    /// Template substitution failed for a manifest document
    #[error("template error in {document}: {message}")]
    Template {
        /// Document context (stage and index within the stage)
        document: String,
        /// Description of what failed
        message: String,
    },

    /// A build definition names a vendor different from the expected update vendor
    #[error("build {object}: vendor '{vendor}' does not match update vendor '{expected}'")]
    VendorMismatch {
        /// Object identity as `kind/namespace/name`
        object: String,
        /// Vendor found in the annotation
        vendor: String,
        /// Expected update vendor from the runtime facts
        expected: String,
    },

    /// A build definition carries no vendor annotation at all
    #[error("build {object}: missing driver-container vendor annotation")]
    MissingVendorAnnotation {
        /// Object identity as `kind/namespace/name`
        object: String,
    },

    /// Any other API failure, wrapped with operation context
    #[error("{verb} {object}: unexpected error: {message}")]
    Unexpected {
        /// API verb that was attempted
        verb: String,
        /// Object identity as `kind/namespace/name`
        object: String,
        /// Description of what failed
        message: String,
    },

    /// Transport-level Kubernetes client error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Invalid configuration object
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Name of the SpecialResource with invalid configuration
        resource: String,
        /// Description of what's invalid
        message: String,
    },

    /// Reading the local manifest fallback failed
    #[error("asset error [{path}]: {message}")]
    Asset {
        /// Path being read
        path: String,
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Classify a kube client error for the given verb and object identity.
    ///
    /// API responses map by status code: 404 NotFound, 403 Forbidden,
    /// 409 Conflict, anything else Unexpected. Transport failures stay `Kube`.
    pub fn from_kube(err: kube::Error, verb: &str, object: impl Into<String>) -> Self {
        let object = object.into();
        match err {
            kube::Error::Api(ae) => match ae.code {
                404 => Self::NotFound {
                    verb: verb.to_string(),
                    object,
                },
                403 => Self::Forbidden {
                    verb: verb.to_string(),
                    object,
                    message: ae.message,
                },
                409 => Self::Conflict {
                    verb: verb.to_string(),
                    object,
                    message: ae.message,
                },
                _ => Self::Unexpected {
                    verb: verb.to_string(),
                    object,
                    message: format!("{} ({})", ae.message, ae.code),
                },
            },
            other => Self::Kube { source: other },
        }
    }

    /// Create a not-found error
    pub fn not_found(verb: impl Into<String>, object: impl Into<String>) -> Self {
        Self::NotFound {
            verb: verb.into(),
            object: object.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(
        verb: impl Into<String>,
        object: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Forbidden {
            verb: verb.into(),
            object: object.into(),
            message: msg.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(
        verb: impl Into<String>,
        object: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            verb: verb.into(),
            object: object.into(),
            message: msg.into(),
        }
    }

    /// Create an unexpected error wrapped with operation context
    pub fn unexpected(
        verb: impl Into<String>,
        object: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Unexpected {
            verb: verb.into(),
            object: object.into(),
            message: msg.into(),
        }
    }

    /// Create a template error for the given document
    pub fn template(document: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Template {
            document: document.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a validation error for a SpecialResource
    pub fn validation_for(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create an asset loading error
    pub fn asset(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Asset {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Whether this error is a NotFound classification
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether this error is a Forbidden classification
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden { .. })
    }

    /// Whether this error is a Conflict classification
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Check if this error is retryable
    ///
    /// Conflicts are re-driven by the controller at the next scheduling
    /// opportunity, as are transport failures. Everything else needs a
    /// change to RBAC, manifests, or the SpecialResource to make progress.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Conflict { .. } => true,
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::NotFound { .. }
            | Error::Forbidden { .. }
            | Error::Template { .. }
            | Error::VendorMismatch { .. }
            | Error::MissingVendorAnnotation { .. }
            | Error::Unexpected { .. }
            | Error::Serialization { .. }
            | Error::Validation { .. }
            | Error::Asset { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("status {}", code),
            reason: String::new(),
            code,
        })
    }

    /// Story: API status codes map onto the reconciler's error kinds
    #[test]
    fn story_kube_errors_are_classified_by_status() {
        let err = Error::from_kube(api_error(404), "get", "ConfigMap/ns/x");
        assert!(err.is_not_found());

        let err = Error::from_kube(api_error(403), "get", "ConfigMap/ns/x");
        assert!(err.is_forbidden());
        assert!(err.to_string().contains("ClusterRole"));

        let err = Error::from_kube(api_error(409), "update", "Node//worker-0");
        assert!(err.is_conflict());
        assert!(err.to_string().contains("Node//worker-0"));

        let err = Error::from_kube(api_error(422), "update", "Service/ns/svc");
        match &err {
            Error::Unexpected { verb, object, .. } => {
                assert_eq!(verb, "update");
                assert_eq!(object, "Service/ns/svc");
            }
            _ => panic!("Expected Unexpected variant"),
        }
    }

    /// Story: only conflicts and transport failures are retried
    #[test]
    fn story_error_retryability() {
        assert!(Error::conflict("update", "Node//a", "changed").is_retryable());
        assert!(!Error::forbidden("get", "Node//a", "denied").is_retryable());
        assert!(!Error::template("stage/0", "undefined").is_retryable());
        assert!(!Error::MissingVendorAnnotation {
            object: "BuildConfig/ns/b".to_string()
        }
        .is_retryable());
        assert!(!Error::unexpected("get", "x", "boom").is_retryable());
        assert!(!Error::serialization("bad yaml").is_retryable());
        assert!(!Error::from_kube(api_error(400), "create", "x").is_retryable());
    }

    #[test]
    fn test_template_error_names_document() {
        let err = Error::template("state-driver.yaml[2]", "undefined value");
        assert!(err.to_string().contains("state-driver.yaml[2]"));
    }

    #[test]
    fn test_vendor_mismatch_display() {
        let err = Error::VendorMismatch {
            object: "BuildConfig/gpu/driver".to_string(),
            vendor: "acme".to_string(),
            expected: "nvidia".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("acme"));
        assert!(msg.contains("nvidia"));
    }
}
