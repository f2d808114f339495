//! Driver-container build gating
//!
//! Vendors ship pre-compiled driver containers. A BuildConfig is only worth
//! reconciling when no trusted vendor image exists, and the vendor annotation
//! on the BuildConfig is the only evidence either way.

use tracing::info;

use sro_common::manifest::ResourceObject;
use sro_common::runtime::RuntimeInfo;
use sro_common::{Error, DRIVER_CONTAINER_VENDOR_ANNOTATION};

/// Kind of the build definitions subject to gating
pub const BUILD_CONFIG_KIND: &str = "BuildConfig";

/// Decide whether `obj` should be reconciled.
///
/// Returns `Ok(true)` for every kind other than BuildConfig. For a BuildConfig:
/// - vendor annotation equal to the update vendor: `Ok(false)`, the vendor
///   image is trusted and the build is skipped
/// - a different vendor: `Error::VendorMismatch`
/// - no vendor annotation: `Error::MissingVendorAnnotation`
pub fn should_build(obj: &ResourceObject, runtime: &RuntimeInfo) -> Result<bool, Error> {
    if obj.kind() != BUILD_CONFIG_KIND {
        return Ok(true);
    }

    let Some(vendor) = obj.annotation(DRIVER_CONTAINER_VENDOR_ANNOTATION) else {
        return Err(Error::MissingVendorAnnotation {
            object: obj.identity(),
        });
    };

    if vendor == runtime.update_vendor {
        info!(
            kind = %obj.kind(),
            namespace = obj.namespace().unwrap_or_default(),
            name = %obj.name(),
            vendor = %vendor,
            "Vendor image trusted, skipping driver-container build"
        );
        return Ok(false);
    }

    Err(Error::VendorMismatch {
        object: obj.identity(),
        vendor: vendor.to_string(),
        expected: runtime.update_vendor.clone(),
    })
}
