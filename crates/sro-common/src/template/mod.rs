//! Runtime fact injection for manifest documents
//!
//! Each document is rendered with `${...}` placeholders resolved against the
//! pass's [`RuntimeInfo`](crate::runtime::RuntimeInfo):
//! - `${KernelFullVersion}`, `${OperatingSystemMajor}`, ... - node facts
//! - `${Namespace}`, `${SpecialResourceName}`, `${UpdateVendor}` - resource facts
//! - `${Values.KEY}` - free-form values from the SpecialResource
//!
//! Rendering runs a fixed number of passes ([`RENDER_PASSES`]) so that a value
//! which itself contains a placeholder is resolved once. Deeper indirection is
//! not chased; it surfaces as [`TemplateError::Unresolved`].

mod engine;
mod error;

pub use engine::{TemplateEngine, RENDER_PASSES};
pub use error::TemplateError;
