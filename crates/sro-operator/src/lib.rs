//! Special resource operator: reconciles hardware-enablement manifests and
//! gates node readiness stage by stage

#![deny(missing_docs)]

pub mod build_gate;
pub mod client;
pub mod controller;
pub mod node_cache;
pub mod node_state;
pub mod pipeline;
pub mod reconciler;
pub mod resolver;

pub use sro_common::{Error, Result};
