//! Workspace façade crate.
//!
//! Exposes the offline download core behind feature flags so host
//! applications can depend on `offline-workspace` alone instead of wiring
//! each workspace crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
