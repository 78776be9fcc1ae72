//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the offline download core:
//! - Logging and tracing infrastructure
//! - Configuration management and capability checks
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its logging conventions,
//! its configuration surface, and the broadcast channel used to publish
//! download events to the host.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
