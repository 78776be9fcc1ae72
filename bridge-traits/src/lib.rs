//! # Host Bridge Traits
//!
//! Contracts between the offline download core and the host platform.
//!
//! ## Overview
//!
//! The core never transfers bytes itself. It tracks what the host's transfer
//! engine reports and forwards start/remove commands to it. Everything that
//! differs per platform is expressed as a trait here.
//!
//! ## Traits
//!
//! ### Downloads
//! - [`TransferEngine`](transfer::TransferEngine) - Executes transfers and reports state changes
//! - [`DurableIndex`](index::DurableIndex) - Persistent record store read once at startup
//! - [`DownloadPreparer`](prepare::DownloadPreparer) - Inspects content before it is queued
//!
//! ### Platform Integration
//! - [`UserNotifier`](notification::UserNotifier) - User-facing error messages
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Index + notifier |
//! | Android  | TBD                 | 📋 Planned |
//! | iOS      | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError), except download
//! preparation which reports the narrower [`PrepareError`](prepare::PrepareError)
//! so callers can tell unsupported content apart from transient failures.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! across the tracker's tasks.

pub mod download;
pub mod error;
pub mod index;
pub mod logging;
pub mod notification;
pub mod prepare;
pub mod transfer;

pub use error::BridgeError;

// Re-export commonly used types
pub use download::{DownloadRecord, DownloadRequest, DownloadState, EngineConfig, SourceLocator};
pub use index::{DownloadCursor, DurableIndex};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use notification::UserNotifier;
pub use prepare::{DownloadPreparer, PrepareError, PreparedDownload};
pub use transfer::{TransferEngine, TransferEvent, TransferEventReceiver};
