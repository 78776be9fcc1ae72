//! # Offline Download Tracker
//!
//! Tracks the lifecycle of downloadable media so the host can query, start,
//! cancel, and observe offline content without asking the transfer engine
//! on every call.
//!
//! ## Components
//!
//! - [`DownloadTracker`](tracker::DownloadTracker): startup load, command
//!   dispatch, event application, listener fan-out
//! - [`RecordStore`](store::RecordStore): in-memory id → record map
//! - [`ListenerRegistry`](listeners::ListenerRegistry): copy-on-write
//!   listener list
//! - [`TrackerConfig`](config::TrackerConfig): notification and event-bus
//!   settings
//!
//! ## Usage
//!
//! ```ignore
//! use core_offline::{CoarseStatus, DownloadTracker};
//! use std::sync::Arc;
//!
//! let tracker = DownloadTracker::builder(index, engine, preparer)
//!     .notifier(notifier)
//!     .event_bus(event_bus.clone())
//!     .build()
//!     .await?;
//!
//! tracker.add_listener(Arc::new(|id: &str, status: CoarseStatus| {
//!     println!("{id}: {status}");
//! }));
//!
//! tracker.start_download("Chapter One", source, "book-1/ch-1", EngineConfig::default());
//! ```

pub mod config;
mod dispatch;
pub mod error;
pub mod listeners;
pub mod store;
pub mod tracker;

pub use config::TrackerConfig;
pub use error::{OfflineError, Result};
pub use listeners::{CoarseStatus, DownloadListener, ListenerRegistry};
pub use store::RecordStore;
pub use tracker::{DownloadTracker, DownloadTrackerBuilder};
