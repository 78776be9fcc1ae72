//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `DurableIndex` using a SQLite table ([`SqliteDownloadIndex`])
//! - `UserNotifier` logging through `tracing` ([`TracingNotifier`])
//!
//! The transfer engine and the preparation subsystem have no desktop default;
//! hosts always inject those.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{SqliteDownloadIndex, TracingNotifier};
//!
//! #[tokio::main]
//! async fn main() {
//!     let index = SqliteDownloadIndex::new(SqliteDownloadIndex::default_path())
//!         .await
//!         .unwrap();
//!     let notifier = TracingNotifier::new();
//!
//!     // Use in core configuration
//! }
//! ```

mod index;
mod notifier;

pub use index::SqliteDownloadIndex;
pub use notifier::TracingNotifier;
