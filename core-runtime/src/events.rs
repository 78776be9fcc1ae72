//! # Event Bus System
//!
//! Provides an event-driven channel for the offline download core using
//! `tokio::sync::broadcast`. Host UIs and diagnostics subscribe here instead
//! of registering tracker listeners directly.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wrapping domain-specific enums
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐   emit    ┌───────────┐   subscribe   ┌────────────┐
//! │ DownloadTracker ├──────────>│ EventBus  ├──────────────>│ Subscriber │
//! └─────────────────┘           │ (broadcast│               └────────────┘
//!                               │  channel) │   subscribe   ┌────────────┐
//!                               │           ├──────────────>│ Subscriber │
//!                               └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Download(DownloadEvent::Removed {
//!         download_id: "track-1".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Download removed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; keep receiving.
//! - **`RecvError::Closed`**: All senders have been dropped. Treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; publishers ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Offline download events
    Download(DownloadEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Download(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Download(DownloadEvent::PreparationFailed { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::StateChanged { state, .. }) if state == "failed" => {
                EventSeverity::Warning
            }
            CoreEvent::Download(DownloadEvent::StateChanged { .. })
            | CoreEvent::Download(DownloadEvent::Removed { .. })
            | CoreEvent::Download(DownloadEvent::Restored { .. }) => EventSeverity::Info,
            CoreEvent::Download(DownloadEvent::Progress { .. }) => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Download Events
// ============================================================================

/// Events related to offline downloads.
///
/// `status` carries the coarse listener status (`completed`, `unknown`,
/// `removed`); `state` carries the engine state it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// A record was inserted or replaced.
    StateChanged {
        download_id: String,
        status: String,
        state: String,
    },
    /// Byte progress for an active download.
    Progress {
        download_id: String,
        /// Completion percentage (0-100).
        percent: u8,
        bytes_downloaded: u64,
    },
    /// The record was removed by the engine.
    Removed { download_id: String },
    /// Preparation failed; the download never reached the engine.
    PreparationFailed {
        download_id: String,
        message: String,
        /// The content kind is not downloadable (live streams and the like).
        unsupported: bool,
    },
    /// Startup load from the durable index finished.
    Restored { count: usize },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::StateChanged { .. } => "Download state changed",
            DownloadEvent::Progress { .. } => "Download in progress",
            DownloadEvent::Removed { .. } => "Download removed",
            DownloadEvent::PreparationFailed { .. } => "Download preparation failed",
            DownloadEvent::Restored { .. } => "Downloads restored from index",
        }
    }

    /// Download id the event refers to, if any.
    pub fn download_id(&self) -> Option<&str> {
        match self {
            DownloadEvent::StateChanged { download_id, .. }
            | DownloadEvent::Progress { download_id, .. }
            | DownloadEvent::Removed { download_id }
            | DownloadEvent::PreparationFailed { download_id, .. } => Some(download_id),
            DownloadEvent::Restored { .. } => None,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for broadcasting events to multiple subscribers.
///
/// Cloning is cheap; all clones share the same underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emits an event to all active subscribers.
    ///
    /// Returns the number of subscribers that received it, or `Err` when
    /// there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver wrapper with an optional filter predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, DownloadEvent, EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let stream = EventStream::new(bus.subscribe()).filter(|event| {
///     matches!(event, CoreEvent::Download(DownloadEvent::PreparationFailed { .. }))
/// });
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Next event matching the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. `None` when no matching event is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
