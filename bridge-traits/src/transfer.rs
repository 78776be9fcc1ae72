//! Transfer Engine Abstraction
//!
//! The engine performs the actual transfer and is the only source of state
//! transitions for download records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::download::{DownloadRecord, DownloadRequest};
use crate::error::Result;

/// Asynchronous notification emitted by the transfer engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum TransferEvent {
    /// The record was created or its state/progress changed
    Changed(DownloadRecord),
    /// The record and its content were deleted
    Removed(DownloadRecord),
}

impl TransferEvent {
    pub fn record(&self) -> &DownloadRecord {
        match self {
            Self::Changed(record) | Self::Removed(record) => record,
        }
    }

    pub fn download_id(&self) -> &str {
        self.record().id()
    }
}

/// Receiving half of an engine event subscription.
pub type TransferEventReceiver = mpsc::UnboundedReceiver<TransferEvent>;

/// Transfer engine trait
///
/// Both commands are fire-and-forget: returning `Ok` only means the engine
/// accepted the command. The outcome arrives later as a [`TransferEvent`].
/// Engines must dedupe `add_download` by request id.
///
/// # Platform Notes
///
/// - Android: wraps the platform download service
/// - iOS: wraps a background asset download session
/// - Desktop: any in-process downloader
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Queue a new download (or update an existing one with the same id).
    async fn add_download(&self, request: DownloadRequest) -> Result<()>;

    /// Remove a download and its content.
    async fn remove_download(&self, download_id: &str) -> Result<()>;

    /// Subscribe to state change and removal events.
    ///
    /// Events for a given id are delivered in the order the engine emits
    /// them. The stream ends when the engine shuts down.
    fn subscribe(&self) -> TransferEventReceiver;
}
