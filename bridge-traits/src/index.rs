//! Durable Download Index
//!
//! Persistent store holding one record per download. The tracker reads it
//! exactly once at startup; writes belong to the transfer engine.

use async_trait::async_trait;

use crate::download::DownloadRecord;
use crate::error::Result;

/// Cursor over persisted records.
///
/// Each item is a decode result, so a corrupted row surfaces as an error in
/// the middle of iteration rather than aborting the whole read up front.
pub type DownloadCursor = Box<dyn Iterator<Item = Result<DownloadRecord>> + Send>;

/// Durable index trait
///
/// Implementations:
/// - **Desktop**: SQLite table (`bridge_desktop::SqliteDownloadIndex`)
/// - **Mobile**: the platform download manager's own database
///
/// # Example
///
/// ```ignore
/// use bridge_traits::index::DurableIndex;
///
/// async fn count(index: &dyn DurableIndex) -> Result<usize> {
///     let mut n = 0;
///     for record in index.downloads().await? {
///         record?;
///         n += 1;
///     }
///     Ok(n)
/// }
/// ```
#[async_trait]
pub trait DurableIndex: Send + Sync {
    /// Open a cursor over every persisted download.
    ///
    /// Must succeed on an empty index.
    async fn downloads(&self) -> Result<DownloadCursor>;
}
