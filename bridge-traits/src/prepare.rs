//! Download Preparation
//!
//! Before a download can be queued the content has to be inspected (format
//! detection, track selection). That work is host specific and exposed here
//! as an async preparer yielding a handle from which the request payload is
//! derived.

use async_trait::async_trait;
use thiserror::Error;

use crate::download::{DownloadRequest, EngineConfig, SourceLocator};

/// Reasons a preparation can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrepareError {
    /// Live streams cannot be downloaded
    #[error("Downloading live content is unsupported")]
    LiveContentUnsupported,

    /// Content type the engine cannot handle
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    #[error("Preparation failed: {0}")]
    Failed(String),
}

impl PrepareError {
    /// Returns `true` for the "unsupported content" family of failures.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            PrepareError::LiveContentUnsupported | PrepareError::UnsupportedContent(_)
        )
    }
}

/// Successfully prepared content.
pub trait PreparedDownload: Send + Sync {
    /// Build the request payload for `download_id` carrying `data`.
    fn download_request(&self, download_id: &str, data: &[u8]) -> DownloadRequest;

    /// Release resources held by the preparation (media periods, loaders).
    fn release(&self) {}
}

/// Preparation subsystem trait
///
/// # Example
///
/// ```ignore
/// let prepared = preparer.prepare(&source, &EngineConfig::default()).await?;
/// let request = prepared.download_request("track-1", b"Track One");
/// prepared.release();
/// ```
#[async_trait]
pub trait DownloadPreparer: Send + Sync {
    async fn prepare(
        &self,
        source: &SourceLocator,
        config: &EngineConfig,
    ) -> std::result::Result<Box<dyn PreparedDownload>, PrepareError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_classification() {
        assert!(PrepareError::LiveContentUnsupported.is_unsupported());
        assert!(PrepareError::UnsupportedContent("drm".to_string()).is_unsupported());
        assert!(!PrepareError::Failed("timeout".to_string()).is_unsupported());
    }
}
