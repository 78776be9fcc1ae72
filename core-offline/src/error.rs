//! # Offline Error Types
//!
//! Internal error types for the download tracker. None of these reach the
//! tracker's public command/query surface; they are logged, published on the
//! event bus, or turned into user notifications at the boundary.

use bridge_traits::{BridgeError, PrepareError};
use thiserror::Error;

use crate::config::TrackerConfig;

/// Errors raised while running the download tracker.
#[derive(Error, Debug)]
pub enum OfflineError {
    /// Reading the durable index at startup failed.
    #[error("Failed to load downloads from index: {0}")]
    StartupLoad(#[source] BridgeError),

    /// The preparation subsystem rejected the content.
    #[error("Failed to prepare download {download_id}: {source}")]
    Preparation {
        download_id: String,
        #[source]
        source: PrepareError,
    },

    /// The command dispatcher is gone (tracker shutting down).
    #[error("Engine command dispatch failed: {0}")]
    Dispatch(String),

    /// The user notifier itself failed.
    #[error("User notification failed: {0}")]
    Notification(#[source] BridgeError),

    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    /// The tracker was built outside a Tokio runtime.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl OfflineError {
    /// Whether this is a preparation failure for content that can never be
    /// downloaded (live streams and the like).
    pub fn is_unsupported_content(&self) -> bool {
        matches!(self, OfflineError::Preparation { source, .. } if source.is_unsupported())
    }

    /// Text shown to the user for this failure.
    pub fn user_message<'a>(&self, config: &'a TrackerConfig) -> &'a str {
        if self.is_unsupported_content() {
            &config.unsupported_content_message
        } else {
            &config.start_error_message
        }
    }
}

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, OfflineError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn preparation(source: PrepareError) -> OfflineError {
        OfflineError::Preparation {
            download_id: "a".to_string(),
            source,
        }
    }

    #[test]
    fn test_unsupported_content_classification() {
        assert!(preparation(PrepareError::LiveContentUnsupported).is_unsupported_content());
        assert!(!preparation(PrepareError::Failed("io".to_string())).is_unsupported_content());
        assert!(!OfflineError::Dispatch("closed".to_string()).is_unsupported_content());
    }

    #[test]
    fn test_user_message_selection() {
        let config = TrackerConfig::default();
        assert_eq!(
            preparation(PrepareError::LiveContentUnsupported).user_message(&config),
            config.unsupported_content_message
        );
        assert_eq!(
            preparation(PrepareError::Failed("timeout".to_string())).user_message(&config),
            config.start_error_message
        );
    }

    #[test]
    fn test_display_includes_id() {
        let err = preparation(PrepareError::Failed("timeout".to_string()));
        assert_eq!(
            err.to_string(),
            "Failed to prepare download a: Preparation failed: timeout"
        );
    }
}
