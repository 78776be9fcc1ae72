//! Tracker configuration

use core_runtime::config::FeatureFlags;

/// Configuration for the download tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Publish `CoreEvent::Download` events on the event bus (default: true)
    pub emit_core_events: bool,

    /// Show a user notification when preparation fails (default: true)
    pub notify_preparation_errors: bool,

    /// Message shown when a download could not be started
    pub start_error_message: String,

    /// Message shown when the content kind cannot be downloaded
    pub unsupported_content_message: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            emit_core_events: true,
            notify_preparation_errors: true,
            start_error_message: "Failed to start download".to_string(),
            unsupported_content_message: "Downloading live content is unsupported".to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive tracker settings from the core feature flags.
    pub fn from_features(features: &FeatureFlags) -> Self {
        Self::default()
            .with_core_events(features.emit_core_events)
            .with_preparation_notifications(features.notify_preparation_errors)
    }

    pub fn with_core_events(mut self, enabled: bool) -> Self {
        self.emit_core_events = enabled;
        self
    }

    pub fn with_preparation_notifications(mut self, enabled: bool) -> Self {
        self.notify_preparation_errors = enabled;
        self
    }

    pub fn with_start_error_message(mut self, message: impl Into<String>) -> Self {
        self.start_error_message = message.into();
        self
    }

    pub fn with_unsupported_content_message(mut self, message: impl Into<String>) -> Self {
        self.unsupported_content_message = message.into();
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.notify_preparation_errors {
            if self.start_error_message.trim().is_empty() {
                return Err("start_error_message must not be empty".to_string());
            }
            if self.unsupported_content_message.trim().is_empty() {
                return Err("unsupported_content_message must not be empty".to_string());
            }
        }
        Ok(())
    }
}
