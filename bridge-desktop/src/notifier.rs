//! User notifications routed through `tracing`
//!
//! Desktop hosts without a toast surface get errors in the log instead.

use async_trait::async_trait;
use bridge_traits::{error::Result, notification::UserNotifier};
use parking_lot::Mutex;
use tracing::warn;

/// Notifier that logs user-facing messages at WARN level.
///
/// Keeps the most recent message so a CLI or test harness can surface it.
#[derive(Debug, Default)]
pub struct TracingNotifier {
    last_message: Mutex<Option<String>>,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_message(&self) -> Option<String> {
        self.last_message.lock().clone()
    }
}

#[async_trait]
impl UserNotifier for TracingNotifier {
    async fn show_error(&self, message: &str) -> Result<()> {
        warn!(target: "user_notification", message = message, "User-facing error");
        *self.last_message.lock() = Some(message.to_string());
        Ok(())
    }
}
