//! User-facing notifications (toasts, snackbars, system notifications).

use async_trait::async_trait;

use crate::error::Result;

/// Surface short messages to the user.
///
/// The core only reports failures the user can act on; currently that is a
/// download that could not be started.
#[async_trait]
pub trait UserNotifier: Send + Sync {
    /// Show an error message.
    async fn show_error(&self, message: &str) -> Result<()>;
}
