//! Listener registry
//!
//! Copy-on-write list of change listeners. Delivery iterates an immutable
//! snapshot, so listeners may add or remove listeners (including
//! themselves) from inside a callback.

use bridge_traits::DownloadState;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Coarse status reported to listeners.
///
/// Lossy on purpose: every state other than `Completed` reads as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoarseStatus {
    Completed,
    Unknown,
    Removed,
}

impl CoarseStatus {
    /// Status for a record that was just inserted or replaced.
    pub fn from_state(state: DownloadState) -> Self {
        match state {
            DownloadState::Completed => CoarseStatus::Completed,
            _ => CoarseStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoarseStatus::Completed => "completed",
            CoarseStatus::Unknown => "unknown",
            CoarseStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for CoarseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives a callback for every record change.
///
/// Called synchronously while the tracker applies an engine event; keep it
/// short. Calling `DownloadTracker::apply_event` from inside the callback
/// deadlocks.
pub trait DownloadListener: Send + Sync {
    fn on_downloads_changed(&self, download_id: &str, status: CoarseStatus);
}

impl<F> DownloadListener for F
where
    F: Fn(&str, CoarseStatus) + Send + Sync,
{
    fn on_downloads_changed(&self, download_id: &str, status: CoarseStatus) {
        self(download_id, status)
    }
}

type ListenerList = Arc<Vec<Arc<dyn DownloadListener>>>;

/// Registered listeners, compared by `Arc` identity.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<ListenerList>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Returns `false` if it was already registered.
    pub fn add(&self, listener: Arc<dyn DownloadListener>) -> bool {
        let mut guard = self.listeners.write();
        if guard.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
            return false;
        }
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(listener);
        *guard = Arc::new(next);
        true
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove(&self, listener: &Arc<dyn DownloadListener>) -> bool {
        let mut guard = self.listeners.write();
        if !guard.iter().any(|existing| Arc::ptr_eq(existing, listener)) {
            return false;
        }
        let next: Vec<_> = guard
            .iter()
            .filter(|existing| !Arc::ptr_eq(existing, listener))
            .cloned()
            .collect();
        *guard = Arc::new(next);
        true
    }

    /// Current listener list. Later registrations don't affect it.
    pub fn snapshot(&self) -> ListenerList {
        Arc::clone(&self.listeners.read())
    }

    /// Deliver one change to every listener registered when the pass began.
    ///
    /// A panicking listener is logged and skipped; the rest of the pass
    /// still runs. Returns the number of listeners that panicked.
    pub fn notify(&self, download_id: &str, status: CoarseStatus) -> usize {
        let mut panicked = 0;
        for listener in self.snapshot().iter() {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
                listener.on_downloads_changed(download_id, status)
            }));
            if let Err(payload) = delivered {
                panicked += 1;
                error!(
                    download_id = %download_id,
                    status = %status,
                    panic = %panic_message(payload.as_ref()),
                    "Download listener panicked"
                );
            }
        }
        panicked
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
