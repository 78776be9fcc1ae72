//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided bridges collected in a
//! [`CoreConfig`] (transfer engine, preparer, durable index, notifier) into
//! the offline download core. Desktop apps typically enable the
//! `desktop-shims` feature, which supplies a SQLite download index and a
//! logging notifier when the host does not inject its own.
//!
//! ```ignore
//! use core_service::{CoreConfig, OfflineService};
//!
//! let config = CoreConfig::builder()
//!     .database_path(data_dir.join("downloads.db"))
//!     .transfer_engine(engine)
//!     .preparer(preparer)
//!     .build()?;
//!
//! let service = OfflineService::new(config);
//! let tracker = service.tracker().await?;
//! tracker.start_download("Chapter One", source, "book-1/ch-1", EngineConfig::default());
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use bridge_traits::{EngineConfig, SourceLocator};
pub use core_offline::{CoarseStatus, DownloadListener, DownloadTracker, TrackerConfig};
pub use core_runtime::config::{CoreConfig, CoreConfigBuilder, FeatureFlags};
pub use core_runtime::events::{CoreEvent, DownloadEvent, EventBus, EventStream};

use core_runtime::logging::strip_path;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument};

struct ServiceInner {
    config: CoreConfig,
    event_bus: EventBus,
    tracker: Mutex<Option<Arc<DownloadTracker>>>,
}

/// Primary façade exposed to host applications.
///
/// Owns the configured bridges and the event bus. The tracker is built on
/// first use and shared by every clone of the service.
#[derive(Clone)]
pub struct OfflineService {
    inner: Arc<ServiceInner>,
}

impl OfflineService {
    pub fn new(config: CoreConfig) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        Self {
            inner: Arc::new(ServiceInner {
                config,
                event_bus,
                tracker: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// Subscribe to download events published by the tracker.
    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    /// The shared download tracker, built on the first call.
    ///
    /// Concurrent first calls wait on one another; exactly one tracker is
    /// ever constructed. A failed construction leaves nothing behind, so a
    /// later call tries again.
    #[instrument(skip(self))]
    pub async fn tracker(&self) -> Result<Arc<DownloadTracker>> {
        let mut slot = self.inner.tracker.lock().await;
        if let Some(tracker) = slot.as_ref() {
            return Ok(Arc::clone(tracker));
        }

        let config = &self.inner.config;
        if let (None, Some(path)) = (&config.download_index, &config.database_path) {
            let path = path.to_string_lossy();
            info!(db = %strip_path(&path), "Opening default download index");
        }
        let index = config.download_index().await?;

        let mut builder = DownloadTracker::builder(
            index,
            Arc::clone(&config.transfer_engine),
            Arc::clone(&config.preparer),
        )
        .event_bus(self.inner.event_bus.clone())
        .config(TrackerConfig::from_features(&config.features));

        match &config.notifier {
            Some(notifier) => builder = builder.notifier(Arc::clone(notifier)),
            None => debug!("No user notifier configured"),
        }

        let tracker = Arc::new(builder.build().await?);
        info!(downloads = tracker.download_count(), "Download tracker ready");

        *slot = Some(Arc::clone(&tracker));
        Ok(tracker)
    }

    /// Start a download with the configured default engine configuration.
    pub async fn start_download(
        &self,
        display_name: &str,
        source: SourceLocator,
        download_id: &str,
    ) -> Result<()> {
        let tracker = self.tracker().await?;
        tracker.start_download(
            display_name,
            source,
            download_id,
            self.inner.config.default_engine_config.clone(),
        );
        Ok(())
    }
}

impl std::fmt::Debug for OfflineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineService")
            .field("config", &self.inner.config)
            .finish()
    }
}
