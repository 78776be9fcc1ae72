//! # Download Tracker
//!
//! Keeps an in-memory view of every download consistent with the durable
//! index (read once at startup) and with the transfer engine's asynchronous
//! state changes, and fans every change out to registered listeners.
//!
//! ## Flow
//!
//! ```text
//!  caller ──start/remove──> DownloadTracker ──commands──> CommandDispatcher ──> TransferEngine
//!                               ▲                                                   │
//!                               │ apply_event (event pump)                          │
//!                               └───────────────── TransferEvent ◄──────────────────┘
//!                               │
//!                               ├──> RecordStore (upsert / delete)
//!                               ├──> ListenerRegistry (on_downloads_changed)
//!                               └──> EventBus (CoreEvent::Download)
//! ```
//!
//! ## Guarantees
//!
//! - Records are created and mutated only by engine events; remove commands
//!   never touch the store directly.
//! - Events are applied one at a time. Every listener registered when an
//!   event is applied has been called before the next event is applied.
//! - A panicking listener is logged and skipped; the event pump survives it.
//! - The public command and query surface never fails. Problems are logged,
//!   published on the event bus, or shown to the user.

use bridge_traits::{
    DownloadPreparer, DownloadRecord, DownloadRequest, DownloadState, DurableIndex, EngineConfig,
    SourceLocator, TransferEngine, TransferEvent, TransferEventReceiver, UserNotifier,
};
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_runtime::logging::redact_uri;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::config::TrackerConfig;
use crate::dispatch::CommandDispatcher;
use crate::error::{OfflineError, Result};
use crate::listeners::{panic_message, CoarseStatus, DownloadListener, ListenerRegistry};
use crate::store::RecordStore;

type PumpAck = oneshot::Sender<()>;

/// Builder for [`DownloadTracker`].
pub struct DownloadTrackerBuilder {
    index: Arc<dyn DurableIndex>,
    engine: Arc<dyn TransferEngine>,
    preparer: Arc<dyn DownloadPreparer>,
    notifier: Option<Arc<dyn UserNotifier>>,
    event_bus: Option<EventBus>,
    config: TrackerConfig,
}

impl DownloadTrackerBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn UserNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Load every record from the durable index and start the tracker.
    ///
    /// An index that cannot be read is logged and treated as empty. The
    /// only errors are an invalid configuration or a missing Tokio runtime.
    #[instrument(skip(self))]
    pub async fn build(self) -> Result<DownloadTracker> {
        self.config.validate().map_err(OfflineError::InvalidConfig)?;

        let runtime = Handle::try_current().map_err(|e| {
            OfflineError::Runtime(format!("DownloadTracker requires a Tokio runtime: {}", e))
        })?;

        // Subscribe first: changes that land while the index is being read
        // are buffered and applied on top of the loaded snapshot.
        let events = self.engine.subscribe();

        let records = match load_records(self.index.as_ref()).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Could not read download index, starting with no downloads");
                Vec::new()
            }
        };
        let count = records.len();

        let inner = Arc::new(TrackerInner {
            store: RecordStore::from_records(records),
            listeners: ListenerRegistry::new(),
            apply_gate: Mutex::new(()),
            starts: Mutex::new(StartReservations::default()),
            preparation_settled: Notify::new(),
            dispatcher: CommandDispatcher::spawn(self.engine, &runtime),
            preparer: self.preparer,
            notifier: self.notifier,
            event_bus: self.event_bus,
            config: self.config,
            runtime: runtime.clone(),
        });

        info!(count, "Restored downloads from index");
        inner.publish(DownloadEvent::Restored { count });

        let (pump_control, control) = mpsc::unbounded_channel();
        runtime.spawn(run_event_pump(Arc::clone(&inner), events, control));

        Ok(DownloadTracker {
            inner,
            pump_control,
        })
    }
}

async fn load_records(index: &dyn DurableIndex) -> Result<Vec<DownloadRecord>> {
    let cursor = index.downloads().await.map_err(OfflineError::StartupLoad)?;
    cursor
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(OfflineError::StartupLoad)
}

/// Offline download state tracker.
///
/// Construct with [`DownloadTracker::builder`]. Dropping the tracker stops
/// the engine event pump; commands already queued are still delivered.
pub struct DownloadTracker {
    inner: Arc<TrackerInner>,
    pump_control: mpsc::UnboundedSender<PumpAck>,
}

impl DownloadTracker {
    pub fn builder(
        index: Arc<dyn DurableIndex>,
        engine: Arc<dyn TransferEngine>,
        preparer: Arc<dyn DownloadPreparer>,
    ) -> DownloadTrackerBuilder {
        DownloadTrackerBuilder {
            index,
            engine,
            preparer,
            notifier: None,
            event_bus: None,
            config: TrackerConfig::default(),
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Start downloading `source` under `download_id`.
    ///
    /// No-op when a record exists for the id, its preparation is in flight,
    /// or its add was accepted by the engine but no event for it has been
    /// applied yet. Otherwise preparation runs on a background task; on
    /// success an add command carrying `display_name` is queued for the
    /// engine, on failure the user is notified and nothing is recorded.
    #[instrument(skip(self, display_name, source, engine_config))]
    pub fn start_download(
        &self,
        display_name: &str,
        source: SourceLocator,
        download_id: &str,
        engine_config: EngineConfig,
    ) {
        if !self.inner.begin_start(download_id) {
            debug!("Download already tracked or starting, ignoring start");
            return;
        }

        let guard = PendingStart {
            inner: Arc::clone(&self.inner),
            download_id: download_id.to_string(),
        };
        let display_name = display_name.to_string();
        let span = info_span!("prepare_download", download_id = %download_id);

        self.inner.runtime.spawn(
            async move {
                guard
                    .inner
                    .prepare_and_enqueue(&guard.download_id, display_name, source, engine_config)
                    .await;
            }
            .instrument(span),
        );
    }

    /// Ask the engine to remove `download_id`.
    ///
    /// The record stays in place until the engine reports the removal.
    pub fn remove_download(&self, download_id: &str) {
        if !self.inner.store.contains(download_id) {
            debug!(download_id = %download_id, "Remove for unknown download ignored");
            return;
        }
        if let Err(e) = self.inner.dispatcher.remove(download_id) {
            error!(download_id = %download_id, error = %e, "Failed to queue remove command");
        }
    }

    /// Ask the engine to remove every download whose id starts with `prefix`.
    pub fn remove_download_starts_with(&self, prefix: &str) {
        let ids = self.inner.store.ids_with_prefix(prefix);
        debug!(prefix = %prefix, count = ids.len(), "Removing downloads by prefix");
        for download_id in ids {
            if let Err(e) = self.inner.dispatcher.remove(&download_id) {
                error!(download_id = %download_id, error = %e, "Failed to queue remove command");
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Record exists and has not failed.
    pub fn is_downloaded(&self, download_id: &str) -> bool {
        self.inner.store.is_tracked(download_id)
    }

    /// Request payload for a record that exists and has not failed.
    pub fn get_download_request(&self, download_id: &str) -> Option<DownloadRequest> {
        self.inner.store.request(download_id)
    }

    /// Ids of completed downloads, unordered.
    pub fn get_downloads(&self) -> Vec<String> {
        self.inner.store.ids_in_state(DownloadState::Completed)
    }

    /// Ids of queued, downloading and restarting downloads, unordered.
    pub fn get_active_downloads(&self) -> Vec<String> {
        self.inner.store.active_ids()
    }

    /// Snapshot of the full record, including progress.
    pub fn get_download(&self, download_id: &str) -> Option<DownloadRecord> {
        self.inner.store.get(download_id)
    }

    pub fn download_count(&self) -> usize {
        self.inner.store.len()
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Returns `false` if the listener was already registered.
    pub fn add_listener(&self, listener: Arc<dyn DownloadListener>) -> bool {
        self.inner.listeners.add(listener)
    }

    /// Returns `false` if the listener was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn DownloadListener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    // ------------------------------------------------------------------
    // Engine events
    // ------------------------------------------------------------------

    /// Apply one engine event.
    ///
    /// The event pump calls this for everything the engine's subscription
    /// yields. Hosts whose engine delivers callbacks some other way may call
    /// it directly; must not be called from inside a listener.
    pub fn apply_event(&self, event: TransferEvent) {
        self.inner.apply_event(event);
    }

    /// Wait until in-flight preparations have settled, every command issued
    /// so far has been handed to the engine, and every engine event emitted
    /// before that point has been applied.
    pub async fn flush(&self) {
        loop {
            let settled = self.inner.preparation_settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            if self.inner.starts.lock().preparing.is_empty() {
                break;
            }
            settled.await;
        }

        self.inner.dispatcher.barrier().await;

        let (ack, done) = oneshot::channel();
        if self.pump_control.send(ack).is_ok() {
            let _ = done.await;
        }
    }
}

impl fmt::Debug for DownloadTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadTracker")
            .field("downloads", &self.inner.store.len())
            .field("listeners", &self.inner.listeners.len())
            .field("starts", &*self.inner.starts.lock())
            .finish()
    }
}

struct TrackerInner {
    store: RecordStore,
    listeners: ListenerRegistry,
    /// Serializes event application and delivery
    apply_gate: Mutex<()>,
    starts: Mutex<StartReservations>,
    preparation_settled: Notify,
    dispatcher: CommandDispatcher,
    preparer: Arc<dyn DownloadPreparer>,
    notifier: Option<Arc<dyn UserNotifier>>,
    event_bus: Option<EventBus>,
    config: TrackerConfig,
    runtime: Handle,
}

impl TrackerInner {
    fn apply_event(&self, event: TransferEvent) {
        let _gate = self.apply_gate.lock();

        match event {
            TransferEvent::Changed(record) => {
                let download_id = record.id().to_string();
                let state = record.state;
                let status = CoarseStatus::from_state(state);
                let progress = match (state, record.percent_downloaded) {
                    (DownloadState::Downloading, Some(percent)) => {
                        Some((percent, record.bytes_downloaded))
                    }
                    _ => None,
                };

                let previous = self.store.upsert(record).map(|previous| previous.state);
                if previous == Some(state) {
                    debug!(download_id = %download_id, state = %state, "Download updated");
                } else {
                    info!(
                        download_id = %download_id,
                        state = %state,
                        previous = ?previous,
                        "Download state changed"
                    );
                }

                self.starts.lock().awaiting_engine.remove(&download_id);
                self.listeners.notify(&download_id, status);

                if let Some((percent, bytes_downloaded)) = progress {
                    self.publish(DownloadEvent::Progress {
                        download_id: download_id.clone(),
                        percent: percent.clamp(0.0, 100.0) as u8,
                        bytes_downloaded,
                    });
                }
                self.publish(DownloadEvent::StateChanged {
                    download_id,
                    status: status.as_str().to_string(),
                    state: state.as_str().to_string(),
                });
            }
            TransferEvent::Removed(record) => {
                let download_id = record.id().to_string();
                if self.store.remove(&download_id).is_some() {
                    info!(download_id = %download_id, "Download removed");
                } else {
                    debug!(download_id = %download_id, "Removal for unknown download");
                }

                self.starts.lock().awaiting_engine.remove(&download_id);
                self.listeners.notify(&download_id, CoarseStatus::Removed);
                self.publish(DownloadEvent::Removed { download_id });
            }
        }
    }

    fn publish(&self, event: DownloadEvent) {
        if !self.config.emit_core_events {
            return;
        }
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Download(event)).ok();
        }
    }

    /// Reserve `download_id` for a new start. `false` when it is already
    /// known or reserved.
    fn begin_start(&self, download_id: &str) -> bool {
        let mut starts = self.starts.lock();
        if self.store.contains(download_id) || starts.contains(download_id) {
            return false;
        }
        starts.preparing.insert(download_id.to_string())
    }

    fn finish_preparation(&self, download_id: &str) {
        let mut starts = self.starts.lock();
        starts.preparing.remove(download_id);
        if starts.preparing.is_empty() {
            self.preparation_settled.notify_waiters();
        }
    }

    /// Hand the request to the engine, keeping the id reserved until the
    /// engine's first event for it is applied. Returns whether the engine
    /// accepted the add.
    async fn enqueue_add(&self, download_id: &str, request: DownloadRequest) -> bool {
        // Reserve before sending: the engine may answer with an event
        // before the ack arrives here.
        self.starts
            .lock()
            .awaiting_engine
            .insert(download_id.to_string());

        let accepted = match self.dispatcher.add(request) {
            Ok(outcome) => outcome.await.unwrap_or(false),
            Err(e) => {
                error!(error = %e, "Failed to queue prepared download");
                false
            }
        };

        if !accepted {
            self.starts.lock().awaiting_engine.remove(download_id);
        }
        accepted
    }

    async fn prepare_and_enqueue(
        &self,
        download_id: &str,
        display_name: String,
        source: SourceLocator,
        engine_config: EngineConfig,
    ) {
        match self.preparer.prepare(&source, &engine_config).await {
            Ok(prepared) => {
                let request = prepared.download_request(download_id, display_name.as_bytes());
                prepared.release();

                if self.enqueue_add(download_id, request).await {
                    info!(uri = %redact_uri(&source.uri), "Download prepared and queued");
                } else {
                    debug!("Add not accepted, download can be started again");
                }
            }
            Err(source_error) => {
                let err = OfflineError::Preparation {
                    download_id: download_id.to_string(),
                    source: source_error,
                };
                self.report_preparation_failure(download_id, &err).await;
            }
        }
    }

    async fn report_preparation_failure(&self, download_id: &str, err: &OfflineError) {
        let unsupported = err.is_unsupported_content();
        if unsupported {
            warn!(error = %err, "Downloading live content is unsupported");
        } else {
            error!(error = %err, "Failed to start download");
        }

        self.publish(DownloadEvent::PreparationFailed {
            download_id: download_id.to_string(),
            message: err.to_string(),
            unsupported,
        });

        if !self.config.notify_preparation_errors {
            return;
        }

        match &self.notifier {
            Some(notifier) => {
                if let Err(e) = notifier.show_error(err.user_message(&self.config)).await {
                    let e = OfflineError::Notification(e);
                    warn!(error = %e, "Could not show preparation error to user");
                }
            }
            None => debug!("No user notifier configured, preparation failure only logged"),
        }
    }
}

/// Ids reserved by `start_download`.
#[derive(Debug, Default)]
struct StartReservations {
    /// Preparation in flight
    preparing: HashSet<String>,
    /// Add accepted by the engine, no event for the id applied yet
    awaiting_engine: HashSet<String>,
}

impl StartReservations {
    fn contains(&self, download_id: &str) -> bool {
        self.preparing.contains(download_id) || self.awaiting_engine.contains(download_id)
    }
}

/// Releases the preparation reservation when the preparation task ends,
/// however it ends.
struct PendingStart {
    inner: Arc<TrackerInner>,
    download_id: String,
}

impl Drop for PendingStart {
    fn drop(&mut self) {
        self.inner.finish_preparation(&self.download_id);
    }
}

/// Apply engine events in arrival order and answer flush barriers once the
/// event queue is drained.
async fn run_event_pump(
    inner: Arc<TrackerInner>,
    mut events: TransferEventReceiver,
    mut control: mpsc::UnboundedReceiver<PumpAck>,
) {
    let mut engine_open = true;

    loop {
        tokio::select! {
            biased;

            event = events.recv(), if engine_open => match event {
                Some(event) => apply_guarded(&inner, event),
                None => {
                    engine_open = false;
                    info!("Transfer engine event stream closed");
                }
            },
            ack = control.recv() => match ack {
                Some(ack) => {
                    let _ = ack.send(());
                }
                None => break,
            },
        }
    }

    if engine_open {
        debug!("Tracker dropped, engine event pump stopped");
    } else {
        debug!("Engine event pump stopped");
    }
}

/// A panic while applying one event must not stop the pump.
fn apply_guarded(inner: &TrackerInner, event: TransferEvent) {
    let download_id = event.download_id().to_string();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| inner.apply_event(event))) {
        error!(
            download_id = %download_id,
            panic = %panic_message(payload.as_ref()),
            "Applying engine event panicked"
        );
    }
}
