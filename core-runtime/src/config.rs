//! # Core Configuration
//!
//! Collects the host bridges and settings the offline download core needs
//! and fails fast, with an actionable message, when a required capability
//! has not been injected.
//!
//! ## Required capabilities
//!
//! | Capability | Desktop default (`desktop-shims`) |
//! |------------|-----------------------------------|
//! | `TransferEngine` | none, always injected |
//! | `DownloadPreparer` | none, always injected |
//! | `DurableIndex` | `SqliteDownloadIndex` at `database_path` |
//! | `UserNotifier` (optional) | `TracingNotifier` |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/offline/downloads.db")
//!     .transfer_engine(engine)
//!     .preparer(preparer)
//!     .event_buffer_size(256)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{DownloadPreparer, DurableIndex, EngineConfig, TransferEngine, UserNotifier};
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration
#[derive(Clone)]
pub struct CoreConfig {
    /// Location of the default SQLite download index
    pub database_path: Option<PathBuf>,

    /// Executes transfers and reports state changes (required)
    pub transfer_engine: Arc<dyn TransferEngine>,

    /// Inspects content before it is queued (required)
    pub preparer: Arc<dyn DownloadPreparer>,

    /// Injected durable index. When `None`, [`CoreConfig::download_index`]
    /// opens the desktop default.
    pub download_index: Option<Arc<dyn DurableIndex>>,

    /// Surface for user-facing errors. Optional.
    pub notifier: Option<Arc<dyn UserNotifier>>,

    /// Capacity of the broadcast event bus
    pub event_buffer_size: usize,

    /// Engine configuration used when callers don't supply one
    pub default_engine_config: EngineConfig,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("transfer_engine", &"TransferEngine { ... }")
            .field("preparer", &"DownloadPreparer { ... }")
            .field(
                "download_index",
                &self.download_index.as_ref().map(|_| "DurableIndex { ... }"),
            )
            .field(
                "notifier",
                &self.notifier.as_ref().map(|_| "UserNotifier { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("default_engine_config", &self.default_engine_config)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags for optional behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Mirror tracker changes onto the event bus as `CoreEvent::Download`
    pub emit_core_events: bool,

    /// Show a user-facing error when a download cannot be prepared
    pub notify_preparation_errors: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            emit_core_events: true,
            notify_preparation_errors: true,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.download_index.is_none() {
            if !cfg!(feature = "desktop-shims") {
                return Err(download_index_missing_error());
            }
            if self.database_path.is_none() {
                return Err(Error::Config(
                    "Database path is required when no DurableIndex is injected. \
                     Use .database_path() or .download_index()."
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Resolve the durable index: the injected one, or the desktop default
    /// opened at `database_path`.
    pub async fn download_index(&self) -> Result<Arc<dyn DurableIndex>> {
        if let Some(index) = &self.download_index {
            return Ok(Arc::clone(index));
        }
        provide_default_download_index(self.database_path.as_ref()).await
    }
}

fn download_index_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "DurableIndex".to_string(),
        message: "DurableIndex implementation is required to restore downloads at startup. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default SqliteDownloadIndex. \
                 Mobile: inject an adapter over the platform download manager's database."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
async fn provide_default_download_index(
    database_path: Option<&PathBuf>,
) -> Result<Arc<dyn DurableIndex>> {
    use bridge_desktop::SqliteDownloadIndex;

    let path = database_path.cloned().ok_or_else(|| {
        Error::Config("Database path is required for the default download index".to_string())
    })?;

    let index = SqliteDownloadIndex::new(path).await.map_err(|e| {
        Error::Internal(format!("Failed to initialize default DurableIndex: {}", e))
    })?;

    let index: Arc<dyn DurableIndex> = Arc::new(index);
    Ok(index)
}

#[cfg(not(feature = "desktop-shims"))]
async fn provide_default_download_index(
    _database_path: Option<&PathBuf>,
) -> Result<Arc<dyn DurableIndex>> {
    Err(download_index_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_notifier() -> Option<Arc<dyn UserNotifier>> {
    let notifier: Arc<dyn UserNotifier> = Arc::new(bridge_desktop::TracingNotifier::new());
    Some(notifier)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_notifier() -> Option<Arc<dyn UserNotifier>> {
    None
}

/// Builder for [`CoreConfig`]
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    transfer_engine: Option<Arc<dyn TransferEngine>>,
    preparer: Option<Arc<dyn DownloadPreparer>>,
    download_index: Option<Arc<dyn DurableIndex>>,
    notifier: Option<Arc<dyn UserNotifier>>,
    event_buffer_size: Option<usize>,
    default_engine_config: Option<EngineConfig>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn transfer_engine(mut self, engine: Arc<dyn TransferEngine>) -> Self {
        self.transfer_engine = Some(engine);
        self
    }

    pub fn preparer(mut self, preparer: Arc<dyn DownloadPreparer>) -> Self {
        self.preparer = Some(preparer);
        self
    }

    pub fn download_index(mut self, index: Arc<dyn DurableIndex>) -> Self {
        self.download_index = Some(index);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn UserNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn default_engine_config(mut self, config: EngineConfig) -> Self {
        self.default_engine_config = Some(config);
        self
    }

    pub fn emit_core_events(mut self, enabled: bool) -> Self {
        self.features.emit_core_events = enabled;
        self
    }

    pub fn notify_preparation_errors(mut self, enabled: bool) -> Self {
        self.features.notify_preparation_errors = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when the transfer engine or preparer is
    ///   absent, or when no index is injected without `desktop-shims`
    /// - [`Error::Config`] for invalid settings
    pub fn build(self) -> Result<CoreConfig> {
        let transfer_engine = self.transfer_engine.ok_or_else(|| Error::CapabilityMissing {
            capability: "TransferEngine".to_string(),
            message: "TransferEngine implementation is required to execute downloads. \
                     Inject the host's download service adapter with .transfer_engine()."
                .to_string(),
        })?;

        let preparer = self.preparer.ok_or_else(|| Error::CapabilityMissing {
            capability: "DownloadPreparer".to_string(),
            message: "DownloadPreparer implementation is required to inspect content before \
                     it is queued. Inject one with .preparer()."
                .to_string(),
        })?;

        let config = CoreConfig {
            database_path: self.database_path,
            transfer_engine,
            preparer,
            download_index: self.download_index,
            notifier: self.notifier.or_else(provide_default_notifier),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            default_engine_config: self.default_engine_config.unwrap_or_default(),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        DownloadCursor, DownloadRequest, PrepareError, PreparedDownload, SourceLocator,
        TransferEventReceiver,
    };

    struct StubEngine;

    #[async_trait]
    impl TransferEngine for StubEngine {
        async fn add_download(&self, _request: DownloadRequest) -> BridgeResult<()> {
            Ok(())
        }

        async fn remove_download(&self, _download_id: &str) -> BridgeResult<()> {
            Ok(())
        }

        fn subscribe(&self) -> TransferEventReceiver {
            tokio::sync::mpsc::unbounded_channel().1
        }
    }

    struct StubPreparer;

    #[async_trait]
    impl DownloadPreparer for StubPreparer {
        async fn prepare(
            &self,
            _source: &SourceLocator,
            _config: &EngineConfig,
        ) -> std::result::Result<Box<dyn PreparedDownload>, PrepareError> {
            Err(PrepareError::LiveContentUnsupported)
        }
    }

    struct EmptyIndex;

    #[async_trait]
    impl DurableIndex for EmptyIndex {
        async fn downloads(&self) -> BridgeResult<DownloadCursor> {
            Ok(Box::new(std::iter::empty()))
        }
    }

    fn base_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .transfer_engine(Arc::new(StubEngine))
            .preparer(Arc::new(StubPreparer))
    }

    #[test]
    fn test_builder_requires_transfer_engine() {
        let result = CoreConfig::builder()
            .preparer(Arc::new(StubPreparer))
            .download_index(Arc::new(EmptyIndex))
            .build();

        let err = result.unwrap_err();
        assert!(matches!(err, Error::CapabilityMissing { .. }));
        assert!(err.to_string().contains("TransferEngine"));
    }

    #[test]
    fn test_builder_requires_preparer() {
        let result = CoreConfig::builder()
            .transfer_engine(Arc::new(StubEngine))
            .download_index(Arc::new(EmptyIndex))
            .build();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("DownloadPreparer"));
    }

    #[test]
    fn test_builder_with_injected_index() {
        let config = base_builder()
            .download_index(Arc::new(EmptyIndex))
            .build()
            .unwrap();

        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.features.emit_core_events);
        assert!(config.features.notify_preparation_errors);
        assert!(config.default_engine_config.options.is_empty());
    }

    #[test]
    fn test_builder_overrides() {
        let config = base_builder()
            .download_index(Arc::new(EmptyIndex))
            .event_buffer_size(8)
            .emit_core_events(false)
            .notify_preparation_errors(false)
            .default_engine_config(EngineConfig::new().with_option("max_bitrate", "800000"))
            .build()
            .unwrap();

        assert_eq!(config.event_buffer_size, 8);
        assert!(!config.features.emit_core_events);
        assert!(!config.features.notify_preparation_errors);
        assert_eq!(
            config.default_engine_config.get("max_bitrate"),
            Some("800000")
        );
    }

    #[test]
    fn test_zero_event_buffer_rejected() {
        let result = base_builder()
            .download_index(Arc::new(EmptyIndex))
            .event_buffer_size(0)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_database_path_rejected() {
        let result = base_builder()
            .download_index(Arc::new(EmptyIndex))
            .database_path("")
            .build();

        assert!(result.unwrap_err().to_string().contains("Database path"));
    }

    #[tokio::test]
    async fn test_injected_index_is_resolved() {
        let config = base_builder()
            .download_index(Arc::new(EmptyIndex))
            .build()
            .unwrap();

        let index = config.download_index().await.unwrap();
        assert_eq!(index.downloads().await.unwrap().count(), 0);
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_index_without_shims_fails_fast() {
        let err = base_builder().database_path("/tmp/x.db").build().unwrap_err();
        assert!(matches!(err, Error::CapabilityMissing { .. }));
        assert!(err.to_string().contains("DurableIndex"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_notifier_is_optional_without_shims() {
        let config = base_builder()
            .download_index(Arc::new(EmptyIndex))
            .build()
            .unwrap();
        assert!(config.notifier.is_none());
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_defaults_require_database_path() {
        let err = base_builder().build().unwrap_err();
        assert!(err.to_string().contains("Database path is required"));
    }

    #[cfg(feature = "desktop-shims")]
    #[tokio::test]
    async fn test_build_with_desktop_defaults() {
        let base = std::env::temp_dir().join(format!(
            "core-runtime-test-{}",
            std::process::id()
        ));
        let config = base_builder()
            .database_path(base.join("downloads.db"))
            .build()
            .expect("desktop defaults should succeed");

        assert!(config.notifier.is_some());
        let index = config.download_index().await.unwrap();
        assert_eq!(index.downloads().await.unwrap().count(), 0);

        let _ = tokio::fs::remove_dir_all(&base).await;
    }
}
