//! Download Data Model
//!
//! Types shared between the tracker and the host-provided collaborators
//! (durable index, transfer engine, preparation subsystem).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Engine-side state of a single download.
///
/// Mirrors the transfer engine's state machine. Only the engine moves a
/// record between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Waiting for the engine to pick it up
    Queued,
    /// Transfer in progress
    Downloading,
    /// Engine is restarting the transfer (e.g. after a request change)
    Restarting,
    /// All content is available offline
    Completed,
    /// Transfer failed and will not be retried by the engine
    Failed,
    /// Engine is deleting the downloaded content
    Removing,
}

impl DownloadState {
    /// Database/wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Restarting => "restarting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Removing => "removing",
        }
    }

    /// Whether the engine is still working towards completion.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Downloading | Self::Restarting)
    }

    /// Whether the record counts as downloaded for query purposes.
    ///
    /// Everything except `Failed` counts, including in-flight states.
    pub fn is_tracked(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

impl std::str::FromStr for DownloadState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "downloading" => Ok(Self::Downloading),
            "restarting" => Ok(Self::Restarting),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "removing" => Ok(Self::Removing),
            other => Err(format!("Unknown download state: {}", other)),
        }
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the content to transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocator {
    /// Content URI (e.g. an HLS playlist)
    pub uri: String,
    /// Optional MIME type hint used during preparation
    pub mime_type: Option<String>,
    /// Optional key overriding the URI as the cache key
    pub custom_cache_key: Option<String>,
}

impl SourceLocator {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: None,
            custom_cache_key: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_custom_cache_key(mut self, key: impl Into<String>) -> Self {
        self.custom_cache_key = Some(key.into());
        self
    }
}

/// Engine configuration handed to the preparation subsystem.
///
/// Opaque to the tracker; the keys are understood by the host's preparer
/// (renderer selection, track-selection constraints, and so on).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub options: HashMap<String, String>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// Request payload sent to the transfer engine and persisted with the record.
///
/// Holds everything the engine needs to resume the transfer after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Caller-assigned download identifier
    pub id: String,
    /// Content URI
    pub uri: String,
    pub mime_type: Option<String>,
    pub custom_cache_key: Option<String>,
    /// Tracks/renditions selected during preparation
    pub stream_keys: Vec<String>,
    /// Application data; carries the UTF-8 display name
    pub data: Vec<u8>,
}

impl DownloadRequest {
    /// Build a request for `source` with no selected streams.
    pub fn new(id: impl Into<String>, source: &SourceLocator, display_name: &str) -> Self {
        Self {
            id: id.into(),
            uri: source.uri.clone(),
            mime_type: source.mime_type.clone(),
            custom_cache_key: source.custom_cache_key.clone(),
            stream_keys: Vec::new(),
            data: display_name.as_bytes().to_vec(),
        }
    }

    pub fn with_stream_keys(mut self, keys: Vec<String>) -> Self {
        self.stream_keys = keys;
        self
    }

    /// Display name decoded from `data`.
    pub fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Source locator this request was built from.
    pub fn source(&self) -> SourceLocator {
        SourceLocator {
            uri: self.uri.clone(),
            mime_type: self.mime_type.clone(),
            custom_cache_key: self.custom_cache_key.clone(),
        }
    }
}

/// One tracked download as reported by the engine or loaded from the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub request: DownloadRequest,
    pub state: DownloadState,
    /// Unix epoch milliseconds when the download was first added
    pub start_time_ms: i64,
    /// Unix epoch milliseconds of the last engine update
    pub update_time_ms: i64,
    /// Total content length, when known
    pub content_length: Option<u64>,
    pub bytes_downloaded: u64,
    /// Completion percentage in `[0, 100]`, when known
    pub percent_downloaded: Option<f32>,
    /// Engine-provided reason for a `Failed` state
    pub failure_reason: Option<String>,
}

impl DownloadRecord {
    /// Create a record in `state` with empty progress.
    pub fn new(request: DownloadRequest, state: DownloadState) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            request,
            state,
            start_time_ms: now,
            update_time_ms: now,
            content_length: None,
            bytes_downloaded: 0,
            percent_downloaded: None,
            failure_reason: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.request.id
    }

    pub fn display_name(&self) -> String {
        self.request.display_name()
    }

    pub fn source(&self) -> SourceLocator {
        self.request.source()
    }

    pub fn with_state(mut self, state: DownloadState) -> Self {
        self.state = state;
        self
    }

    pub fn with_progress(mut self, bytes_downloaded: u64, content_length: Option<u64>) -> Self {
        self.bytes_downloaded = bytes_downloaded;
        self.content_length = content_length;
        self.percent_downloaded = content_length
            .filter(|len| *len > 0)
            .map(|len| (bytes_downloaded as f64 / len as f64 * 100.0).min(100.0) as f32);
        self
    }

    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}
