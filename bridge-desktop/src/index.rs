//! Download Index using SQLite

use async_trait::async_trait;
use bridge_traits::{
    download::{DownloadRecord, DownloadRequest, DownloadState},
    error::{BridgeError, Result},
    index::{DownloadCursor, DurableIndex},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};
use std::path::PathBuf;
use tracing::{debug, warn};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS downloads (
        id TEXT PRIMARY KEY,
        uri TEXT NOT NULL,
        mime_type TEXT,
        custom_cache_key TEXT,
        stream_keys TEXT NOT NULL,
        data BLOB NOT NULL,
        state TEXT NOT NULL,
        start_time_ms INTEGER NOT NULL,
        update_time_ms INTEGER NOT NULL,
        content_length INTEGER,
        bytes_downloaded INTEGER NOT NULL,
        percent_downloaded REAL,
        failure_reason TEXT
    )
"#;

/// SQLite-backed durable download index
///
/// One row per download, keyed by download id. The tracker only reads it;
/// `put` and `delete` exist for the engine side and for seeding tests.
pub struct SqliteDownloadIndex {
    pool: SqlitePool,
}

impl SqliteDownloadIndex {
    /// Open (or create) the index database at `db_path`
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

        Self::create_schema(&pool).await?;
        debug!(path = ?db_path, "Initialized download index");

        Ok(Self { pool })
    }

    /// Create an in-memory index (for testing)
    ///
    /// Limited to a single connection; every pooled connection to
    /// `sqlite::memory:` would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

        Self::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Default on-disk location under the user's data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("offline-downloads")
            .join("downloads.db")
    }

    async fn create_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    /// Insert or replace the row for `record.id()`.
    pub async fn put(&self, record: &DownloadRecord) -> Result<()> {
        let stream_keys = serde_json::to_string(&record.request.stream_keys)
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to encode stream keys: {}", e)))?;
        let content_length = record
            .content_length
            .map(i64::try_from)
            .transpose()
            .map_err(|_| too_large(record.id(), "content_length"))?;
        let bytes_downloaded = i64::try_from(record.bytes_downloaded)
            .map_err(|_| too_large(record.id(), "bytes_downloaded"))?;

        sqlx::query(
            r#"
            INSERT INTO downloads (
                id, uri, mime_type, custom_cache_key, stream_keys, data, state,
                start_time_ms, update_time_ms, content_length, bytes_downloaded,
                percent_downloaded, failure_reason
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                uri = excluded.uri,
                mime_type = excluded.mime_type,
                custom_cache_key = excluded.custom_cache_key,
                stream_keys = excluded.stream_keys,
                data = excluded.data,
                state = excluded.state,
                update_time_ms = excluded.update_time_ms,
                content_length = excluded.content_length,
                bytes_downloaded = excluded.bytes_downloaded,
                percent_downloaded = excluded.percent_downloaded,
                failure_reason = excluded.failure_reason
            "#,
        )
        .bind(record.id())
        .bind(&record.request.uri)
        .bind(&record.request.mime_type)
        .bind(&record.request.custom_cache_key)
        .bind(stream_keys)
        .bind(&record.request.data)
        .bind(record.state.as_str())
        .bind(record.start_time_ms)
        .bind(record.update_time_ms)
        .bind(content_length)
        .bind(bytes_downloaded)
        .bind(record.percent_downloaded.map(f64::from))
        .bind(&record.failure_reason)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to store download: {}", e)))?;

        debug!(download_id = record.id(), state = %record.state, "Stored download");
        Ok(())
    }

    /// Delete the row for `download_id`. Missing rows are not an error.
    pub async fn delete(&self, download_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(download_id)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to delete download: {}", e)))?;

        debug!(download_id = download_id, "Deleted download");
        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) FROM downloads")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to count downloads: {}", e)))?;

        let count: i64 = row.get(0);
        Ok(count as usize)
    }

    fn decode_row(row: &SqliteRow) -> Result<DownloadRecord> {
        let id: String = row.try_get("id").map_err(corrupted)?;

        let state: String = row.try_get("state").map_err(corrupted)?;
        let state = state
            .parse::<DownloadState>()
            .map_err(|e| BridgeError::CorruptedRecord(format!("{}: {}", id, e)))?;

        let stream_keys: String = row.try_get("stream_keys").map_err(corrupted)?;
        let stream_keys: Vec<String> = serde_json::from_str(&stream_keys)
            .map_err(|e| BridgeError::CorruptedRecord(format!("{}: bad stream keys: {}", id, e)))?;

        let content_length: Option<i64> = row.try_get("content_length").map_err(corrupted)?;
        let content_length = content_length
            .map(u64::try_from)
            .transpose()
            .map_err(|_| BridgeError::CorruptedRecord(format!("{}: negative content_length", id)))?;
        let bytes_downloaded: i64 = row.try_get("bytes_downloaded").map_err(corrupted)?;
        let bytes_downloaded = u64::try_from(bytes_downloaded)
            .map_err(|_| BridgeError::CorruptedRecord(format!("{}: negative bytes_downloaded", id)))?;
        let percent_downloaded: Option<f64> =
            row.try_get("percent_downloaded").map_err(corrupted)?;

        let request = DownloadRequest {
            uri: row.try_get("uri").map_err(corrupted)?,
            mime_type: row.try_get("mime_type").map_err(corrupted)?,
            custom_cache_key: row.try_get("custom_cache_key").map_err(corrupted)?,
            stream_keys,
            data: row.try_get("data").map_err(corrupted)?,
            id,
        };

        Ok(DownloadRecord {
            request,
            state,
            start_time_ms: row.try_get("start_time_ms").map_err(corrupted)?,
            update_time_ms: row.try_get("update_time_ms").map_err(corrupted)?,
            content_length,
            bytes_downloaded,
            percent_downloaded: percent_downloaded.map(|p| p as f32),
            failure_reason: row.try_get("failure_reason").map_err(corrupted)?,
        })
    }
}

fn corrupted(e: sqlx::Error) -> BridgeError {
    BridgeError::CorruptedRecord(e.to_string())
}

fn too_large(download_id: &str, column: &str) -> BridgeError {
    BridgeError::OperationFailed(format!(
        "{}: {} does not fit in an SQLite integer",
        download_id, column
    ))
}

#[async_trait]
impl DurableIndex for SqliteDownloadIndex {
    async fn downloads(&self) -> Result<DownloadCursor> {
        let rows = sqlx::query("SELECT * FROM downloads ORDER BY start_time_ms, id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to read downloads: {}", e)))?;

        let decoded: Vec<Result<DownloadRecord>> = rows
            .iter()
            .map(|row| {
                Self::decode_row(row).inspect_err(|e| warn!(error = %e, "Undecodable download row"))
            })
            .collect();

        debug!(rows = decoded.len(), "Opened download cursor");
        Ok(Box::new(decoded.into_iter()))
    }
}

impl std::fmt::Debug for SqliteDownloadIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDownloadIndex").finish_non_exhaustive()
    }
}
