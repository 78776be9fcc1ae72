//! In-memory record store
//!
//! The tracker's authoritative runtime view of every known download. All
//! queries are map lookups or scans over this store; the durable index is
//! only read once at startup.

use bridge_traits::{DownloadRecord, DownloadRequest, DownloadState};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Map from download id to its latest record.
///
/// Each operation takes the lock once, so readers see either the state
/// before or after an upsert/delete, never a partial one.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: RwLock<HashMap<String, DownloadRecord>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from loaded records. Later duplicates of an id win.
    pub fn from_records(records: impl IntoIterator<Item = DownloadRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.id().to_string(), record))
            .collect();
        Self {
            records: RwLock::new(map),
        }
    }

    /// Insert or replace the record for its id; returns the previous one.
    pub fn upsert(&self, record: DownloadRecord) -> Option<DownloadRecord> {
        self.records
            .write()
            .insert(record.id().to_string(), record)
    }

    pub fn remove(&self, download_id: &str) -> Option<DownloadRecord> {
        self.records.write().remove(download_id)
    }

    pub fn get(&self, download_id: &str) -> Option<DownloadRecord> {
        self.records.read().get(download_id).cloned()
    }

    pub fn contains(&self, download_id: &str) -> bool {
        self.records.read().contains_key(download_id)
    }

    /// Record exists and has not failed.
    pub fn is_tracked(&self, download_id: &str) -> bool {
        self.records
            .read()
            .get(download_id)
            .is_some_and(|record| record.state.is_tracked())
    }

    /// Request payload of a tracked (non-failed) record.
    pub fn request(&self, download_id: &str) -> Option<DownloadRequest> {
        self.records
            .read()
            .get(download_id)
            .filter(|record| record.state.is_tracked())
            .map(|record| record.request.clone())
    }

    pub fn ids_in_state(&self, state: DownloadState) -> Vec<String> {
        self.ids_where(|record| record.state == state)
    }

    /// Ids the engine is still working on.
    pub fn active_ids(&self) -> Vec<String> {
        self.ids_where(|record| record.state.is_active())
    }

    /// Snapshot of the ids starting with `prefix`.
    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.records
            .read()
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn ids_where(&self, predicate: impl Fn(&DownloadRecord) -> bool) -> Vec<String> {
        self.records
            .read()
            .values()
            .filter(|record| predicate(record))
            .map(|record| record.id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::SourceLocator;

    fn record(id: &str, state: DownloadState) -> DownloadRecord {
        let request = DownloadRequest::new(id, &SourceLocator::new(format!("uri/{}", id)), id);
        DownloadRecord::new(request, state)
    }

    fn sorted(mut ids: Vec<String>) -> Vec<String> {
        ids.sort();
        ids
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let store = RecordStore::new();
        assert!(store.upsert(record("a", DownloadState::Queued)).is_none());

        let previous = store.upsert(record("a", DownloadState::Completed)).unwrap();
        assert_eq!(previous.state, DownloadState::Queued);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().state, DownloadState::Completed);
    }

    #[test]
    fn test_failed_records_are_not_tracked() {
        let store = RecordStore::from_records(vec![
            record("ok", DownloadState::Removing),
            record("bad", DownloadState::Failed),
        ]);

        assert!(store.is_tracked("ok"));
        assert!(store.request("ok").is_some());

        assert!(store.contains("bad"));
        assert!(!store.is_tracked("bad"));
        assert!(store.request("bad").is_none());

        assert!(!store.is_tracked("missing"));
    }

    #[test]
    fn test_state_queries() {
        let store = RecordStore::from_records(vec![
            record("q", DownloadState::Queued),
            record("d", DownloadState::Downloading),
            record("r", DownloadState::Restarting),
            record("c", DownloadState::Completed),
            record("f", DownloadState::Failed),
            record("x", DownloadState::Removing),
        ]);

        assert_eq!(store.ids_in_state(DownloadState::Completed), vec!["c"]);
        assert_eq!(sorted(store.active_ids()), vec!["d", "q", "r"]);
    }

    #[test]
    fn test_prefix_snapshot() {
        let store = RecordStore::from_records(vec![
            record("lib/1", DownloadState::Completed),
            record("lib/2", DownloadState::Downloading),
            record("other", DownloadState::Completed),
        ]);

        assert_eq!(sorted(store.ids_with_prefix("lib/")), vec!["lib/1", "lib/2"]);
        assert_eq!(store.ids_with_prefix("").len(), 3);
        assert!(store.ids_with_prefix("nope").is_empty());
    }

    #[test]
    fn test_remove() {
        let store = RecordStore::from_records(vec![record("a", DownloadState::Completed)]);
        assert!(store.remove("a").is_some());
        assert!(store.remove("a").is_none());
        assert!(store.is_empty());
    }
}
