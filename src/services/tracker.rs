use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// In-flight bookkeeping for one upload.
#[derive(Debug, Clone)]
pub struct TrackerEntry {
    pub file_name: String,
    pub content_type: String,
    pub total_chunks: u32,
    pub received: BTreeSet<u32>,
    pub last_activity: DateTime<Utc>,
}

impl TrackerEntry {
    pub fn new(file_name: String, content_type: String, total_chunks: u32) -> Self {
        Self {
            file_name,
            content_type,
            total_chunks,
            received: BTreeSet::new(),
            last_activity: Utc::now(),
        }
    }
}

/// What `record` saw after adding a sequence to an entry.
#[derive(Debug, Clone, Copy)]
pub struct RecordOutcome {
    pub received_count: u32,
    pub total_chunks: u32,
    pub newly_added: bool,
}

/// Fast answer to "which sequences does upload X already have".
/// Authoritative state lives in the blob store; entries here may vanish
/// at any moment (restart, sweep) and get rebuilt from durable rows.
#[async_trait]
pub trait FragmentTracker: Send + Sync {
    async fn get(&self, upload_id: &str) -> Option<TrackerEntry>;

    /// Insert an entry unless one is already present. Returns whichever
    /// entry ended up in the table.
    async fn insert_if_absent(&self, upload_id: &str, entry: TrackerEntry) -> TrackerEntry;

    /// Add a sequence to an existing entry. `None` means no entry was
    /// present and the caller has to rebuild before retrying.
    async fn record(&self, upload_id: &str, sequence: u32) -> Option<RecordOutcome>;

    async fn remove(&self, upload_id: &str);

    async fn clear(&self);
}

/// Process-local tracker over a sharded concurrent map.
#[derive(Default)]
pub struct InMemoryTracker {
    entries: DashMap<String, TrackerEntry>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl FragmentTracker for InMemoryTracker {
    async fn get(&self, upload_id: &str) -> Option<TrackerEntry> {
        self.entries.get(upload_id).map(|e| e.clone())
    }

    async fn insert_if_absent(&self, upload_id: &str, entry: TrackerEntry) -> TrackerEntry {
        self.entries
            .entry(upload_id.to_string())
            .or_insert(entry)
            .clone()
    }

    async fn record(&self, upload_id: &str, sequence: u32) -> Option<RecordOutcome> {
        let mut entry = self.entries.get_mut(upload_id)?;
        let newly_added = entry.received.insert(sequence);
        entry.last_activity = Utc::now();

        Some(RecordOutcome {
            received_count: entry.received.len() as u32,
            total_chunks: entry.total_chunks,
            newly_added,
        })
    }

    async fn remove(&self, upload_id: &str) {
        self.entries.remove(upload_id);
    }

    async fn clear(&self) {
        self.entries.clear();
    }
}
