// Execution memory: timestamps of recently triggered queries
//
// A triggered query's durable `last_retrieved_at` is only updated once the
// asynchronous execution pipeline finishes, so the scan consults this store
// first to avoid re-triggering a query whose run is still in flight.

mod in_memory;
mod redis;

pub use in_memory::InMemoryExecutionMemory;
pub use redis::RedisExecutionMemory;

use crate::errors::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Default retention for execution-memory entries: 30 days, comfortably
/// above the longest plausible weekly-plus-backoff gap between runs.
pub const DEFAULT_RETENTION_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Snapshot of execution memory taken at the start of a scan.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    entries: HashMap<i64, DateTime<Utc>>,
}

impl MemorySnapshot {
    pub fn new(entries: HashMap<i64, DateTime<Utc>>) -> Self {
        Self { entries }
    }

    /// Last recorded trigger time for a query, if any.
    pub fn get(&self, query_id: i64) -> Option<DateTime<Utc>> {
        self.entries.get(&query_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Store of recently triggered query timestamps.
///
/// The scan refreshes once at its start and works from the snapshot; the
/// enqueueing caller records each actual trigger. Entries older than the
/// store's retention window are evicted during refresh.
#[async_trait]
pub trait ExecutionMemory: Send + Sync {
    /// Load a fresh snapshot, evicting entries past retention.
    async fn refresh(&self) -> Result<MemorySnapshot, StorageError>;

    /// Record that a query was triggered at `at`.
    async fn record_trigger(&self, query_id: i64, at: DateTime<Utc>) -> Result<(), StorageError>;
}
