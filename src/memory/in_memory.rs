// Process-local execution memory, for tests and single-node deployments

use super::{ExecutionMemory, MemorySnapshot, DEFAULT_RETENTION_SECONDS};
use crate::errors::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

pub struct InMemoryExecutionMemory {
    retention: Duration,
    entries: Mutex<HashMap<i64, DateTime<Utc>>>,
}

impl InMemoryExecutionMemory {
    pub fn new(retention_seconds: i64) -> Self {
        Self {
            retention: Duration::seconds(retention_seconds),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryExecutionMemory {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_SECONDS)
    }
}

#[async_trait]
impl ExecutionMemory for InMemoryExecutionMemory {
    async fn refresh(&self) -> Result<MemorySnapshot, StorageError> {
        let mut entries = self.entries.lock().await;
        let cutoff = Utc::now() - self.retention;
        entries.retain(|_, at| *at > cutoff);
        Ok(MemorySnapshot::new(entries.clone()))
    }

    async fn record_trigger(&self, query_id: i64, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.entries.lock().await.insert(query_id, at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_then_refresh_roundtrip() {
        let memory = InMemoryExecutionMemory::default();
        let at = Utc::now();

        memory.record_trigger(42, at).await.unwrap();
        let snapshot = memory.refresh().await.unwrap();

        assert_eq!(snapshot.get(42), Some(at));
        assert_eq!(snapshot.get(43), None);
    }

    #[tokio::test]
    async fn test_record_overwrites_previous_trigger() {
        let memory = InMemoryExecutionMemory::default();
        let first = Utc::now() - Duration::hours(1);
        let second = Utc::now();

        memory.record_trigger(42, first).await.unwrap();
        memory.record_trigger(42, second).await.unwrap();

        let snapshot = memory.refresh().await.unwrap();
        assert_eq!(snapshot.get(42), Some(second));
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_evicts_entries_past_retention() {
        let memory = InMemoryExecutionMemory::new(3600);
        let fresh = Utc::now();
        let stale = Utc::now() - Duration::hours(2);

        memory.record_trigger(1, fresh).await.unwrap();
        memory.record_trigger(2, stale).await.unwrap();

        let snapshot = memory.refresh().await.unwrap();
        assert_eq!(snapshot.get(1), Some(fresh));
        assert_eq!(snapshot.get(2), None);
        assert_eq!(snapshot.len(), 1);
    }
}
