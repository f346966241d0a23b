// Outdated-query scan
//
// Collects the scheduled queries whose next refresh time has passed,
// deduplicated by (query_hash, data_source_id) so that identical query
// text against the same data source is executed once per cycle.

use crate::memory::{ExecutionMemory, MemorySnapshot};
use crate::models::ScheduledQuery;
use crate::schedule::should_schedule_next;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Scans materialized query records for ones due to refresh.
///
/// The scan is read-only; recording the actual trigger times back into
/// execution memory is the enqueueing caller's job.
pub struct DueQueryScanner {
    memory: Arc<dyn ExecutionMemory>,
}

impl DueQueryScanner {
    pub fn new(memory: Arc<dyn ExecutionMemory>) -> Self {
        Self { memory }
    }

    /// Collect the queries due for refresh at `now`.
    ///
    /// A query with a malformed schedule is skipped with a warning; one bad
    /// descriptor never blocks evaluation of the rest. A query with no
    /// prior result and no execution-memory entry is treated as having just
    /// run, so it only becomes due once its first interval elapses.
    #[instrument(skip(self, queries), fields(query_count = queries.len()))]
    pub async fn scan(
        &self,
        queries: &[ScheduledQuery],
        now: DateTime<Utc>,
    ) -> Vec<ScheduledQuery> {
        let snapshot = match self.memory.refresh().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // A missing snapshot can only double-trigger a query whose
                // run is in flight, never lose a run; keep scanning.
                warn!(error = %e, "Failed to refresh execution memory, scanning without it");
                MemorySnapshot::default()
            }
        };

        let mut outdated: HashMap<(String, i64), ScheduledQuery> = HashMap::new();

        for query in queries {
            let Some(schedule) = query.schedule.as_ref() else {
                continue;
            };
            if schedule.interval.is_none() {
                continue;
            }

            let refresh = match schedule.validate() {
                Ok(refresh) => refresh,
                Err(e) => {
                    warn!(query_id = query.id, error = %e, "Skipping query with malformed schedule");
                    continue;
                }
            };

            if refresh.is_expired(now) {
                debug!(query_id = query.id, "Schedule expired, skipping");
                continue;
            }

            let previous_iteration = snapshot
                .get(query.id)
                .or(query.last_retrieved_at)
                .unwrap_or(now);

            if should_schedule_next(
                previous_iteration,
                now,
                refresh.interval,
                refresh.time_of_day,
                refresh.day_of_week,
                query.schedule_failures,
            ) {
                let key = (query.query_hash.clone(), query.data_source_id);
                outdated.insert(key, query.clone());
            }
        }

        debug!(due_count = outdated.len(), "Scan complete");
        outdated.into_values().collect()
    }
}
