// Property-based tests for the outdated-query scan

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use query_refresh::memory::{ExecutionMemory, InMemoryExecutionMemory};
use query_refresh::models::{Schedule, ScheduledQuery};
use query_refresh::scanner::DueQueryScanner;
use std::collections::HashSet;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime")
}

fn scan_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap()
}

fn hourly_query(id: i64, hash: &str, data_source_id: i64, overdue: bool) -> ScheduledQuery {
    let now = scan_time();
    let last = if overdue {
        now - Duration::hours(2)
    } else {
        now - Duration::minutes(5)
    };
    ScheduledQuery {
        id,
        query_hash: hash.to_string(),
        data_source_id,
        schedule: Some(Schedule {
            interval: Some(3600),
            ..Default::default()
        }),
        schedule_failures: 0,
        last_retrieved_at: Some(last),
    }
}

/// **Property: identical due queries collapse to one execution**
///
/// *For any* number of query records sharing a (query_hash, data_source_id)
/// pair, all due, the scan returns exactly one representative.
#[test]
fn property_identical_due_queries_collapse_to_one() {
    proptest!(|(copies in 1usize..20, ds in 1i64..100)| {
        let queries: Vec<ScheduledQuery> = (0..copies)
            .map(|i| hourly_query(i as i64 + 1, "aabbccdd", ds, true))
            .collect();

        let scanner = DueQueryScanner::new(Arc::new(InMemoryExecutionMemory::default()));
        let due = runtime().block_on(scanner.scan(&queries, scan_time()));

        prop_assert_eq!(due.len(), 1);
        prop_assert_eq!(due[0].data_source_id, ds);
    });
}

/// **Property: the due set has distinct keys and only due members**
///
/// *For any* mix of overdue and fresh queries across a handful of hashes
/// and data sources, every returned query was overdue, no two returned
/// queries share a (query_hash, data_source_id) pair, and every overdue
/// pair is represented.
#[test]
fn property_due_set_is_keyed_and_complete() {
    proptest!(|(specs in prop::collection::vec((0u8..3, 1i64..4, any::<bool>()), 0..30))| {
        let hashes = ["hash-a", "hash-b", "hash-c"];
        let queries: Vec<ScheduledQuery> = specs
            .iter()
            .enumerate()
            .map(|(i, &(h, ds, overdue))| {
                hourly_query(i as i64 + 1, hashes[h as usize], ds, overdue)
            })
            .collect();

        let scanner = DueQueryScanner::new(Arc::new(InMemoryExecutionMemory::default()));
        let due = runtime().block_on(scanner.scan(&queries, scan_time()));

        let due_ids: HashSet<i64> = due.iter().map(|q| q.id).collect();
        let overdue_ids: HashSet<i64> = queries
            .iter()
            .zip(specs.iter())
            .filter(|(_, &(_, _, overdue))| overdue)
            .map(|(q, _)| q.id)
            .collect();
        prop_assert!(due_ids.is_subset(&overdue_ids));

        let mut keys = HashSet::new();
        for q in &due {
            prop_assert!(keys.insert((q.query_hash.clone(), q.data_source_id)));
        }

        let overdue_keys: HashSet<(String, i64)> = queries
            .iter()
            .zip(specs.iter())
            .filter(|(_, &(_, _, overdue))| overdue)
            .map(|(q, _)| (q.query_hash.clone(), q.data_source_id))
            .collect();
        prop_assert_eq!(keys, overdue_keys);
    });
}

/// **Property: expired schedules are never due**
///
/// *For any* scan time at or after the `until` date's midnight, a query is
/// never returned, no matter how overdue its previous run is.
#[test]
fn property_expired_schedule_is_never_due() {
    proptest!(|(seconds_past in 0i64..86_400 * 365, overdue_days in 1i64..1000)| {
        let deadline = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let now = deadline + Duration::seconds(seconds_past);

        let mut query = hourly_query(1, "aabbccdd", 1, true);
        query.schedule = Some(Schedule {
            interval: Some(3600),
            until: Some("2024-01-01".to_string()),
            ..Default::default()
        });
        query.last_retrieved_at = Some(now - Duration::days(overdue_days));

        let scanner = DueQueryScanner::new(Arc::new(InMemoryExecutionMemory::default()));
        let due = runtime().block_on(scanner.scan(&[query], now));
        prop_assert!(due.is_empty());
    });
}

/// **Property: cold-start queries wait out their first interval**
///
/// *For any* interval, a query with no prior result and no execution-memory
/// entry is not due at scan time.
#[test]
fn property_cold_start_is_never_due() {
    proptest!(|(interval in 1i64..10_000_000)| {
        let query = ScheduledQuery {
            id: 1,
            query_hash: "aabbccdd".to_string(),
            data_source_id: 1,
            schedule: Some(Schedule {
                interval: Some(interval),
                ..Default::default()
            }),
            schedule_failures: 0,
            last_retrieved_at: None,
        };

        let scanner = DueQueryScanner::new(Arc::new(InMemoryExecutionMemory::default()));
        let due = runtime().block_on(scanner.scan(&[query], scan_time()));
        prop_assert!(due.is_empty());
    });
}

/// **Property: a recent trigger suppresses re-scheduling**
///
/// *For any* trigger recorded within the interval, the query is not due
/// even when its durable retrieval timestamp says it is long overdue.
#[test]
fn property_recent_trigger_suppresses_due() {
    proptest!(|(trigger_minutes_ago in 0i64..60, stale_hours in 2i64..1000)| {
        let now = scan_time();
        let mut query = hourly_query(7, "aabbccdd", 1, true);
        query.last_retrieved_at = Some(now - Duration::hours(stale_hours));

        // Retention long enough that the fixed test timestamps survive the
        // wall-clock-based eviction in refresh.
        let memory = Arc::new(InMemoryExecutionMemory::new(200 * 365 * 24 * 60 * 60));
        let scanner = DueQueryScanner::new(memory.clone());

        let due = runtime().block_on(async {
            memory
                .record_trigger(7, now - Duration::minutes(trigger_minutes_ago))
                .await
                .expect("record_trigger failed");
            scanner.scan(&[query], now).await
        });
        prop_assert!(due.is_empty());
    });
}
