// Redis-backed execution memory, shared across scheduler nodes
//
// Layout: a single hash whose fields are query ids and whose values are
// fractional unix timestamps of the last trigger.

use super::{ExecutionMemory, MemorySnapshot};
use crate::config::RedisConfig;
use crate::errors::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

const KEY_NAME: &str = "sq:executed_at";

pub struct RedisExecutionMemory {
    manager: ConnectionManager,
    retention: Duration,
}

impl RedisExecutionMemory {
    /// Connect to Redis with a reconnecting connection manager.
    #[instrument(skip(config))]
    pub async fn new(config: &RedisConfig, retention_seconds: i64) -> Result<Self, StorageError> {
        info!(url = %config.url, "Connecting to Redis");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            StorageError::ConnectionFailed(format!("Failed to create Redis client: {}", e))
        })?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("Failed to connect to Redis: {}", e)))?;

        info!("Redis connection established");
        Ok(Self {
            manager,
            retention: Duration::seconds(retention_seconds),
        })
    }
}

#[async_trait]
impl ExecutionMemory for RedisExecutionMemory {
    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<MemorySnapshot, StorageError> {
        let mut conn = self.manager.clone();
        let raw: HashMap<String, f64> = conn.hgetall(KEY_NAME).await?;

        let cutoff = Utc::now() - self.retention;
        let mut entries = HashMap::with_capacity(raw.len());
        let mut stale: Vec<String> = Vec::new();

        for (field, timestamp) in raw {
            let Ok(query_id) = field.parse::<i64>() else {
                warn!(field = %field, "Ignoring non-numeric execution memory field");
                continue;
            };
            let Some(at) = parse_unix_timestamp(timestamp) else {
                warn!(field = %field, timestamp, "Ignoring out-of-range execution memory timestamp");
                continue;
            };
            if at <= cutoff {
                stale.push(field);
            } else {
                entries.insert(query_id, at);
            }
        }

        if !stale.is_empty() {
            info!(evicted = stale.len(), "Evicting execution memory entries past retention");
            let _: () = conn.hdel(KEY_NAME, stale).await?;
        }

        Ok(MemorySnapshot::new(entries))
    }

    async fn record_trigger(&self, query_id: i64, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut conn = self.manager.clone();
        let timestamp = at.timestamp() as f64 + f64::from(at.timestamp_subsec_micros()) / 1e6;
        let _: () = conn
            .hset(KEY_NAME, query_id.to_string(), timestamp)
            .await?;
        Ok(())
    }
}

fn parse_unix_timestamp(timestamp: f64) -> Option<DateTime<Utc>> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.trunc() as i64;
    let nanos = (timestamp.fract() * 1e9) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}
