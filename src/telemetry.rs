// Telemetry module for structured logging

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging.
///
/// Sets up the tracing subscriber with log levels from the environment
/// (falling back to the configured level) and optional JSON formatting for
/// log aggregation.
pub fn init_logging(log_level: &str, json_logs: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let registry = tracing_subscriber::registry();

    if json_logs {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_filter(env_filter);
        registry
            .with(layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        let layer = fmt::layer().with_target(true).with_filter(env_filter);
        registry
            .with(layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(log_level = log_level, json_logs, "Structured logging initialized");

    Ok(())
}
