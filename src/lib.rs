// Query freshness scheduling core: due-time calculation and outdated-query
// scanning for periodically refreshed dashboard queries.

pub mod config;
pub mod errors;
pub mod memory;
pub mod models;
pub mod scanner;
pub mod schedule;
pub mod telemetry;
