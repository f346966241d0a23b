// Error handling framework

use thiserror::Error;

/// Schedule descriptor validation errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Schedule has no interval")]
    MissingInterval,

    #[error("Invalid interval {0}: must be a positive number of seconds")]
    InvalidInterval(i64),

    #[error("Invalid time of day '{value}': {reason}")]
    InvalidTimeOfDay { value: String, reason: String },

    #[error("Invalid day of week: {0}")]
    InvalidDayOfWeek(String),

    #[error("Day of week requires a time of day anchor")]
    DayOfWeekWithoutTime,

    #[error("Invalid until date '{value}': {reason}")]
    InvalidUntilDate { value: String, reason: String },
}

/// Execution-memory storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    RedisError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        StorageError::RedisError(err.to_string())
    }
}
