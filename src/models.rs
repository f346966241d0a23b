// Data model for scheduled queries and their refresh descriptors

use crate::errors::ScheduleError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Schedule describes when a query should be refreshed, in the shape it is
/// stored on the query record. All fields are optional; `interval: None`
/// means the query is not scheduled and is skipped by the scan.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Refresh interval in seconds
    pub interval: Option<i64>,
    /// "HH:MM" wall-clock anchor; when present the schedule runs at this
    /// time of day instead of rolling from the previous run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Weekday name anchoring weekly schedules; only meaningful together
    /// with `time`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,
    /// "YYYY-MM-DD" expiry; at or past this date the query stops refreshing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
}

impl Schedule {
    /// Validate the wire descriptor into its typed form.
    ///
    /// `day_of_week` without `time` is rejected: the combination has no
    /// defined meaning, and silently ignoring a field the user set would
    /// hide a misconfiguration.
    pub fn validate(&self) -> Result<RefreshSchedule, ScheduleError> {
        let interval = self.interval.ok_or(ScheduleError::MissingInterval)?;
        if interval <= 0 {
            return Err(ScheduleError::InvalidInterval(interval));
        }

        let time_of_day = self
            .time
            .as_deref()
            .map(parse_time_of_day)
            .transpose()?;

        let day_of_week = match self.day_of_week.as_deref() {
            Some(name) => {
                if time_of_day.is_none() {
                    return Err(ScheduleError::DayOfWeekWithoutTime);
                }
                Some(parse_day_of_week(name)?)
            }
            None => None,
        };

        let until = self
            .until
            .as_deref()
            .map(parse_until_date)
            .transpose()?;

        Ok(RefreshSchedule {
            interval,
            time_of_day,
            day_of_week,
            until,
        })
    }
}

/// Validated, typed form of a [`Schedule`], produced once at the storage
/// boundary so the due-time calculation never re-parses strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    pub interval: i64,
    pub time_of_day: Option<NaiveTime>,
    pub day_of_week: Option<Weekday>,
    pub until: Option<NaiveDate>,
}

impl RefreshSchedule {
    /// True once the expiry date has been reached; the query is then
    /// permanently skipped. The `until` date is compared at UTC midnight.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.until {
            Some(date) => date.and_time(NaiveTime::MIN).and_utc() <= now,
            None => false,
        }
    }
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime, ScheduleError> {
    let invalid = |reason: &str| ScheduleError::InvalidTimeOfDay {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let (hour, minute) = value
        .split_once(':')
        .ok_or_else(|| invalid("expected HH:MM"))?;
    let hour: u32 = hour
        .trim()
        .parse()
        .map_err(|_| invalid("hour is not a number"))?;
    let minute: u32 = minute
        .trim()
        .parse()
        .map_err(|_| invalid("minute is not a number"))?;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| invalid("hour or minute out of range"))
}

fn parse_day_of_week(name: &str) -> Result<Weekday, ScheduleError> {
    name.parse::<Weekday>()
        .map_err(|_| ScheduleError::InvalidDayOfWeek(name.to_string()))
}

fn parse_until_date(value: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| ScheduleError::InvalidUntilDate {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// A query record as materialized from storage for the scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledQuery {
    pub id: i64,
    pub query_hash: String,
    pub data_source_id: i64,
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub schedule_failures: i32,
    /// When the query's latest result was retrieved; `None` for a query
    /// that has never produced a result
    pub last_retrieved_at: Option<DateTime<Utc>>,
}

impl ScheduledQuery {
    /// Replace the query text. The hash is recomputed and the failure
    /// streak resets, so backoff from a broken query does not outlive a fix.
    pub fn set_query_text(&mut self, text: &str) {
        self.query_hash = gen_query_hash(text);
        self.schedule_failures = 0;
    }
}

/// Hash of a query's text, normalized so insignificant whitespace and
/// casing do not produce distinct hashes.
pub fn gen_query_hash(text: &str) -> String {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}
