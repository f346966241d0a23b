// Due-time calculation for scheduled queries
//
// Decides whether a query's next refresh has come due, given the timestamp
// of its previous run and its validated schedule parameters. Pure: the
// caller supplies `now`, so every decision is reproducible in tests.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};

/// Largest failure exponent applied to backoff. 2^28 minutes is around 510
/// years, far past any real schedule, and keeps the delay well inside
/// `chrono::Duration` range for any failure count.
const MAX_FAILURE_EXPONENT: i32 = 28;

const SECONDS_PER_DAY: i64 = 86_400;

/// Compute the next scheduled refresh time after `previous_iteration`.
///
/// Without a time-of-day anchor the schedule rolls: the next run is simply
/// `previous_iteration + interval` seconds. With an anchor the next run
/// lands on the anchor's hour and minute, `interval / 86400` whole days
/// ahead, shifted onto `day_of_week` when one is set. Each failure in a
/// row pushes the result out by `2^failures` minutes.
pub fn next_iteration(
    previous_iteration: DateTime<Utc>,
    interval: i64,
    time_of_day: Option<NaiveTime>,
    day_of_week: Option<Weekday>,
    failures: i32,
) -> DateTime<Utc> {
    let mut next = match time_of_day {
        None => previous_iteration + Duration::seconds(interval),
        Some(anchor) => {
            // Re-anchor the previous run to its own day's anchor time. When
            // the previous run landed after midnight but before the anchor
            // (anchored at 23:59, scheduler woke at 00:01), that day's
            // anchor is still ahead of the run, so the run belongs to the
            // previous day; without the rollback a whole day is skipped.
            let mut normalized = at_anchor(previous_iteration, anchor);
            if normalized > previous_iteration {
                normalized -= Duration::days(1);
            }

            let days_delay = interval / SECONDS_PER_DAY;
            let days_to_add = match day_of_week {
                Some(target) => {
                    i64::from(target.num_days_from_monday())
                        - i64::from(normalized.weekday().num_days_from_monday())
                }
                None => 0,
            };

            normalized + Duration::days(days_delay + days_to_add)
        }
    };

    if failures > 0 {
        let exponent = failures.min(MAX_FAILURE_EXPONENT);
        next += Duration::minutes(1i64 << exponent);
    }

    next
}

/// True when `now` has passed the next scheduled refresh time.
///
/// The boundary is strict: a query becomes due only after its next
/// iteration, not at it.
pub fn should_schedule_next(
    previous_iteration: DateTime<Utc>,
    now: DateTime<Utc>,
    interval: i64,
    time_of_day: Option<NaiveTime>,
    day_of_week: Option<Weekday>,
    failures: i32,
) -> bool {
    now > next_iteration(previous_iteration, interval, time_of_day, day_of_week, failures)
}

/// Replace the hour and minute of `ts` with the anchor's, keeping seconds.
fn at_anchor(ts: DateTime<Utc>, anchor: NaiveTime) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(anchor.hour(), anchor.minute(), ts.time().second())
        .unwrap_or(anchor);
    ts.date_naive().and_time(time).and_utc()
}
