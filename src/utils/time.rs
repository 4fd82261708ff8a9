// src/utils/time.rs

//! Date and time helpers shared by the collectors.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};

use crate::error::{AppError, Result};

/// Midnight UTC `days` days before today; the default backfill start.
pub fn backfill_start(days: i64) -> DateTime<Utc> {
    let today = Utc::now().date_naive();
    (today - Duration::days(days))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Parse a `YYYY-MM-DD` day into midnight UTC.
pub fn parse_day(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| AppError::validation(format!("Invalid date '{s}' (expected YYYY-MM-DD): {e}")))?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

/// `YYYY-MM-DD` stamp for directory naming.
pub fn day_stamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Compact second-resolution stamp for file naming.
pub fn compact_stamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%S").to_string()
}

/// Minutes elapsed since midnight, for sub-daily snapshot file names.
pub fn minute_of_day(ts: DateTime<Utc>) -> u32 {
    ts.hour() * 60 + ts.minute()
}
