//! Date/time utilities for postbox.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision, so comparing the stored text compares the instants.

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use chrono_tz::Tz;

/// Current time at storage precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Render a timestamp in its storage form (e.g. `2024-01-15T10:30:00.000000Z`).
pub fn to_db_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Check if `dt` survives a round trip through [`to_db_string`].
///
/// Years outside `0000..=9999` are written with a sign and more than four
/// digits, which neither parses back nor sorts as text.
pub fn is_storable(dt: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&dt.year())
}

/// Latest instant at storage precision that is not after `dt`.
pub fn floor_to_storage(dt: &DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(6)
}

/// Earliest instant at storage precision that is not before `dt`.
pub fn ceil_to_storage(dt: &DateTime<Utc>) -> DateTime<Utc> {
    let floor = floor_to_storage(dt);
    if floor < *dt {
        floor
            .checked_add_signed(TimeDelta::microseconds(1))
            .unwrap_or(floor)
    } else {
        floor
    }
}

/// Parse a timestamp read back from storage.
pub fn from_db_string(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a user-supplied timestamp.
///
/// Accepts RFC 3339, RFC 2822 (`Tue, 18 Jan 2022 09:37:29 +0300`) and the
/// SQLite form `YYYY-MM-DD HH:MM:SS`, which is taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a DateTime<Utc> in the specified timezone.
///
/// Falls back to UTC when the timezone name is unknown.
pub fn format_utc_datetime(dt: &DateTime<Utc>, timezone: &str, format: &str) -> String {
    let tz: Tz = match timezone.parse() {
        Ok(tz) => tz,
        Err(_) => return dt.format(format).to_string(),
    };
    dt.with_timezone(&tz).format(format).to_string()
}
