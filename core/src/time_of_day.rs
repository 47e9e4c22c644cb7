//! Lenient parsing of the clock values found in the input files.
//!
//! Both parsers return `None` instead of failing: an unreadable time is
//! stored as absent, never as an error.

use chrono::NaiveTime;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Parse an event start time such as `10:05` or `19:40:00`.
pub fn parse_local_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// Parse a performance mark (`9.58`, `1:45.32`, `2:01:09`) into the time of
/// day that many seconds after midnight.
///
/// Only the first whitespace-separated token is read, so trailing record
/// annotations (`10.49 WR`) are ignored. Status codes like `DNF` are absent.
pub fn parse_mark(raw: &str) -> Option<NaiveTime> {
    let token = raw.split_whitespace().next()?;

    let parts: Vec<&str> = token.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let (seconds_part, whole_parts) = parts.split_last()?;
    let seconds: f64 = seconds_part.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    let mut total = 0.0;
    for part in whole_parts {
        let value: u32 = part.parse().ok()?;
        total = total * 60.0 + f64::from(value);
    }
    total = total * 60.0 + seconds;
    if total >= SECONDS_PER_DAY {
        return None;
    }

    let nanos_total = (total * 1e9).round() as u64;
    let secs = (nanos_total / 1_000_000_000) as u32;
    let nanos = (nanos_total % 1_000_000_000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}
