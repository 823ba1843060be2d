use crate::error::ValidationError;
use chrono::{DateTime, Months, NaiveDate, Utc};

/// Share of `part` in `total` as a whole percentage, rounded half away from
/// zero. Returns 0 when `total` is zero.
///
/// Integer arithmetic only, so `2 / 3` is exactly 67 and `1 / 8` exactly 13.
pub fn round_percentage(part: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let part = u64::from(part.min(total));
    let total = u64::from(total);
    // floor(100 * part / total + 1/2)
    ((200 * part + total) / (2 * total)) as u8
}

/// Every calendar date from `start` up to, but excluding, the same day of the
/// following month.
pub fn month_days(start: NaiveDate) -> Vec<NaiveDate> {
    let Some(end) = start.checked_add_months(Months::new(1)) else {
        return Vec::new();
    };
    start.iter_days().take_while(|d| *d < end).collect()
}

/// Formats a date as `YYYY-MM-DD`.
pub fn format_ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_ymd(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

/// Normalizes a backend date, either `YYYY-MM-DD` or a full RFC 3339
/// timestamp, to its UTC calendar date.
pub fn normalize_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}
