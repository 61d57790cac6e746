//! Primitives callable from templates.

use time::{Date, OffsetDateTime, macros::format_description};

/// Whole days from now until midnight UTC of `date` (`M/D/YYYY`), truncated toward zero.
///
/// Dates in the past give negative counts. Unparseable input gives `-1`.
pub fn days_until(date: &str) -> i64 {
    days_between(date, OffsetDateTime::now_utc()).unwrap_or(-1)
}

/// Whole days from `now` until midnight UTC of `date`, or `None` when `date` does not parse.
pub fn days_between(date: &str, now: OffsetDateTime) -> Option<i64> {
    let format = format_description!("[month padding:none]/[day padding:none]/[year]");
    let target = Date::parse(date.trim(), format).ok()?.midnight().assume_utc();
    let seconds = (target - now).whole_seconds();
    Some(seconds / 86_400)
}

pub fn eq_str(a: &str, b: &str) -> bool {
    a == b
}

pub fn eq_int(a: i64, b: i64) -> bool {
    a == b
}
