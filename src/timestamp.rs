//! Archive timestamps
//!
//! Containers carry UTC dates as 14-digit `yyyyMMddHHmmss` strings. HTTP
//! `Date`-style headers come in the three forms RFC 9110 still tolerates.

use chrono::{DateTime, NaiveDateTime, Utc};

const FOURTEEN_DIGIT_FORMAT: &str = "%Y%m%d%H%M%S";

/// Render epoch milliseconds as `yyyyMMddHHmmss`.
pub fn fourteen_digit(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format(FOURTEEN_DIGIT_FORMAT).to_string())
}

/// The current time as `yyyyMMddHHmmss`.
pub fn now_fourteen_digit() -> String {
    Utc::now().format(FOURTEEN_DIGIT_FORMAT).to_string()
}

/// Parse an HTTP date into `yyyyMMddHHmmss`.
///
/// Accepts RFC 1123 (`Sun, 06 Nov 1994 08:49:37 GMT`), RFC 850
/// (`Sunday, 06-Nov-94 08:49:37 GMT`) and asctime
/// (`Sun Nov  6 08:49:37 1994`).
pub fn parse_http_date(value: &str) -> Option<String> {
    let value = value.trim();
    if let Ok(t) = DateTime::parse_from_rfc2822(value) {
        return Some(t.with_timezone(&Utc).format(FOURTEEN_DIGIT_FORMAT).to_string());
    }
    let parsed = NaiveDateTime::parse_from_str(value, "%A, %d-%b-%y %H:%M:%S GMT")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%a %b %e %H:%M:%S %Y"))
        .ok()?;
    Some(parsed.format(FOURTEEN_DIGIT_FORMAT).to_string())
}

/// Two-digit years misread as 209x are rewritten to 199x.
pub fn repair_legacy_year(date: String) -> String {
    match date.strip_prefix("209") {
        Some(rest) => format!("199{}", rest),
        None => date,
    }
}
