//! HTTP date parsing and formatting (RFC 7231 §7.1.1.1).

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse an HTTP date header value.
///
/// Accepts, in order of preference: IMF-fixdate (`Sun, 06 Nov 1994 08:49:37
/// GMT`), the obsolete RFC 850 form (`Sunday, 06-Nov-94 08:49:37 GMT`), the
/// ANSI C `asctime()` form, and RFC 2822 as a lenient fallback.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    // The fixed formats spell out GMT, so parse naive and pin to UTC.
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT") {
        return Some(dt.and_utc());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%A, %d-%b-%y %H:%M:%S GMT") {
        return Some(dt.and_utc());
    }

    // asctime carries no zone; RFC 7231 says interpret as GMT.
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%a %b %e %H:%M:%S %Y") {
        return Some(dt.and_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

/// Format a timestamp as an IMF-fixdate string, the only form senders may
/// generate.
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
