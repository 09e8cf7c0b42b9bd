//! Lazy date/time coercion and fixed-length unit arithmetic
//!
//! Strings and numbers are only interpreted as instants when a date-aware
//! operator demands it. Units use fixed equivalences (a month is 30 days, a
//! year 365) so window checks stay deterministic.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::ast::Span;
use crate::error::{Error, Result};
use crate::value::Value;

/// Coerce a value to an instant under a date-aware operator.
///
/// Instants pass through, strings are parsed, integers and floats are Unix
/// seconds. Anything else, and any unparseable string, is a type error.
pub(crate) fn coerce_instant(value: &Value, span: Span) -> Result<DateTime<Utc>> {
    match value {
        Value::Instant(t) => Ok(*t),
        Value::String(s) => parse_instant(s).ok_or_else(|| {
            Error::type_at(span, format!("could not parse date string: '{}'", s))
        }),
        Value::Int(secs) => Utc
            .timestamp_opt(*secs, 0)
            .single()
            .ok_or_else(|| Error::type_at(span, format!("timestamp out of range: {}", secs))),
        Value::Float(secs) => Utc
            .timestamp_millis_opt((secs * 1000.0) as i64)
            .single()
            .ok_or_else(|| Error::type_at(span, format!("timestamp out of range: {}", secs))),
        other => Err(Error::type_at(
            span,
            format!("cannot interpret {} as a date/time", other.kind_name()),
        )),
    }
}

/// Parse a date/time string in one of the supported forms.
///
/// Accepted, in order: ISO 8601 with offset (`Z` or `+HH:MM`),
/// `YYYY-MM-DD HH:MM:SS UTC`, `YYYY-MM-DDTHH:MM:SS[.fff]`,
/// `YYYY-MM-DD HH:MM:SS`, and bare `YYYY-MM-DD` (midnight UTC).
/// Offset-free forms are taken as UTC.
pub(crate) fn parse_instant(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in [
        "%Y-%m-%d %H:%M:%S UTC",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let naive = NaiveDateTime::new(date, NaiveTime::MIN);
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }

    None
}

/// UTC midnight of the day containing `now` (the value of `$today`)
pub(crate) fn midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let naive = NaiveDateTime::new(now.date_naive(), NaiveTime::MIN);
    DateTime::from_naive_utc_and_offset(naive, Utc)
}
