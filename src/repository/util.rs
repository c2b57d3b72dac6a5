//! Repository utilities.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use diesel::result::DatabaseErrorInformation;

/// Simple error info wrapper for database errors.
#[derive(Debug)]
pub struct DbErrorInfo(pub String);

impl DatabaseErrorInformation for DbErrorInfo {
    fn message(&self) -> &str {
        &self.0
    }
    fn details(&self) -> Option<&str> {
        None
    }
    fn hint(&self) -> Option<&str> {
        None
    }
    fn table_name(&self) -> Option<&str> {
        None
    }
    fn column_name(&self) -> Option<&str> {
        None
    }
    fn constraint_name(&self) -> Option<&str> {
        None
    }
    fn statement_position(&self) -> Option<i32> {
        None
    }
}

/// Convert any displayable error to a diesel error with proper message.
pub fn to_diesel_error(e: impl std::fmt::Display) -> diesel::result::Error {
    diesel::result::Error::DatabaseError(
        diesel::result::DatabaseErrorKind::Unknown,
        Box::new(DbErrorInfo(e.to_string())),
    )
}

/// Format a timestamp for storage.
///
/// Fixed microsecond precision and a `Z` suffix keep string order equal to
/// chronological order, which the call-log window query relies on.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 and the offset-less ISO form older databases contain,
/// which is read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_timestamp_round_trip() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let s = format_timestamp(ts);
        assert_eq!(s, "2024-03-01T12:30:00.000000Z");
        assert_eq!(parse_timestamp(&s), Some(ts));
    }

    #[test]
    fn test_formatted_order_is_chronological() {
        let a = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let b = a + Duration::milliseconds(1);
        let c = a + Duration::hours(20);
        assert!(format_timestamp(a) < format_timestamp(b));
        assert!(format_timestamp(b) < format_timestamp(c));
    }

    #[test]
    fn test_parse_legacy_naive_timestamp() {
        let parsed = parse_timestamp("2024-01-15T08:00:00.123456").unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap() + Duration::microseconds(123456)
        );
        assert!(parse_timestamp("yesterday").is_none());
    }
}
