//! Timestamp parsing
//!
//! Exports mix strict ISO-8601 with whatever the spreadsheet tool wrote, so
//! parsing is two-stage: RFC 3339 first, then a list of permissive formats.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Naive date-time layouts tried after RFC 3339
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M",
];

/// Layouts carrying an explicit offset without a colon (`+0900`)
const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a timestamp cell into UTC.
///
/// Values without an offset are read as local time at `naive_offset`.
pub fn parse_timestamp(raw: &str, naive_offset: FixedOffset) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }

    // A trailing `Z` after a space-separated time is common in exports
    let normalized = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    let zulu = normalized.len() != trimmed.len();

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(normalized, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(normalized, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(normalized, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    if zulu {
        return Some(Utc.from_utc_datetime(&naive));
    }
    naive_offset
        .from_local_datetime(&naive)
        .single()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Offset for a whole number of hours east of UTC
pub fn offset_from_hours(hours: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(hours.checked_mul(3600)?)
}

/// Year of the academic window containing `ts`.
///
/// With `start_month = 4` the 2024 year runs from 2024-04-01 to 2025-03-31.
pub fn academic_year(ts: DateTime<Utc>, start_month: u32) -> i32 {
    if ts.month() >= start_month {
        ts.year()
    } else {
        ts.year() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_strict_iso8601() {
        let ts = parse_timestamp("2023-05-01T10:00:00+09:00", utc()).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 5, 1, 1, 0, 0).unwrap());
    }

    #[test]
    fn test_permissive_formats() {
        let expected = Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2023-05-01 10:00:00", utc()), Some(expected));
        assert_eq!(parse_timestamp("2023/05/01 10:00:00", utc()), Some(expected));
        assert_eq!(parse_timestamp("2023/05/01 10:00", utc()), Some(expected));
        assert_eq!(parse_timestamp("2023-05-01 10:00:00.000Z", utc()), Some(expected));
        assert_eq!(parse_timestamp("2023-05-01T19:00:00+0900", utc()), Some(expected));
        assert_eq!(
            parse_timestamp("2023-05-01", utc()),
            Some(Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_naive_values_use_configured_offset() {
        let jst = offset_from_hours(9).unwrap();
        let ts = parse_timestamp("2023-05-01 10:00:00", jst).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 5, 1, 1, 0, 0).unwrap());
    }

    #[test]
    fn test_unparseable_timestamp() {
        assert_eq!(parse_timestamp("yesterday", utc()), None);
        assert_eq!(parse_timestamp("", utc()), None);
        assert_eq!(parse_timestamp("2023-13-45 10:00:00", utc()), None);
    }

    #[test]
    fn test_academic_year() {
        let march = Utc.with_ymd_and_hms(2024, 3, 31, 23, 0, 0).unwrap();
        let april = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(academic_year(march, 4), 2023);
        assert_eq!(academic_year(april, 4), 2024);
        assert_eq!(academic_year(march, 1), 2024);
    }
}
