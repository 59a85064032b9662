//! Date value coercion for date columns and date fields.
//!
//! Dates are stored as `YYYY-MM-DD HH:MM:SS` text, so every accepted input
//! is normalised to a range in that format. The range width follows the
//! precision of the input:
//! - "2024" covers the entire year
//! - "2024-01" covers the entire month
//! - "2024-01-15", "today", "yesterday" cover the entire day
//! - everything else covers a single second

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::Scalar;

/// Storage format of date columns.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Precision of a parsed date value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPrecision {
    /// A whole year.
    Year,
    /// A whole month.
    Month,
    /// A whole day.
    Day,
    /// A single second.
    Second,
}

/// A parsed date value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// First instant covered by the value.
    pub start: NaiveDateTime,
    /// How much time the value covers.
    pub precision: TimestampPrecision,
}

impl Timestamp {
    fn new(start: NaiveDateTime, precision: TimestampPrecision) -> Self {
        Self { start, precision }
    }

    /// First instant after the covered range, or `None` past the last
    /// representable date.
    pub fn end(&self) -> Option<NaiveDateTime> {
        let next_period = |year: i32, month: u32| {
            NaiveDate::from_ymd_opt(year, month, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        };
        match self.precision {
            TimestampPrecision::Year => next_period(self.start.year() + 1, 1),
            TimestampPrecision::Month if self.start.month() == 12 => {
                next_period(self.start.year() + 1, 1)
            }
            TimestampPrecision::Month => next_period(self.start.year(), self.start.month() + 1),
            TimestampPrecision::Day => self.start.checked_add_signed(Duration::days(1)),
            TimestampPrecision::Second => self.start.checked_add_signed(Duration::seconds(1)),
        }
    }

    /// The covered range as storage-formatted `[start, end)` strings.
    pub fn range(&self) -> Option<(String, String)> {
        let end = self.end()?;
        Some((
            self.start.format(STORAGE_FORMAT).to_string(),
            end.format(STORAGE_FORMAT).to_string(),
        ))
    }
}

/// Parses a date value relative to `now`.
///
/// Accepts unix seconds, `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, date-times with a
/// space or `T` separator, RFC 3339, the words `now`, `today`, `yesterday`,
/// `tomorrow`, and relative offsets such as `-2 weeks`, `+3 days` or
/// `1 month ago`.
///
/// Values whose range would end past the last representable date are
/// rejected.
pub fn parse_timestamp(value: &Scalar, now: DateTime<Utc>) -> Option<Timestamp> {
    let ts = match value {
        Scalar::Integer(secs) => from_unix(*secs),
        Scalar::Float(secs) => from_unix(*secs as i64),
        Scalar::Text(text) => parse_text(text.trim(), now),
        Scalar::Null => None,
    }?;
    ts.end().map(|_| ts)
}

fn from_unix(secs: i64) -> Option<Timestamp> {
    let dt = Utc.timestamp_opt(secs, 0).single()?;
    Some(Timestamp::new(dt.naive_utc(), TimestampPrecision::Second))
}

fn parse_text(text: &str, now: DateTime<Utc>) -> Option<Timestamp> {
    let lower = text.to_ascii_lowercase();
    let today = now.date_naive().and_hms_opt(0, 0, 0)?;

    match lower.as_str() {
        "" => return None,
        "now" => return Some(Timestamp::new(now.naive_utc(), TimestampPrecision::Second)),
        "today" => return Some(Timestamp::new(today, TimestampPrecision::Day)),
        "yesterday" => {
            return Some(Timestamp::new(
                today.checked_sub_signed(Duration::days(1))?,
                TimestampPrecision::Day,
            ));
        }
        "tomorrow" => {
            return Some(Timestamp::new(
                today.checked_add_signed(Duration::days(1))?,
                TimestampPrecision::Day,
            ));
        }
        _ => {}
    }

    if lower.bytes().all(|b| b.is_ascii_digit()) {
        if lower.len() == 4 {
            let year = lower.parse().ok()?;
            let start = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
            return Some(Timestamp::new(start, TimestampPrecision::Year));
        }
        return from_unix(lower.parse().ok()?);
    }

    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", lower), "%Y-%m-%d") {
        if lower.len() == 7 {
            return Some(Timestamp::new(
                date.and_hms_opt(0, 0, 0)?,
                TimestampPrecision::Month,
            ));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(&lower, "%Y-%m-%d") {
        return Some(Timestamp::new(
            date.and_hms_opt(0, 0, 0)?,
            TimestampPrecision::Day,
        ));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dt%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&lower, format) {
            return Some(Timestamp::new(dt, TimestampPrecision::Second));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Timestamp::new(
            dt.with_timezone(&Utc).naive_utc(),
            TimestampPrecision::Second,
        ));
    }

    parse_relative(&lower, now)
}

/// Parses `-2 weeks`, `+3 days`, `1 month ago` or `2 weeks`.
fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<Timestamp> {
    let (mut negative, mut rest) = match text.chars().next()? {
        '-' => (true, &text[1..]),
        '+' => (false, &text[1..]),
        _ => (false, text),
    };
    if let Some(stripped) = rest.trim_end().strip_suffix("ago") {
        negative = !negative;
        rest = stripped;
    }

    // humantime wants "2weeks 3days"
    let mut normalized = String::new();
    let mut pending_number = false;
    for token in rest.split_whitespace() {
        let is_number = token.bytes().all(|b| b.is_ascii_digit());
        if !normalized.is_empty() && !pending_number {
            normalized.push(' ');
        }
        normalized.push_str(token);
        pending_number = is_number;
    }

    let offset = humantime::parse_duration(&normalized).ok()?;
    let offset = Duration::from_std(offset).ok()?;
    let instant = if negative {
        now.checked_sub_signed(offset)?
    } else {
        now.checked_add_signed(offset)?
    };
    Some(Timestamp::new(instant.naive_utc(), TimestampPrecision::Second))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap()
    }

    fn range(value: impl Into<Scalar>) -> (String, String) {
        parse_timestamp(&value.into(), now()).unwrap().range().unwrap()
    }

    #[test]
    fn test_precision_ranges() {
        assert_eq!(
            range("2024"),
            ("2024-01-01 00:00:00".into(), "2025-01-01 00:00:00".into())
        );
        assert_eq!(
            range("2024-12"),
            ("2024-12-01 00:00:00".into(), "2025-01-01 00:00:00".into())
        );
        assert_eq!(
            range("2024-01-15"),
            ("2024-01-15 00:00:00".into(), "2024-01-16 00:00:00".into())
        );
        assert_eq!(
            range("2024-01-15 10:00:00"),
            ("2024-01-15 10:00:00".into(), "2024-01-15 10:00:01".into())
        );
    }

    #[test]
    fn test_unix_seconds() {
        assert_eq!(range(0).0, "1970-01-01 00:00:00");
        assert_eq!(range("86400").0, "1970-01-02 00:00:00");
    }

    #[test]
    fn test_words() {
        assert_eq!(range("today").0, "2024-03-15 00:00:00");
        assert_eq!(range("yesterday").0, "2024-03-14 00:00:00");
        assert_eq!(range("tomorrow").1, "2024-03-17 00:00:00");
        assert_eq!(range("now").0, "2024-03-15 12:30:00");
    }

    #[test]
    fn test_relative_offsets() {
        assert_eq!(range("-2 weeks").0, "2024-03-01 12:30:00");
        assert_eq!(range("3 days ago").0, "2024-03-12 12:30:00");
        assert_eq!(range("+1 day").0, "2024-03-16 12:30:00");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_timestamp(&Scalar::from("not a date"), now()).is_none());
        assert!(parse_timestamp(&Scalar::Null, now()).is_none());
        assert!(parse_timestamp(&Scalar::from(""), now()).is_none());
    }

    #[test]
    fn test_rejects_values_ending_past_the_last_date() {
        let last = NaiveDateTime::MAX.and_utc().timestamp();
        assert!(parse_timestamp(&Scalar::Integer(last), now()).is_none());
        assert!(parse_timestamp(&Scalar::from(last.to_string()), now()).is_none());

        let ts = parse_timestamp(&Scalar::Integer(last - 1), now()).unwrap();
        assert!(ts.end().is_some());
    }
}
