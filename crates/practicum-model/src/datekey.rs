//! Calendar-date keys for hour entries.
//!
//! Entries are grouped by local calendar date, never by instant. The
//! canonical text form is ISO `YYYY-MM-DD`; the legacy form produced by the
//! original web tracker (`Mon Apr 01 2024`) is still accepted on input so
//! old exports keep working.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Legacy key layout: abbreviated weekday, month, zero-padded day, year.
const LEGACY_FORMAT: &str = "%a %b %d %Y";

/// A calendar date used as a storage key.
///
/// Serializes as the canonical ISO string; deserializes from either form,
/// so documents written by the original tracker round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        DateKey(date)
    }

    /// Build a key from calendar components; `None` for impossible dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(DateKey)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Key as stored on disk and over the wire.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        DateKey(date)
    }
}

impl TryFrom<String> for DateKey {
    type Error = DateKeyParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> String {
        key.to_string()
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Error parsing a date key from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date key `{0}` (expected YYYY-MM-DD or legacy `Mon Apr 01 2024`)")]
pub struct DateKeyParseError(pub String);

impl FromStr for DateKey {
    type Err = DateKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(DateKey(date));
        }
        NaiveDate::parse_from_str(trimmed, LEGACY_FORMAT)
            .map(DateKey)
            .map_err(|_| DateKeyParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_form_is_iso() {
        let key = DateKey::from_ymd(2024, 4, 1).unwrap();
        assert_eq!(key.to_string(), "2024-04-01");
    }

    #[test]
    fn test_parses_iso() {
        let key: DateKey = "2024-04-01".parse().unwrap();
        assert_eq!(key, DateKey::from_ymd(2024, 4, 1).unwrap());
    }

    #[test]
    fn test_parses_legacy_web_format() {
        // April 1st 2024 really was a Monday.
        let key: DateKey = "Mon Apr 01 2024".parse().unwrap();
        assert_eq!(key, DateKey::from_ymd(2024, 4, 1).unwrap());
    }

    #[test]
    fn test_legacy_weekday_must_match() {
        assert!("Tue Apr 01 2024".parse::<DateKey>().is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        let err = "next tuesday".parse::<DateKey>().unwrap_err();
        assert_eq!(err, DateKeyParseError("next tuesday".to_string()));
    }

    #[test]
    fn test_rejects_impossible_dates() {
        assert!(DateKey::from_ymd(2024, 2, 30).is_none());
        assert!("2024-02-30".parse::<DateKey>().is_err());
    }

    #[test]
    fn test_serde_writes_canonical_reads_both() {
        let key = DateKey::from_ymd(2024, 12, 25).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2024-12-25\"");
        let back: DateKey = serde_json::from_str("\"2024-12-25\"").unwrap();
        assert_eq!(back, key);

        let legacy: DateKey = serde_json::from_str("\"Wed Dec 25 2024\"").unwrap();
        assert_eq!(legacy, key);
    }

    #[test]
    fn test_ordering_follows_calendar() {
        let a: DateKey = "2024-01-31".parse().unwrap();
        let b: DateKey = "2024-02-01".parse().unwrap();
        assert!(a < b);
    }
}
