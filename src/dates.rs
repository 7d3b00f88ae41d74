// src/dates.rs

use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::error::ConfigError;

/// Format used to address one day's source file.
pub const TOKEN_FORMAT: &str = "%Y-%m-%d";

/// An inclusive `[start, end]` span of calendar days. `start <= end` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Apply the run's defaulting rules to optional configured dates:
    ///  - neither given → yesterday (relative to `today`) only
    ///  - start only → that single day
    ///  - both → the span between them
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, ConfigError> {
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            (Some(start), None) => Ok(Self::single(start)),
            (None, Some(end)) => Err(ConfigError::EndWithoutStart(end)),
            (None, None) => {
                let yesterday = today
                    .checked_sub_days(Days::new(1))
                    .ok_or_else(|| ConfigError::InvalidDate(today.to_string()))?;
                Ok(Self::single(yesterday))
            }
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, both ends included.
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Always false: `new` rejects `start > end`, so a range holds at least one day.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every day in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// A `YYYY-MM-DD` string addressing one day's file.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateToken(String);

impl DateToken {
    pub fn from_date(date: NaiveDate) -> Self {
        DateToken(date.format(TOKEN_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DateToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tokens for every day of `range`, ascending.
pub fn fill_date_range(range: &DateRange) -> Vec<DateToken> {
    if range.start == range.end {
        return vec![DateToken::from_date(range.start)];
    }
    range.days().map(DateToken::from_date).collect()
}

/// Parse a configured date. Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYYMMDD`
/// and datetimes (`YYYY-MM-DDTHH:MM:SS`, with or without offset), whose
/// time part is dropped.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ConfigError> {
    let s = raw.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    Err(ConfigError::InvalidDate(raw.to_string()))
}
