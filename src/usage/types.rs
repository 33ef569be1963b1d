//! Data types for card usage history.

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// One row of portal-reported card activity.
///
/// Fields serialize in PascalCase, which is the shape the serving interface
/// has always returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UsageRecord {
    /// The export carries no zone; the portal's wall-clock time is read as UTC
    /// so the field serializes as RFC 3339 (`2018-01-30T18:08:00Z`).
    pub date_time: DateTime<Utc>,
    pub transaction: String,
    pub product: String,
    pub line_item: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Kept verbatim; the portal does not always put money in this column.
    pub balance_details: String,
    pub order_date: String,
    pub payment: String,
    pub order_number: String,
    pub auth_code: String,
    pub total: String,
}

impl UsageRecord {
    /// Parses the balance column as money, using the same rules as `amount`.
    pub fn balance_amount(&self) -> Result<Decimal> {
        super::decoder::parse_amount(&self.balance_details)
    }
}

/// Inclusive time range scoping a usage query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageOptions {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl UsageOptions {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Covers a whole calendar month: the first day at midnight up to the last
    /// second of the last day.
    pub fn for_month(month: MonthKey) -> Self {
        let start = month.first_day().and_time(NaiveTime::MIN);
        let next = (month.first_day() + Months::new(1)).and_time(NaiveTime::MIN);
        Self {
            start,
            end: next - Duration::seconds(1),
        }
    }
}

/// A calendar year-month, displayed and parsed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey(NaiveDate);

impl MonthKey {
    /// Builds a key, rejecting months outside 1-12 and years outside 1-9999.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::invalid_input("month out of range [1, 12]"));
        }
        if !(1..=9999).contains(&year) {
            return Err(Error::invalid_input(format!(
                "year out of range [1, 9999]: {}",
                year
            )));
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| Error::invalid_input(format!("invalid month {}-{}", year, month)))
    }

    /// The month containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self(date - Days::new(u64::from(date.day0())))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.0 + Months::new(1) - Days::new(1)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for MonthKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| Error::invalid_input(format!("month key must be YYYY-MM: {:?}", s)))?;
        let digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !digits(year, 4) || !digits(month, 2) {
            return Err(Error::invalid_input(format!(
                "month key must be YYYY-MM: {:?}",
                s
            )));
        }
        let year: i32 = year
            .parse()
            .map_err(|_| Error::invalid_input(format!("invalid year in {:?}", s)))?;
        let month: u32 = month
            .parse()
            .map_err(|_| Error::invalid_input(format!("invalid month in {:?}", s)))?;
        Self::new(year, month)
    }
}

#[cfg(test)]
#[path = "tests/types_tests.rs"]
mod tests;
