//! Integer-encoded calendar dates (`YYYYMMDD`).
//!
//! Ordering is plain integer ordering. Day arithmetic goes through
//! `chrono::NaiveDate` (proleptic Gregorian); encodings that are not calendar
//! dates roll over month and day the way `YYYYMMDD` arithmetic would.

use core::fmt;
use core::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, Months, NaiveDate, TimeDelta};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{LedgerError, LedgerResult};

static YYYYMMDD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})[-/.]?([0-9]?[0-9])?[-/.]?([0-9]?[0-9])?$").expect("static regex")
});
static DDMMYYYY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]?[0-9])[-/.]?([0-9]?[0-9])[-/.]?([0-9]{4})$").expect("static regex")
});
static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(this|last|next)[._ \t]+(month|year|quarter)$").expect("static regex")
});

/// Calendar date stored as `year * 10000 + month * 100 + day`.
///
/// Zero is the "unset" sentinel.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date(i32);

/// Calendar granularity used for flooring and period averaging.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Monthly,
    Quarterly,
    Yearly,
}

impl Date {
    pub const UNSET: Date = Date(0);

    pub const fn new(year: i32, month: u32, day: u32) -> Self {
        Date(year * 10000 + month as i32 * 100 + day as i32)
    }

    pub const fn from_int(value: i32) -> Self {
        Date(value)
    }

    pub const fn as_int(self) -> i32 {
        self.0
    }

    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }

    pub const fn year(self) -> i32 {
        self.0 / 10000
    }

    pub const fn month(self) -> u32 {
        ((self.0 / 100) % 100) as u32
    }

    pub const fn day(self) -> u32 {
        (self.0 % 100) as u32
    }

    /// Today's date from the local clock.
    pub fn today() -> Self {
        Self::from(chrono::Local::now().date_naive())
    }

    /// Days since 0001/01/01 (which is day zero).
    ///
    /// Out-of-range months are clamped to `0..=12` elapsed months and
    /// out-of-range days overflow into the following months, so the unset
    /// date and `2020/02/30` still have a position on the day line.
    pub fn as_days(self) -> i64 {
        if let Some(date) = self.to_naive_date() {
            return i64::from(date.num_days_from_ce()) - 1;
        }
        let months = Months::new(self.month().saturating_sub(1).min(12));
        NaiveDate::from_ymd_opt(self.year(), 1, 1)
            .and_then(|first| first.checked_add_months(months))
            .map_or(0, |first| {
                i64::from(first.num_days_from_ce()) - 1 + i64::from(self.day()) - 1
            })
    }

    /// Inverse of [`Date::as_days`]. Days outside chrono's range give the
    /// unset date.
    pub fn from_days(days: i64) -> Self {
        days.checked_add(1)
            .and_then(|ce| i32::try_from(ce).ok())
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map_or(Date::UNSET, Date::from)
    }

    /// Whole days from `earlier` to `self` (negative if `earlier` is later).
    pub fn days_since(self, earlier: Date) -> i64 {
        match (self.to_naive_date(), earlier.to_naive_date()) {
            (Some(later), Some(earlier)) => later.signed_duration_since(earlier).num_days(),
            _ => self.as_days() - earlier.as_days(),
        }
    }

    pub fn add_days(self, days: i64) -> Self {
        self.to_naive_date()
            .and_then(|date| date.checked_add_signed(TimeDelta::try_days(days)?))
            .map_or_else(|| Self::from_days(self.as_days() + days), Date::from)
    }

    pub fn floor(self, period: Period) -> Self {
        self.floor_diff(period, 0)
    }

    /// Floor to the start of the containing period, then move `diff` periods.
    pub fn floor_diff(self, period: Period, diff: i32) -> Self {
        match period {
            Period::Daily => self.add_days(i64::from(diff)),
            Period::Monthly => self.floor_month(diff),
            Period::Quarterly => self.floor_quarter(diff),
            Period::Yearly => self.floor_year(diff),
        }
    }

    pub fn floor_year(self, diff: i32) -> Self {
        Date::new(self.year() + diff, 1, 1)
    }

    pub fn floor_month(self, diff: i32) -> Self {
        Self::first_of_month(self.year(), self.month() as i32 - 1 + diff)
    }

    pub fn floor_quarter(self, diff: i32) -> Self {
        let quarter = (self.month() as i32 - 1) / 3;
        Self::first_of_month(self.year(), (quarter + diff) * 3)
    }

    fn first_of_month(year: i32, month0: i32) -> Self {
        Date::new(
            year + month0.div_euclid(12),
            month0.rem_euclid(12) as u32 + 1,
            1,
        )
    }

    /// Fractional year: `year - 1 + elapsed days / days in year`.
    pub fn as_years(self) -> f64 {
        let year = self.year();
        let first = Date::new(year, 1, 1);
        let elapsed = self.as_days() - first.as_days();
        let leap = first.to_naive_date().is_some_and(|d| d.leap_year());
        let length = if leap { 366.0 } else { 365.0 };
        f64::from(year - 1) + elapsed as f64 / length
    }

    pub fn year_label(self) -> String {
        format!("{:04}", self.year())
    }

    pub fn year_month_label(self) -> String {
        format!("{:04}/{:02}", self.year(), self.month())
    }

    pub fn year_quarter_label(self) -> String {
        format!("{:04} Q{}", self.year(), (self.month().saturating_sub(1)) / 3 + 1)
    }

    pub fn to_naive_date(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year(), self.month(), self.day())
    }

    /// Parse a date, resolving `this|last|next month|quarter|year` against `today`.
    pub fn parse_relative_to(input: &str, today: Date) -> LedgerResult<Self> {
        let input = input.trim();

        if let Some(caps) = YYYYMMDD.captures(input) {
            let year = parse_part(caps.get(1).map(|m| m.as_str()), input)?;
            let month = parse_part(caps.get(2).map(|m| m.as_str()), input)?.max(1);
            let day = parse_part(caps.get(3).map(|m| m.as_str()), input)?.max(1);
            return Self::checked(year as i32, month, day, input);
        }

        if let Some(caps) = DDMMYYYY.captures(input) {
            let day = parse_part(caps.get(1).map(|m| m.as_str()), input)?;
            let month = parse_part(caps.get(2).map(|m| m.as_str()), input)?;
            let year = parse_part(caps.get(3).map(|m| m.as_str()), input)?;
            return Self::checked(year as i32, month, day, input);
        }

        if let Some(caps) = RELATIVE.captures(input) {
            let diff = match &caps[1] {
                "last" => -1,
                "next" => 1,
                _ => 0,
            };
            return Ok(match &caps[2] {
                "year" => today.floor_year(diff),
                "quarter" => today.floor_quarter(diff),
                _ => today.floor_month(diff),
            });
        }

        input
            .parse::<i32>()
            .map(Date)
            .map_err(|_| LedgerError::invalid_date(input))
    }

    fn checked(year: i32, month: u32, day: u32, input: &str) -> LedgerResult<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Date::from)
            .ok_or_else(|| LedgerError::invalid_date(input))
    }
}

fn parse_part(part: Option<&str>, input: &str) -> LedgerResult<u32> {
    match part {
        None => Ok(0),
        Some(text) => text
            .parse::<u32>()
            .map_err(|_| LedgerError::invalid_date(input)),
    }
}

impl FromStr for Date {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_relative_to(s, Date::today())
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            return write!(f, "{:10}", "");
        }
        write!(f, "{:04}/{:02}/{:02}", self.year(), self.month(), self.day())
    }
}

impl Serialize for Date {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!(
            "{:04}-{:02}-{:02}T00:00:00Z",
            self.year(),
            self.month(),
            self.day()
        ))
    }
}

impl From<NaiveDate> for Date {
    fn from(value: NaiveDate) -> Self {
        Date::new(value.year(), value.month(), value.day())
    }
}

impl FromStr for Period {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Period::Daily),
            "monthly" => Ok(Period::Monthly),
            "quarterly" => Ok(Period::Quarterly),
            "yearly" => Ok(Period::Yearly),
            other => Err(LedgerError::invalid_period(other)),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Period::Daily => "daily",
            Period::Monthly => "monthly",
            Period::Quarterly => "quarterly",
            Period::Yearly => "yearly",
        })
    }
}
