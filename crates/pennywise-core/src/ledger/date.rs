use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Next occurrence strictly after `base`.
    ///
    /// Monthly and yearly steps land on `anchor_day` (normally the rule's
    /// start day-of-month), clamped to the last day of shorter months.
    pub fn advance(self, base: NaiveDate, anchor_day: u32) -> NaiveDate {
        match self {
            Self::Daily => base + Duration::days(1),
            Self::Weekly => base + Duration::days(7),
            Self::Monthly => add_months_anchored(base, 1, anchor_day),
            Self::Yearly => add_months_anchored(base, 12, anchor_day),
        }
    }
}

impl FromStr for Frequency {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(CoreError::invalid_frequency(value)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn add_months_clamped(date: NaiveDate, months: i32) -> NaiveDate {
    add_months_anchored(date, months, date.day())
}

pub fn add_months_anchored(date: NaiveDate, months: i32, anchor_day: u32) -> NaiveDate {
    let current_month = i32::try_from(date.month()).unwrap_or(1);
    let mut raw_month = current_month + months;
    let mut year = date.year();

    while raw_month > 12 {
        raw_month -= 12;
        year += 1;
    }
    while raw_month < 1 {
        raw_month += 12;
        year -= 1;
    }

    let month_u32 = u32::try_from(raw_month).unwrap_or(1);
    let day = anchor_day.clamp(1, days_in_month(year, month_u32));
    if let Some(result) = NaiveDate::from_ymd_opt(year, month_u32, day) {
        return result;
    }
    date
}

pub fn start_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

pub fn end_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))
}

/// Inclusive `[first 00:00:00, last 23:59:59]` window for a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub year: i32,
    pub month: u32,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl MonthWindow {
    pub fn new(year: i32, month: u32) -> CoreResult<Self> {
        let (Some(first), Some(last)) = (start_of_month(year, month), end_of_month(year, month))
        else {
            return Err(CoreError::invalid_field(
                "month",
                &format!("Month must be between 1 and 12, got {month}."),
            ));
        };
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Ok(Self {
            year,
            month,
            start: first.and_time(NaiveTime::MIN),
            end: last.and_time(end_of_day),
        })
    }

    pub fn containing(date: NaiveDate) -> CoreResult<Self> {
        Self::new(date.year(), date.month())
    }

    /// The month `months` calendar months before this one.
    pub fn shifted_back(&self, months: u32) -> CoreResult<Self> {
        let offset = i32::try_from(months).unwrap_or(i32::MAX);
        let first = add_months_clamped(self.start.date(), -offset);
        Self::containing(first)
    }

    pub fn period_label(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 31,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn format_iso_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

pub fn parse_iso_date(value: &str, field_name: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        CoreError::invalid_field(
            field_name,
            &format!("`{field_name}` must use YYYY-MM-DD format with a real calendar date."),
        )
    })
}

/// Accepts either `YYYY-MM-DD HH:MM:SS` or a bare date (midnight).
pub fn parse_timestamp(value: &str, field_name: &str) -> CoreResult<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT) {
        return Ok(parsed);
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(parsed);
    }
    parse_iso_date(trimmed, field_name)
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| {
            CoreError::invalid_field(
                field_name,
                &format!("`{field_name}` must use `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`."),
            )
        })
}
