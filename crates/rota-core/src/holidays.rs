//! Public holidays and working-day arithmetic.
//!
//! A day is non-working when it is a Sunday or a public holiday of the
//! configured country. Saturdays count as working days; individual
//! employees mark theirs off with day-off shifts.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::period::MonthKey;

pub const MAX_WORKING_DAYS_OVERRIDE: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Country {
    #[default]
    CzechRepublic,
    Germany,
}

impl Country {
    pub fn code(self) -> &'static str {
        match self {
            Self::CzechRepublic => "CZ",
            Self::Germany => "DE",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CzechRepublic => "Czech Republic",
            Self::Germany => "Germany",
        }
    }

    /// Name of the public holiday falling on `date`, if any.
    pub fn holiday_name(self, date: NaiveDate) -> Option<&'static str> {
        match self {
            Self::CzechRepublic => czech_holiday(date),
            Self::Germany => german_holiday(date),
        }
    }

    pub fn holidays_in_year(self, year: i32) -> Vec<Holiday> {
        let Some(start) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            return Vec::new();
        };
        start
            .iter_days()
            .take_while(|day| day.year() == year)
            .filter_map(|date| {
                self.holiday_name(date)
                    .map(|name| Holiday { date, name })
            })
            .collect()
    }
}

impl FromStr for Country {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CZ" | "CZE" => Ok(Self::CzechRepublic),
            "DE" | "DEU" => Ok(Self::Germany),
            other => Err(anyhow!("unsupported holiday country: {other} (expected CZ or DE)")),
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayClass {
    pub date: NaiveDate,
    pub holiday: Option<&'static str>,
    pub is_sunday: bool,
    pub is_saturday: bool,
}

impl DayClass {
    pub fn is_holiday(&self) -> bool {
        self.holiday.is_some()
    }

    pub fn is_non_working(&self) -> bool {
        self.is_sunday || self.is_holiday()
    }

    pub fn is_weekend(&self) -> bool {
        self.is_sunday || self.is_saturday
    }
}

pub fn classify(country: Country, date: NaiveDate) -> DayClass {
    let weekday = date.weekday();
    DayClass {
        date,
        holiday: country.holiday_name(date),
        is_sunday: weekday == Weekday::Sun,
        is_saturday: weekday == Weekday::Sat,
    }
}

/// Days of `month` that are neither Sundays nor public holidays.
pub fn working_days_in_month(country: Country, month: MonthKey) -> u32 {
    let count = month
        .days()
        .filter(|day| !classify(country, *day).is_non_working())
        .count() as u32;
    debug!(%month, country = %country, count, "computed working days");
    count
}

/// Manual per-month working-day counts entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkingDaysOverrides {
    months: BTreeMap<MonthKey, u32>,
}

impl WorkingDaysOverrides {
    pub fn get(&self, month: MonthKey) -> Option<u32> {
        self.months.get(&month).copied()
    }

    pub fn set(&mut self, month: MonthKey, days: u32) -> anyhow::Result<()> {
        if days > MAX_WORKING_DAYS_OVERRIDE {
            return Err(anyhow!(
                "working days override must be between 0 and {MAX_WORKING_DAYS_OVERRIDE}, got {days}"
            ));
        }
        self.months.insert(month, days);
        Ok(())
    }

    pub fn clear(&mut self, month: MonthKey) -> Option<u32> {
        self.months.remove(&month)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MonthKey, &u32)> {
        self.months.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

/// The override when one is stored for `month` (zero included), else the computed count.
pub fn effective_working_days(
    country: Country,
    month: MonthKey,
    overrides: &WorkingDaysOverrides,
) -> u32 {
    overrides
        .get(month)
        .unwrap_or_else(|| working_days_in_month(country, month))
}

/// Gregorian Easter Sunday (anonymous computus).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

fn easter_offset(date: NaiveDate) -> Option<i64> {
    let easter = easter_sunday(date.year())?;
    Some((date - easter).num_days())
}

fn czech_holiday(date: NaiveDate) -> Option<&'static str> {
    let name = match (date.month(), date.day()) {
        (1, 1) => "New Year's Day",
        (5, 1) => "Labour Day",
        (5, 8) => "Liberation Day",
        (7, 5) => "Saints Cyril and Methodius Day",
        (7, 6) => "Jan Hus Day",
        (9, 28) => "Czech Statehood Day",
        (10, 28) => "Independence Day",
        (11, 17) => "Freedom and Democracy Day",
        (12, 24) => "Christmas Eve",
        (12, 25) => "Christmas Day",
        (12, 26) => "St. Stephen's Day",
        _ => match easter_offset(date)? {
            // observed again since 2016
            -2 if date.year() >= 2016 => "Good Friday",
            1 => "Easter Monday",
            _ => return None,
        },
    };
    Some(name)
}

fn german_holiday(date: NaiveDate) -> Option<&'static str> {
    let name = match (date.month(), date.day()) {
        (1, 1) => "New Year's Day",
        (5, 1) => "Labour Day",
        (10, 3) => "German Unity Day",
        (12, 25) => "Christmas Day",
        (12, 26) => "Boxing Day",
        _ => match easter_offset(date)? {
            -2 => "Good Friday",
            1 => "Easter Monday",
            39 => "Ascension Day",
            50 => "Whit Monday",
            _ => return None,
        },
    };
    Some(name)
}
