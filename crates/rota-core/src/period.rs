use std::fmt;
use std::str::FromStr;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Duration,
  NaiveDate
};
use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum ViewMode {
  Week,
  #[default]
  Month
}

impl ViewMode {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Week => "week",
      | Self::Month => "month"
    }
  }

  pub fn from_key(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "week" | "w" => Some(Self::Week),
      | "month" | "m" => {
        Some(Self::Month)
      }
      | _ => None
    }
  }
}

impl Serialize for ViewMode {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer
      .serialize_str(self.as_key())
  }
}

impl<'de> Deserialize<'de> for ViewMode {
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    Self::from_key(&raw).ok_or_else(
      || {
        serde::de::Error::custom(
          format!(
            "unknown view mode: {raw}"
          )
        )
      }
    )
  }
}

/// A calendar month, written `YYYY-MM`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub struct MonthKey {
  pub year:  i32,
  pub month: u32
}

impl MonthKey {
  pub fn new(
    year: i32,
    month: u32
  ) -> anyhow::Result<Self> {
    if !(1..=12).contains(&month) {
      return Err(anyhow!(
        "month out of range: {month}"
      ));
    }
    Ok(Self { year, month })
  }

  #[must_use]
  pub fn of(date: NaiveDate) -> Self {
    Self {
      year:  date.year(),
      month: date.month()
    }
  }

  #[must_use]
  pub fn first_day(self) -> NaiveDate {
    first_day_of_month(
      self.year, self.month
    )
  }

  #[must_use]
  pub fn last_day(self) -> NaiveDate {
    last_day_of_month(
      self.year, self.month
    )
  }

  #[must_use]
  pub fn contains(
    self,
    date: NaiveDate
  ) -> bool {
    date.year() == self.year
      && date.month() == self.month
  }

  pub fn days(
    self
  ) -> impl Iterator<Item = NaiveDate>
  {
    self
      .first_day()
      .iter_days()
      .take(days_in_month(
        self.year, self.month
      ) as usize)
  }
}

impl fmt::Display for MonthKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:04}-{:02}",
      self.year, self.month
    )
  }
}

impl FromStr for MonthKey {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let (y, m) = s
      .trim()
      .split_once('-')
      .ok_or_else(|| {
        anyhow!(
          "expected YYYY-MM, got: {s}"
        )
      })?;
    let year: i32 = y
      .parse()
      .with_context(|| {
        format!("invalid year in {s}")
      })?;
    let month: u32 = m
      .parse()
      .with_context(|| {
        format!("invalid month in {s}")
      })?;
    Self::new(year, month)
  }
}

impl Serialize for MonthKey {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for MonthKey {
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    raw
      .parse()
      .map_err(serde::de::Error::custom)
  }
}

/// Days shown for `view` around `focus`, ascending and gap-free.
///
/// Weeks always run Monday to Sunday.
#[must_use]
pub fn visible_days(
  focus: NaiveDate,
  view: ViewMode
) -> Vec<NaiveDate> {
  let (start, end) =
    date_window(focus, view);
  start
    .iter_days()
    .take_while(|day| *day <= end)
    .collect()
}

#[must_use]
pub fn date_window(
  focus: NaiveDate,
  view: ViewMode
) -> (NaiveDate, NaiveDate) {
  match view {
    | ViewMode::Month => {
      (
        first_day_of_month(
          focus.year(),
          focus.month()
        ),
        last_day_of_month(
          focus.year(),
          focus.month()
        )
      )
    }
    | ViewMode::Week => {
      let start = start_of_week(focus);
      (start, add_days(start, 6))
    }
  }
}

/// Moves the focus by `step` weeks or months.
#[must_use]
pub fn shift_focus(
  current: NaiveDate,
  view: ViewMode,
  step: i64
) -> NaiveDate {
  match view {
    | ViewMode::Month => {
      shift_months(current, step as i32)
    }
    | ViewMode::Week => {
      add_days(current, step * 7)
    }
  }
}

#[must_use]
pub fn period_title(
  focus: NaiveDate,
  view: ViewMode
) -> String {
  match view {
    | ViewMode::Month => {
      focus.format("%B %Y").to_string()
    }
    | ViewMode::Week => {
      let start = start_of_week(focus);
      let end = add_days(start, 6);
      format!(
        "Week {} ({} - {})",
        start.iso_week().week(),
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
      )
    }
  }
}

fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let mut year = date.year();
  let mut month =
    date.month() as i32 + months;

  while month < 1 {
    month += 12;
    year = year.saturating_sub(1);
  }
  while month > 12 {
    month -= 12;
    year = year.saturating_add(1);
  }

  let month = month as u32;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

#[must_use]
pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

#[must_use]
pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

#[must_use]
pub fn start_of_week(
  day: NaiveDate
) -> NaiveDate {
  let diff = day
    .weekday()
    .num_days_from_monday()
    as i64;
  add_days(day, -diff)
}
