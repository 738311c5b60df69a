use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

use crate::config::Config;
use crate::period::{
  MonthKey,
  add_days
};

const TIMEZONE_ENV_VAR: &str =
  "ROTA_TIMEZONE";
const DEFAULT_TIMEZONE: &str =
  "Europe/Prague";

/// Zone that decides which calendar day "today" is.
///
/// `ROTA_TIMEZONE` wins over the `timezone` config key. An unparseable
/// value is logged and skipped; UTC is the last resort.
pub fn resolve_timezone(
  cfg: &Config
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(raw) = cfg.get("timezone")
    && let Some(tz) =
      parse_timezone(&raw, "config:timezone")
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_TIMEZONE,
    "DEFAULT_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[must_use]
pub fn local_date(
  dt: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  dt.with_timezone(tz).date_naive()
}

#[must_use]
pub fn today(tz: &Tz) -> NaiveDate {
  local_date(Utc::now(), tz)
}

/// Resolves a day expression relative to `today`.
///
/// Accepts `today`, `tomorrow`, `yesterday`, weekday names (the next
/// occurrence after today), `YYYY-MM-DD` and offsets like `+3d`, `-2w`.
#[tracing::instrument(fields(input = input))]
pub fn parse_day_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(add_days(today, 1));
    }
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today,
      target_weekday
    ));
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    let duration = match unit {
      | "d" => Duration::days(num),
      | "w" => Duration::weeks(num),
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    };

    let shifted = if sign == "-" {
      today.checked_sub_signed(duration)
    } else {
      today.checked_add_signed(duration)
    };
    return shifted.ok_or_else(|| {
      anyhow!(
        "date offset out of range: \
         {token}"
      )
    });
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized date: {token} \
       (expected YYYY-MM-DD, today, \
       a weekday or +Nd)"
    )
  })
}

/// Resolves `this`, `next`, `prev`, a month name (this year) or `YYYY-MM`.
#[tracing::instrument(fields(input = input))]
pub fn parse_month_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<MonthKey> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let current = MonthKey::of(today);

  match lower.as_str() {
    | "this" | "current" => {
      return Ok(current);
    }
    | "next" => {
      return Ok(MonthKey::of(
        current.last_day() + Duration::days(1)
      ));
    }
    | "prev" | "last" | "previous" => {
      return Ok(MonthKey::of(
        current.first_day() - Duration::days(1)
      ));
    }
    | _ => {}
  }

  if let Some(month) =
    parse_month_name(&lower)
  {
    return MonthKey::new(
      today.year(),
      month
    );
  }

  token.parse::<MonthKey>()
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  add_days(from, delta)
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::*;

  fn d(
    y: i32,
    m: u32,
    day: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day)
      .expect("valid date")
  }

  #[test]
  fn parses_relative_words() {
    let today = d(2026, 2, 17);
    assert_eq!(
      parse_day_expr("today", today)
        .expect("today"),
      today
    );
    assert_eq!(
      parse_day_expr("Tomorrow", today)
        .expect("tomorrow"),
      d(2026, 2, 18)
    );
    assert_eq!(
      parse_day_expr("yesterday", today)
        .expect("yesterday"),
      d(2026, 2, 16)
    );
  }

  #[test]
  fn parses_weekday_name() {
    let today = d(2026, 2, 17);
    assert_eq!(
      parse_day_expr("wednesday", today)
        .expect("weekday"),
      d(2026, 2, 18)
    );
    assert_eq!(
      parse_day_expr("tue", today)
        .expect("same weekday"),
      d(2026, 2, 24)
    );
  }

  #[test]
  fn parses_offsets_and_iso_dates() {
    let today = d(2026, 2, 27);
    assert_eq!(
      parse_day_expr("+3d", today)
        .expect("offset"),
      d(2026, 3, 2)
    );
    assert_eq!(
      parse_day_expr("-1w", today)
        .expect("weeks"),
      d(2026, 2, 20)
    );
    assert_eq!(
      parse_day_expr("2026-12-24", today)
        .expect("iso"),
      d(2026, 12, 24)
    );
    assert!(
      parse_day_expr("2026-02-30", today)
        .is_err()
    );
    assert!(
      parse_day_expr("soon", today)
        .is_err()
    );
  }

  #[test]
  fn parses_month_expressions() {
    let today = d(2026, 1, 15);
    assert_eq!(
      parse_month_expr("this", today)
        .expect("this")
        .to_string(),
      "2026-01"
    );
    assert_eq!(
      parse_month_expr("prev", today)
        .expect("prev")
        .to_string(),
      "2025-12"
    );
    assert_eq!(
      parse_month_expr("next", today)
        .expect("next")
        .to_string(),
      "2026-02"
    );
    assert_eq!(
      parse_month_expr("march", today)
        .expect("name")
        .to_string(),
      "2026-03"
    );
    assert_eq!(
      parse_month_expr("2027-07", today)
        .expect("key")
        .to_string(),
      "2027-07"
    );
  }

  #[test]
  fn local_date_follows_zone() {
    let late = Utc
      .with_ymd_and_hms(
        2026, 3, 1, 23, 30, 0
      )
      .single()
      .expect("valid now");
    assert_eq!(
      local_date(
        late,
        &chrono_tz::Europe::Prague
      ),
      d(2026, 3, 2)
    );
    assert_eq!(
      local_date(late, &chrono_tz::UTC),
      d(2026, 3, 1)
    );
  }
}
