use anyhow::{Context, anyhow};
use chrono::{NaiveTime, Timelike};
use regex::Regex;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Elapsed hours between two wall-clock times on the same nominal day.
///
/// An `end` earlier than `start` is read as a shift that crosses midnight.
/// Equal times give zero, never a full day.
#[must_use]
pub fn shift_hours(start: NaiveTime, end: NaiveTime) -> f64 {
    let start_min = minutes_of_day(start);
    let end_min = minutes_of_day(end);
    let mut diff = end_min - start_min;
    if diff < 0 {
        diff += MINUTES_PER_DAY;
    }
    round_hours(diff as f64 / 60.0)
}

#[must_use]
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

fn minutes_of_day(t: NaiveTime) -> i64 {
    i64::from(t.hour()) * 60 + i64::from(t.minute())
}

/// Parses `H:MM`, `HH:MM` or `HH:MM:SS`. Seconds are accepted and dropped.
pub fn parse_clock(input: &str) -> anyhow::Result<NaiveTime> {
    let clock_re = Regex::new(r"^(?P<hour>\d{1,2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

    let token = input.trim();
    let caps = clock_re
        .captures(token)
        .ok_or_else(|| anyhow!("invalid time of day: {input} (expected HH:MM)"))?;

    let hour: u32 = caps["hour"].parse().context("invalid hour")?;
    let minute: u32 = caps["minute"].parse().context("invalid minute")?;

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| anyhow!("time of day out of range: {input}"))
}

#[must_use]
pub fn format_clock(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}
