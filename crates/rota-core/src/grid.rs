//! Employees x days x shifts folded into what the schedule grid shows.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{NaiveDate, NaiveTime, Timelike};
use deunicode::deunicode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::duration::round_hours;
use crate::holidays::{Country, DayClass, classify};
use crate::model::{Employee, EmployeeId, NORM_HOURS_PER_DAY, Shift, ShiftCategory};
use crate::period::MonthKey;

/// One shift per (employee, day). Duplicate rows for a cell resolve to the
/// most recently updated one.
#[derive(Debug, Default)]
pub struct ShiftIndex<'a> {
    cells: HashMap<(EmployeeId, NaiveDate), &'a Shift>,
}

impl<'a> ShiftIndex<'a> {
    pub fn build<I>(shifts: I) -> Self
    where
        I: IntoIterator<Item = &'a Shift>,
    {
        let mut cells: HashMap<(EmployeeId, NaiveDate), &'a Shift> = HashMap::new();
        for shift in shifts {
            let key = (shift.employee_id, shift.date);
            match cells.get(&key).copied() {
                Some(existing) => {
                    let newer = shift.updated_at >= existing.updated_at;
                    warn!(
                        employee = %shift.employee_id,
                        date = %shift.date,
                        kept = %if newer { shift.id } else { existing.id },
                        "multiple shifts for one cell"
                    );
                    if newer {
                        cells.insert(key, shift);
                    }
                }
                None => {
                    cells.insert(key, shift);
                }
            }
        }
        Self { cells }
    }

    pub fn get(&self, employee_id: EmployeeId, date: NaiveDate) -> Option<&'a Shift> {
        self.cells.get(&(employee_id, date)).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartBand {
    Morning,
    Afternoon,
    Night,
}

impl StartBand {
    /// Morning 04:00-11:59, afternoon 12:00-19:59, night otherwise.
    pub fn of(start: NaiveTime) -> Self {
        match start.hour() {
            4..=11 => Self::Morning,
            12..=19 => Self::Afternoon,
            _ => Self::Night,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BandCounts {
    pub morning: usize,
    pub afternoon: usize,
    pub night: usize,
    /// Work shifts without a start time.
    pub untimed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayStats {
    pub date: NaiveDate,
    pub shift_count: usize,
    pub bands: BandCounts,
    pub vacation: usize,
    pub day_off: usize,
    pub full_staffing: bool,
}

impl DayStats {
    fn collect<'a>(
        date: NaiveDate,
        cells: impl Iterator<Item = &'a Shift>,
        roster_size: usize,
    ) -> Self {
        let mut stats = Self {
            date,
            shift_count: 0,
            bands: BandCounts::default(),
            vacation: 0,
            day_off: 0,
            full_staffing: false,
        };
        for shift in cells {
            stats.shift_count += 1;
            match shift.kind.category() {
                ShiftCategory::Vacation => stats.vacation += 1,
                ShiftCategory::DayOff => stats.day_off += 1,
                ShiftCategory::Work => match shift.start.map(StartBand::of) {
                    Some(StartBand::Morning) => stats.bands.morning += 1,
                    Some(StartBand::Afternoon) => stats.bands.afternoon += 1,
                    Some(StartBand::Night) => stats.bands.night += 1,
                    None => stats.bands.untimed += 1,
                },
            }
        }
        stats.full_staffing = roster_size > 0 && stats.shift_count == roster_size;
        stats
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EmployeeMonthStats {
    pub total_hours: f64,
    pub vacation_days: usize,
    pub day_off_days: usize,
    pub shift_count: usize,
}

/// Totals for one employee over `month`, reading cells through `index`.
pub fn employee_month_stats(
    index: &ShiftIndex<'_>,
    employee_id: EmployeeId,
    month: MonthKey,
) -> EmployeeMonthStats {
    let mut stats = EmployeeMonthStats::default();
    let mut hours = 0.0;
    for shift in month.days().filter_map(|day| index.get(employee_id, day)) {
        stats.shift_count += 1;
        hours += shift.effective_hours();
        match shift.kind.category() {
            ShiftCategory::Vacation => stats.vacation_days += 1,
            ShiftCategory::DayOff => stats.day_off_days += 1,
            ShiftCategory::Work => {}
        }
    }
    stats.total_hours = round_hours(hours);
    stats
}

pub fn norm_hours(working_days: u32) -> f64 {
    f64::from(working_days) * NORM_HOURS_PER_DAY
}

/// True only when the total hits the target exactly; over and under are both misses.
pub fn norm_met(total_hours: f64, working_days: u32) -> bool {
    round_hours(total_hours) == norm_hours(working_days)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    RoleThenName,
}

impl SortKey {
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::RoleThenName => "role",
        }
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "role" | "role,name" => Ok(Self::RoleThenName),
            other => Err(anyhow!("unknown sort key: {other} (expected name or role)")),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl Serialize for SortKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_key())
    }
}

impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Primary collation weight: diacritics and case folded away.
pub fn collation_key(value: &str) -> String {
    deunicode(value)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compares by folded text first and by accents only when the folded forms tie,
/// so `Čermák` sorts next to `Cermak` rather than after `Zeman`.
pub fn collate(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
}

/// Stable sort; employees that compare equal keep their relative order.
pub fn sort_employees(employees: &mut [Employee], key: SortKey) {
    match key {
        SortKey::Name => employees.sort_by(|a, b| collate(&a.name, &b.name)),
        SortKey::RoleThenName => employees.sort_by(|a, b| {
            collate(&a.role, &b.role).then_with(|| collate(&a.name, &b.name))
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayColumn {
    pub class: DayClass,
    pub stats: DayStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub employee: Employee,
    /// One entry per visible day, in column order.
    pub cells: Vec<Option<Shift>>,
    pub month: EmployeeMonthStats,
    pub norm_met: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridTotals {
    pub month_hours: f64,
    pub vacation_days: usize,
    pub visible_shifts: usize,
    pub norm_met_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub month: MonthKey,
    pub working_days: u32,
    pub norm_hours: f64,
    pub columns: Vec<DayColumn>,
    pub rows: Vec<GridRow>,
    pub totals: GridTotals,
}

pub struct GridInput<'a> {
    pub days: &'a [NaiveDate],
    /// Already in display order.
    pub employees: &'a [Employee],
    pub shifts: &'a [Shift],
    /// Month that per-employee totals are scoped to.
    pub month: MonthKey,
    pub working_days: u32,
    pub country: Country,
}

#[tracing::instrument(
    skip_all,
    fields(month = %input.month, days = input.days.len(), employees = input.employees.len())
)]
pub fn build_grid(input: &GridInput<'_>) -> Grid {
    let index = ShiftIndex::build(input.shifts);
    let roster_size = input.employees.len();

    let columns: Vec<DayColumn> = input
        .days
        .iter()
        .map(|&day| DayColumn {
            class: classify(input.country, day),
            stats: DayStats::collect(
                day,
                input.employees.iter().filter_map(|e| index.get(e.id, day)),
                roster_size,
            ),
        })
        .collect();

    let rows: Vec<GridRow> = input
        .employees
        .iter()
        .map(|employee| {
            let month = employee_month_stats(&index, employee.id, input.month);
            GridRow {
                employee: employee.clone(),
                cells: input
                    .days
                    .iter()
                    .map(|&day| index.get(employee.id, day).cloned())
                    .collect(),
                month,
                norm_met: norm_met(month.total_hours, input.working_days),
            }
        })
        .collect();

    let totals = GridTotals {
        month_hours: round_hours(rows.iter().map(|r| r.month.total_hours).sum()),
        vacation_days: rows.iter().map(|r| r.month.vacation_days).sum(),
        visible_shifts: columns.iter().map(|c| c.stats.shift_count).sum(),
        norm_met_count: rows.iter().filter(|r| r.norm_met).count(),
    };

    debug!(
        indexed = index.len(),
        month_hours = totals.month_hours,
        visible_shifts = totals.visible_shifts,
        "built grid"
    );

    Grid {
        month: input.month,
        working_days: input.working_days,
        norm_hours: norm_hours(input.working_days),
        columns,
        rows,
        totals,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveTime, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::model::{ShiftDraft, ShiftKind};
    use crate::period::{ViewMode, visible_days};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn employee(name: &str, role: &str) -> Employee {
        Employee::new(name, role, None, Utc::now()).expect("valid employee")
    }

    fn shift(employee: &Employee, day: NaiveDate, start: u32, end: u32, kind: ShiftKind) -> Shift {
        let draft = ShiftDraft::new(employee.id, day, Some(t(start, 0)), Some(t(end, 0)), kind);
        Shift::from_draft(&draft, Utc::now())
    }

    fn names(employees: &[Employee]) -> Vec<&str> {
        employees.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn index_keeps_latest_duplicate() {
        let anna = employee("Anna", "");
        let day = date(2026, 3, 2);
        let older = shift(&anna, day, 6, 14, ShiftKind::Morning);
        let mut newer = shift(&anna, day, 14, 22, ShiftKind::Afternoon);
        newer.updated_at = older.updated_at + Duration::seconds(5);

        let shifts = vec![newer.clone(), older];
        let index = ShiftIndex::build(&shifts);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(anna.id, day).map(|s| s.id), Some(newer.id));
        assert!(index.get(Uuid::new_v4(), day).is_none());
    }

    #[test]
    fn month_totals_use_fixed_hours_for_leave() {
        let anna = employee("Anna", "");
        let mut vacation = shift(&anna, date(2026, 3, 3), 8, 10, ShiftKind::Vacation);
        vacation.hours = 2.0;
        let mut off = shift(&anna, date(2026, 3, 4), 8, 16, ShiftKind::DayOff);
        off.hours = 8.0;
        let shifts = vec![
            shift(&anna, date(2026, 3, 2), 6, 14, ShiftKind::Morning),
            vacation,
            off,
            // outside the month
            shift(&anna, date(2026, 4, 1), 6, 14, ShiftKind::Morning),
        ];
        let index = ShiftIndex::build(&shifts);
        let stats = employee_month_stats(&index, anna.id, MonthKey::new(2026, 3).expect("month"));
        assert_eq!(stats.total_hours, 16.0);
        assert_eq!(stats.vacation_days, 1);
        assert_eq!(stats.day_off_days, 1);
        assert_eq!(stats.shift_count, 3);
    }

    #[test]
    fn norm_requires_exact_match() {
        assert!(norm_met(160.0, 20));
        assert!(!norm_met(159.0, 20));
        assert!(!norm_met(161.0, 20));
        assert!(!norm_met(160.5, 20));
        assert!(norm_met(0.0, 0));
        // float noise from summing quarter hours still counts as exact
        assert!(norm_met(0.1 + 0.2 + 7.7, 1));
    }

    #[test]
    fn sorts_by_name_with_collation() {
        let mut staff = vec![
            employee("zeman", ""),
            employee("Čermák", ""),
            employee("Adam", ""),
            employee("cihla", ""),
        ];
        sort_employees(&mut staff, SortKey::Name);
        assert_eq!(names(&staff), vec!["Adam", "Čermák", "cihla", "zeman"]);
    }

    #[test]
    fn sorts_by_role_then_name_and_is_stable() {
        let first_twin = employee("Eva", "Cashier");
        let second_twin = employee("Eva", "Cashier");
        let mut staff = vec![
            employee("Olga", "Stocker"),
            first_twin.clone(),
            employee("Bára", "Cashier"),
            second_twin.clone(),
            employee("Karel", "Manager"),
        ];
        sort_employees(&mut staff, SortKey::RoleThenName);
        assert_eq!(names(&staff), vec!["Bára", "Eva", "Eva", "Karel", "Olga"]);
        assert_eq!(staff[1].id, first_twin.id);
        assert_eq!(staff[2].id, second_twin.id);

        let before: Vec<_> = staff.iter().map(|e| e.id).collect();
        sort_employees(&mut staff, SortKey::RoleThenName);
        let after: Vec<_> = staff.iter().map(|e| e.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn day_stats_flag_full_staffing() {
        let anna = employee("Anna", "");
        let ben = employee("Ben", "");
        let monday = date(2026, 3, 2);
        let tuesday = date(2026, 3, 3);
        let shifts = vec![
            shift(&anna, monday, 6, 14, ShiftKind::Morning),
            shift(&ben, monday, 22, 6, ShiftKind::Night),
            shift(&anna, tuesday, 14, 22, ShiftKind::Afternoon),
        ];
        let employees = vec![anna, ben];
        let days = visible_days(monday, ViewMode::Week);
        let grid = build_grid(&GridInput {
            days: &days,
            employees: &employees,
            shifts: &shifts,
            month: MonthKey::of(monday),
            working_days: 22,
            country: Country::CzechRepublic,
        });

        let mon = &grid.columns[0].stats;
        assert_eq!(mon.shift_count, 2);
        assert_eq!(mon.bands.morning, 1);
        assert_eq!(mon.bands.night, 1);
        assert!(mon.full_staffing);

        let tue = &grid.columns[1].stats;
        assert_eq!(tue.bands.afternoon, 1);
        assert!(!tue.full_staffing);

        assert_eq!(grid.rows[0].cells.len(), 7);
        assert!(grid.rows[0].cells[0].is_some());
        assert!(grid.rows[1].cells[1].is_none());
        assert_eq!(grid.rows[0].month.total_hours, 16.0);
        assert_eq!(grid.totals.month_hours, 24.0);
        assert_eq!(grid.totals.visible_shifts, 3);
        assert_eq!(grid.norm_hours, 176.0);
    }

    #[test]
    fn week_grid_reports_whole_month_totals() {
        let anna = employee("Anna", "");
        let shifts = vec![
            shift(&anna, date(2026, 3, 2), 6, 14, ShiftKind::Morning),
            shift(&anna, date(2026, 3, 20), 6, 14, ShiftKind::Morning),
        ];
        let employees = vec![anna];
        let days = visible_days(date(2026, 3, 2), ViewMode::Week);
        let grid = build_grid(&GridInput {
            days: &days,
            employees: &employees,
            shifts: &shifts,
            month: MonthKey::new(2026, 3).expect("month"),
            working_days: 2,
            country: Country::CzechRepublic,
        });
        assert_eq!(grid.totals.visible_shifts, 1);
        assert_eq!(grid.rows[0].month.total_hours, 16.0);
        assert!(grid.rows[0].norm_met);
    }

    #[test]
    fn empty_roster_is_never_fully_staffed() {
        let days = vec![date(2026, 3, 2)];
        let grid = build_grid(&GridInput {
            days: &days,
            employees: &[],
            shifts: &[],
            month: MonthKey::new(2026, 3).expect("month"),
            working_days: 0,
            country: Country::CzechRepublic,
        });
        assert!(!grid.columns[0].stats.full_staffing);
        assert!(grid.rows.is_empty());
    }
}
