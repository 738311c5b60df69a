use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Datelike;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::duration::format_clock;
use crate::grid::{DayColumn, Grid};
use crate::holidays::Holiday;
use crate::model::{Employee, Shift, ShiftKind, ShiftTemplate};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, grid))]
    pub fn print_grid(&self, grid: &Grid, title: &str, compact: bool) -> anyhow::Result<()> {
        self.render_grid(io::stdout().lock(), grid, title, compact)
    }

    /// Employees down, days across, then month hours against the norm.
    /// The last line counts shifts per day; `!` marks a fully staffed day.
    pub fn render_grid<W: Write>(
        &self,
        mut out: W,
        grid: &Grid,
        title: &str,
        compact: bool,
    ) -> anyhow::Result<()> {
        writeln!(out, "{title}")?;
        writeln!(
            out,
            "working days {}  norm {}h  holidays {}",
            grid.working_days,
            format_hours(grid.norm_hours),
            self.holiday_legend(&grid.columns)
        )?;
        writeln!(out)?;

        let mut headers = vec!["Employee".to_string()];
        headers.extend(grid.columns.iter().map(|c| self.day_header(c)));
        headers.push("Hours".to_string());
        headers.push("Vac".to_string());

        let mut rows = Vec::with_capacity(grid.rows.len() + 1);
        for row in &grid.rows {
            let mut cells = vec![row.employee.name.clone()];
            cells.extend(
                row.cells
                    .iter()
                    .map(|cell| cell.as_ref().map(|s| cell_label(s, compact)).unwrap_or_default()),
            );
            let hours = format!(
                "{}/{}",
                format_hours(row.month.total_hours),
                format_hours(grid.norm_hours)
            );
            cells.push(if row.norm_met {
                self.paint(&hours, "32")
            } else {
                self.paint(&hours, "33")
            });
            cells.push(row.month.vacation_days.to_string());
            rows.push(cells);
        }

        let mut staffing = vec!["staffed".to_string()];
        staffing.extend(grid.columns.iter().map(|c| {
            if c.stats.full_staffing {
                format!("{}!", c.stats.shift_count)
            } else {
                c.stats.shift_count.to_string()
            }
        }));
        staffing.push(format_hours(grid.totals.month_hours));
        staffing.push(grid.totals.vacation_days.to_string());
        rows.push(staffing);

        write_table(&mut out, headers, rows)?;
        writeln!(
            out,
            "\n{} of {} employees on norm",
            grid.totals.norm_met_count,
            grid.rows.len()
        )?;
        Ok(())
    }

    fn day_header(&self, column: &DayColumn) -> String {
        let date = column.class.date;
        let mut label = format!("{} {:02}", &date.weekday().to_string()[..2], date.day());
        if column.class.is_holiday() {
            label.push('*');
            return self.paint(&label, "31");
        }
        if column.class.is_weekend() {
            return self.paint(&label, "2");
        }
        label
    }

    fn holiday_legend(&self, columns: &[DayColumn]) -> String {
        let names: Vec<String> = columns
            .iter()
            .filter_map(|c| {
                c.class
                    .holiday
                    .map(|name| format!("{} {}", c.class.date.format("%d.%m."), name))
            })
            .collect();
        if names.is_empty() {
            "-".to_string()
        } else {
            names.join(", ")
        }
    }

    #[tracing::instrument(skip(self, employees))]
    pub fn print_employees(&self, employees: &[Employee]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec![
            "#".to_string(),
            "Name".to_string(),
            "Role".to_string(),
            "Color".to_string(),
            "ID".to_string(),
        ];
        let rows = employees
            .iter()
            .enumerate()
            .map(|(idx, e)| {
                vec![
                    self.paint(&(idx + 1).to_string(), "33"),
                    e.name.clone(),
                    e.role.clone(),
                    e.color.to_string(),
                    e.id.to_string(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_templates(
        &self,
        templates: &[ShiftTemplate],
        active: Option<usize>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec![
            "Key".to_string(),
            "Template".to_string(),
            "Time".to_string(),
            "Hours".to_string(),
            "Kind".to_string(),
        ];
        let rows = templates
            .iter()
            .enumerate()
            .map(|(idx, t)| {
                let key = (idx + 1).to_string();
                vec![
                    if active == Some(idx) {
                        self.paint(&format!("{key}*"), "32")
                    } else {
                        key
                    },
                    t.label.to_string(),
                    format!("{}-{}", format_clock(t.start), format_clock(t.end)),
                    format_hours(t.hours()),
                    t.kind.to_string(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_holidays(&self, holidays: &[Holiday]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec!["Date".to_string(), "Day".to_string(), "Holiday".to_string()];
        let rows = holidays
            .iter()
            .map(|h| {
                vec![
                    h.date.format("%Y-%m-%d").to_string(),
                    h.date.weekday().to_string(),
                    h.name.to_string(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_shift(&self, shift: &Shift, employee: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "id        {}", shift.id)?;
        writeln!(out, "employee  {employee}")?;
        writeln!(out, "date      {}", shift.date.format("%Y-%m-%d"))?;
        writeln!(out, "kind      {}", shift.kind)?;
        if let (Some(start), Some(end)) = (shift.start, shift.end) {
            writeln!(out, "time      {}-{}", format_clock(start), format_clock(end))?;
        }
        writeln!(out, "hours     {}", format_hours(shift.effective_hours()))?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn format_hours(hours: f64) -> String {
    format!("{hours}")
}

fn cell_label(shift: &Shift, compact: bool) -> String {
    if compact {
        return match shift.kind {
            ShiftKind::Morning => "M",
            ShiftKind::Afternoon => "A",
            ShiftKind::Night => "N",
            ShiftKind::Regular => "D",
            ShiftKind::Vacation => "V",
            ShiftKind::DayOff => "-",
        }
        .to_string();
    }
    match (shift.kind, shift.start, shift.end) {
        (ShiftKind::Vacation, _, _) => "vacation".to_string(),
        (ShiftKind::DayOff, _, _) => "off".to_string(),
        (_, Some(start), Some(end)) => format!("{}-{}", format_clock(start), format_clock(end)),
        _ => format!("{}h", format_hours(shift.hours)),
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(header).as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        let width = UnicodeWidthStr::width(strip_ansi(header).as_str());
        let padding = widths[idx].saturating_sub(width);
        write!(writer, "{}{} ", header, " ".repeat(padding))?;
    }
    writeln!(writer)?;

    for &width in &widths {
        write!(writer, "{:-<width$} ", "", width = width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, width) in widths.iter().enumerate() {
            let cell = row.get(idx).map(String::as_str).unwrap_or_default();
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::grid::{GridInput, build_grid};
    use crate::holidays::Country;
    use crate::model::builtin_templates;
    use crate::period::{MonthKey, ViewMode, visible_days};

    fn render(compact: bool) -> String {
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).expect("valid date");
        let jana = Employee::new("Jana Nováková", "Cashier", None, Utc::now()).expect("employee");
        let draft = builtin_templates()[0].draft_for(jana.id, day);
        let shifts = vec![Shift::from_draft(&draft, Utc::now())];
        let employees = vec![jana];
        let days = visible_days(day, ViewMode::Week);
        let grid = build_grid(&GridInput {
            days: &days,
            employees: &employees,
            shifts: &shifts,
            month: MonthKey::of(day),
            working_days: 1,
            country: Country::CzechRepublic,
        });

        let mut buf = Vec::new();
        Renderer { color: false }
            .render_grid(&mut buf, &grid, "May 2026", compact)
            .expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn grid_marks_holidays_and_staffing() {
        let text = render(false);
        assert!(text.starts_with("May 2026\n"));
        assert!(text.contains("Fr 01*"));
        assert!(text.contains("holidays 01.05. Labour Day"));
        assert!(text.contains("06:00-14:00"));
        assert!(text.contains("8/8"));
        assert!(text.contains("1!"));
        assert!(text.contains("1 of 1 employees on norm"));
    }

    #[test]
    fn compact_cells_use_letters() {
        let text = render(true);
        assert!(!text.contains("06:00-14:00"));
        let row = text
            .lines()
            .find(|l| l.starts_with("Jana"))
            .expect("employee row");
        assert!(row.contains(" M "));
    }

    #[test]
    fn table_pads_by_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["A".to_string(), "B".to_string()],
            vec![vec!["Žluťoučký".to_string(), "x".to_string()]],
        )
        .expect("table");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], format!("A{} B ", " ".repeat(8)));
        assert_eq!(lines[2], "Žluťoučký x ");
    }
}
