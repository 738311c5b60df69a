use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cli::Invocation;
use crate::datetime::{parse_day_expr, parse_month_expr};
use crate::duration::parse_clock;
use crate::grid::{SortKey, collation_key};
use crate::model::{
    AvatarColor, Employee, EmployeeId, EmployeePatch, PRESET_ROLES, ShiftDraft, ShiftKind,
    ShiftTemplate,
};
use crate::period::{MonthKey, ViewMode, period_title};
use crate::quick_add::{Key, QuickAddState};
use crate::render::{Renderer, format_hours};
use crate::session::{ClickOutcome, Session};
use crate::store::RemoteStore;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "grid",
        "employees",
        "employee-add",
        "employee-modify",
        "employee-delete",
        "shift",
        "shift-delete",
        "templates",
        "quick",
        "adjust",
        "workdays",
        "holidays",
        "view",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(session, renderer, inv))]
pub fn dispatch<S: RemoteStore>(
    session: &mut Session<S>,
    renderer: &Renderer,
    today: NaiveDate,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    let args = inv.command_args.as_slice();

    debug!(command, args = ?args, "dispatching command");

    match command {
        "grid" => cmd_grid(session, renderer, today, args),
        "employees" => renderer.print_employees(session.employees()),
        "employee-add" => cmd_employee_add(session, args),
        "employee-modify" => cmd_employee_modify(session, args),
        "employee-delete" => cmd_employee_delete(session, args),
        "shift" => cmd_shift(session, renderer, today, args),
        "shift-delete" => cmd_shift_delete(session, today, args),
        "templates" => renderer.print_templates(
            session.templates(),
            session.view().quick_add.active_index(),
        ),
        "quick" => cmd_quick(session, renderer, today, args),
        "adjust" => cmd_adjust(session, today, args),
        "workdays" => cmd_workdays(session, today, args),
        "holidays" => cmd_holidays(session, renderer, today, args),
        "view" => cmd_view(session, args),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// `grid [DAY|YYYY-MM] [week|month] [compact]`; the mode word applies to this call only.
#[instrument(skip(session, renderer, args))]
fn cmd_grid<S: RemoteStore>(
    session: &mut Session<S>,
    renderer: &Renderer,
    today: NaiveDate,
    args: &[String],
) -> anyhow::Result<()> {
    let mut focus = today;
    let mut mode = session.view().mode;
    let mut compact = session.view().compact;

    for arg in args {
        if let Some(one_off) = ViewMode::from_key(arg) {
            mode = one_off;
        } else if arg == "compact" {
            compact = true;
        } else if let Ok(month) = arg.parse::<MonthKey>() {
            focus = month.first_day();
        } else {
            focus = parse_day_expr(arg, today)?;
        }
    }

    session.go_to(focus);
    let grid = session.grid_in(mode);

    info!(focus = %focus, mode = mode.as_key(), rows = grid.rows.len(), "command grid");
    renderer.print_grid(&grid, &period_title(focus, mode), compact)
}

#[instrument(skip(session, args))]
fn cmd_employee_add<S: RemoteStore>(
    session: &mut Session<S>,
    args: &[String],
) -> anyhow::Result<()> {
    let (words, patch) = parse_employee_mods(args)?;
    let name = patch.name.clone().unwrap_or_else(|| words.join(" "));
    if name.trim().is_empty() {
        return Err(anyhow!("employee-add: a name is required"));
    }

    let role = patch.role.as_deref().unwrap_or_default();
    let employee = session.add_employee(&name, role, patch.color)?;
    println!("Added employee {} ({}).", employee.name, employee.id);
    note_custom_role(&employee);
    Ok(())
}

#[instrument(skip(session, args))]
fn cmd_employee_modify<S: RemoteStore>(
    session: &mut Session<S>,
    args: &[String],
) -> anyhow::Result<()> {
    let (target, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("employee-modify: which employee?"))?;
    let id = resolve_employee(session, target)?;
    let (words, mut patch) = parse_employee_mods(rest)?;
    if !words.is_empty() {
        if patch.name.is_some() {
            return Err(anyhow!("employee-modify: unexpected words: {}", words.join(" ")));
        }
        patch.name = Some(words.join(" "));
    }
    if patch.is_empty() {
        return Err(anyhow!("employee-modify: nothing to change (use name:, role: or color:)"));
    }

    let employee = session.update_employee(id, &patch)?;
    println!("Modified employee {}.", employee.name);
    if patch.role.is_some() {
        note_custom_role(&employee);
    }
    Ok(())
}

fn note_custom_role(employee: &Employee) {
    if let Some(note) = custom_role_note(employee) {
        println!("{note}");
    }
}

fn custom_role_note(employee: &Employee) -> Option<String> {
    if employee.role.is_empty() || employee.has_preset_role() {
        return None;
    }
    Some(format!(
        "Note: '{}' is a custom role (presets: {}).",
        employee.role,
        PRESET_ROLES.join(", ")
    ))
}

#[instrument(skip(session, args))]
fn cmd_employee_delete<S: RemoteStore>(
    session: &mut Session<S>,
    args: &[String],
) -> anyhow::Result<()> {
    let target = args
        .first()
        .ok_or_else(|| anyhow!("employee-delete: which employee?"))?;
    let id = resolve_employee(session, target)?;
    let name = session
        .employee(id)
        .map(|e| e.name.clone())
        .unwrap_or_default();
    let shifts = session.shifts().iter().filter(|s| s.employee_id == id).count();

    session.delete_employee(id)?;
    println!("Deleted employee {name} and {shifts} shift(s).");
    Ok(())
}

/// `shift EMPLOYEE DAY TEMPLATE|KIND [HH:MM-HH:MM]`
#[instrument(skip(session, renderer, args))]
fn cmd_shift<S: RemoteStore>(
    session: &mut Session<S>,
    renderer: &Renderer,
    today: NaiveDate,
    args: &[String],
) -> anyhow::Result<()> {
    let [target, day, kind, rest @ ..] = args else {
        return Err(anyhow!("usage: shift EMPLOYEE DAY TEMPLATE|KIND [HH:MM-HH:MM]"));
    };
    let employee_id = resolve_employee(session, target)?;
    let date = parse_day_expr(day, today)?;
    let range = rest.first().map(|r| parse_time_range(r)).transpose()?;
    if rest.len() > 1 {
        warn!(extra = ?&rest[1..], "ignoring extra shift arguments");
    }

    let draft = match (find_template(session.templates(), kind), range) {
        (Some(template), None) => template.draft_for(employee_id, date),
        (Some(template), Some((start, end))) => {
            ShiftDraft::new(employee_id, date, Some(start), Some(end), template.kind)
        }
        (None, range) => {
            let kind: ShiftKind = kind.parse()?;
            match (kind.fixed_hours(), range) {
                (_, Some((start, end))) => {
                    ShiftDraft::new(employee_id, date, Some(start), Some(end), kind)
                }
                (Some(_), None) => ShiftDraft::new(employee_id, date, None, None, kind),
                (None, None) => {
                    return Err(anyhow!("{kind} shifts need a time range like 09:00-17:30"));
                }
            }
        }
    };

    let shift = session.save_shift(&draft)?;
    let name = session
        .employee(employee_id)
        .map(|e| e.name.clone())
        .unwrap_or_default();
    renderer.print_shift(&shift, &name)
}

#[instrument(skip(session, args))]
fn cmd_shift_delete<S: RemoteStore>(
    session: &mut Session<S>,
    today: NaiveDate,
    args: &[String],
) -> anyhow::Result<()> {
    let [target, day, ..] = args else {
        return Err(anyhow!("usage: shift-delete EMPLOYEE DAY"));
    };
    let employee_id = resolve_employee(session, target)?;
    let date = parse_day_expr(day, today)?;
    let id = session
        .shift_at(employee_id, date)
        .map(|s| s.id)
        .ok_or_else(|| anyhow!("no shift on {date}"))?;
    session.delete_shift(id)?;
    println!("Deleted shift on {date}.");
    Ok(())
}

/// `quick KEY EMPLOYEE DAY...` presses KEY (a template number or esc), then clicks each day's cell.
#[instrument(skip(session, renderer, args))]
fn cmd_quick<S: RemoteStore>(
    session: &mut Session<S>,
    renderer: &Renderer,
    today: NaiveDate,
    args: &[String],
) -> anyhow::Result<()> {
    let [key, target, days @ ..] = args else {
        return Err(anyhow!("usage: quick KEY EMPLOYEE DAY..."));
    };
    if days.is_empty() {
        return Err(anyhow!("quick: at least one day is required"));
    }

    let key = Key::parse(key);
    if let Key::Digit(n) = key
        && (n == 0 || usize::from(n) > session.templates().len())
    {
        return Err(anyhow!("quick: no template {n}"));
    }
    let state = session.press_key(key, false);
    let employee_id = resolve_employee(session, target)?;
    debug!(state = ?state, "quick-add state");

    for day in days {
        let date = parse_day_expr(day, today)?;
        match session.click_cell(employee_id, date)? {
            ClickOutcome::Created(shift) => println!("Created {} shift on {date}.", shift.kind),
            ClickOutcome::Updated(shift) => println!("Updated shift on {date} to {}.", shift.kind),
            ClickOutcome::OpenEditor { existing, .. } => match existing {
                Some(shift) => {
                    let name = session
                        .employee(employee_id)
                        .map(|e| e.name.clone())
                        .unwrap_or_default();
                    renderer.print_shift(&shift, &name)?;
                }
                None => println!("No shift on {date}."),
            },
        }
    }

    if state == QuickAddState::Idle {
        info!("no template active; cells were only inspected");
    }
    Ok(())
}

/// `adjust EMPLOYEE DAY +H|-H`
#[instrument(skip(session, args))]
fn cmd_adjust<S: RemoteStore>(
    session: &mut Session<S>,
    today: NaiveDate,
    args: &[String],
) -> anyhow::Result<()> {
    let [target, day, delta, ..] = args else {
        return Err(anyhow!("usage: adjust EMPLOYEE DAY +HOURS|-HOURS"));
    };
    let employee_id = resolve_employee(session, target)?;
    let date = parse_day_expr(day, today)?;
    let delta: f64 = delta
        .parse()
        .with_context(|| format!("invalid hour delta: {delta}"))?;
    let id = session
        .shift_at(employee_id, date)
        .map(|s| s.id)
        .ok_or_else(|| anyhow!("no shift on {date}"))?;

    let shift = session.adjust_hours(id, delta)?;
    println!("Shift on {date} now {}h.", format_hours(shift.hours));
    Ok(())
}

/// `workdays [MONTH] [N|clear]`
#[instrument(skip(session, args))]
fn cmd_workdays<S: RemoteStore>(
    session: &mut Session<S>,
    today: NaiveDate,
    args: &[String],
) -> anyhow::Result<()> {
    let (month, action) = match args {
        [] => (MonthKey::of(today), None),
        [only] if only == "clear" || only.parse::<u32>().is_ok() => {
            (MonthKey::of(today), Some(only))
        }
        [month] => (parse_month_expr(month, today)?, None),
        [month, action, ..] => (parse_month_expr(month, today)?, Some(action)),
    };

    match action.map(String::as_str) {
        Some("clear") => {
            let previous = session.clear_working_days_override(month)?;
            match previous {
                Some(days) => println!("Cleared override of {days} for {month}."),
                None => println!("No override set for {month}."),
            }
        }
        Some(raw) => {
            let days: u32 = raw
                .parse()
                .with_context(|| format!("invalid working day count: {raw}"))?;
            session.set_working_days_override(month, days)?;
        }
        None => {}
    }

    let days = session.working_days(month);
    let source = if session.view().overrides.get(month).is_some() {
        "override"
    } else {
        "computed"
    };
    println!(
        "{month}: {days} working days ({source}), norm {}h",
        format_hours(f64::from(days) * crate::model::NORM_HOURS_PER_DAY)
    );
    Ok(())
}

#[instrument(skip(session, renderer, args))]
fn cmd_holidays<S: RemoteStore>(
    session: &Session<S>,
    renderer: &Renderer,
    today: NaiveDate,
    args: &[String],
) -> anyhow::Result<()> {
    let year = match args.first() {
        Some(raw) => raw
            .parse::<i32>()
            .with_context(|| format!("invalid year: {raw}"))?,
        None => today.year(),
    };
    let country = session.country();
    println!("{} {year}", country.name());
    renderer.print_holidays(&country.holidays_in_year(year))
}

/// `view [week|month] [compact:on|off] [weekends:on|off] [sort:name|role]`
#[instrument(skip(session, args))]
fn cmd_view<S: RemoteStore>(session: &mut Session<S>, args: &[String]) -> anyhow::Result<()> {
    for arg in args {
        if let Some(mode) = ViewMode::from_key(arg) {
            session.set_view_mode(mode)?;
            continue;
        }
        let (key, value) = arg
            .split_once(':')
            .ok_or_else(|| anyhow!("view: unrecognized setting: {arg}"))?;
        match key {
            "compact" => session.set_compact(parse_switch(value)?)?,
            "weekends" => session.set_show_weekends(parse_switch(value)?)?,
            "sort" => session.set_sort(value.parse::<SortKey>()?)?,
            other => return Err(anyhow!("view: unknown setting: {other}")),
        }
    }

    let view = session.view();
    println!("mode      {}", view.mode.as_key());
    println!("compact   {}", on_off(view.compact));
    println!("weekends  {}", on_off(view.show_weekends));
    println!("sort      {}", view.sort);
    for (month, days) in view.overrides.iter() {
        println!("workdays  {month} = {days}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("Commands: {}", known_command_names().join(", "));
    Ok(())
}

/// By list number, id, exact name or unique name prefix; case and accents are ignored.
fn resolve_employee<S: RemoteStore>(
    session: &Session<S>,
    token: &str,
) -> anyhow::Result<EmployeeId> {
    let employees = session.employees();

    if let Ok(n) = token.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|idx| employees.get(idx))
            .map(|e| e.id)
            .ok_or_else(|| anyhow!("no employee #{n}"));
    }
    if let Ok(id) = Uuid::parse_str(token) {
        return session
            .employee(id)
            .map(|e| e.id)
            .ok_or_else(|| anyhow!("unknown employee: {id}"));
    }

    let wanted = collation_key(token);
    if let Some(exact) = employees.iter().find(|e| collation_key(&e.name) == wanted) {
        return Ok(exact.id);
    }
    let matches: Vec<_> = employees
        .iter()
        .filter(|e| collation_key(&e.name).starts_with(&wanted))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.id),
        [] => Err(anyhow!("no employee matches {token:?}")),
        many => Err(anyhow!(
            "{token:?} matches several employees: {}",
            many.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(", ")
        )),
    }
}

fn parse_employee_mods(args: &[String]) -> anyhow::Result<(Vec<String>, EmployeePatch)> {
    let mut words = Vec::new();
    let mut patch = EmployeePatch::default();

    for arg in args {
        match arg.split_once(':') {
            Some(("name", value)) => patch.name = Some(value.to_string()),
            Some(("role", value)) => patch.role = Some(value.to_string()),
            Some(("color", value)) => patch.color = Some(value.parse::<AvatarColor>()?),
            _ => words.push(arg.clone()),
        }
    }
    Ok((words, patch))
}

fn find_template<'a>(templates: &'a [ShiftTemplate], token: &str) -> Option<&'a ShiftTemplate> {
    let lower = token.to_ascii_lowercase();
    templates
        .iter()
        .find(|t| t.id == lower || t.label.eq_ignore_ascii_case(token))
}

fn parse_time_range(raw: &str) -> anyhow::Result<(chrono::NaiveTime, chrono::NaiveTime)> {
    let (start, end) = raw
        .split_once('-')
        .ok_or_else(|| anyhow!("expected HH:MM-HH:MM, got: {raw}"))?;
    Ok((parse_clock(start)?, parse_clock(end)?))
}

fn parse_switch(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Ok(true),
        "off" | "no" | "false" | "0" => Ok(false),
        other => Err(anyhow!("expected on or off, got: {other}")),
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
