//! Application state for one user: view settings, the local mirror of
//! store rows, and every operation that reads or changes them.
//!
//! Store failures are logged and returned; the mirror is only touched once a
//! store call has succeeded. Hour adjustments are the exception: they show
//! immediately and are rolled back if the store rejects them.

use anyhow::{Context, anyhow};
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use tracing::{debug, error, info, warn};

use crate::cache::{LocalState, Snapshot, ViewPrefs, is_fresh};
use crate::grid::{Grid, GridInput, ShiftIndex, SortKey, build_grid, sort_employees};
use crate::holidays::{Country, WorkingDaysOverrides, effective_working_days};
use crate::model::{
    AvatarColor, Employee, EmployeeId, EmployeePatch, Shift, ShiftDraft, ShiftId, ShiftTemplate,
    builtin_templates,
};
use crate::pending::Pending;
use crate::period::{MonthKey, ViewMode, shift_focus, visible_days};
use crate::quick_add::{CellAction, Key, QuickAdd, QuickAddState};
use crate::rows::{employee_from_row, employee_to_row, shift_from_row, shift_to_row};
use crate::store::RemoteStore;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub focus: NaiveDate,
    pub mode: ViewMode,
    pub quick_add: QuickAdd,
    pub overrides: WorkingDaysOverrides,
    pub sort: SortKey,
    pub compact: bool,
    pub show_weekends: bool,
}

impl ViewState {
    pub fn from_prefs(prefs: ViewPrefs, focus: NaiveDate) -> Self {
        Self {
            focus,
            mode: prefs.view_mode,
            quick_add: QuickAdd::default(),
            overrides: prefs.working_days,
            sort: prefs.sort,
            compact: prefs.compact,
            show_weekends: prefs.show_weekends,
        }
    }

    pub fn to_prefs(&self) -> ViewPrefs {
        ViewPrefs {
            view_mode: self.mode,
            compact: self.compact,
            show_weekends: self.show_weekends,
            sort: self.sort,
            working_days: self.overrides.clone(),
        }
    }

    /// Days the grid shows, with Saturdays and Sundays dropped when weekends are hidden.
    pub fn days(&self) -> Vec<NaiveDate> {
        let mut days = visible_days(self.focus, self.mode);
        if !self.show_weekends {
            days.retain(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun));
        }
        days
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Snapshot,
    Store,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Created(Shift),
    Updated(Shift),
    OpenEditor {
        employee_id: EmployeeId,
        date: NaiveDate,
        existing: Option<Shift>,
    },
}

pub struct Session<S: RemoteStore> {
    store: S,
    local: Option<LocalState>,
    view: ViewState,
    templates: Vec<ShiftTemplate>,
    country: Country,
    employees: Vec<Employee>,
    shifts: Vec<Shift>,
    last_updated: Option<DateTime<Utc>>,
}

impl<S: RemoteStore> Session<S> {
    /// Saved preferences, when present, decide the view; `mode` is used otherwise.
    pub fn new(
        store: S,
        local: Option<LocalState>,
        country: Country,
        focus: NaiveDate,
        mode: ViewMode,
    ) -> Self {
        let view = match &local {
            Some(local) if local.prefs_path.exists() => {
                ViewState::from_prefs(local.load_prefs(), focus)
            }
            _ => ViewState::from_prefs(
                ViewPrefs {
                    view_mode: mode,
                    ..ViewPrefs::default()
                },
                focus,
            ),
        };
        Self {
            store,
            local,
            view,
            templates: builtin_templates(),
            country,
            employees: Vec::new(),
            shifts: Vec::new(),
            last_updated: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn templates(&self) -> &[ShiftTemplate] {
        &self.templates
    }

    pub fn country(&self) -> Country {
        self.country
    }

    /// Employees in the current sort order.
    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    pub fn employee(&self, id: EmployeeId) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }

    pub fn shift_at(&self, employee_id: EmployeeId, date: NaiveDate) -> Option<&Shift> {
        ShiftIndex::build(&self.shifts).get(employee_id, date)
    }

    /// Shows the cached snapshot first, then refetches only when the store
    /// reports changes newer than the snapshot.
    #[tracing::instrument(skip(self))]
    pub fn load(&mut self) -> anyhow::Result<LoadSource> {
        let snapshot = self.local.as_ref().and_then(LocalState::load_snapshot);
        let cached = match snapshot {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            None => false,
        };

        if cached {
            let probe = match self.store.max_updated() {
                Ok(probe) => probe,
                Err(err) => {
                    warn!(
                        error = %format!("{err:#}"),
                        "store probe failed; showing cached snapshot"
                    );
                    return Ok(LoadSource::Snapshot);
                }
            };
            if is_fresh(self.last_updated, probe) {
                info!(
                    employees = self.employees.len(),
                    shifts = self.shifts.len(),
                    "using cached snapshot"
                );
                return Ok(LoadSource::Snapshot);
            }
            debug!(cached = ?self.last_updated, remote = ?probe, "snapshot is stale");
            if let Err(err) = self.refresh() {
                warn!(error = %format!("{err:#}"), "refetch failed; showing cached snapshot");
                return Ok(LoadSource::Snapshot);
            }
            return Ok(LoadSource::Store);
        }

        self.refresh()?;
        Ok(LoadSource::Store)
    }

    /// Refetches everything and replaces the mirror in one step.
    #[tracing::instrument(skip(self))]
    pub fn refresh(&mut self) -> anyhow::Result<()> {
        let snapshot = log_store_failure("refresh", self.fetch_all())?;
        self.apply_snapshot(snapshot.clone());

        if let Some(local) = &self.local
            && let Err(err) = local.save_snapshot(&snapshot)
        {
            warn!(error = %format!("{err:#}"), "failed to cache snapshot");
        }
        info!(
            employees = self.employees.len(),
            shifts = self.shifts.len(),
            "refreshed from store"
        );
        Ok(())
    }

    /// Probes first so a write landing mid-fetch makes the next load refetch.
    fn fetch_all(&self) -> anyhow::Result<Snapshot> {
        let last_updated = self.store.max_updated()?;
        Ok(Snapshot {
            last_updated,
            employees: self.store.list_employees()?,
            shifts: self.store.list_shifts()?,
        })
    }

    /// Replaces the mirror. Shift rows that do not map are logged and left out.
    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        let mut employees: Vec<Employee> =
            snapshot.employees.into_iter().map(employee_from_row).collect();
        let shifts = snapshot
            .shifts
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                shift_from_row(row)
                    .inspect_err(|err| {
                        warn!(%id, error = %format!("{err:#}"), "skipping shift row");
                    })
                    .ok()
            })
            .collect();
        sort_employees(&mut employees, self.view.sort);
        self.employees = employees;
        self.shifts = shifts;
        self.last_updated = snapshot.last_updated;
    }

    #[tracing::instrument(skip(self, color))]
    pub fn add_employee(
        &mut self,
        name: &str,
        role: &str,
        color: Option<AvatarColor>,
    ) -> anyhow::Result<Employee> {
        let employee = Employee::new(name, role, color, Utc::now())?;
        let row = log_store_failure(
            "insert_employee",
            self.store.insert_employee(employee_to_row(&employee)),
        )?;
        let stored = employee_from_row(row);
        self.employees.push(stored.clone());
        sort_employees(&mut self.employees, self.view.sort);
        info!(id = %stored.id, name = %stored.name, "added employee");
        Ok(stored)
    }

    #[tracing::instrument(skip(self, patch), fields(id = %id))]
    pub fn update_employee(
        &mut self,
        id: EmployeeId,
        patch: &EmployeePatch,
    ) -> anyhow::Result<Employee> {
        let mut updated = self
            .employee(id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown employee: {id}"))?;
        updated.apply_patch(patch)?;

        let row = log_store_failure(
            "update_employee",
            self.store.update_employee(employee_to_row(&updated)),
        )?;
        let stored = employee_from_row(row);
        if let Some(slot) = self.employees.iter_mut().find(|e| e.id == id) {
            *slot = stored.clone();
        }
        sort_employees(&mut self.employees, self.view.sort);
        Ok(stored)
    }

    /// Removes the employee and, like the store, all of their shifts.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete_employee(&mut self, id: EmployeeId) -> anyhow::Result<()> {
        if self.employee(id).is_none() {
            return Err(anyhow!("unknown employee: {id}"));
        }
        log_store_failure("delete_employee", self.store.delete_employee(id))?;
        self.employees.retain(|e| e.id != id);
        let before = self.shifts.len();
        self.shifts.retain(|s| s.employee_id != id);
        info!(removed_shifts = before - self.shifts.len(), "deleted employee");
        Ok(())
    }

    /// Creates the shift, or overwrites the one already in its (employee, day) cell.
    #[tracing::instrument(
        skip(self, draft),
        fields(employee = %draft.employee_id, date = %draft.date)
    )]
    pub fn save_shift(&mut self, draft: &ShiftDraft) -> anyhow::Result<Shift> {
        if self.employee(draft.employee_id).is_none() {
            return Err(anyhow!("unknown employee: {}", draft.employee_id));
        }
        match self.shift_at(draft.employee_id, draft.date).map(|s| s.id) {
            Some(id) => self.update_shift(id, draft),
            None => self.create_shift(draft),
        }
    }

    fn create_shift(&mut self, draft: &ShiftDraft) -> anyhow::Result<Shift> {
        let shift = Shift::from_draft(draft, Utc::now());
        let row = log_store_failure("insert_shift", self.store.insert_shift(shift_to_row(&shift)))?;
        let stored = shift_from_row(row)?;
        self.shifts.push(stored.clone());
        debug!(id = %stored.id, kind = %stored.kind, "created shift");
        Ok(stored)
    }

    fn update_shift(&mut self, id: ShiftId, draft: &ShiftDraft) -> anyhow::Result<Shift> {
        let mut shift = self
            .shifts
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown shift: {id}"))?;
        shift.apply_draft(draft, Utc::now());
        let row = log_store_failure("update_shift", self.store.update_shift(shift_to_row(&shift)))?;
        let stored = shift_from_row(row)?;
        self.replace_shift(stored.clone());
        debug!(id = %stored.id, kind = %stored.kind, "updated shift");
        Ok(stored)
    }

    fn replace_shift(&mut self, shift: Shift) {
        if let Some(slot) = self.shifts.iter_mut().find(|s| s.id == shift.id) {
            *slot = shift;
        }
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete_shift(&mut self, id: ShiftId) -> anyhow::Result<()> {
        if !self.shifts.iter().any(|s| s.id == id) {
            return Err(anyhow!("unknown shift: {id}"));
        }
        log_store_failure("delete_shift", self.store.delete_shift(id))?;
        self.shifts.retain(|s| s.id != id);
        Ok(())
    }

    pub fn select_template(&mut self, idx: usize) -> anyhow::Result<QuickAddState> {
        if idx >= self.templates.len() {
            return Err(anyhow!(
                "no template #{} (there are {})",
                idx + 1,
                self.templates.len()
            ));
        }
        Ok(self.view.quick_add.toggle(idx))
    }

    pub fn press_key(&mut self, key: Key, in_text_input: bool) -> QuickAddState {
        let count = self.templates.len();
        self.view.quick_add.handle_key(key, in_text_input, count)
    }

    /// With a template active the click writes straight through; otherwise
    /// the caller gets what the editor should be opened with.
    #[tracing::instrument(skip(self), fields(employee = %employee_id, date = %date))]
    pub fn click_cell(
        &mut self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> anyhow::Result<ClickOutcome> {
        if self.employee(employee_id).is_none() {
            return Err(anyhow!("unknown employee: {employee_id}"));
        }
        let existing = self.shift_at(employee_id, date).cloned();
        let action = self
            .view
            .quick_add
            .on_cell_click(&self.templates, employee_id, date, existing.as_ref());
        match action {
            CellAction::Create(draft) => self.create_shift(&draft).map(ClickOutcome::Created),
            CellAction::Update { id, draft } => {
                self.update_shift(id, &draft).map(ClickOutcome::Updated)
            }
            CellAction::OpenEditor {
                employee_id,
                date,
                existing,
            } => Ok(ClickOutcome::OpenEditor {
                employee_id,
                date,
                existing,
            }),
        }
    }

    /// Lengthens or shortens a shift by `delta` hours, showing the result
    /// before the store confirms it and restoring the old shift if the store refuses.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn adjust_hours(&mut self, id: ShiftId, delta: f64) -> anyhow::Result<Shift> {
        let original = self
            .shifts
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown shift: {id}"))?;

        let mut pending = Pending::new(original.clone());
        pending.propose(original.adjusted_by(delta)?);
        let optimistic = pending.current().clone();
        self.replace_shift(optimistic.clone());
        debug!(from = original.hours, to = optimistic.hours, "applied hours optimistically");

        let stored = self
            .store
            .update_shift(shift_to_row(&optimistic))
            .and_then(shift_from_row);
        match stored {
            Ok(stored) => {
                let committed = pending.commit_with(stored).clone();
                self.replace_shift(committed.clone());
                Ok(committed)
            }
            Err(err) => {
                let restored = pending.revert().clone();
                error!(
                    op = "update_shift",
                    error = %format!("{err:#}"),
                    restored = restored.hours,
                    "store call failed; reverted hours"
                );
                self.replace_shift(restored);
                Err(err.context("update_shift failed"))
            }
        }
    }

    pub fn working_days(&self, month: MonthKey) -> u32 {
        effective_working_days(self.country, month, &self.view.overrides)
    }

    pub fn set_working_days_override(&mut self, month: MonthKey, days: u32) -> anyhow::Result<()> {
        self.view.overrides.set(month, days)?;
        info!(month = %month, days, "set working days override");
        self.persist_prefs()
    }

    pub fn clear_working_days_override(&mut self, month: MonthKey) -> anyhow::Result<Option<u32>> {
        let previous = self.view.overrides.clear(month);
        self.persist_prefs()?;
        Ok(previous)
    }

    pub fn grid(&self) -> Grid {
        self.grid_in(self.view.mode)
    }

    /// The grid as `mode` would lay it out, leaving the saved view alone.
    pub fn grid_in(&self, mode: ViewMode) -> Grid {
        let view = ViewState {
            mode,
            ..self.view.clone()
        };
        let days = view.days();
        let month = MonthKey::of(self.view.focus);
        build_grid(&GridInput {
            days: &days,
            employees: &self.employees,
            shifts: &self.shifts,
            month,
            working_days: self.working_days(month),
            country: self.country,
        })
    }

    pub fn go_to(&mut self, focus: NaiveDate) {
        self.view.focus = focus;
    }

    /// Moves the focus by `step` weeks or months, depending on the view.
    pub fn navigate(&mut self, step: i64) -> NaiveDate {
        self.view.focus = shift_focus(self.view.focus, self.view.mode, step);
        self.view.focus
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> anyhow::Result<()> {
        self.view.mode = mode;
        self.persist_prefs()
    }

    pub fn set_sort(&mut self, sort: SortKey) -> anyhow::Result<()> {
        self.view.sort = sort;
        sort_employees(&mut self.employees, sort);
        self.persist_prefs()
    }

    pub fn set_compact(&mut self, compact: bool) -> anyhow::Result<()> {
        self.view.compact = compact;
        self.persist_prefs()
    }

    pub fn set_show_weekends(&mut self, show: bool) -> anyhow::Result<()> {
        self.view.show_weekends = show;
        self.persist_prefs()
    }

    fn persist_prefs(&self) -> anyhow::Result<()> {
        match &self.local {
            Some(local) => local
                .save_prefs(&self.view.to_prefs())
                .context("failed to save view preferences"),
            None => Ok(()),
        }
    }
}

fn log_store_failure<T>(op: &'static str, result: anyhow::Result<T>) -> anyhow::Result<T> {
    result.map_err(|err| {
        error!(op, error = %format!("{err:#}"), "store call failed");
        err.context(format!("{op} failed"))
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};
    use tempfile::{TempDir, tempdir};
    use uuid::Uuid;

    use super::*;
    use crate::duration::{format_clock, shift_hours};
    use crate::model::ShiftKind;
    use crate::rows::{EmployeeRow, ShiftRow};
    use crate::store::FileStore;

    /// FileStore whose writes can be switched off.
    struct FlakyStore {
        inner: FileStore,
        fail_writes: bool,
        fail_probe: bool,
    }

    impl FlakyStore {
        fn check(&self) -> anyhow::Result<()> {
            if self.fail_writes {
                Err(anyhow!("connection reset"))
            } else {
                Ok(())
            }
        }
    }

    impl RemoteStore for FlakyStore {
        fn list_employees(&self) -> anyhow::Result<Vec<EmployeeRow>> {
            self.inner.list_employees()
        }
        fn insert_employee(&mut self, row: EmployeeRow) -> anyhow::Result<EmployeeRow> {
            self.check()?;
            self.inner.insert_employee(row)
        }
        fn update_employee(&mut self, row: EmployeeRow) -> anyhow::Result<EmployeeRow> {
            self.check()?;
            self.inner.update_employee(row)
        }
        fn delete_employee(&mut self, id: Uuid) -> anyhow::Result<()> {
            self.check()?;
            self.inner.delete_employee(id)
        }
        fn list_shifts(&self) -> anyhow::Result<Vec<ShiftRow>> {
            self.inner.list_shifts()
        }
        fn insert_shift(&mut self, row: ShiftRow) -> anyhow::Result<ShiftRow> {
            self.check()?;
            self.inner.insert_shift(row)
        }
        fn update_shift(&mut self, row: ShiftRow) -> anyhow::Result<ShiftRow> {
            self.check()?;
            self.inner.update_shift(row)
        }
        fn delete_shift(&mut self, id: Uuid) -> anyhow::Result<()> {
            self.check()?;
            self.inner.delete_shift(id)
        }
        fn max_updated(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
            if self.fail_probe {
                return Err(anyhow!("network down"));
            }
            self.inner.max_updated()
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).expect("valid date")
    }

    fn session(temp: &TempDir) -> Session<FlakyStore> {
        let inner = FileStore::open(temp.path()).expect("open store");
        let local = LocalState::open(temp.path()).expect("open local");
        let mut session = Session::new(
            FlakyStore {
                inner,
                fail_writes: false,
                fail_probe: false,
            },
            Some(local),
            Country::CzechRepublic,
            day(2),
            ViewMode::Month,
        );
        session.load().expect("load");
        session
    }

    #[test]
    fn quick_add_twice_on_same_cell_keeps_one_shift() {
        let temp = tempdir().expect("tempdir");
        let mut s = session(&temp);
        let anna = s.add_employee("Anna", "Cashier", None).expect("add");

        s.select_template(0).expect("template");
        let first = s.click_cell(anna.id, day(3)).expect("first click");
        let second = s.click_cell(anna.id, day(3)).expect("second click");

        let ClickOutcome::Created(created) = first else {
            panic!("first click should create");
        };
        let ClickOutcome::Updated(updated) = second else {
            panic!("second click should update");
        };
        assert_eq!(created.id, updated.id);
        assert_eq!(s.store().list_shifts().expect("list").len(), 1);
        assert_eq!(s.shifts().len(), 1);
    }

    #[test]
    fn active_template_overwrites_existing_shift() {
        let temp = tempdir().expect("tempdir");
        let mut s = session(&temp);
        let anna = s.add_employee("Anna", "", None).expect("add");
        s.select_template(0).expect("morning");
        s.click_cell(anna.id, day(4)).expect("create");

        s.press_key(Key::Digit(3), false);
        let ClickOutcome::Updated(shift) = s.click_cell(anna.id, day(4)).expect("click") else {
            panic!("expected update");
        };
        assert_eq!(shift.kind, ShiftKind::Night);
        assert_eq!(shift.start.map(|t| t.to_string()), Some("22:00:00".to_string()));
        assert_eq!(s.shifts().len(), 1);
    }

    #[test]
    fn idle_click_opens_editor_without_writing() {
        let temp = tempdir().expect("tempdir");
        let mut s = session(&temp);
        let anna = s.add_employee("Anna", "", None).expect("add");
        let outcome = s.click_cell(anna.id, day(5)).expect("click");
        assert_eq!(
            outcome,
            ClickOutcome::OpenEditor {
                employee_id: anna.id,
                date: day(5),
                existing: None
            }
        );
        assert!(s.store().list_shifts().expect("list").is_empty());
    }

    #[test]
    fn failed_write_leaves_state_unchanged() {
        let temp = tempdir().expect("tempdir");
        let mut s = session(&temp);
        let anna = s.add_employee("Anna", "", None).expect("add");

        s.store.fail_writes = true;
        assert!(s.add_employee("Ben", "", None).is_err());
        assert_eq!(s.employees().len(), 1);

        let draft = ShiftDraft::new(anna.id, day(2), None, None, ShiftKind::Vacation);
        assert!(s.save_shift(&draft).is_err());
        assert!(s.shifts().is_empty());

        assert!(s.delete_employee(anna.id).is_err());
        assert_eq!(s.employees().len(), 1);
    }

    #[test]
    fn adjust_hours_commits_or_reverts() {
        let temp = tempdir().expect("tempdir");
        let mut s = session(&temp);
        let anna = s.add_employee("Anna", "", None).expect("add");
        let draft = builtin_templates()[0].draft_for(anna.id, day(2));
        let shift = s.save_shift(&draft).expect("save");

        let adjusted = s.adjust_hours(shift.id, 0.5).expect("adjust");
        assert_eq!(adjusted.hours, 8.5);
        assert_eq!(adjusted.start, shift.start);
        assert_eq!(adjusted.end.map(format_clock), Some("14:30".to_string()));
        let current = s.shift_at(anna.id, day(2)).cloned().expect("shift");
        let (start, end) = (current.start.expect("start"), current.end.expect("end"));
        assert_eq!(current.hours, shift_hours(start, end));

        s.store.fail_writes = true;
        assert!(s.adjust_hours(shift.id, -2.0).is_err());
        assert_eq!(s.shift_at(anna.id, day(2)), Some(&current));

        s.store.fail_writes = false;
        let floored = s.adjust_hours(shift.id, -20.0).expect("floor");
        assert_eq!(floored.hours, 0.0);
        assert_eq!(floored.end, floored.start);
        assert!(s.adjust_hours(shift.id, 24.0).is_err());
    }

    #[test]
    fn adjusting_untimed_shift_changes_hours_only() {
        let temp = tempdir().expect("tempdir");
        let mut s = session(&temp);
        let anna = s.add_employee("Anna", "", None).expect("add");
        let mut draft = ShiftDraft::new(anna.id, day(2), None, None, ShiftKind::Regular);
        draft.hours = 6.0;
        let shift = s.save_shift(&draft).expect("save");

        let adjusted = s.adjust_hours(shift.id, 1.25).expect("adjust");
        assert_eq!(adjusted.hours, 7.25);
        assert_eq!((adjusted.start, adjusted.end), (None, None));
    }

    #[test]
    fn adjusting_fixed_duration_entry_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let mut s = session(&temp);
        let anna = s.add_employee("Anna", "", None).expect("add");
        let draft = ShiftDraft::new(anna.id, day(2), None, None, ShiftKind::Vacation);
        let shift = s.save_shift(&draft).expect("save");
        assert!(s.adjust_hours(shift.id, 1.0).is_err());
    }

    #[test]
    fn deleting_employee_drops_their_shifts_locally() {
        let temp = tempdir().expect("tempdir");
        let mut s = session(&temp);
        let anna = s.add_employee("Anna", "", None).expect("add");
        let ben = s.add_employee("Ben", "", None).expect("add");
        for emp in [&anna, &ben] {
            let draft = builtin_templates()[1].draft_for(emp.id, day(6));
            s.save_shift(&draft).expect("save");
        }
        s.delete_employee(anna.id).expect("delete");
        assert_eq!(s.shifts().len(), 1);
        assert_eq!(s.shifts()[0].employee_id, ben.id);
    }

    #[test]
    fn load_uses_snapshot_until_store_changes() {
        let temp = tempdir().expect("tempdir");
        {
            let mut s = session(&temp);
            s.add_employee("Anna", "", None).expect("add");
            s.refresh().expect("refresh");
        }

        let mut reopened = session(&temp);
        assert_eq!(reopened.employees().len(), 1);
        assert_eq!(reopened.load().expect("load"), LoadSource::Snapshot);

        reopened.add_employee("Ben", "", None).expect("add");
        let mut third = Session::new(
            FlakyStore {
                inner: FileStore::open(temp.path()).expect("open"),
                fail_writes: false,
                fail_probe: false,
            },
            Some(LocalState::open(temp.path()).expect("local")),
            Country::CzechRepublic,
            day(2),
            ViewMode::Month,
        );
        assert_eq!(third.load().expect("load"), LoadSource::Store);
        assert_eq!(third.employees().len(), 2);
    }

    #[test]
    fn unmappable_shift_rows_are_skipped() {
        let temp = tempdir().expect("tempdir");
        let (anna, good) = {
            let mut s = session(&temp);
            let anna = s.add_employee("Anna", "", None).expect("add");
            let draft = builtin_templates()[0].draft_for(anna.id, day(3));
            (anna, s.save_shift(&draft).expect("save"))
        };

        let mut store = FileStore::open(temp.path()).expect("open");
        let mut bad = shift_to_row(&good);
        bad.id = Uuid::new_v4();
        bad.shift_date = "2026-03-04".to_string();
        bad.shift_type = "training".to_string();
        store.insert_shift(bad).expect("insert foreign row");

        let s = session(&temp);
        assert_eq!(s.employees().len(), 1);
        assert_eq!(s.shifts().len(), 1);
        assert_eq!(s.shift_at(anna.id, day(3)).map(|sh| sh.id), Some(good.id));
    }

    #[test]
    fn reset_store_invalidates_snapshot() {
        let temp = tempdir().expect("tempdir");
        {
            let mut s = session(&temp);
            s.add_employee("Anna", "", None).expect("add");
            s.refresh().expect("refresh");
            for path in [
                &s.store.inner.employees_path,
                &s.store.inner.shifts_path,
                &s.store.inner.tombstone_path,
            ] {
                std::fs::write(path, "").expect("reset");
            }
        }

        let mut s = session(&temp);
        assert!(s.employees().is_empty());
        assert_eq!(s.load().expect("load"), LoadSource::Snapshot);
    }

    #[test]
    fn failed_probe_keeps_cached_snapshot() {
        let temp = tempdir().expect("tempdir");
        {
            let mut s = session(&temp);
            s.add_employee("Anna", "", None).expect("add");
            s.refresh().expect("refresh");
        }

        let mut offline = Session::new(
            FlakyStore {
                inner: FileStore::open(temp.path()).expect("open"),
                fail_writes: false,
                fail_probe: true,
            },
            Some(LocalState::open(temp.path()).expect("local")),
            Country::CzechRepublic,
            day(2),
            ViewMode::Month,
        );
        assert_eq!(offline.load().expect("load"), LoadSource::Snapshot);
        assert_eq!(offline.employees().len(), 1);

        let mut cold = Session::new(
            FlakyStore {
                inner: FileStore::open(temp.path()).expect("open"),
                fail_writes: false,
                fail_probe: true,
            },
            None,
            Country::CzechRepublic,
            day(2),
            ViewMode::Month,
        );
        assert!(cold.load().is_err());
    }

    #[test]
    fn overrides_and_view_prefs_survive_reopen() {
        let temp = tempdir().expect("tempdir");
        let march = MonthKey::new(2026, 3).expect("month");
        {
            let mut s = session(&temp);
            assert_eq!(s.working_days(march), 26);
            s.set_working_days_override(march, 20).expect("override");
            s.set_view_mode(ViewMode::Week).expect("mode");
            assert!(s.set_working_days_override(march, 40).is_err());
        }
        let mut s = session(&temp);
        assert_eq!(s.view().mode, ViewMode::Week);
        assert_eq!(s.working_days(march), 20);
        assert_eq!(s.clear_working_days_override(march).expect("clear"), Some(20));
        assert_eq!(s.working_days(march), 26);
    }

    #[test]
    fn grid_respects_sort_and_weekend_visibility() {
        let temp = tempdir().expect("tempdir");
        let mut s = session(&temp);
        s.add_employee("Zdena", "Cashier", None).expect("add");
        s.add_employee("Adam", "Stocker", None).expect("add");
        s.add_employee("Eva", "Cashier", None).expect("add");

        let names = |s: &Session<FlakyStore>| -> Vec<String> {
            s.grid().rows.iter().map(|r| r.employee.name.clone()).collect()
        };
        assert_eq!(names(&s), vec!["Adam", "Eva", "Zdena"]);
        s.set_sort(SortKey::RoleThenName).expect("sort");
        assert_eq!(names(&s), vec!["Eva", "Zdena", "Adam"]);

        s.set_view_mode(ViewMode::Week).expect("mode");
        assert_eq!(s.grid().columns.len(), 7);
        s.set_show_weekends(false).expect("weekends");
        assert_eq!(s.grid().columns.len(), 5);
    }

    #[test]
    fn navigation_moves_by_view_unit() {
        let temp = tempdir().expect("tempdir");
        let mut s = session(&temp);
        assert_eq!(s.navigate(1), day(2) + chrono::Duration::days(31));
        s.set_view_mode(ViewMode::Week).expect("mode");
        s.go_to(day(2));
        assert_eq!(s.navigate(-1), NaiveDate::from_ymd_opt(2026, 2, 23).expect("date"));
    }
}
