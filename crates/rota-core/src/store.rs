use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::rows::{EmployeeRow, ShiftRow};

/// Row-level access to the employee and shift collections.
///
/// Writes return the row as stored, with `updated_at` stamped by the store.
/// Nothing here enforces one shift per employee and date.
pub trait RemoteStore {
    fn list_employees(&self) -> anyhow::Result<Vec<EmployeeRow>>;
    fn insert_employee(&mut self, row: EmployeeRow) -> anyhow::Result<EmployeeRow>;
    fn update_employee(&mut self, row: EmployeeRow) -> anyhow::Result<EmployeeRow>;
    /// Removes the employee and every shift that belongs to it.
    fn delete_employee(&mut self, id: Uuid) -> anyhow::Result<()>;

    fn list_shifts(&self) -> anyhow::Result<Vec<ShiftRow>>;
    fn insert_shift(&mut self, row: ShiftRow) -> anyhow::Result<ShiftRow>;
    fn update_shift(&mut self, row: ShiftRow) -> anyhow::Result<ShiftRow>;
    fn delete_shift(&mut self, id: Uuid) -> anyhow::Result<()>;

    /// Latest `updated_at` across both collections, or of the last delete.
    fn max_updated(&self) -> anyhow::Result<Option<DateTime<Utc>>>;
}

#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
    pub employees_path: PathBuf,
    pub shifts_path: PathBuf,
    pub tombstone_path: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let employees_path = data_dir.join("employees.data");
        let shifts_path = data_dir.join("shifts.data");
        let tombstone_path = data_dir.join("deleted.stamp");

        for path in [&employees_path, &shifts_path, &tombstone_path] {
            if !path.exists() {
                fs::write(path, "")?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            employees = %employees_path.display(),
            shifts = %shifts_path.display(),
            "opened store"
        );

        Ok(Self {
            data_dir,
            employees_path,
            shifts_path,
            tombstone_path,
        })
    }

    fn save_employees(&self, rows: &[EmployeeRow]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.employees_path, rows).context("failed to save employees.data")
    }

    fn save_shifts(&self, rows: &[ShiftRow]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.shifts_path, rows).context("failed to save shifts.data")
    }

    fn stamp_delete(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        fs::write(&self.tombstone_path, now.to_rfc3339())
            .with_context(|| format!("failed writing {}", self.tombstone_path.display()))
    }

    fn last_delete(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        let raw = fs::read_to_string(&self.tombstone_path)
            .with_context(|| format!("failed reading {}", self.tombstone_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let parsed = DateTime::parse_from_rfc3339(trimmed)
            .with_context(|| format!("invalid timestamp in {}", self.tombstone_path.display()))?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }
}

impl RemoteStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn list_employees(&self) -> anyhow::Result<Vec<EmployeeRow>> {
        load_jsonl(&self.employees_path).context("failed to load employees.data")
    }

    #[tracing::instrument(skip(self, row), fields(id = %row.id))]
    fn insert_employee(&mut self, mut row: EmployeeRow) -> anyhow::Result<EmployeeRow> {
        let mut rows = self.list_employees()?;
        if rows.iter().any(|r| r.id == row.id) {
            return Err(anyhow!("employee already exists: {}", row.id));
        }
        row.updated_at = Utc::now();
        rows.push(row.clone());
        self.save_employees(&rows)?;
        Ok(row)
    }

    #[tracing::instrument(skip(self, row), fields(id = %row.id))]
    fn update_employee(&mut self, mut row: EmployeeRow) -> anyhow::Result<EmployeeRow> {
        let mut rows = self.list_employees()?;
        let slot = rows
            .iter_mut()
            .find(|r| r.id == row.id)
            .ok_or_else(|| anyhow!("employee not found: {}", row.id))?;
        row.updated_at = Utc::now();
        *slot = row.clone();
        self.save_employees(&rows)?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn delete_employee(&mut self, id: Uuid) -> anyhow::Result<()> {
        let mut rows = self.list_employees()?;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        if rows.len() == before {
            return Err(anyhow!("employee not found: {id}"));
        }

        let mut shifts = self.list_shifts()?;
        let shifts_before = shifts.len();
        shifts.retain(|s| s.employee_id != id);

        self.save_shifts(&shifts)?;
        self.save_employees(&rows)?;
        self.stamp_delete(Utc::now())?;
        info!(removed_shifts = shifts_before - shifts.len(), "deleted employee");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn list_shifts(&self) -> anyhow::Result<Vec<ShiftRow>> {
        load_jsonl(&self.shifts_path).context("failed to load shifts.data")
    }

    #[tracing::instrument(skip(self, row), fields(id = %row.id, date = %row.shift_date))]
    fn insert_shift(&mut self, mut row: ShiftRow) -> anyhow::Result<ShiftRow> {
        if !self.list_employees()?.iter().any(|e| e.id == row.employee_id) {
            return Err(anyhow!("shift references unknown employee: {}", row.employee_id));
        }
        let mut rows = self.list_shifts()?;
        if rows.iter().any(|r| r.id == row.id) {
            return Err(anyhow!("shift already exists: {}", row.id));
        }
        row.updated_at = Utc::now();
        rows.push(row.clone());
        rows.sort_by(|a, b| a.shift_date.cmp(&b.shift_date));
        self.save_shifts(&rows)?;
        Ok(row)
    }

    #[tracing::instrument(skip(self, row), fields(id = %row.id, date = %row.shift_date))]
    fn update_shift(&mut self, mut row: ShiftRow) -> anyhow::Result<ShiftRow> {
        let mut rows = self.list_shifts()?;
        let slot = rows
            .iter_mut()
            .find(|r| r.id == row.id)
            .ok_or_else(|| anyhow!("shift not found: {}", row.id))?;
        row.updated_at = Utc::now();
        *slot = row.clone();
        rows.sort_by(|a, b| a.shift_date.cmp(&b.shift_date));
        self.save_shifts(&rows)?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn delete_shift(&mut self, id: Uuid) -> anyhow::Result<()> {
        let mut rows = self.list_shifts()?;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        if rows.len() == before {
            return Err(anyhow!("shift not found: {id}"));
        }
        self.save_shifts(&rows)?;
        self.stamp_delete(Utc::now())
    }

    #[tracing::instrument(skip(self))]
    fn max_updated(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        let employees = self.list_employees()?.into_iter().map(|r| r.updated_at);
        let shifts = self.list_shifts()?.into_iter().map(|r| r.updated_at);
        let latest = employees
            .chain(shifts)
            .chain(self.last_delete()?)
            .max();
        debug!(latest = ?latest, "probed store freshness");
        Ok(latest)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let row: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(row);
    }

    debug!(count = out.len(), "loaded rows from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, rows))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = rows.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for row in rows {
        let serialized = serde_json::to_string(row)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;
    use uuid::Uuid;

    use super::{FileStore, RemoteStore};
    use crate::rows::{EmployeeRow, ShiftRow};

    fn employee_row(name: &str) -> EmployeeRow {
        EmployeeRow {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            role_label: None,
            avatar_color: None,
            updated_at: Utc::now(),
        }
    }

    fn shift_row(employee_id: Uuid, date: &str) -> ShiftRow {
        ShiftRow {
            id: Uuid::new_v4(),
            employee_id,
            shift_date: date.to_string(),
            start_time: Some("06:00:00".to_string()),
            end_time: Some("14:00:00".to_string()),
            duration_hours: 8.0,
            shift_type: "morning".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn deleting_employee_cascades_to_shifts() {
        let temp = tempdir().expect("tempdir");
        let mut store = FileStore::open(temp.path()).expect("open store");

        let anna = store.insert_employee(employee_row("Anna")).expect("insert anna");
        let ben = store.insert_employee(employee_row("Ben")).expect("insert ben");
        store.insert_shift(shift_row(anna.id, "2026-03-02")).expect("anna shift");
        store.insert_shift(shift_row(anna.id, "2026-03-03")).expect("anna shift");
        store.insert_shift(shift_row(ben.id, "2026-03-02")).expect("ben shift");

        store.delete_employee(anna.id).expect("delete anna");

        let shifts = store.list_shifts().expect("list shifts");
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].employee_id, ben.id);
        assert_eq!(store.list_employees().expect("list").len(), 1);
    }

    #[test]
    fn store_does_not_dedupe_shifts_per_day() {
        let temp = tempdir().expect("tempdir");
        let mut store = FileStore::open(temp.path()).expect("open store");
        let anna = store.insert_employee(employee_row("Anna")).expect("insert");
        store.insert_shift(shift_row(anna.id, "2026-03-02")).expect("first");
        store.insert_shift(shift_row(anna.id, "2026-03-02")).expect("second");
        assert_eq!(store.list_shifts().expect("list").len(), 2);
    }

    #[test]
    fn max_updated_moves_forward_on_delete() {
        let temp = tempdir().expect("tempdir");
        let mut store = FileStore::open(temp.path()).expect("open store");
        assert_eq!(store.max_updated().expect("probe"), None);

        let anna = store.insert_employee(employee_row("Anna")).expect("insert");
        let shift = store.insert_shift(shift_row(anna.id, "2026-03-02")).expect("shift");
        let after_insert = store.max_updated().expect("probe").expect("some");
        assert!(after_insert >= shift.updated_at);

        store.delete_shift(shift.id).expect("delete");
        let after_delete = store.max_updated().expect("probe").expect("some");
        assert!(after_delete >= after_insert);
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let mut store = FileStore::open(temp.path()).expect("open store");
        assert!(store.delete_shift(Uuid::new_v4()).is_err());
        assert!(store.update_employee(employee_row("Ghost")).is_err());
        assert!(store.insert_shift(shift_row(Uuid::new_v4(), "2026-03-02")).is_err());
    }
}
