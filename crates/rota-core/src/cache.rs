use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::grid::SortKey;
use crate::holidays::WorkingDaysOverrides;
use crate::period::ViewMode;
use crate::rows::{EmployeeRow, ShiftRow};

const LOCAL_DIR: &str = "local";
const PREFS_FILE: &str = "prefs.toml";
const SNAPSHOT_FILE: &str = "snapshot.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewPrefs {
    pub view_mode: ViewMode,
    pub compact: bool,
    pub show_weekends: bool,
    pub sort: SortKey,
    /// Kept last so it serializes as a trailing table.
    pub working_days: WorkingDaysOverrides,
}

impl Default for ViewPrefs {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::default(),
            compact: false,
            show_weekends: true,
            sort: SortKey::default(),
            working_days: WorkingDaysOverrides::default(),
        }
    }
}

/// Rows as last fetched, stamped with the store's freshness marker at that time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub last_updated: Option<DateTime<Utc>>,
    pub employees: Vec<EmployeeRow>,
    pub shifts: Vec<ShiftRow>,
}

/// True when nothing in the store changed after the cached stamp was taken.
pub fn is_fresh(cached: Option<DateTime<Utc>>, probe: Option<DateTime<Utc>>) -> bool {
    match (cached, probe) {
        (None, None) => true,
        (Some(_), None) | (None, Some(_)) => false,
        (Some(cached), Some(remote)) => remote <= cached,
    }
}

/// Per-user state under `<data>/local`.
#[derive(Debug, Clone)]
pub struct LocalState {
    pub dir: PathBuf,
    pub prefs_path: PathBuf,
    pub snapshot_path: PathBuf,
}

impl LocalState {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let dir = data_dir.join(LOCAL_DIR);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        debug!(dir = %dir.display(), "opened local state");
        Ok(Self {
            prefs_path: dir.join(PREFS_FILE),
            snapshot_path: dir.join(SNAPSHOT_FILE),
            dir,
        })
    }

    /// Missing or unreadable preferences fall back to defaults.
    #[tracing::instrument(skip(self))]
    pub fn load_prefs(&self) -> ViewPrefs {
        if !self.prefs_path.exists() {
            return ViewPrefs::default();
        }
        let parsed = fs::read_to_string(&self.prefs_path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| toml::from_str::<ViewPrefs>(&raw).map_err(anyhow::Error::from));
        match parsed {
            Ok(prefs) => prefs,
            Err(err) => {
                warn!(
                    file = %self.prefs_path.display(),
                    error = %err,
                    "ignoring unreadable preferences"
                );
                ViewPrefs::default()
            }
        }
    }

    #[tracing::instrument(skip(self, prefs))]
    pub fn save_prefs(&self, prefs: &ViewPrefs) -> anyhow::Result<()> {
        let text = toml::to_string(prefs).context("failed to serialize preferences")?;
        write_atomic(&self.prefs_path, text.as_bytes())?;
        debug!(file = %self.prefs_path.display(), "saved preferences");
        Ok(())
    }

    /// A snapshot that fails to parse is treated as absent.
    #[tracing::instrument(skip(self))]
    pub fn load_snapshot(&self) -> Option<Snapshot> {
        let raw = fs::read_to_string(&self.snapshot_path).ok()?;
        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => {
                debug!(
                    employees = snapshot.employees.len(),
                    shifts = snapshot.shifts.len(),
                    last_updated = ?snapshot.last_updated,
                    "loaded snapshot"
                );
                Some(snapshot)
            }
            Err(err) => {
                warn!(
                    file = %self.snapshot_path.display(),
                    error = %err,
                    "discarding unreadable snapshot"
                );
                None
            }
        }
    }

    #[tracing::instrument(skip(self, snapshot))]
    pub fn save_snapshot(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let text = serde_json::to_vec(snapshot).context("failed to serialize snapshot")?;
        write_atomic(&self.snapshot_path, &text)?;
        info!(
            employees = snapshot.employees.len(),
            shifts = snapshot.shifts.len(),
            "saved snapshot"
        );
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
    Ok(())
}
