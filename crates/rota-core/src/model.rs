use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::duration::{round_hours, shift_hours};

pub type EmployeeId = Uuid;
pub type ShiftId = Uuid;

/// Hours credited for a vacation entry, whatever its stored duration.
pub const VACATION_HOURS: f64 = 8.0;
pub const DAY_OFF_HOURS: f64 = 0.0;
pub const NORM_HOURS_PER_DAY: f64 = 8.0;

pub const PRESET_ROLES: &[&str] = &["Manager", "Shift Lead", "Cashier", "Stocker", "Trainee"];

pub const AVATAR_PALETTE: &[&str] = &[
    "slate", "red", "orange", "amber", "green", "teal", "blue", "indigo", "violet", "pink",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvatarColor(String);

impl AvatarColor {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Palette slot derived from the employee name, used when none is chosen.
    pub fn for_name(name: &str) -> Self {
        let sum: usize = name.bytes().map(usize::from).sum();
        Self(AVATAR_PALETTE[sum % AVATAR_PALETTE.len()].to_string())
    }
}

impl Default for AvatarColor {
    fn default() -> Self {
        Self(AVATAR_PALETTE[0].to_string())
    }
}

impl FromStr for AvatarColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        if AVATAR_PALETTE.contains(&lower.as_str()) {
            return Ok(Self(lower));
        }
        let is_hex = trimmed.len() == 7
            && trimmed.starts_with('#')
            && trimmed[1..].chars().all(|c| c.is_ascii_hexdigit());
        if is_hex {
            return Ok(Self(lower));
        }
        Err(anyhow!(
            "invalid avatar color: {s} (expected #rrggbb or one of {})",
            AVATAR_PALETTE.join(", ")
        ))
    }
}

impl fmt::Display for AvatarColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub color: AvatarColor,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    pub fn new(
        name: &str,
        role: &str,
        color: Option<AvatarColor>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Self> {
        let name = normalize_label(name);
        if name.is_empty() {
            return Err(anyhow!("employee name cannot be empty"));
        }
        let color = color.unwrap_or_else(|| AvatarColor::for_name(&name));
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            role: normalize_role(role),
            color,
            updated_at: now,
        })
    }

    pub fn has_preset_role(&self) -> bool {
        PRESET_ROLES.iter().any(|r| r.eq_ignore_ascii_case(&self.role))
    }

    /// Applies the set fields; an empty name is rejected and leaves `self` untouched.
    pub fn apply_patch(&mut self, patch: &EmployeePatch) -> anyhow::Result<()> {
        let name = match &patch.name {
            Some(raw) => {
                let name = normalize_label(raw);
                if name.is_empty() {
                    return Err(anyhow!("employee name cannot be empty"));
                }
                Some(name)
            }
            None => None,
        };
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(role) = &patch.role {
            self.role = normalize_role(role);
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        Ok(())
    }
}

/// Rename, role change and colour change, any subset at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeePatch {
    pub name: Option<String>,
    pub role: Option<String>,
    pub color: Option<AvatarColor>,
}

impl EmployeePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.role.is_none() && self.color.is_none()
    }
}

fn normalize_label(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Preset roles keep their canonical spelling whatever case they were typed in.
fn normalize_role(raw: &str) -> String {
    let label = normalize_label(raw);
    PRESET_ROLES
        .iter()
        .find(|preset| preset.eq_ignore_ascii_case(&label))
        .map_or(label, |preset| (*preset).to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftCategory {
    Work,
    Vacation,
    DayOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftKind {
    Morning,
    Afternoon,
    Night,
    Regular,
    Vacation,
    DayOff,
}

impl ShiftKind {
    pub fn all() -> [Self; 6] {
        [
            Self::Morning,
            Self::Afternoon,
            Self::Night,
            Self::Regular,
            Self::Vacation,
            Self::DayOff,
        ]
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Night => "night",
            Self::Regular => "regular",
            Self::Vacation => "vacation",
            Self::DayOff => "dayoff",
        }
    }

    pub fn category(self) -> ShiftCategory {
        match self {
            Self::Vacation => ShiftCategory::Vacation,
            Self::DayOff => ShiftCategory::DayOff,
            Self::Morning | Self::Afternoon | Self::Night | Self::Regular => ShiftCategory::Work,
        }
    }

    /// Duration that overrides start/end for vacation and day-off entries.
    pub fn fixed_hours(self) -> Option<f64> {
        match self.category() {
            ShiftCategory::Vacation => Some(VACATION_HOURS),
            ShiftCategory::DayOff => Some(DAY_OFF_HOURS),
            ShiftCategory::Work => None,
        }
    }
}

impl FromStr for ShiftKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|kind| kind.as_key() == key)
            .or(match key.as_str() {
                "day-off" | "off" => Some(Self::DayOff),
                "work" => Some(Self::Regular),
                _ => None,
            })
            .ok_or_else(|| anyhow!("unknown shift type: {s}"))
    }
}

impl fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub hours: f64,
    pub kind: ShiftKind,
    pub updated_at: DateTime<Utc>,
}

impl Shift {
    pub fn from_draft(draft: &ShiftDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_id: draft.employee_id,
            date: draft.date,
            start: draft.start,
            end: draft.end,
            hours: draft.hours,
            kind: draft.kind,
            updated_at: now,
        }
    }

    pub fn apply_draft(&mut self, draft: &ShiftDraft, now: DateTime<Utc>) {
        self.employee_id = draft.employee_id;
        self.date = draft.date;
        self.start = draft.start;
        self.end = draft.end;
        self.hours = draft.hours;
        self.kind = draft.kind;
        self.updated_at = now;
    }

    /// The shift lengthened or shortened by `delta` hours, floored at zero.
    ///
    /// A timed shift keeps its start and moves its end, so the stored hours
    /// always match the clock times. Fixed-duration entries cannot be adjusted.
    pub fn adjusted_by(&self, delta: f64) -> anyhow::Result<Shift> {
        if self.kind.fixed_hours().is_some() {
            return Err(anyhow!("{} entries have a fixed duration", self.kind));
        }
        let target = round_hours((self.hours + delta).max(0.0));
        if target >= 24.0 {
            return Err(anyhow!("a shift cannot last {target} hours"));
        }

        let mut adjusted = self.clone();
        match (self.start, self.end) {
            (Some(start), Some(_)) => {
                let minutes = (target * 60.0).round() as i64;
                let (end, _) = start.overflowing_add_signed(Duration::minutes(minutes));
                adjusted.end = Some(end);
                adjusted.hours = shift_hours(start, end);
            }
            _ => adjusted.hours = target,
        }
        Ok(adjusted)
    }

    /// Hours counted toward the monthly total.
    pub fn effective_hours(&self) -> f64 {
        self.kind.fixed_hours().unwrap_or(self.hours)
    }
}

/// Field values for a shift that is about to be created or overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftDraft {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub hours: f64,
    pub kind: ShiftKind,
}

impl ShiftDraft {
    pub fn new(
        employee_id: EmployeeId,
        date: NaiveDate,
        start: Option<NaiveTime>,
        end: Option<NaiveTime>,
        kind: ShiftKind,
    ) -> Self {
        let mut draft = Self {
            employee_id,
            date,
            start,
            end,
            hours: 0.0,
            kind,
        };
        draft.recompute_hours();
        draft
    }

    /// Fixed categories take their fixed value; otherwise derive from start/end when both are set.
    pub fn recompute_hours(&mut self) {
        if let Some(fixed) = self.kind.fixed_hours() {
            self.hours = fixed;
        } else if let (Some(start), Some(end)) = (self.start, self.end) {
            self.hours = shift_hours(start, end);
        }
        self.hours = round_hours(self.hours.max(0.0));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShiftTemplate {
    pub id: &'static str,
    pub label: &'static str,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub style: &'static str,
    pub kind: ShiftKind,
}

impl ShiftTemplate {
    pub fn hours(&self) -> f64 {
        self.kind
            .fixed_hours()
            .unwrap_or_else(|| shift_hours(self.start, self.end))
    }

    pub fn draft_for(&self, employee_id: EmployeeId, date: NaiveDate) -> ShiftDraft {
        ShiftDraft::new(employee_id, date, Some(self.start), Some(self.end), self.kind)
    }
}

fn clock(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Templates in hot-key order: key `1` selects the first entry.
pub fn builtin_templates() -> Vec<ShiftTemplate> {
    vec![
        ShiftTemplate {
            id: "morning",
            label: "Morning",
            start: clock(6, 0),
            end: clock(14, 0),
            style: "sky",
            kind: ShiftKind::Morning,
        },
        ShiftTemplate {
            id: "afternoon",
            label: "Afternoon",
            start: clock(14, 0),
            end: clock(22, 0),
            style: "amber",
            kind: ShiftKind::Afternoon,
        },
        ShiftTemplate {
            id: "night",
            label: "Night",
            start: clock(22, 0),
            end: clock(6, 0),
            style: "indigo",
            kind: ShiftKind::Night,
        },
        ShiftTemplate {
            id: "day",
            label: "Day",
            start: clock(8, 0),
            end: clock(16, 30),
            style: "teal",
            kind: ShiftKind::Regular,
        },
        ShiftTemplate {
            id: "vacation",
            label: "Vacation",
            start: clock(8, 0),
            end: clock(16, 0),
            style: "green",
            kind: ShiftKind::Vacation,
        },
        ShiftTemplate {
            id: "dayoff",
            label: "Day off",
            start: clock(0, 0),
            end: clock(0, 0),
            style: "slate",
            kind: ShiftKind::DayOff,
        },
    ]
}
