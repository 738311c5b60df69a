//! Flat rows as kept by the store, and the one place they are mapped
//! to and from the in-memory model.

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::duration::round_hours;
use crate::model::{AvatarColor, Employee, Shift, ShiftKind};

const ROW_DATE_FORMAT: &str = "%Y-%m-%d";
const ROW_TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRow {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub role_label: Option<String>,
    #[serde(default)]
    pub avatar_color: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftRow {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub shift_date: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration_hours: f64,
    pub shift_type: String,
    pub updated_at: DateTime<Utc>,
}

pub fn employee_to_row(employee: &Employee) -> EmployeeRow {
    EmployeeRow {
        id: employee.id,
        full_name: employee.name.clone(),
        role_label: (!employee.role.is_empty()).then(|| employee.role.clone()),
        avatar_color: Some(employee.color.to_string()),
        updated_at: employee.updated_at,
    }
}

/// Unknown colours fall back to the name-derived palette slot instead of failing the row.
pub fn employee_from_row(row: EmployeeRow) -> Employee {
    let color = row
        .avatar_color
        .as_deref()
        .and_then(|raw| raw.parse::<AvatarColor>().ok())
        .unwrap_or_else(|| AvatarColor::for_name(&row.full_name));
    Employee {
        id: row.id,
        name: row.full_name,
        role: row.role_label.unwrap_or_default(),
        color,
        updated_at: row.updated_at,
    }
}

pub fn shift_to_row(shift: &Shift) -> ShiftRow {
    ShiftRow {
        id: shift.id,
        employee_id: shift.employee_id,
        shift_date: shift.date.format(ROW_DATE_FORMAT).to_string(),
        start_time: shift.start.map(|t| t.format(ROW_TIME_FORMAT).to_string()),
        end_time: shift.end.map(|t| t.format(ROW_TIME_FORMAT).to_string()),
        duration_hours: shift.hours,
        shift_type: shift.kind.as_key().to_string(),
        updated_at: shift.updated_at,
    }
}

pub fn shift_from_row(row: ShiftRow) -> anyhow::Result<Shift> {
    let date = NaiveDate::parse_from_str(&row.shift_date, ROW_DATE_FORMAT)
        .with_context(|| format!("shift {} has invalid date {:?}", row.id, row.shift_date))?;
    let start = parse_row_time(row.start_time.as_deref())
        .with_context(|| format!("shift {} has invalid start_time", row.id))?;
    let end = parse_row_time(row.end_time.as_deref())
        .with_context(|| format!("shift {} has invalid end_time", row.id))?;
    let kind: ShiftKind = row
        .shift_type
        .parse()
        .with_context(|| format!("shift {} has invalid shift_type", row.id))?;

    Ok(Shift {
        id: row.id,
        employee_id: row.employee_id,
        date,
        start,
        end,
        hours: round_hours(row.duration_hours),
        kind,
        updated_at: row.updated_at,
    })
}

fn parse_row_time(raw: Option<&str>) -> anyhow::Result<Option<NaiveTime>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    NaiveTime::parse_from_str(raw, ROW_TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map(Some)
        .map_err(|err| anyhow!("unparseable time {raw:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::model::ShiftDraft;

    #[test]
    fn shift_maps_field_names() {
        let draft = ShiftDraft::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date"),
            NaiveTime::from_hms_opt(22, 0, 0),
            NaiveTime::from_hms_opt(6, 0, 0),
            ShiftKind::Night,
        );
        let shift = Shift::from_draft(&draft, Utc::now());
        let row = shift_to_row(&shift);

        assert_eq!(row.shift_date, "2026-03-02");
        assert_eq!(row.start_time.as_deref(), Some("22:00:00"));
        assert_eq!(row.shift_type, "night");
        assert_eq!(row.duration_hours, 8.0);

        let json = serde_json::to_value(&row).expect("serialize row");
        assert!(json.get("shift_date").is_some());
        assert!(json.get("date").is_none());

        assert_eq!(shift_from_row(row).expect("map back"), shift);
    }

    #[test]
    fn short_row_times_are_accepted() {
        let row = ShiftRow {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            shift_date: "2026-03-02".to_string(),
            start_time: Some("06:00".to_string()),
            end_time: Some(String::new()),
            duration_hours: 8.0,
            shift_type: "morning".to_string(),
            updated_at: Utc::now(),
        };
        let shift = shift_from_row(row).expect("valid row");
        assert_eq!(shift.start, NaiveTime::from_hms_opt(6, 0, 0));
        assert_eq!(shift.end, None);
    }

    #[test]
    fn bad_shift_type_is_reported() {
        let row = ShiftRow {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            shift_date: "2026-03-02".to_string(),
            start_time: None,
            end_time: None,
            duration_hours: 0.0,
            shift_type: "siesta".to_string(),
            updated_at: Utc::now(),
        };
        let err = shift_from_row(row).expect_err("should fail");
        assert!(format!("{err:#}").contains("shift_type"));
    }

    #[test]
    fn employee_row_without_color_gets_palette_slot() {
        let row = EmployeeRow {
            id: Uuid::new_v4(),
            full_name: "Petr".to_string(),
            role_label: None,
            avatar_color: Some("not-a-color".to_string()),
            updated_at: Utc::now(),
        };
        let employee = employee_from_row(row);
        assert_eq!(employee.role, "");
        assert_eq!(employee.color, AvatarColor::for_name("Petr"));
        assert_eq!(employee_to_row(&employee).role_label, None);
    }
}
