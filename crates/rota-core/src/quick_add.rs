//! Template selection and what a grid click turns into.

use chrono::NaiveDate;
use tracing::debug;

use crate::model::{EmployeeId, Shift, ShiftDraft, ShiftId, ShiftTemplate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuickAddState {
    #[default]
    Idle,
    /// Index into the template list.
    TemplateActive(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A number key as typed, `1` being the first template.
    Digit(u8),
    Escape,
    Other,
}

impl Key {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("esc") || trimmed.eq_ignore_ascii_case("escape") {
            return Self::Escape;
        }
        match trimmed.parse::<u8>() {
            Ok(n) if n <= 9 => Self::Digit(n),
            _ => Self::Other,
        }
    }
}

/// Outcome of clicking a grid cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellAction {
    Create(ShiftDraft),
    Update { id: ShiftId, draft: ShiftDraft },
    OpenEditor {
        employee_id: EmployeeId,
        date: NaiveDate,
        existing: Option<Shift>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuickAdd {
    state: QuickAddState,
}

impl QuickAdd {
    pub fn state(&self) -> QuickAddState {
        self.state
    }

    pub fn active_index(&self) -> Option<usize> {
        match self.state {
            QuickAddState::Idle => None,
            QuickAddState::TemplateActive(idx) => Some(idx),
        }
    }

    pub fn active<'a>(&self, templates: &'a [ShiftTemplate]) -> Option<&'a ShiftTemplate> {
        self.active_index().and_then(|idx| templates.get(idx))
    }

    /// Selecting the active template again deselects it; any other replaces it.
    pub fn toggle(&mut self, idx: usize) -> QuickAddState {
        self.state = match self.state {
            QuickAddState::TemplateActive(current) if current == idx => QuickAddState::Idle,
            _ => QuickAddState::TemplateActive(idx),
        };
        debug!(state = ?self.state, "quick-add template toggled");
        self.state
    }

    pub fn clear(&mut self) {
        self.state = QuickAddState::Idle;
    }

    /// Number keys `1..=template_count` toggle a template and Escape returns
    /// to idle. Keys typed into a text field never reach the grid.
    pub fn handle_key(
        &mut self,
        key: Key,
        in_text_input: bool,
        template_count: usize,
    ) -> QuickAddState {
        if in_text_input {
            return self.state;
        }
        match key {
            Key::Escape => self.clear(),
            Key::Digit(n) if n >= 1 && usize::from(n) <= template_count => {
                self.toggle(usize::from(n) - 1);
            }
            Key::Digit(_) | Key::Other => {}
        }
        self.state
    }

    pub fn on_cell_click(
        &self,
        templates: &[ShiftTemplate],
        employee_id: EmployeeId,
        date: NaiveDate,
        existing: Option<&Shift>,
    ) -> CellAction {
        let Some(template) = self.active(templates) else {
            return CellAction::OpenEditor {
                employee_id,
                date,
                existing: existing.cloned(),
            };
        };

        let draft = template.draft_for(employee_id, date);
        match existing {
            Some(shift) => CellAction::Update { id: shift.id, draft },
            None => CellAction::Create(draft),
        }
    }
}
