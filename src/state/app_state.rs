use std::time::{Duration, Instant};
use tui::layout::{Position, Rect};

pub const TOAST_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    /// Keystrokes edit the search term.
    Search,
}

// ---------------------------------------------------------------------------
// Card grid selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GridState {
    /// Index into the filtered list.
    pub selected: usize,
    /// Columns in the last drawn layout.
    pub columns: usize,
    /// First visible row.
    pub scroll_row: usize,
}

impl Default for GridState {
    fn default() -> Self {
        Self { selected: 0, columns: 1, scroll_row: 0 }
    }
}

impl GridState {
    pub fn move_left(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_right(&mut self, len: usize) {
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn move_up(&mut self) {
        if self.selected >= self.columns {
            self.selected -= self.columns;
        }
    }

    pub fn move_down(&mut self, len: usize) {
        let target = self.selected + self.columns.max(1);
        if target < len {
            self.selected = target;
        } else if self.row_of(len.saturating_sub(1)) > self.row_of(self.selected) {
            // last row is shorter: land on its final card
            self.selected = len - 1;
        }
    }

    /// Keep the selection inside a list that shrank.
    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.selected = 0;
            self.scroll_row = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    pub fn reset(&mut self) {
        self.selected = 0;
        self.scroll_row = 0;
    }

    pub fn set_columns(&mut self, columns: usize) {
        self.columns = columns.max(1);
    }

    /// Scroll so the selected row is one of `visible_rows`.
    pub fn ensure_visible(&mut self, visible_rows: usize) {
        let row = self.row_of(self.selected);
        let visible_rows = visible_rows.max(1);
        if row < self.scroll_row {
            self.scroll_row = row;
        } else if row >= self.scroll_row + visible_rows {
            self.scroll_row = row + 1 - visible_rows;
        }
    }

    fn row_of(&self, index: usize) -> usize {
        index / self.columns.max(1)
    }
}

// ---------------------------------------------------------------------------
// Toast
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Toast {
    pub title: &'static str,
    pub description: &'static str,
    pub shown_at: Instant,
}

#[derive(Debug, Default)]
pub struct ToastState {
    pub current: Option<Toast>,
    /// Last list failure count a toast was raised for.
    seen_errors: u32,
}

impl ToastState {
    /// Raise the list error toast once for each new failure. Returns whether
    /// a toast was raised.
    pub fn on_list_errors(&mut self, error_count: u32, now: Instant) -> bool {
        if error_count == self.seen_errors {
            return false;
        }
        self.seen_errors = error_count;
        self.current = Some(Toast {
            title: "Error loading leagues",
            description: "Please try again later.",
            shown_at: now,
        });
        true
    }

    /// Drop an expired toast. Returns whether anything changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        let expired = self
            .current
            .as_ref()
            .is_some_and(|t| now.duration_since(t.shown_at) >= TOAST_DURATION);
        if expired {
            self.current = None;
        }
        expired
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }
}

// ---------------------------------------------------------------------------
// Mouse hit testing
// ---------------------------------------------------------------------------

/// Where a card was drawn last frame.
#[derive(Debug, Clone)]
pub struct CardHitbox {
    pub area: Rect,
    pub index: usize,
    pub league_id: String,
}

// ---------------------------------------------------------------------------
// Root app state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct AppState {
    pub input_mode: InputMode,
    pub grid: GridState,
    /// League under the mouse pointer.
    pub hovered: Option<String>,
    pub show_help: bool,
    pub show_logs: bool,
    pub toast: ToastState,
    pub card_hitboxes: Vec<CardHitbox>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn card_at(&self, column: u16, row: u16) -> Option<&CardHitbox> {
        self.card_hitboxes
            .iter()
            .find(|hitbox| hitbox.area.contains(Position::new(column, row)))
    }
}
