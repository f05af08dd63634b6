use tui::layout::{Constraint, Layout, Rect, Size};

pub const HEADER_HEIGHT: u16 = 3;
pub const FILTER_BAR_HEIGHT: u16 = 4;
pub const LOG_PANE_HEIGHT: u16 = 10;

/// Pre-computed layout areas for the main draw loop.
pub struct LayoutAreas {
    pub header: Rect,
    pub filters: Rect,
    pub main: Rect,
    pub logs: Rect,
}

impl LayoutAreas {
    pub fn new(size: Size) -> Self {
        let rect = Rect::new(0, 0, size.width, size.height);
        Self::from_rect(rect, false, false)
    }

    pub fn update(&mut self, area: Rect, full_screen: bool, show_logs: bool) {
        *self = Self::from_rect(area, full_screen, show_logs);
    }

    fn from_rect(area: Rect, full_screen: bool, show_logs: bool) -> Self {
        let logs_height = if show_logs { LOG_PANE_HEIGHT } else { 0 };

        if full_screen {
            let [main, logs] =
                Layout::vertical([Constraint::Fill(1), Constraint::Length(logs_height)]).areas(area);
            return LayoutAreas { header: Rect::ZERO, filters: Rect::ZERO, main, logs };
        }

        let [header, filters, main, logs] = Layout::vertical([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Length(FILTER_BAR_HEIGHT),
            Constraint::Fill(1),
            Constraint::Length(logs_height),
        ])
        .areas(area);

        LayoutAreas { header, filters, main, logs }
    }
}

/// Card columns for a grid of `width`: one on narrow terminals, up to three.
pub fn grid_columns(width: u16, min_card_width: u16) -> u16 {
    (width / min_card_width.max(1)).clamp(1, 3)
}
