use crate::app::App;
use crate::state::app_state::InputMode;
use crossterm::event::KeyCode::Char;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use std::sync::Arc;
use tokio::sync::Mutex;

/// What the main loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

pub async fn handle_key_bindings(key_event: KeyEvent, app: &Arc<Mutex<App>>) -> KeyOutcome {
    let mut guard = app.lock().await;

    if let (Char('c'), KeyModifiers::CONTROL) = (key_event.code, key_event.modifiers) {
        return KeyOutcome::Quit;
    }

    if guard.state.input_mode == InputMode::Search {
        match key_event.code {
            KeyCode::Enter | KeyCode::Esc => guard.end_search(),
            KeyCode::Backspace => guard.search_pop(),
            Char(c) => guard.search_push(c),
            _ => {}
        }
        return KeyOutcome::Continue;
    }

    if guard.state.show_help {
        if matches!(key_event.code, KeyCode::Esc | Char('?') | Char('q')) {
            guard.toggle_help();
        }
        return KeyOutcome::Continue;
    }

    match key_event.code {
        Char('q') => return KeyOutcome::Quit,
        Char('?') => guard.toggle_help(),
        Char('"') => guard.toggle_show_logs(),
        Char('f') => guard.toggle_full_screen(),

        // Filters
        Char('/') | Char('i') => guard.begin_search(),
        Char('s') => guard.cycle_sport(true),
        Char('S') => guard.cycle_sport(false),
        Char('c') => guard.clear_filters(),
        Char('r') => guard.refetch(),

        // Grid
        Char('h') | KeyCode::Left => guard.select_left(),
        Char('l') | KeyCode::Right => guard.select_right(),
        Char('k') | KeyCode::Up => guard.select_up(),
        Char('j') | KeyCode::Down => guard.select_down(),
        KeyCode::Enter | Char(' ') => guard.toggle_selected(),
        KeyCode::Esc => guard.state.toast.dismiss(),

        _ => {}
    }
    KeyOutcome::Continue
}

/// Returns whether the event changed anything worth redrawing.
pub async fn handle_mouse(mouse_event: MouseEvent, app: &Arc<Mutex<App>>) -> bool {
    let mut guard = app.lock().await;
    match mouse_event.kind {
        MouseEventKind::Moved => guard.hover_at(mouse_event.column, mouse_event.row),
        MouseEventKind::Down(_) => guard.press_at(mouse_event.column, mouse_event.row),
        MouseEventKind::ScrollDown => {
            guard.select_down();
            true
        }
        MouseEventKind::ScrollUp => {
            guard.select_up();
            true
        }
        _ => false,
    }
}
