use crate::query::QueryKey;
use crate::state::network::LoadingState;
use crossterm::event::{KeyEvent, MouseEvent};

#[derive(Debug)]
pub enum NetworkResponse {
    LoadingStateChanged { loading_state: LoadingState },
    /// A cache entry settled or started fetching.
    QueryUpdated { key: QueryKey },
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    KeyPressed(KeyEvent),
    Mouse(MouseEvent),
    Resize,
    AppStarted,
    Tick,
}
