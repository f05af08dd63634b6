use crate::components::league_card::BadgeView;
use crate::query::leagues::{LeaguesQuery, LeaguesView};
use crate::query::season_badges::{SeasonBadgesQuery, prefetch_season_badges};
use crate::query::{LeagueSource, QueryClient, QueryKey};
use crate::state::app_settings::AppSettings;
use crate::state::app_state::{AppState, InputMode};
use log::debug;
use sportsdb_api::League;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub struct App {
    pub settings: AppSettings,
    pub state: AppState,
    client: QueryClient,
    source: Arc<dyn LeagueSource>,
    leagues: LeaguesQuery,
    /// One detail query per expanded card, keyed by league id.
    expanded: HashMap<String, SeasonBadgesQuery>,
}

impl App {
    pub fn new(settings: AppSettings, client: QueryClient, source: Arc<dyn LeagueSource>) -> Self {
        let leagues = LeaguesQuery::new(client.clone(), source.clone());
        Self {
            settings,
            state: AppState::new(),
            client,
            source,
            leagues,
            expanded: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Query lifecycle
    // -----------------------------------------------------------------------

    pub fn start(&mut self) {
        // The fetch runs on its own task; the view follows cache events.
        let _ = self.leagues.mount();
    }

    pub fn refetch(&mut self) {
        let _ = self.leagues.refetch();
    }

    pub fn leagues(&self) -> LeaguesView {
        self.leagues.state()
    }

    /// Called for every cache event. Returns whether a redraw is needed.
    pub fn on_query_updated(&mut self, key: &QueryKey, now: Instant) -> bool {
        if *key == QueryKey::Leagues {
            let view = self.leagues.state();
            self.state.grid.clamp(view.filtered_leagues.len());
            if self.state.toast.on_list_errors(view.query.error_updated_count, now) {
                debug!("list error toast raised");
            }
        }
        true
    }

    pub fn on_tick(&mut self, now: Instant) -> bool {
        self.state.toast.expire(now)
    }

    // -----------------------------------------------------------------------
    // Filters
    // -----------------------------------------------------------------------

    pub fn begin_search(&mut self) {
        self.state.input_mode = InputMode::Search;
    }

    pub fn end_search(&mut self) {
        self.state.input_mode = InputMode::Normal;
    }

    pub fn search_push(&mut self, c: char) {
        let mut term = self.leagues.filters().search_term.clone();
        term.push(c);
        self.set_search_term(term);
    }

    pub fn search_pop(&mut self) {
        let mut term = self.leagues.filters().search_term.clone();
        term.pop();
        self.set_search_term(term);
    }

    fn set_search_term(&mut self, term: String) {
        self.leagues.set_search_term(term);
        self.state.grid.reset();
    }

    /// Step through "all sports" followed by each available sport.
    pub fn cycle_sport(&mut self, forward: bool) {
        let view = self.leagues.state();
        let options: Vec<&str> = std::iter::once("")
            .chain(view.available_sports.iter().map(String::as_str))
            .collect();
        let current = options
            .iter()
            .position(|s| *s == view.selected_sport)
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % options.len()
        } else {
            (current + options.len() - 1) % options.len()
        };
        self.leagues.set_selected_sport(options[next]);
        self.state.grid.reset();
    }

    pub fn clear_filters(&mut self) {
        self.leagues.reset_filters();
        self.state.grid.reset();
    }

    // -----------------------------------------------------------------------
    // Grid navigation and intent
    // -----------------------------------------------------------------------

    pub fn select_left(&mut self) {
        self.state.grid.move_left();
        self.prefetch_selected();
    }

    pub fn select_right(&mut self) {
        let len = self.leagues.state().filtered_leagues.len();
        self.state.grid.move_right(len);
        self.prefetch_selected();
    }

    pub fn select_up(&mut self) {
        self.state.grid.move_up();
        self.prefetch_selected();
    }

    pub fn select_down(&mut self) {
        let len = self.leagues.state().filtered_leagues.len();
        self.state.grid.move_down(len);
        self.prefetch_selected();
    }

    pub fn selected_league(&self) -> Option<League> {
        self.leagues
            .state()
            .filtered_leagues
            .get(self.state.grid.selected)
            .cloned()
    }

    /// Keyboard focus landing on a card.
    fn prefetch_selected(&self) {
        if let Some(league) = self.selected_league() {
            self.prefetch(&league.id);
        }
    }

    fn prefetch(&self, league_id: &str) {
        let _ = prefetch_season_badges(&self.client, &self.source, league_id);
    }

    pub fn toggle_selected(&mut self) {
        if let Some(league) = self.selected_league() {
            self.toggle_card(&league.id);
        }
    }

    pub fn toggle_card(&mut self, league_id: &str) {
        if self.expanded.remove(league_id).is_some() {
            debug!("collapsed {league_id}");
            return;
        }
        let query = SeasonBadgesQuery::new(
            self.client.clone(),
            self.source.clone(),
            Some(league_id.to_string()),
        );
        self.expanded.insert(league_id.to_string(), query);
    }

    pub fn badge_view(&self, league: &League) -> BadgeView {
        match self.expanded.get(&league.id) {
            Some(query) => BadgeView::expanded(league, &query.result()),
            None => BadgeView::Collapsed,
        }
    }

    /// Pointer moved. Entering a new card counts as intent to open it.
    pub fn hover_at(&mut self, column: u16, row: u16) -> bool {
        let hovered = self.state.card_at(column, row).map(|c| c.league_id.clone());
        if hovered == self.state.hovered {
            return false;
        }
        if let Some(id) = &hovered {
            self.prefetch(id);
        }
        self.state.hovered = hovered;
        true
    }

    /// Button press: prefetch on contact, then select and toggle the card.
    pub fn press_at(&mut self, column: u16, row: u16) -> bool {
        let Some(hit) = self.state.card_at(column, row).cloned() else {
            return false;
        };
        self.prefetch(&hit.league_id);
        self.state.grid.selected = hit.index;
        self.toggle_card(&hit.league_id);
        true
    }

    // -----------------------------------------------------------------------
    // Overlays
    // -----------------------------------------------------------------------

    pub fn toggle_help(&mut self) {
        self.state.show_help = !self.state.show_help;
    }

    pub fn toggle_show_logs(&mut self) {
        self.state.show_logs = !self.state.show_logs;
    }

    pub fn toggle_full_screen(&mut self) {
        self.settings.full_screen = !self.settings.full_screen;
    }
}
