use sportsdb_api::League;
use std::collections::BTreeSet;

/// Search and sport predicates held by the list view. Stored raw; trimming
/// and case-folding happen at match time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub search_term: String,
    pub selected_sport: String,
}

impl FilterState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Leagues whose name or alternate name contains `search_term`
/// (trimmed, case-insensitive) and whose sport equals `sport`.
/// Empty predicates match everything; input order is kept.
pub fn filter_leagues(leagues: Option<&[League]>, search_term: &str, sport: &str) -> Vec<League> {
    let Some(leagues) = leagues.filter(|l| !l.is_empty()) else {
        return Vec::new();
    };

    let query = fold_case(search_term.trim());

    leagues
        .iter()
        .filter(|league| sport.is_empty() || league.sport == sport)
        .filter(|league| query.is_empty() || matches_search(league, &query))
        .cloned()
        .collect()
}

fn matches_search(league: &League, query: &str) -> bool {
    let alternate = league.alternate_name.as_deref().unwrap_or("");
    fold_case(&league.name).contains(query) || fold_case(alternate).contains(query)
}

/// Lower-cases `text` one char at a time. Searching and highlighting both
/// compare in this form, so a card that matches always shows its match.
pub fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Distinct, non-empty sports present in the list, sorted.
pub fn available_sports(leagues: &[League]) -> Vec<String> {
    leagues
        .iter()
        .map(|l| l.sport.as_str())
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_owned)
        .collect()
}
