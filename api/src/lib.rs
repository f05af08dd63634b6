pub mod client;
pub mod sportsdb;
pub mod validate;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Domain types — clean model, independent of TheSportsDB wire format
// ---------------------------------------------------------------------------

/// A league as listed by `all_leagues.php`. Immutable once fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    pub id: String,
    pub name: String,                   // "English Premier League"
    pub alternate_name: Option<String>, // "Premier League, EPL"
    pub sport: String,                  // "Soccer"
}

impl League {
    /// Short monogram shown when a league has no badge artwork.
    ///
    /// Takes the first two uppercase letters of the name ("English Premier League" → "EP"),
    /// falling back to the first two characters uppercased, then to "NL".
    pub fn initials(&self) -> String {
        let capitals: String = self.name.chars().filter(char::is_ascii_uppercase).take(2).collect();
        if !capitals.is_empty() {
            return capitals;
        }
        let leading: String = self.name.chars().take(2).collect::<String>().to_uppercase();
        if leading.is_empty() { "NL".to_owned() } else { leading }
    }
}

/// One season of a league with its (optional) badge artwork.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonBadge {
    pub season: String,            // "2023-2024"
    pub badge_url: Option<String>, // None is common and not an error
}

/// Badge of the most recent season, as ordered by the source.
/// Empty URLs count as "no badge".
pub fn latest_badge(seasons: &[SeasonBadge]) -> Option<&str> {
    seasons
        .last()
        .and_then(|s| s.badge_url.as_deref())
        .filter(|url| !url.is_empty())
}
