/// TheSportsDB raw wire types — serde shapes for validating API responses.
/// These map to our clean domain types in client.rs.
use serde::{Deserialize, Deserializer};

// ---------------------------------------------------------------------------
// League list  (all_leagues.php)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct LeaguesResponse {
    pub leagues: Vec<RawLeague>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawLeague {
    pub id_league: String,
    pub str_league: String,
    pub str_sport: String,
    /// Sent as explicit null by the API for most leagues; sometimes omitted.
    #[serde(default)]
    pub str_league_alternate: Option<String>,
}

// ---------------------------------------------------------------------------
// Season badges  (search_all_seasons.php?badge=1)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct SeasonBadgesResponse {
    /// `null` when the league has no seasons. A missing field is malformed.
    #[serde(deserialize_with = "nullable")]
    pub seasons: Option<Vec<RawSeason>>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawSeason {
    pub str_season: String,
    #[serde(default)]
    pub str_badge: Option<String>,
}

/// Accepts `null` but, unlike a plain `Option` field, still requires the key.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}
