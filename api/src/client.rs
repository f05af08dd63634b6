use crate::sportsdb::{LeaguesResponse, RawLeague, RawSeason, SeasonBadgesResponse};
use crate::validate::validate_response;
use crate::{League, SeasonBadge};
use log::{debug, error};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::fmt;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

pub const DEFAULT_BASE_URL: &str = "https://www.thesportsdb.com/api/v1/json/3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const LEAGUES_CONTEXT: &str = "leagues API response";
const SEASON_BADGES_CONTEXT: &str = "season badges API response";

/// Read-only client for TheSportsDB's public v1 JSON API.
#[derive(Debug, Clone)]
pub struct SportsDbApi {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl Default for SportsDbApi {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

#[derive(Debug)]
pub enum ApiError {
    /// Connection refused, DNS failure, timeout.
    Network(reqwest::Error, String),
    /// Non-success HTTP status.
    Api(reqwest::Error, String),
    /// Body was not JSON, or did not match the expected shape.
    Validation { context: &'static str },
    Other(String),
}

impl ApiError {
    /// Transport failures may succeed on a second attempt; a malformed
    /// response will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network(..) | ApiError::Api(..))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            ApiError::Validation { context } => write!(f, "Failed to validate {context}"),
            ApiError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl SportsDbApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client against a different deployment (or a mock server in tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .user_agent("leaguetui/0.1 (terminal league browser)")
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch every league known to the API. No parameters, no pagination.
    pub async fn fetch_leagues(&self) -> ApiResult<Vec<League>> {
        let url = self.endpoint("all_leagues.php", &[])?;
        let raw: LeaguesResponse = validate_response(self.get(url, LEAGUES_CONTEXT).await?, LEAGUES_CONTEXT)?;
        Ok(raw.leagues.into_iter().map(map_league).collect())
    }

    /// Fetch all seasons of a league with their badge artwork.
    /// A league without seasons yields an empty list.
    pub async fn fetch_season_badges(&self, league_id: &str) -> ApiResult<Vec<SeasonBadge>> {
        let url = self.endpoint("search_all_seasons.php", &[("badge", "1"), ("id", league_id)])?;
        let raw: SeasonBadgesResponse =
            validate_response(self.get(url, SEASON_BADGES_CONTEXT).await?, SEASON_BADGES_CONTEXT)?;
        Ok(raw
            .seasons
            .unwrap_or_default()
            .into_iter()
            .map(map_season)
            .collect())
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> ApiResult<Url> {
        let base = format!("{}/{path}", self.base_url);
        let parsed = if params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, params)
        };
        parsed.map_err(|e| ApiError::Other(format!("invalid url {base}: {e}")))
    }

    async fn get(&self, url: Url, context: &'static str) -> ApiResult<serde_json::Value> {
        let url_str = url.to_string();
        debug!("GET {url_str}");
        let response = self
            .client
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url_str.clone()))?;

        let response = response
            .error_for_status()
            .map_err(|e| ApiError::Api(e, url_str.clone()))?;

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e, url_str.clone()))?;

        serde_json::from_str(&body).map_err(|e| {
            error!("{context} from {url_str} is not JSON: {e}");
            ApiError::Validation { context }
        })
    }
}

// ---------------------------------------------------------------------------
// Mapping: TheSportsDB wire types → clean domain types
// ---------------------------------------------------------------------------

fn map_league(raw: RawLeague) -> League {
    League {
        id: raw.id_league,
        name: raw.str_league,
        alternate_name: raw.str_league_alternate,
        sport: raw.str_sport,
    }
}

fn map_season(raw: RawSeason) -> SeasonBadge {
    SeasonBadge {
        season: raw.str_season,
        badge_url: raw.str_badge,
    }
}
