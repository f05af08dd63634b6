//! Client-side data layer: a keyed request cache plus the list/detail
//! queries the view reads from.
//!
//! Key schema:
//!   `["leagues"]`                    → `Vec<League>`      (stale 5m, gc 30m, refetched on every mount)
//!   `["season-badges", league_id]`   → `Vec<SeasonBadge>` (stale 24h, never collected)

pub mod client;
pub mod filter;
pub mod leagues;
pub mod persist;
pub mod season_badges;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sportsdb_api::client::{ApiError, ApiResult, SportsDbApi};
use sportsdb_api::{League, SeasonBadge};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use client::{InFlight, QueryClient, QueryObserver};

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

// ---------------------------------------------------------------------------
// Keys, options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKey {
    Leagues,
    SeasonBadges(String),
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Leagues => write!(f, r#"["leagues"]"#),
            QueryKey::SeasonBadges(id) => write!(f, r#"["season-badges","{id}"]"#),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefetchOnMount {
    /// Only when the cached data is missing or stale.
    IfStale,
    /// Every mount, regardless of freshness.
    Always,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// How long fetched data is served without triggering a refetch.
    pub stale_time: Duration,
    /// How long an unobserved entry survives. `None` keeps it for the whole session.
    pub gc_time: Option<Duration>,
    /// Extra attempts after a transport failure.
    pub retry: u32,
    /// Base delay, doubled per attempt and capped at 30s.
    pub retry_delay: Duration,
    pub refetch_on_mount: RefetchOnMount,
}

impl QueryOptions {
    const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_delay
            .checked_mul(factor)
            .unwrap_or(Self::MAX_RETRY_DELAY)
            .min(Self::MAX_RETRY_DELAY)
    }
}

/// Per-resource options. Shared by every consumer of a key so a prefetch and
/// a later subscription always agree on freshness.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    pub leagues: QueryOptions,
    pub season_badges: QueryOptions,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            leagues: QueryOptions {
                stale_time: 5 * MINUTE,
                gc_time: Some(30 * MINUTE),
                retry: 1,
                retry_delay: Duration::from_secs(1),
                refetch_on_mount: RefetchOnMount::Always,
            },
            season_badges: QueryOptions {
                stale_time: DAY,
                gc_time: None,
                retry: 1,
                retry_delay: Duration::from_secs(1),
                refetch_on_mount: RefetchOnMount::IfStale,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Cached values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum QueryData {
    Leagues(Arc<Vec<League>>),
    SeasonBadges(Arc<Vec<SeasonBadge>>),
}

/// Typed access to the variant of `QueryData` a key holds.
pub trait QueryValue: Sized + Send + Sync + 'static {
    fn from_data(data: &QueryData) -> Option<Arc<Self>>;
    fn into_data(value: Self) -> QueryData;
}

impl QueryValue for Vec<League> {
    fn from_data(data: &QueryData) -> Option<Arc<Self>> {
        match data {
            QueryData::Leagues(leagues) => Some(leagues.clone()),
            _ => None,
        }
    }

    fn into_data(value: Self) -> QueryData {
        QueryData::Leagues(Arc::new(value))
    }
}

impl QueryValue for Vec<SeasonBadge> {
    fn from_data(data: &QueryData) -> Option<Arc<Self>> {
        match data {
            QueryData::SeasonBadges(seasons) => Some(seasons.clone()),
            _ => None,
        }
    }

    fn into_data(value: Self) -> QueryData {
        QueryData::SeasonBadges(Arc::new(value))
    }
}

// ---------------------------------------------------------------------------
// Snapshots exposed to the view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryStatus {
    /// No data and no error yet.
    #[default]
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchStatus {
    #[default]
    Idle,
    Fetching,
}

/// Lifecycle of one resource as the list view sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    Idle,
    Loading,
    Success,
    Error,
    Refetching,
}

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub data_updated_at: Option<DateTime<Utc>>,
    pub error: Option<Arc<ApiError>>,
    /// Incremented once per failed fetch; lets the view react to each
    /// failure exactly once.
    pub error_updated_count: u32,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            data_updated_at: None,
            error: None,
            error_updated_count: 0,
            status: QueryStatus::Pending,
            fetch_status: FetchStatus::Idle,
        }
    }
}

impl<T> QueryState<T> {
    /// State of a query with no key: nothing loaded, nothing loading.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Nothing to show yet and a request is running. Also true for a retry
    /// after a failed first load.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn phase(&self) -> QueryPhase {
        match (self.status, self.fetch_status) {
            (QueryStatus::Pending, FetchStatus::Idle) => QueryPhase::Idle,
            (QueryStatus::Pending, FetchStatus::Fetching) => QueryPhase::Loading,
            (_, FetchStatus::Fetching) if self.data.is_some() => QueryPhase::Refetching,
            (QueryStatus::Error, FetchStatus::Fetching) => QueryPhase::Loading,
            (QueryStatus::Success, FetchStatus::Idle) => QueryPhase::Success,
            (QueryStatus::Error, FetchStatus::Idle) => QueryPhase::Error,
            (QueryStatus::Success, FetchStatus::Fetching) => QueryPhase::Refetching,
        }
    }
}

// ---------------------------------------------------------------------------
// Data source seam
// ---------------------------------------------------------------------------

/// The two reads the queries depend on. Implemented by the HTTP client;
/// tests substitute their own.
pub trait LeagueSource: Send + Sync {
    fn fetch_leagues(&self) -> BoxFuture<'static, ApiResult<Vec<League>>>;
    fn fetch_season_badges(&self, league_id: &str) -> BoxFuture<'static, ApiResult<Vec<SeasonBadge>>>;
}

impl LeagueSource for SportsDbApi {
    fn fetch_leagues(&self) -> BoxFuture<'static, ApiResult<Vec<League>>> {
        let api = self.clone();
        Box::pin(async move { api.fetch_leagues().await })
    }

    fn fetch_season_badges(&self, league_id: &str) -> BoxFuture<'static, ApiResult<Vec<SeasonBadge>>> {
        let api = self.clone();
        let league_id = league_id.to_owned();
        Box::pin(async move { api.fetch_season_badges(&league_id).await })
    }
}
