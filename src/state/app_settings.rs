use crate::query::QueryConfig;
use crate::query::persist::default_cache_path;
use log::LevelFilter;
use sportsdb_api::client::DEFAULT_BASE_URL;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub full_screen: bool,
    pub log_level: LevelFilter,
    pub base_url: String,
    /// `None` when persistence is switched off.
    pub cache_path: Option<PathBuf>,
    pub leagues_stale_time: Duration,
    pub badges_stale_time: Duration,
}

impl Default for AppSettings {
    fn default() -> Self {
        let config = QueryConfig::default();
        Self {
            full_screen: false,
            log_level: LevelFilter::Error,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_path: Some(default_cache_path()),
            leagues_stale_time: config.leagues.stale_time,
            badges_stale_time: config.season_badges.stale_time,
        }
    }
}

impl AppSettings {
    pub fn load() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = var("SPORTSDB_API_BASE_URL") {
            settings.base_url = url;
        }
        if let Some(level) = var("LEAGUETUI_LOG").and_then(|v| LevelFilter::from_str(&v).ok()) {
            settings.log_level = level;
        }
        if var("LEAGUETUI_NO_PERSIST").is_some() {
            settings.cache_path = None;
        }
        if let Some(secs) = var("LEAGUETUI_LEAGUES_STALE_SECS").and_then(|v| v.parse().ok()) {
            settings.leagues_stale_time = Duration::from_secs(secs);
        }
        if let Some(secs) = var("LEAGUETUI_BADGES_STALE_SECS").and_then(|v| v.parse().ok()) {
            settings.badges_stale_time = Duration::from_secs(secs);
        }
        settings
    }

    pub fn query_config(&self) -> QueryConfig {
        let mut config = QueryConfig::default();
        config.leagues.stale_time = self.leagues_stale_time;
        config.season_badges.stale_time = self.badges_stale_time;
        config
    }
}
