use super::{QueryClient, QueryData, QueryKey};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

const CACHE_DIR: &str = "leaguetui";
const CACHE_FILE: &str = "query-cache.json";
const MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
const WRITE_THROTTLE: Duration = Duration::from_secs(1);

/// One successful cache entry as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedQuery {
    pub key: QueryKey,
    pub data: QueryData,
    pub data_updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedClient {
    timestamp: DateTime<Utc>,
    buster: String,
    queries: Vec<PersistedQuery>,
}

/// Mirrors the query cache to a JSON file so fetched data survives restarts.
#[derive(Debug, Clone)]
pub struct CachePersister {
    path: PathBuf,
    buster: String,
    max_age: Duration,
}

impl CachePersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            buster: env!("CARGO_PKG_VERSION").to_string(),
            max_age: MAX_AGE,
        }
    }

    pub fn with_buster(mut self, buster: impl Into<String>) -> Self {
        self.buster = buster.into();
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seed `client` from the snapshot on disk. A snapshot written by another
    /// version or older than the max age is deleted instead.
    pub fn restore(&self, client: &QueryClient) -> Result<usize> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e).with_context(|| format!("read {}", self.path.display())),
        };
        let snapshot: PersistedClient = serde_json::from_str(&content)
            .with_context(|| format!("parse {}", self.path.display()))?;

        if snapshot.buster != self.buster {
            info!("discarding cache written by {} (now {})", snapshot.buster, self.buster);
            self.discard();
            return Ok(0);
        }
        let age = (Utc::now() - snapshot.timestamp).to_std().unwrap_or(Duration::ZERO);
        if age > self.max_age {
            info!("discarding cache snapshot from {}", snapshot.timestamp);
            self.discard();
            return Ok(0);
        }

        let restored = client.hydrate(snapshot.queries);
        debug!("restored {restored} queries from {}", self.path.display());
        Ok(restored)
    }

    pub fn persist(&self, client: &QueryClient) -> Result<()> {
        let snapshot = PersistedClient {
            timestamp: Utc::now(),
            buster: self.buster.clone(),
            queries: client.dehydrate(),
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        let payload = serde_json::to_string(&snapshot).context("serialize cache")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, payload).with_context(|| format!("write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename to {}", self.path.display()))?;
        debug!("persisted {} queries", snapshot.queries.len());
        Ok(())
    }

    fn discard(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("could not remove {}: {e}", self.path.display());
        }
    }

    /// Write the cache after it changes, at most once per second.
    pub async fn run(self, client: QueryClient) {
        let mut events = client.subscribe();
        loop {
            match events.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
            tokio::time::sleep(WRITE_THROTTLE).await;
            // coalesce whatever arrived during the window
            while matches!(events.try_recv(), Ok(_) | Err(TryRecvError::Lagged(_))) {}

            if let Err(e) = self.persist(&client) {
                warn!("cache persist failed: {e:#}");
            }
        }
    }
}

/// `$XDG_CACHE_HOME/leaguetui/query-cache.json`, then `~/.cache/...`, then the
/// working directory.
pub fn default_cache_path() -> PathBuf {
    if let Ok(cache_dir) = std::env::var("XDG_CACHE_HOME")
        && !cache_dir.trim().is_empty()
    {
        return PathBuf::from(cache_dir).join(CACHE_DIR).join(CACHE_FILE);
    }
    if let Ok(home) = std::env::var("HOME")
        && !home.trim().is_empty()
    {
        return PathBuf::from(home).join(".cache").join(CACHE_DIR).join(CACHE_FILE);
    }
    PathBuf::from(CACHE_FILE)
}
