use super::{
    FetchStatus, QueryConfig, QueryData, QueryKey, QueryOptions, QueryState, QueryStatus, QueryValue,
};
use crate::query::persist::PersistedQuery;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use log::{debug, warn};
use sportsdb_api::client::{ApiError, ApiResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

pub type QueryResult = Result<QueryData, Arc<ApiError>>;

/// Handle on a running fetch. Every caller for the same key gets a clone of
/// the same handle; awaiting it never starts a second request.
pub type InFlight = Shared<BoxFuture<'static, QueryResult>>;

/// Produces one attempt of a fetch. Called again for each retry.
pub type QueryFn = Arc<dyn Fn() -> BoxFuture<'static, ApiResult<QueryData>> + Send + Sync>;

const EVENT_CAPACITY: usize = 64;

#[derive(Default)]
struct CacheEntry {
    data: Option<QueryData>,
    data_updated_at: Option<DateTime<Utc>>,
    error: Option<Arc<ApiError>>,
    error_updated_count: u32,
    in_flight: Option<InFlight>,
    observers: usize,
    /// Set while nobody observes the entry; start of its GC window.
    inactive_since: Option<DateTime<Utc>>,
    gc_time: Option<Duration>,
}

impl CacheEntry {
    fn is_stale(&self, stale_time: Duration, now: DateTime<Utc>) -> bool {
        match (&self.data, self.data_updated_at) {
            (Some(_), Some(updated_at)) => elapsed(updated_at, now) >= stale_time,
            _ => true,
        }
    }

    fn is_collectable(&self, now: DateTime<Utc>) -> bool {
        if self.observers > 0 || self.in_flight.is_some() {
            return false;
        }
        match (self.gc_time, self.inactive_since) {
            (Some(gc_time), Some(since)) => elapsed(since, now) >= gc_time,
            _ => false,
        }
    }

    fn snapshot<T: QueryValue>(&self) -> QueryState<T> {
        let data = self.data.as_ref().and_then(T::from_data);
        // The last settle decides; a failed refetch keeps the old data.
        let status = if self.error.is_some() {
            QueryStatus::Error
        } else if data.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Pending
        };
        QueryState {
            data,
            data_updated_at: self.data_updated_at,
            error: self.error.clone(),
            error_updated_count: self.error_updated_count,
            status,
            fetch_status: if self.in_flight.is_some() {
                FetchStatus::Fetching
            } else {
                FetchStatus::Idle
            },
        }
    }
}

/// Clock skew can put `since` in the future; treat that as no time passed.
fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

struct Inner {
    entries: HashMap<QueryKey, CacheEntry>,
}

/// Process-wide keyed request cache, passed explicitly to every consumer.
///
/// Guarantees at most one in-flight request per key, retries transport
/// failures only, and keeps the last good data when a refetch fails.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Mutex<Inner>>,
    config: Arc<QueryConfig>,
    events: broadcast::Sender<QueryKey>,
}

impl QueryClient {
    pub fn new(config: QueryConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner { entries: HashMap::new() })),
            config: Arc::new(config),
            events,
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Receive the key of every entry that changed.
    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, key: &QueryKey) {
        // No receivers is fine: nobody is rendering.
        let _ = self.events.send(key.clone());
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn state<T: QueryValue>(&self, key: &QueryKey) -> QueryState<T> {
        self.lock()
            .entries
            .get(key)
            .map(CacheEntry::snapshot)
            .unwrap_or_default()
    }

    pub fn is_stale(&self, key: &QueryKey, stale_time: Duration) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_none_or(|entry| entry.is_stale(stale_time, Utc::now()))
    }

    /// Whether any request is outstanding. Drives the spinner.
    pub fn is_fetching(&self) -> bool {
        self.lock().entries.values().any(|e| e.in_flight.is_some())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    // -----------------------------------------------------------------------
    // Fetching
    // -----------------------------------------------------------------------

    /// Start a fetch for `key`, or join the one already running.
    ///
    /// The request runs on its own task, so dropping the returned handle does
    /// not cancel it; the result still lands in the cache.
    pub fn fetch(&self, key: &QueryKey, options: &QueryOptions, query_fn: QueryFn) -> InFlight {
        let mut inner = self.lock();
        let entry = inner.entries.entry(key.clone()).or_insert_with(|| CacheEntry {
            inactive_since: Some(Utc::now()),
            ..Default::default()
        });
        entry.gc_time = options.gc_time;

        if let Some(in_flight) = &entry.in_flight {
            debug!("{key}: joining in-flight request");
            return in_flight.clone();
        }

        debug!("{key}: fetching");
        let client = self.clone();
        let task_key = key.clone();
        let task_options = options.clone();
        let task = tokio::spawn(async move {
            let result = run_with_retry(&task_key, &task_options, &query_fn).await.map_err(Arc::new);
            client.settle(&task_key, &result);
            result
        });

        let in_flight = async move {
            task.await
                .unwrap_or_else(|e| Err(Arc::new(ApiError::Other(format!("query task failed: {e}")))))
        }
        .boxed()
        .shared();

        entry.in_flight = Some(in_flight.clone());
        drop(inner);

        self.notify(key);
        in_flight
    }

    /// Fetch only when the cached data is missing or older than `stale_time`.
    /// An outstanding request is joined either way.
    pub fn fetch_if_stale(
        &self,
        key: &QueryKey,
        options: &QueryOptions,
        query_fn: QueryFn,
    ) -> Option<InFlight> {
        {
            let inner = self.lock();
            if let Some(entry) = inner.entries.get(key) {
                if let Some(in_flight) = &entry.in_flight {
                    return Some(in_flight.clone());
                }
                if !entry.is_stale(options.stale_time, Utc::now()) {
                    debug!("{key}: fresh, serving from cache");
                    return None;
                }
            }
        }
        Some(self.fetch(key, options, query_fn))
    }

    fn settle(&self, key: &QueryKey, result: &QueryResult) {
        {
            let mut inner = self.lock();
            let entry = inner.entries.entry(key.clone()).or_default();
            entry.in_flight = None;
            match result {
                Ok(data) => {
                    debug!("{key}: fetched");
                    entry.data = Some(data.clone());
                    entry.data_updated_at = Some(Utc::now());
                    entry.error = None;
                }
                Err(e) => {
                    warn!("{key}: fetch failed: {e}");
                    entry.error = Some(e.clone());
                    entry.error_updated_count = entry.error_updated_count.wrapping_add(1);
                }
            }
        }
        self.notify(key);
    }

    // -----------------------------------------------------------------------
    // Observers & garbage collection
    // -----------------------------------------------------------------------

    /// Register interest in `key`. The entry is exempt from collection until
    /// every observer is dropped.
    pub fn observe(&self, key: &QueryKey) -> QueryObserver {
        let mut inner = self.lock();
        let entry = inner.entries.entry(key.clone()).or_default();
        entry.observers += 1;
        entry.inactive_since = None;
        QueryObserver { client: self.clone(), key: key.clone() }
    }

    fn unobserve(&self, key: &QueryKey) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
            if entry.observers == 0 {
                entry.inactive_since = Some(Utc::now());
            }
        }
    }

    /// Drop unobserved entries whose GC window has passed. Returns how many
    /// were removed.
    pub fn collect_garbage(&self) -> usize {
        self.collect_garbage_at(Utc::now())
    }

    fn collect_garbage_at(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, entry| {
            let keep = !entry.is_collectable(now);
            if !keep {
                debug!("{key}: collected");
            }
            keep
        });
        before - inner.entries.len()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Successful data only; errors and in-flight state are session-local.
    pub fn dehydrate(&self) -> Vec<PersistedQuery> {
        self.lock()
            .entries
            .iter()
            .filter_map(|(key, entry)| {
                Some(PersistedQuery {
                    key: key.clone(),
                    data: entry.data.clone()?,
                    data_updated_at: entry.data_updated_at?,
                })
            })
            .collect()
    }

    /// Seed the cache from a snapshot. Never overwrites newer data.
    pub fn hydrate(&self, queries: Vec<PersistedQuery>) -> usize {
        let now = Utc::now();
        let mut restored = 0;
        {
            let mut inner = self.lock();
            for query in queries {
                let gc_time = match query.key {
                    QueryKey::Leagues => self.config.leagues.gc_time,
                    QueryKey::SeasonBadges(_) => self.config.season_badges.gc_time,
                };
                let entry = inner.entries.entry(query.key).or_insert_with(|| CacheEntry {
                    inactive_since: Some(now),
                    gc_time,
                    ..Default::default()
                });
                if entry.data_updated_at.is_some_and(|at| at >= query.data_updated_at) {
                    continue;
                }
                entry.data = Some(query.data);
                entry.data_updated_at = Some(query.data_updated_at);
                restored += 1;
            }
        }
        restored
    }

    #[cfg(test)]
    pub(crate) fn set_updated_at(&self, key: &QueryKey, at: DateTime<Utc>) {
        if let Some(entry) = self.lock().entries.get_mut(key) {
            entry.data_updated_at = Some(at);
        }
    }
}

async fn run_with_retry(key: &QueryKey, options: &QueryOptions, query_fn: &QueryFn) -> ApiResult<QueryData> {
    let mut attempt = 0;
    loop {
        match query_fn().await {
            Ok(data) => return Ok(data),
            Err(e) if e.is_retryable() && attempt < options.retry => {
                let delay = options.delay_for_attempt(attempt);
                warn!("{key}: attempt {} failed ({e}), retrying in {delay:?}", attempt + 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// RAII registration of a consumer on one cache key.
pub struct QueryObserver {
    client: QueryClient,
    key: QueryKey,
}

impl Drop for QueryObserver {
    fn drop(&mut self) {
        self.client.unobserve(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::test_support::config;
    use sportsdb_api::League;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_fn(calls: Arc<AtomicUsize>, outcome: fn(usize) -> ApiResult<QueryData>) -> QueryFn {
        Arc::new(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { outcome(n) }.boxed()
        })
    }

    fn ok_leagues(_: usize) -> ApiResult<QueryData> {
        Ok(QueryData::Leagues(Arc::new(vec![League {
            id: "1".into(),
            name: "NBA".into(),
            alternate_name: None,
            sport: "Basketball".into(),
        }])))
    }

    fn invalid(_: usize) -> ApiResult<QueryData> {
        Err(ApiError::Validation { context: "leagues API response" })
    }

    #[tokio::test]
    async fn concurrent_fetches_share_one_request() {
        let client = QueryClient::new(config());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = client.config().leagues.clone();
        let query_fn = counting_fn(calls.clone(), ok_leagues);

        let first = client.fetch(&QueryKey::Leagues, &options, query_fn.clone());
        let second = client.fetch(&QueryKey::Leagues, &options, query_fn);
        let (a, b) = tokio::join!(first, second);

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!client.is_fetching());
    }

    #[tokio::test]
    async fn fresh_data_is_not_refetched() {
        let client = QueryClient::new(config());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = client.config().leagues.clone();
        let query_fn = counting_fn(calls.clone(), ok_leagues);

        let in_flight = client.fetch_if_stale(&QueryKey::Leagues, &options, query_fn.clone());
        in_flight.expect("empty cache must fetch").await.unwrap();
        assert!(client.fetch_if_stale(&QueryKey::Leagues, &options, query_fn).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_data_is_refetched() {
        let client = QueryClient::new(config());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = client.config().leagues.clone();
        let query_fn = counting_fn(calls.clone(), ok_leagues);

        client.fetch(&QueryKey::Leagues, &options, query_fn.clone()).await.unwrap();
        client.set_updated_at(&QueryKey::Leagues, Utc::now() - chrono::Duration::minutes(6));
        assert!(client.is_stale(&QueryKey::Leagues, options.stale_time));

        client
            .fetch_if_stale(&QueryKey::Leagues, &options, query_fn)
            .expect("stale entry must refetch")
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn validation_failures_are_not_retried() {
        let client = QueryClient::new(config());
        let calls = Arc::new(AtomicUsize::new(0));
        let options = client.config().leagues.clone();

        let result = client
            .fetch(&QueryKey::Leagues, &options, counting_fn(calls.clone(), invalid))
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let state = client.state::<Vec<League>>(&QueryKey::Leagues);
        assert_eq!(state.status, QueryStatus::Error);
        assert_eq!(state.error_updated_count, 1);
    }

    #[tokio::test]
    async fn failed_refetch_keeps_previous_data() {
        let client = QueryClient::new(config());
        let options = client.config().leagues.clone();
        let calls = Arc::new(AtomicUsize::new(0));

        client
            .fetch(&QueryKey::Leagues, &options, counting_fn(calls.clone(), ok_leagues))
            .await
            .unwrap();
        let _ = client
            .fetch(&QueryKey::Leagues, &options, counting_fn(calls, invalid))
            .await;

        let state = client.state::<Vec<League>>(&QueryKey::Leagues);
        assert_eq!(state.data.as_ref().map(|d| d.len()), Some(1));
        assert!(state.error.is_some());
        assert_eq!(state.status, QueryStatus::Error);
        assert!(state.is_error());
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn dropped_handle_still_populates_cache() {
        let client = QueryClient::new(config());
        let options = client.config().leagues.clone();
        let mut events = client.subscribe();

        drop(client.fetch(
            &QueryKey::Leagues,
            &options,
            counting_fn(Arc::new(AtomicUsize::new(0)), ok_leagues),
        ));

        // started, then settled
        events.recv().await.unwrap();
        events.recv().await.unwrap();
        assert!(client.state::<Vec<League>>(&QueryKey::Leagues).data.is_some());
    }

    #[tokio::test]
    async fn observed_entries_survive_gc() {
        let client = QueryClient::new(config());
        let options = client.config().leagues.clone();
        let query_fn = counting_fn(Arc::new(AtomicUsize::new(0)), ok_leagues);

        let observer = client.observe(&QueryKey::Leagues);
        client.fetch(&QueryKey::Leagues, &options, query_fn).await.unwrap();

        let far_future = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(client.collect_garbage_at(far_future), 0);

        drop(observer);
        assert_eq!(client.collect_garbage_at(Utc::now()), 0, "gc window not yet elapsed");
        assert_eq!(client.collect_garbage_at(far_future), 1);
        assert!(!client.contains(&QueryKey::Leagues));
    }

    #[tokio::test]
    async fn entries_without_gc_time_are_kept_forever() {
        let client = QueryClient::new(config());
        let key = QueryKey::SeasonBadges("4328".into());
        let options = client.config().season_badges.clone();
        let query_fn: QueryFn = Arc::new(|| async { Ok(QueryData::SeasonBadges(Arc::new(Vec::new()))) }.boxed());

        client.fetch(&key, &options, query_fn).await.unwrap();
        let next_year = Utc::now() + chrono::Duration::days(365);
        assert_eq!(client.collect_garbage_at(next_year), 0);
        assert!(client.contains(&key));
    }

    #[tokio::test]
    async fn hydrate_does_not_overwrite_newer_data() {
        let client = QueryClient::new(config());
        let options = client.config().leagues.clone();
        client
            .fetch(&QueryKey::Leagues, &options, counting_fn(Arc::new(AtomicUsize::new(0)), ok_leagues))
            .await
            .unwrap();

        let restored = client.hydrate(vec![PersistedQuery {
            key: QueryKey::Leagues,
            data: QueryData::Leagues(Arc::new(Vec::new())),
            data_updated_at: Utc::now() - chrono::Duration::hours(1),
        }]);

        assert_eq!(restored, 0);
        assert_eq!(client.state::<Vec<League>>(&QueryKey::Leagues).data.map(|d| d.len()), Some(1));
        assert_eq!(client.dehydrate().len(), 1);
    }
}
