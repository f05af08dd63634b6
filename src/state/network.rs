use crate::query::{QueryClient, QueryKey};
use crate::state::messages::NetworkResponse;
use log::{debug, error, warn};
use sportsdb_api::{League, SeasonBadge};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

const SPINNER_CHARS: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
pub const ERROR_CHAR: char = '!';

#[derive(Debug, Copy, Clone)]
pub struct LoadingState {
    pub is_loading: bool,
    pub spinner_char: char,
}

impl Default for LoadingState {
    fn default() -> Self {
        Self { is_loading: false, spinner_char: ' ' }
    }
}

/// Turns query cache events into UI messages and drives the spinner while
/// any request is outstanding. Requests themselves run on the cache's tasks.
pub struct NetworkWorker {
    client: QueryClient,
    responses: mpsc::Sender<NetworkResponse>,
    is_loading: Arc<AtomicBool>,
}

impl NetworkWorker {
    pub fn new(client: QueryClient, responses: mpsc::Sender<NetworkResponse>) -> Self {
        Self {
            client,
            responses,
            is_loading: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn run(self) {
        let mut events = self.client.subscribe();
        loop {
            let key = match events.recv().await {
                Ok(key) => key,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("query events lagged, {skipped} skipped");
                    QueryKey::Leagues
                }
                Err(RecvError::Closed) => break,
            };

            let fetching = self.client.is_fetching();
            let was_loading = self.is_loading.load(Ordering::Relaxed);
            if fetching && !was_loading {
                self.start_loading_animation().await;
            } else if !fetching && was_loading {
                debug!("network idle");
                self.stop_loading_animation(self.settled_ok(&key)).await;
            }

            if let Err(e) = self.responses.send(NetworkResponse::QueryUpdated { key }).await {
                error!("Failed to send network response: {e}");
                break;
            }
        }
    }

    fn settled_ok(&self, key: &QueryKey) -> bool {
        match key {
            QueryKey::Leagues => self.client.state::<Vec<League>>(key).error.is_none(),
            QueryKey::SeasonBadges(_) => self.client.state::<Vec<SeasonBadge>>(key).error.is_none(),
        }
    }

    async fn start_loading_animation(&self) {
        self.is_loading.store(true, Ordering::Relaxed);

        let mut loading_state =
            LoadingState { is_loading: true, spinner_char: SPINNER_CHARS[0] };
        let _ = self
            .responses
            .send(NetworkResponse::LoadingStateChanged { loading_state })
            .await;

        let responses = self.responses.clone();
        let is_loading = self.is_loading.clone();

        tokio::spawn(async move {
            let mut spinner_index = 1;
            let mut interval = tokio::time::interval(Duration::from_millis(33));
            loop {
                interval.tick().await;
                if !is_loading.load(Ordering::Relaxed) {
                    break;
                }
                loading_state.spinner_char = SPINNER_CHARS[spinner_index];
                spinner_index = (spinner_index + 1) % SPINNER_CHARS.len();
                let _ = responses
                    .send(NetworkResponse::LoadingStateChanged { loading_state })
                    .await;
            }
        });
    }

    async fn stop_loading_animation(&self, is_ok: bool) {
        self.is_loading.store(false, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(15)).await;

        let spinner_char = if is_ok { ' ' } else { ERROR_CHAR };
        let _ = self
            .responses
            .send(NetworkResponse::LoadingStateChanged {
                loading_state: LoadingState { is_loading: false, spinner_char },
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::client::QueryFn;
    use crate::query::test_support::config;
    use crate::query::{QueryData, QueryKey};
    use sportsdb_api::client::{ApiError, ApiResult};
    use futures_util::FutureExt;
    use tokio::sync::Notify;

    async fn next_update(rx: &mut mpsc::Receiver<NetworkResponse>) -> (QueryKey, Vec<LoadingState>) {
        let mut loading = Vec::new();
        loop {
            match rx.recv().await.expect("worker alive") {
                NetworkResponse::LoadingStateChanged { loading_state } => loading.push(loading_state),
                NetworkResponse::QueryUpdated { key } => return (key, loading),
            }
        }
    }

    /// A fetch that stays in flight until the gate opens.
    fn gated(gate: Arc<Notify>, outcome: fn() -> ApiResult<QueryData>) -> QueryFn {
        Arc::new(move || {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                outcome()
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn forwards_updates_and_flags_failures() {
        let client = QueryClient::new(config());
        let (tx, mut rx) = mpsc::channel(100);
        let worker = tokio::spawn(NetworkWorker::new(client.clone(), tx).run());
        tokio::task::yield_now().await;
        let options = client.config().leagues.clone();

        let gate = Arc::new(Notify::new());
        let failing = gated(gate.clone(), || Err(ApiError::Validation { context: "leagues API response" }));
        let in_flight = client.fetch(&QueryKey::Leagues, &options, failing);

        let (key, started) = next_update(&mut rx).await;
        assert_eq!(key, QueryKey::Leagues);
        assert!(started.first().is_some_and(|s| s.is_loading));

        gate.notify_one();
        assert!(in_flight.await.is_err());
        let (key, stopped) = next_update(&mut rx).await;
        assert_eq!(key, QueryKey::Leagues);
        assert_eq!(stopped.last().map(|s| s.spinner_char), Some(ERROR_CHAR));

        let ok = gated(gate.clone(), || Ok(QueryData::Leagues(Arc::new(Vec::new()))));
        let in_flight = client.fetch(&QueryKey::Leagues, &options, ok);
        next_update(&mut rx).await;
        gate.notify_one();
        assert!(in_flight.await.is_ok());
        let (_, stopped) = next_update(&mut rx).await;
        assert_eq!(stopped.last().map(|s| s.spinner_char), Some(' '));
        assert!(stopped.last().is_some_and(|s| !s.is_loading));

        worker.abort();
    }
}
