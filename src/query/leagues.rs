use super::client::QueryFn;
use super::filter::{FilterState, available_sports, filter_leagues};
use super::{
    InFlight, LeagueSource, QueryClient, QueryKey, QueryObserver, QueryPhase, QueryState, QueryValue,
    RefetchOnMount,
};
use futures_util::FutureExt;
use log::debug;
use sportsdb_api::League;
use sportsdb_api::client::ApiError;
use std::sync::Arc;

/// Owns the remote league list and the local search/sport filters.
///
/// Everything in [`LeaguesView`] is derived on each call to [`state`]; nothing
/// filtered is stored.
///
/// [`state`]: LeaguesQuery::state
pub struct LeaguesQuery {
    client: QueryClient,
    source: Arc<dyn LeagueSource>,
    filters: FilterState,
    observer: Option<QueryObserver>,
}

/// Everything the list view renders, derived from the cache plus filters.
#[derive(Debug, Clone)]
pub struct LeaguesView {
    pub query: QueryState<Vec<League>>,
    pub leagues: Arc<Vec<League>>,
    pub filtered_leagues: Vec<League>,
    pub available_sports: Vec<String>,
    pub search_term: String,
    pub selected_sport: String,
}

impl LeaguesView {
    pub fn is_loading(&self) -> bool {
        self.query.is_loading()
    }

    pub fn is_fetching(&self) -> bool {
        self.query.is_fetching()
    }

    pub fn error(&self) -> Option<&ApiError> {
        self.query.error.as_deref()
    }

    pub fn phase(&self) -> QueryPhase {
        self.query.phase()
    }

    pub fn has_filters(&self) -> bool {
        !self.search_term.is_empty() || !self.selected_sport.is_empty()
    }
}

impl LeaguesQuery {
    pub fn new(client: QueryClient, source: Arc<dyn LeagueSource>) -> Self {
        Self::with_filters(client, source, FilterState::default())
    }

    pub fn with_filters(client: QueryClient, source: Arc<dyn LeagueSource>, filters: FilterState) -> Self {
        Self { client, source, filters, observer: None }
    }

    /// Subscribe to the list and fetch it. The list is refetched on every
    /// mount even when the cache is fresh, so the roster is always current.
    pub fn mount(&mut self) -> Option<InFlight> {
        if self.observer.is_none() {
            self.observer = Some(self.client.observe(&QueryKey::Leagues));
        }
        let options = &self.client.config().leagues;
        match options.refetch_on_mount {
            RefetchOnMount::Always => Some(self.refetch()),
            RefetchOnMount::IfStale => {
                self.client
                    .fetch_if_stale(&QueryKey::Leagues, options, self.query_fn())
            }
        }
    }

    /// Release the subscription. Cached data stays until its GC window ends.
    pub fn unmount(&mut self) {
        self.observer = None;
    }

    pub fn is_mounted(&self) -> bool {
        self.observer.is_some()
    }

    pub fn refetch(&self) -> InFlight {
        debug!("refetching league list");
        self.client
            .fetch(&QueryKey::Leagues, &self.client.config().leagues, self.query_fn())
    }

    fn query_fn(&self) -> QueryFn {
        let source = self.source.clone();
        Arc::new(move || {
            let fetch = source.fetch_leagues();
            async move { fetch.await.map(<Vec<League>>::into_data) }.boxed()
        })
    }

    pub fn state(&self) -> LeaguesView {
        let query = self.client.state::<Vec<League>>(&QueryKey::Leagues);
        let leagues = query.data.clone().unwrap_or_default();
        LeaguesView {
            filtered_leagues: filter_leagues(
                Some(leagues.as_slice()),
                &self.filters.search_term,
                &self.filters.selected_sport,
            ),
            available_sports: available_sports(&leagues),
            search_term: self.filters.search_term.clone(),
            selected_sport: self.filters.selected_sport.clone(),
            leagues,
            query,
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.filters.search_term = term.into();
    }

    pub fn set_selected_sport(&mut self, sport: impl Into<String>) {
        self.filters.selected_sport = sport.into();
    }

    pub fn reset_filters(&mut self) {
        self.filters.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::test_support::{LEAGUES_BODY, config};
    use crate::query::{QueryConfig, QueryPhase};
    use mockito::Server;
    use sportsdb_api::client::SportsDbApi;

    fn query_for(server: &Server, config: QueryConfig) -> LeaguesQuery {
        let client = QueryClient::new(config);
        LeaguesQuery::new(client, Arc::new(SportsDbApi::with_base_url(server.url())))
    }

    #[tokio::test]
    async fn mount_fetches_and_derives_outputs() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/all_leagues.php")
            .with_status(200)
            .with_body(LEAGUES_BODY)
            .expect(1)
            .create_async()
            .await;

        let mut leagues = query_for(&server, config());
        assert_eq!(leagues.state().phase(), QueryPhase::Idle);

        let in_flight = leagues.mount().expect("mount always fetches");
        let loading = leagues.state();
        assert!(loading.is_loading());
        assert!(loading.filtered_leagues.is_empty());
        assert!(loading.available_sports.is_empty());

        in_flight.await.unwrap();
        mock.assert_async().await;

        let view = leagues.state();
        assert_eq!(view.phase(), QueryPhase::Success);
        assert_eq!(view.filtered_leagues.len(), 3);
        assert_eq!(view.available_sports, ["Basketball", "Soccer"]);
        assert_eq!(view.search_term, "");
        assert_eq!(view.selected_sport, "");
    }

    #[tokio::test]
    async fn remount_refetches_even_when_fresh() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/all_leagues.php")
            .with_status(200)
            .with_body(LEAGUES_BODY)
            .expect(2)
            .create_async()
            .await;

        let mut leagues = query_for(&server, config());
        leagues.mount().unwrap().await.unwrap();
        leagues.unmount();
        assert!(!leagues.is_mounted());

        let refetch = leagues.mount().unwrap();
        assert_eq!(leagues.state().phase(), QueryPhase::Refetching);
        assert_eq!(leagues.state().filtered_leagues.len(), 3, "stale data stays visible");
        refetch.await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn filters_apply_to_cached_list_and_reset_together() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/all_leagues.php")
            .with_status(200)
            .with_body(LEAGUES_BODY)
            .create_async()
            .await;

        let mut leagues = query_for(&server, config());
        leagues.mount().unwrap().await.unwrap();

        leagues.set_search_term("Premier");
        let view = leagues.state();
        assert_eq!(view.filtered_leagues.len(), 1);
        assert_eq!(view.filtered_leagues[0].name, "Premier League");

        leagues.set_search_term("liga");
        leagues.set_selected_sport("Soccer");
        assert_eq!(leagues.state().filtered_leagues[0].id, "3");

        leagues.reset_filters();
        let view = leagues.state();
        assert_eq!(view.search_term, "");
        assert_eq!(view.selected_sport, "");
        assert_eq!(view.filtered_leagues.len(), 3);
        assert!(!view.has_filters());
    }

    #[tokio::test]
    async fn initial_filters_are_applied() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/all_leagues.php")
            .with_status(200)
            .with_body(LEAGUES_BODY)
            .create_async()
            .await;

        let client = QueryClient::new(config());
        let filters = FilterState { search_term: String::new(), selected_sport: "Basketball".into() };
        let mut leagues =
            LeaguesQuery::with_filters(client, Arc::new(SportsDbApi::with_base_url(server.url())), filters);
        leagues.mount().unwrap().await.unwrap();

        assert_eq!(leagues.state().filtered_leagues.len(), 1);
        assert_eq!(leagues.filters().selected_sport, "Basketball");
    }

    #[tokio::test]
    async fn transport_errors_are_retried_once_then_surface() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/all_leagues.php")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let mut leagues = query_for(&server, config());
        assert!(leagues.mount().unwrap().await.is_err());
        mock.assert_async().await;

        let view = leagues.state();
        assert_eq!(view.phase(), QueryPhase::Error);
        assert!(view.error().is_some());
        assert!(view.filtered_leagues.is_empty());
        assert!(view.available_sports.is_empty());
        assert_eq!(view.query.error_updated_count, 1);
    }

    #[tokio::test]
    async fn refetch_after_failed_first_load_shows_loading() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/all_leagues.php")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let mut leagues = query_for(&server, config());
        assert!(leagues.mount().unwrap().await.is_err());
        failing.assert_async().await;
        failing.remove_async().await;

        server
            .mock("GET", "/all_leagues.php")
            .with_status(200)
            .with_body(LEAGUES_BODY)
            .create_async()
            .await;

        let retry = leagues.refetch();
        let view = leagues.state();
        assert_eq!(view.phase(), QueryPhase::Loading);
        assert!(view.is_loading());
        assert!(view.is_fetching());

        retry.await.unwrap();
        let view = leagues.state();
        assert_eq!(view.phase(), QueryPhase::Success);
        assert!(view.error().is_none());
        assert_eq!(view.filtered_leagues.len(), 3);
    }

    #[tokio::test]
    async fn validation_errors_surface_without_retry() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/all_leagues.php")
            .with_status(200)
            .with_body(r#"{ "leagues": "nope" }"#)
            .expect(1)
            .create_async()
            .await;

        let mut leagues = query_for(&server, config());
        let err = leagues.mount().unwrap().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to validate leagues API response");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_refetch_keeps_stale_list_for_derivations() {
        let mut server = Server::new_async().await;
        let ok = server
            .mock("GET", "/all_leagues.php")
            .with_status(200)
            .with_body(LEAGUES_BODY)
            .expect(1)
            .create_async()
            .await;

        let mut leagues = query_for(&server, config());
        leagues.mount().unwrap().await.unwrap();
        ok.assert_async().await;
        ok.remove_async().await;

        server
            .mock("GET", "/all_leagues.php")
            .with_status(502)
            .create_async()
            .await;

        leagues.set_selected_sport("Soccer");
        assert!(leagues.refetch().await.is_err());

        let view = leagues.state();
        assert!(view.error().is_some());
        assert_eq!(view.phase(), QueryPhase::Error);
        assert!(view.query.is_error());
        assert!(!view.is_loading());
        assert_eq!(view.query.error_updated_count, 1, "one notification per failure");
        assert_eq!(view.filtered_leagues.len(), 2);
        assert_eq!(view.available_sports, ["Basketball", "Soccer"]);
    }
}
