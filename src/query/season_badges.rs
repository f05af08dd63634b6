use super::client::QueryFn;
use super::{InFlight, LeagueSource, QueryClient, QueryKey, QueryObserver, QueryOptions, QueryState, QueryValue};
use futures_util::FutureExt;
use log::{debug, warn};
use sportsdb_api::SeasonBadge;
use std::sync::Arc;

/// Key and options for one league's badges. Both the subscription and the
/// prefetch go through here so they always hit the same cache entry.
pub fn season_badges_query_options(client: &QueryClient, league_id: &str) -> (QueryKey, QueryOptions) {
    (
        QueryKey::SeasonBadges(league_id.to_string()),
        client.config().season_badges.clone(),
    )
}

fn season_badges_fn(source: Arc<dyn LeagueSource>, league_id: &str) -> QueryFn {
    let league_id = league_id.to_string();
    Arc::new(move || {
        let fetch = source.fetch_season_badges(&league_id);
        async move { fetch.await.map(<Vec<SeasonBadge>>::into_data) }.boxed()
    })
}

/// Warm the cache for a league the user is about to open. Fresh data and an
/// empty id are no-ops; an outstanding request is joined rather than repeated.
///
/// Failures are only logged, the card that subscribes later sees them.
pub fn prefetch_season_badges(
    client: &QueryClient,
    source: &Arc<dyn LeagueSource>,
    league_id: &str,
) -> Option<InFlight> {
    if league_id.is_empty() {
        return None;
    }
    let (key, options) = season_badges_query_options(client, league_id);
    let in_flight = client.fetch_if_stale(&key, &options, season_badges_fn(source.clone(), league_id))?;
    debug!("{key}: prefetching");

    let watched = in_flight.clone();
    tokio::spawn(async move {
        if let Err(e) = watched.await {
            warn!("{key}: prefetch failed: {e}");
        }
    });
    Some(in_flight)
}

/// Lazily loaded badges for the one league a card is showing.
pub struct SeasonBadgesQuery {
    client: QueryClient,
    source: Arc<dyn LeagueSource>,
    league_id: Option<String>,
    observer: Option<QueryObserver>,
}

impl SeasonBadgesQuery {
    pub fn new(client: QueryClient, source: Arc<dyn LeagueSource>, league_id: Option<String>) -> Self {
        let mut query = Self { client, source, league_id: None, observer: None };
        query.set_league_id(league_id);
        query
    }

    /// Switch to another league, or to none. Only a missing or stale entry
    /// reaches the network.
    pub fn set_league_id(&mut self, league_id: Option<String>) -> Option<InFlight> {
        let league_id = league_id.filter(|id| !id.is_empty());
        if league_id == self.league_id && self.observer.is_some() {
            return None;
        }
        self.observer = None;
        self.league_id = league_id;

        let league_id = self.league_id.as_deref()?;
        let (key, options) = season_badges_query_options(&self.client, league_id);
        self.observer = Some(self.client.observe(&key));
        self.client
            .fetch_if_stale(&key, &options, season_badges_fn(self.source.clone(), league_id))
    }

    pub fn result(&self) -> QueryState<Vec<SeasonBadge>> {
        match &self.league_id {
            Some(id) => self.client.state(&QueryKey::SeasonBadges(id.clone())),
            None => QueryState::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.league_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::test_support::{config, seasons_body};
    use crate::query::{QueryPhase, QueryStatus};
    use mockito::{Matcher, Server};
    use sportsdb_api::client::SportsDbApi;
    use sportsdb_api::latest_badge;

    fn source(server: &Server) -> Arc<dyn LeagueSource> {
        Arc::new(SportsDbApi::with_base_url(server.url()))
    }

    fn season_matcher(id: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("badge".into(), "1".into()),
            Matcher::UrlEncoded("id".into(), id.into()),
        ])
    }

    #[tokio::test]
    async fn disabled_without_league_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search_all_seasons.php")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = QueryClient::new(config());
        let query = SeasonBadgesQuery::new(client.clone(), source(&server), None);
        let result = query.result();
        assert!(result.data.is_none());
        assert!(!result.is_loading());
        assert_eq!(result.phase(), QueryPhase::Idle);
        assert!(!query.is_enabled());

        let empty = SeasonBadgesQuery::new(client, source(&server), Some(String::new()));
        assert!(!empty.is_enabled());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn enabling_fetches_exactly_once() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search_all_seasons.php")
            .match_query(season_matcher("4328"))
            .with_status(200)
            .with_body(seasons_body("https://example.test/epl.png"))
            .expect(1)
            .create_async()
            .await;

        let client = QueryClient::new(config());
        let mut query = SeasonBadgesQuery::new(client, source(&server), None);
        let in_flight = query.set_league_id(Some("4328".into())).expect("absent entry must fetch");
        assert!(query.result().is_loading());
        assert!(query.set_league_id(Some("4328".into())).is_none());

        in_flight.await.unwrap();
        mock.assert_async().await;

        let result = query.result();
        assert_eq!(result.status, QueryStatus::Success);
        let seasons = result.data.unwrap();
        assert_eq!(latest_badge(&seasons), Some("https://example.test/epl.png"));
    }

    #[tokio::test]
    async fn switching_back_serves_cached_badges() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/search_all_seasons.php")
            .match_query(season_matcher("1"))
            .with_status(200)
            .with_body(seasons_body("https://example.test/one.png"))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/search_all_seasons.php")
            .match_query(season_matcher("2"))
            .with_status(200)
            .with_body(seasons_body("https://example.test/two.png"))
            .expect(1)
            .create_async()
            .await;

        let client = QueryClient::new(config());
        let mut query = SeasonBadgesQuery::new(client, source(&server), None);
        query.set_league_id(Some("1".into())).unwrap().await.unwrap();
        let pending = query.set_league_id(Some("2".into())).unwrap();

        let switched = query.result();
        assert!(switched.data.is_none(), "never shows another league's badges");
        assert!(switched.is_loading());
        pending.await.unwrap();

        assert!(query.set_league_id(Some("1".into())).is_none());
        let back = query.result();
        assert_eq!(latest_badge(&back.data.unwrap()), Some("https://example.test/one.png"));

        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn repeated_prefetch_makes_one_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search_all_seasons.php")
            .match_query(season_matcher("4328"))
            .with_status(200)
            .with_body(seasons_body("https://example.test/epl.png"))
            .expect(1)
            .create_async()
            .await;

        let client = QueryClient::new(config());
        let source = source(&server);
        let first = prefetch_season_badges(&client, &source, "4328").expect("cold cache");
        let second = prefetch_season_badges(&client, &source, "4328").expect("joins in-flight");
        let (a, b) = tokio::join!(first, second);
        assert!(a.is_ok() && b.is_ok());

        assert!(prefetch_season_badges(&client, &source, "4328").is_none(), "fresh");
        assert!(prefetch_season_badges(&client, &source, "").is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn prefetch_then_subscribe_does_not_refetch() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search_all_seasons.php")
            .match_query(season_matcher("4328"))
            .with_status(200)
            .with_body(seasons_body("https://example.test/epl.png"))
            .expect(1)
            .create_async()
            .await;

        let client = QueryClient::new(config());
        let source = source(&server);
        let prefetch = prefetch_season_badges(&client, &source, "4328").unwrap();

        // subscribing mid-flight joins the prefetch
        let mut query = SeasonBadgesQuery::new(client.clone(), source.clone(), None);
        let joined = query.set_league_id(Some("4328".into())).unwrap();
        prefetch.await.unwrap();
        joined.await.unwrap();

        let mut later = SeasonBadgesQuery::new(client, source, None);
        assert!(later.set_league_id(Some("4328".into())).is_none());
        assert!(later.result().data.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn null_seasons_is_an_empty_success() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/search_all_seasons.php")
            .match_query(season_matcher("9"))
            .with_status(200)
            .with_body(r#"{ "seasons": null }"#)
            .create_async()
            .await;

        let client = QueryClient::new(config());
        let mut query = SeasonBadgesQuery::new(client, source(&server), None);
        query.set_league_id(Some("9".into())).unwrap().await.unwrap();

        let result = query.result();
        assert_eq!(result.status, QueryStatus::Success);
        assert!(latest_badge(&result.data.unwrap()).is_none());
    }

    #[tokio::test]
    async fn failed_detail_surfaces_as_error_without_data() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search_all_seasons.php")
            .match_query(season_matcher("5"))
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let client = QueryClient::new(config());
        let source = source(&server);
        assert!(prefetch_season_badges(&client, &source, "5").unwrap().await.is_err());
        mock.assert_async().await;

        let query = SeasonBadgesQuery { client, source, league_id: Some("5".into()), observer: None };
        let result = query.result();
        assert!(result.is_error());
        assert!(result.data.is_none());
    }
}
