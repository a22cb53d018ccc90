//! Request interception and caching strategies.
//!
//! Choosing a strategy is synchronous: `select` looks only at the request,
//! so the host learns whether the agent will respond within the same turn
//! the request arrived. Running the strategy is asynchronous and never
//! fails; every failure path ends in a fallback value.
//!
//! | destination            | strategy                                   |
//! |------------------------|--------------------------------------------|
//! | document               | cache first, offline page on failure       |
//! | script / style / image | cache first                                |
//! | anything else          | network first, cached copy on failure      |
//! | non-GET                | passthrough, never stored                  |

use tracing::warn;

use crate::cache::CacheManager;
use crate::config::{AgentConfig, DocumentStrategy};
use crate::events::{AgentEvent, EventSink};
use crate::models::{Destination, Request, ResponseSnapshot};
use crate::network::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Cache, then network; offline page if both miss.
    CacheFirstWithOfflinePage,
    /// Cache, then network; live result returned whatever its status.
    CacheFirst,
    /// Network, then the cached copy of the same key.
    NetworkFirst,
    /// Network, then the offline page for the app shell or the cached copy
    /// for anything else.
    NetworkFirstWithOfflinePage,
}

/// Decision made when a request is intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intercept {
    /// Let the request go to the network untouched.
    Passthrough,
    Respond(Strategy),
}

/// Pick how to answer a request.
pub fn select(request: &Request, documents: DocumentStrategy) -> Intercept {
    if !request.is_get() {
        return Intercept::Passthrough;
    }

    let strategy = match request.destination {
        Destination::Document => match documents {
            DocumentStrategy::CacheFirst => Strategy::CacheFirstWithOfflinePage,
            DocumentStrategy::NetworkFirst => Strategy::NetworkFirstWithOfflinePage,
        },
        d if d.is_asset() => Strategy::CacheFirst,
        _ => Strategy::NetworkFirst,
    };
    Intercept::Respond(strategy)
}

/// Send a request straight to the network. Used for non-GET requests
/// and for requests no agent version controls.
pub async fn passthrough(network: &dyn Network, events: &dyn EventSink, request: &Request) -> FetchOutcome {
    events.emit(&AgentEvent::Passthrough {
        method: request.method.clone(),
        key: request.url.clone(),
    });
    match network.fetch(request).await {
        Ok(response) => FetchOutcome::Network(response),
        Err(e) => {
            events.emit(&AgentEvent::NetworkFailed {
                key: request.url.clone(),
                reason: e.to_string(),
            });
            FetchOutcome::NoValue
        }
    }
}

/// Where a response came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Cache(ResponseSnapshot),
    Network(ResponseSnapshot),
    OfflinePage(ResponseSnapshot),
    /// Nothing to serve: network failed and nothing usable was cached.
    NoValue,
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&ResponseSnapshot> {
        match self {
            FetchOutcome::Cache(r) | FetchOutcome::Network(r) | FetchOutcome::OfflinePage(r) => {
                Some(r)
            }
            FetchOutcome::NoValue => None,
        }
    }

    pub fn into_response(self) -> Option<ResponseSnapshot> {
        match self {
            FetchOutcome::Cache(r) | FetchOutcome::Network(r) | FetchOutcome::OfflinePage(r) => {
                Some(r)
            }
            FetchOutcome::NoValue => None,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            FetchOutcome::Cache(_) => "cache",
            FetchOutcome::Network(_) => "network",
            FetchOutcome::OfflinePage(_) => "offline-page",
            FetchOutcome::NoValue => "none",
        }
    }

    pub fn is_from_cache(&self) -> bool {
        matches!(self, FetchOutcome::Cache(_))
    }
}

/// Executes strategies for one agent version.
pub struct StrategyRunner<'a> {
    pub config: &'a AgentConfig,
    pub cache: &'a CacheManager,
    pub network: &'a dyn Network,
    pub events: &'a dyn EventSink,
}

impl StrategyRunner<'_> {
    pub async fn run(&self, strategy: Strategy, request: &Request) -> FetchOutcome {
        match strategy {
            Strategy::CacheFirstWithOfflinePage => self.cache_first(request, true).await,
            Strategy::CacheFirst => self.cache_first(request, false).await,
            Strategy::NetworkFirst => self.network_first(request, false).await,
            Strategy::NetworkFirstWithOfflinePage => self.network_first(request, true).await,
        }
    }

    /// Forward to the network without touching the cache.
    pub async fn passthrough(&self, request: &Request) -> FetchOutcome {
        passthrough(self.network, self.events, request).await
    }

    async fn cache_first(&self, request: &Request, offline_page: bool) -> FetchOutcome {
        let key = request.cache_key(self.config.origin());
        if let Some(hit) = self.lookup(&key).await {
            return FetchOutcome::Cache(hit);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                self.store(&key, &response).await;
                FetchOutcome::Network(response)
            }
            Err(e) => {
                self.network_failed(request, &e.to_string());
                if offline_page {
                    self.offline_page(request).await
                } else {
                    FetchOutcome::NoValue
                }
            }
        }
    }

    async fn network_first(&self, request: &Request, offline_page_for_shell: bool) -> FetchOutcome {
        let key = request.cache_key(self.config.origin());
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store(&key, &response).await;
                FetchOutcome::Network(response)
            }
            Err(e) => {
                self.network_failed(request, &e.to_string());
                if offline_page_for_shell && request.is_app_shell() {
                    return self.offline_page(request).await;
                }
                match self.lookup(&key).await {
                    Some(hit) => FetchOutcome::Cache(hit),
                    None => FetchOutcome::NoValue,
                }
            }
        }
    }

    /// Cache lookup across partitions. Storage errors count as a miss.
    async fn lookup(&self, key: &str) -> Option<ResponseSnapshot> {
        match self.cache.match_any(key).await {
            Ok(Some((partition, response))) => {
                self.events.emit(&AgentEvent::CacheHit {
                    key: key.to_string(),
                    partition,
                });
                Some(response)
            }
            Ok(None) => {
                self.events.emit(&AgentEvent::CacheMiss { key: key.to_string() });
                None
            }
            Err(e) => {
                warn!(key = key, error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Store into the dynamic partition. A failed store never affects the
    /// response already on its way to the caller.
    async fn store(&self, key: &str, response: &ResponseSnapshot) {
        let partition = self.config.dynamic_cache_name();
        if let Err(e) = self.cache.put(&partition, key, response).await {
            warn!(key = key, partition = %partition, error = %e, "Failed to store response");
        }
    }

    async fn offline_page(&self, request: &Request) -> FetchOutcome {
        let page = self
            .cache
            .get(&self.config.static_cache_name(), self.config.offline_page())
            .await;
        match page {
            Ok(Some(response)) => {
                self.events.emit(&AgentEvent::OfflineFallback {
                    key: request.url.clone(),
                });
                FetchOutcome::OfflinePage(response)
            }
            Ok(None) => FetchOutcome::NoValue,
            Err(e) => {
                warn!(error = %e, "Offline page lookup failed");
                FetchOutcome::NoValue
            }
        }
    }

    fn network_failed(&self, request: &Request, reason: &str) {
        self.events.emit(&AgentEvent::NetworkFailed {
            key: request.url.clone(),
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::MemoryStorage;
    use crate::events::RecordingSink;
    use crate::testing::StubNetwork;

    struct Fixture {
        config: AgentConfig,
        cache: CacheManager,
        network: Arc<StubNetwork>,
        events: Arc<RecordingSink>,
    }

    impl Fixture {
        fn new(config: AgentConfig) -> Self {
            let events = Arc::new(RecordingSink::new());
            Self {
                config,
                cache: CacheManager::new(Arc::new(MemoryStorage::new()), events.clone()),
                network: Arc::new(StubNetwork::site()),
                events,
            }
        }

        fn runner(&self) -> StrategyRunner<'_> {
            StrategyRunner {
                config: &self.config,
                cache: &self.cache,
                network: self.network.as_ref(),
                events: self.events.as_ref(),
            }
        }

        async fn fetch(&self, request: &Request) -> FetchOutcome {
            match select(request, self.config.document_strategy()) {
                Intercept::Respond(strategy) => self.runner().run(strategy, request).await,
                Intercept::Passthrough => self.runner().passthrough(request).await,
            }
        }

        async fn seed_offline_page(&self) {
            self.cache
                .put(
                    &self.config.static_cache_name(),
                    "/offline.html",
                    &ResponseSnapshot::ok("You are offline"),
                )
                .await
                .expect("seed offline page");
        }
    }

    #[test]
    fn test_select_by_destination() {
        let docs = DocumentStrategy::CacheFirst;
        assert_eq!(
            select(&Request::get("/", Destination::Document), docs),
            Intercept::Respond(Strategy::CacheFirstWithOfflinePage)
        );
        for d in [Destination::Script, Destination::Style, Destination::Image] {
            assert_eq!(
                select(&Request::get("/a", d), docs),
                Intercept::Respond(Strategy::CacheFirst)
            );
        }
        assert_eq!(
            select(&Request::get("/api/rates", Destination::Other), docs),
            Intercept::Respond(Strategy::NetworkFirst)
        );
        assert_eq!(
            select(&Request::new("POST", "/api/history", Destination::Other), docs),
            Intercept::Passthrough
        );
        assert_eq!(
            select(&Request::get("/", Destination::Document), DocumentStrategy::NetworkFirst),
            Intercept::Respond(Strategy::NetworkFirstWithOfflinePage)
        );
    }

    #[tokio::test]
    async fn test_cache_first_serves_stored_without_network() {
        let fx = Fixture::new(AgentConfig::default());
        let request = Request::get("/assets/app.js", Destination::Script);
        fx.network.serve("/assets/app.js", ResponseSnapshot::ok("console.log(1)"));

        let first = fx.fetch(&request).await;
        assert!(matches!(first, FetchOutcome::Network(_)));
        assert_eq!(fx.network.calls(), 1);

        let second = fx.fetch(&request).await;
        let third = fx.fetch(&request).await;
        assert!(second.is_from_cache());
        assert_eq!(second, third);
        assert_eq!(second.response(), first.response());
        assert_eq!(fx.network.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_returns_live_non_200_without_storing() {
        let fx = Fixture::new(AgentConfig::default());
        let request = Request::get("/missing.png", Destination::Image);

        let outcome = fx.fetch(&request).await;
        assert_eq!(outcome.response().map(|r| r.status()), Some(404));
        assert!(fx
            .cache
            .match_any("/missing.png")
            .await
            .expect("lookup")
            .is_none());
    }

    #[tokio::test]
    async fn test_document_offline_miss_serves_offline_page() {
        let fx = Fixture::new(AgentConfig::default());
        fx.seed_offline_page().await;
        fx.network.set_online(false);

        let outcome = fx.fetch(&Request::get("/history", Destination::Document)).await;
        match outcome {
            FetchOutcome::OfflinePage(page) => assert_eq!(page.text(), "You are offline"),
            other => panic!("expected offline page, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_document_offline_without_offline_page_is_no_value() {
        let fx = Fixture::new(AgentConfig::default());
        fx.network.set_online(false);
        let outcome = fx.fetch(&Request::get("/", Destination::Document)).await;
        assert_eq!(outcome, FetchOutcome::NoValue);
    }

    #[tokio::test]
    async fn test_document_miss_online_is_stored_in_dynamic() {
        let fx = Fixture::new(AgentConfig::default());
        fx.network.serve("/about", ResponseSnapshot::ok("about"));
        let outcome = fx.fetch(&Request::get("/about", Destination::Document)).await;
        assert!(matches!(outcome, FetchOutcome::Network(_)));
        assert!(fx
            .cache
            .contains(&fx.config.dynamic_cache_name(), "/about")
            .await
            .expect("contains"));
    }

    #[tokio::test]
    async fn test_network_first_prefers_fresh_and_falls_back_to_cache() {
        let fx = Fixture::new(AgentConfig::default());
        let request = Request::get("/api/rates", Destination::Other);
        fx.network.serve("/api/rates", ResponseSnapshot::ok("v1"));
        fx.fetch(&request).await;

        fx.network.serve("/api/rates", ResponseSnapshot::ok("v2"));
        let fresh = fx.fetch(&request).await;
        assert_eq!(fresh.response().map(|r| r.text()), Some("v2".to_string()));
        assert_eq!(fx.network.calls(), 2);

        fx.network.set_online(false);
        let fallback = fx.fetch(&request).await;
        assert!(fallback.is_from_cache());
        assert_eq!(fallback.response().map(|r| r.text()), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_network_first_offline_without_cache_is_no_value() {
        let fx = Fixture::new(AgentConfig::default());
        fx.network.set_online(false);
        let outcome = fx.fetch(&Request::get("/api/rates", Destination::Other)).await;
        assert_eq!(outcome, FetchOutcome::NoValue);
    }

    #[tokio::test]
    async fn test_non_get_passes_through_and_is_not_stored() {
        let fx = Fixture::new(AgentConfig::default());
        fx.network.serve("/api/history", ResponseSnapshot::ok("saved"));
        let request = Request::new("POST", "/api/history", Destination::Other);

        let outcome = fx.fetch(&request).await;
        assert!(matches!(outcome, FetchOutcome::Network(_)));
        assert!(fx.cache.list_partitions().await.expect("list").is_empty());
        assert_eq!(
            fx.events.count(|e| matches!(e, AgentEvent::Passthrough { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_legacy_network_first_documents() {
        let fx = Fixture::new(
            AgentConfig::default().with_document_strategy(DocumentStrategy::NetworkFirst),
        );
        fx.seed_offline_page().await;
        fx.network.serve("/history", ResponseSnapshot::ok("history page"));
        fx.fetch(&Request::get("/history", Destination::Document)).await;
        fx.network.set_online(false);

        // App shell falls back to the offline page
        let shell = fx.fetch(&Request::get("/", Destination::Document)).await;
        assert!(matches!(shell, FetchOutcome::OfflinePage(_)));

        // Other documents fall back to their own cached copy
        let history = fx.fetch(&Request::get("/history", Destination::Document)).await;
        assert!(history.is_from_cache());
    }

    #[tokio::test]
    async fn test_storage_unavailable_degrades_to_network() {
        let events = Arc::new(RecordingSink::new());
        let fx = Fixture {
            config: AgentConfig::default(),
            cache: CacheManager::new(Arc::new(MemoryStorage::unavailable()), events.clone()),
            network: Arc::new(StubNetwork::site()),
            events,
        };
        let outcome = fx.fetch(&Request::get("/index.html", Destination::Document)).await;
        assert!(matches!(outcome, FetchOutcome::Network(_)));
    }
}
