//! One version of the offline caching agent.
//!
//! An `OfflineAgent` owns a single `AgentConfig` and reacts to the events
//! the host delivers: install, activate, fetch, message and sync. It does
//! not decide on its own when to become active; the `Registration` that
//! owns it does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures::future::{join_all, try_join_all};
use tracing::{debug, warn};

use crate::cache::{CacheManager, CacheStorage};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::events::{AgentEvent, EventSink, TracingSink};
use crate::host::Host;
use crate::models::{
    ControlMessage, ControlReply, Destination, LifecycleState, Request, ResponseSnapshot,
};
use crate::network::Network;
use crate::strategy::{self, FetchOutcome, Intercept, StrategyRunner};

/// Sync tag the agent acknowledges
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

/// Host-provided capabilities shared by every agent version in a scope.
/// Clone is cheap - every field is an Arc.
#[derive(Clone)]
pub struct Capabilities {
    pub network: Arc<dyn Network>,
    pub storage: Arc<dyn CacheStorage>,
    pub host: Arc<dyn Host>,
    pub events: Arc<dyn EventSink>,
}

impl Capabilities {
    /// Events go to `tracing` unless replaced with `with_events`.
    pub fn new(network: Arc<dyn Network>, storage: Arc<dyn CacheStorage>, host: Arc<dyn Host>) -> Self {
        Self {
            network,
            storage,
            host,
            events: Arc::new(TracingSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}

pub struct OfflineAgent {
    config: Arc<AgentConfig>,
    cache: CacheManager,
    caps: Capabilities,
    state: RwLock<LifecycleState>,
    skip_waiting: AtomicBool,
}

impl OfflineAgent {
    pub fn new(config: AgentConfig, caps: Capabilities) -> Self {
        let cache = CacheManager::new(caps.storage.clone(), caps.events.clone());
        Self {
            config: Arc::new(config),
            cache,
            caps,
            state: RwLock::new(LifecycleState::Installing),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn version(&self) -> u32 {
        self.config.version()
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn state(&self) -> LifecycleState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(LifecycleState::Redundant)
    }

    pub fn is_active(&self) -> bool {
        self.state() == LifecycleState::Active
    }

    /// Whether a `SkipWaiting` message has been received.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub(crate) fn transition(&self, next: LifecycleState) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| AgentError::Storage("lifecycle lock poisoned".to_string()))?;
        if *state == next {
            return Ok(());
        }
        if !state.can_transition_to(next) {
            return Err(AgentError::InvalidTransition { from: *state, to: next });
        }
        let from = *state;
        debug!(version = self.version(), from = %from, to = %next, "Lifecycle transition");
        *state = next;
        Ok(())
    }

    pub(crate) fn retire(&self) {
        if self.transition(LifecycleState::Redundant).is_ok() {
            self.caps.events.emit(&AgentEvent::Redundant {
                version: self.version(),
            });
        }
    }

    // ===== Install =====

    /// Fetch every critical asset and store them in the static partition
    /// in one batch. Any unreachable or non-200 asset fails the install
    /// before anything is written, and the agent becomes redundant.
    /// On success the agent is `Waiting`.
    pub async fn on_install(&self) -> Result<()> {
        let assets = self.config.critical_assets();
        self.caps.events.emit(&AgentEvent::InstallStarted {
            version: self.version(),
            assets: assets.len(),
        });

        match self.populate_static(assets).await {
            Ok(()) => {
                self.transition(LifecycleState::Waiting)?;
                self.caps.events.emit(&AgentEvent::Installed {
                    version: self.version(),
                    partition: self.config.static_cache_name(),
                });
                Ok(())
            }
            Err(e) => {
                let (path, reason) = match &e {
                    AgentError::InstallAssetFailure { path, reason } => (path.clone(), reason.clone()),
                    other => (String::new(), other.to_string()),
                };
                self.caps.events.emit(&AgentEvent::InstallFailed {
                    version: self.version(),
                    path,
                    reason,
                });
                self.retire();
                Err(e)
            }
        }
    }

    async fn populate_static(&self, assets: &[String]) -> Result<()> {
        let fetches = assets.iter().map(|path| self.fetch_asset(path));
        let entries = try_join_all(fetches).await?;

        self.cache
            .put_all(&self.config.static_cache_name(), entries)
            .await?;
        // Dynamic partition exists from install on, even while empty
        self.cache.open(&self.config.dynamic_cache_name()).await?;
        Ok(())
    }

    async fn fetch_asset(&self, path: &str) -> Result<(String, ResponseSnapshot)> {
        let request = Request::get(path, Destination::Other);
        let key = request.cache_key(self.config.origin());
        let response = self
            .caps
            .network
            .fetch(&request)
            .await
            .map_err(|e| AgentError::InstallAssetFailure {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        if !response.is_ok() {
            return Err(AgentError::InstallAssetFailure {
                path: path.to_string(),
                reason: format!("status {}", response.status()),
            });
        }
        Ok((key, response))
    }

    // ===== Activate =====

    /// Take control of open pages, then delete every partition that does
    /// not belong to this version. Returns the number of partitions deleted.
    pub async fn on_activate(&self) -> Result<usize> {
        let clients = self.caps.host.claim_clients().await;

        let stale: Vec<String> = self
            .cache
            .list_partitions()
            .await?
            .into_iter()
            .filter(|name| !self.config.owns_partition(name))
            .collect();

        let results = join_all(stale.iter().map(|name| self.cache.delete_partition(name))).await;
        let mut deleted = 0;
        for (name, result) in stale.iter().zip(results) {
            match result {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!(partition = %name, error = %e, "Failed to delete old cache"),
            }
        }

        self.transition(LifecycleState::Active)?;
        self.caps.events.emit(&AgentEvent::Activated {
            version: self.version(),
            clients,
        });
        Ok(deleted)
    }

    // ===== Fetch =====

    /// Synchronous interception decision for a request.
    pub fn intercept(&self, request: &Request) -> Intercept {
        strategy::select(request, self.config.document_strategy())
    }

    /// Answer an intercepted request. Never fails; see `strategy`.
    pub async fn on_fetch(&self, request: &Request) -> FetchOutcome {
        let runner = StrategyRunner {
            config: &self.config,
            cache: &self.cache,
            network: self.caps.network.as_ref(),
            events: self.caps.events.as_ref(),
        };
        match self.intercept(request) {
            Intercept::Respond(strategy) => runner.run(strategy, request).await,
            Intercept::Passthrough => runner.passthrough(request).await,
        }
    }

    // ===== Messages =====

    /// Handle a control message addressed to this version. `SkipWaiting`
    /// only records the request; the registration performs the handoff.
    pub async fn on_message(&self, message: ControlMessage) -> Option<ControlReply> {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                None
            }
            ControlMessage::GetCacheInfo => Some(ControlReply::CacheInfo {
                cache_names: self.config.cache_names(),
            }),
        }
    }

    // ===== Sync =====

    /// Background sync hook. Returns whether the tag was handled.
    pub async fn on_sync(&self, tag: &str) -> bool {
        if tag != BACKGROUND_SYNC_TAG {
            return false;
        }
        self.caps.events.emit(&AgentEvent::SyncTriggered {
            tag: tag.to_string(),
        });
        true
    }
}
