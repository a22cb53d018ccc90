//! Readiness queries for the UI.
//!
//! Everything here is read-only except `clear_app_cache` and
//! `force_update`. Storage failures never surface: a host without cache
//! support simply reports `false`, `0` or an empty list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CacheManager;
use crate::config::AgentConfig;
use crate::events::AgentEvent;
use crate::host::ANDROID_APP_REFERRER;
use crate::models::{Destination, Request};
use crate::registration::Registration;

/// Install/offline status shown by the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PwaStatus {
    pub is_installed: bool,
    pub is_installable: bool,
    pub is_offline: bool,
    pub has_service_worker: bool,
}

/// Name and entry count of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub name: String,
    pub size: usize,
}

pub struct ReadinessReporter {
    registration: Arc<Registration>,
    /// Version used when no agent is active yet.
    config: AgentConfig,
}

impl ReadinessReporter {
    pub fn new(registration: Arc<Registration>, config: AgentConfig) -> Self {
        Self {
            registration,
            config,
        }
    }

    /// Configuration of the version in control, or the fallback one.
    fn current_config(&self) -> AgentConfig {
        self.registration
            .active()
            .map(|agent| agent.config().clone())
            .unwrap_or_else(|| self.config.clone())
    }

    async fn partitions(&self) -> Vec<String> {
        match self.registration.capabilities().storage.partitions().await {
            Ok(names) => names,
            Err(e) => {
                debug!(error = %e, "Cache storage unavailable for readiness query");
                Vec::new()
            }
        }
    }

    /// At least one static and one dynamic partition exist.
    pub async fn is_app_cached(&self) -> bool {
        let names = self.partitions().await;
        names.iter().any(|n| n.contains("static")) && names.iter().any(|n| n.contains("dynamic"))
    }

    /// Percentage (0-100) of essential files present in the static partition.
    pub async fn offline_readiness(&self) -> u8 {
        let config = self.current_config();
        let essential = config.essential_files();
        if essential.is_empty() {
            return 0;
        }

        let storage = &self.registration.capabilities().storage;
        let static_name = config.static_cache_name();
        let mut present = 0usize;
        for file in essential {
            let key = Request::get(file.as_str(), Destination::Other).cache_key(config.origin());
            match storage.get(&static_name, &key).await {
                Ok(Some(_)) => present += 1,
                Ok(None) => {}
                Err(e) => {
                    debug!(error = %e, "Cache storage unavailable for readiness query");
                    return 0;
                }
            }
        }
        readiness_percent(present, essential.len())
    }

    /// An agent is in control and the app is cached.
    pub async fn is_ready_for_offline(&self) -> bool {
        let active = self
            .registration
            .active()
            .is_some_and(|agent| agent.is_active());
        active && self.is_app_cached().await
    }

    pub fn is_pwa_installed(&self) -> bool {
        let env = self.registration.capabilities().host.environment();
        env.display_mode_standalone
            || env.navigator_standalone
            || env.referrer.contains(ANDROID_APP_REFERRER)
    }

    pub fn is_pwa_installable(&self) -> bool {
        let env = self.registration.capabilities().host.environment();
        env.supports_agent && env.supports_install_prompt
    }

    pub fn pwa_status(&self) -> PwaStatus {
        let env = self.registration.capabilities().host.environment();
        PwaStatus {
            is_installed: self.is_pwa_installed(),
            is_installable: self.is_pwa_installable(),
            is_offline: !env.online,
            has_service_worker: env.supports_agent,
        }
    }

    /// Every partition with its entry count.
    pub async fn cache_info(&self) -> Vec<CacheInfo> {
        let storage = &self.registration.capabilities().storage;
        let mut info = Vec::new();
        for name in self.partitions().await {
            let size = storage.keys(&name).await.map(|keys| keys.len()).unwrap_or(0);
            info.push(CacheInfo { name, size });
        }
        info
    }

    /// Delete every partition. Returns how many were deleted.
    pub async fn clear_app_cache(&self) -> usize {
        let caps = self.registration.capabilities();
        let cache = CacheManager::new(caps.storage.clone(), caps.events.clone());
        let mut deleted = 0;
        for name in self.partitions().await {
            match cache.delete_partition(&name).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => debug!(partition = %name, error = %e, "Failed to delete partition"),
            }
        }
        caps.events.emit(&AgentEvent::CacheCleared { partitions: deleted });
        deleted
    }

    pub async fn force_update(&self) {
        self.registration.update().await;
    }
}

/// round(100 * present / total), clamped to 0..=100.
fn readiness_percent(present: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (100.0 * present as f64 / total as f64).round();
    percent.clamp(0.0, 100.0) as u8
}
