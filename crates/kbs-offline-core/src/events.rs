//! Observability hook for the agent.
//!
//! The agent reports what it does as structured `AgentEvent`s through an
//! `EventSink`. Hosts wire the sink to whatever they log with; the default
//! `TracingSink` forwards everything to `tracing`.

use std::sync::Mutex;

use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    InstallStarted { version: u32, assets: usize },
    Installed { version: u32, partition: String },
    InstallFailed { version: u32, path: String, reason: String },
    /// A newer version finished installing while another one is active
    UpdateAvailable { version: u32 },
    Activated { version: u32, clients: usize },
    PartitionDeleted { name: String },
    Redundant { version: u32 },
    CacheHit { key: String, partition: String },
    CacheMiss { key: String },
    Stored { partition: String, key: String },
    StoreSkipped { key: String, status: u16 },
    NetworkFailed { key: String, reason: String },
    OfflineFallback { key: String },
    Passthrough { method: String, key: String },
    SyncTriggered { tag: String },
    CacheCleared { partitions: usize },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &AgentEvent);
}

impl<F> EventSink for F
where
    F: Fn(&AgentEvent) + Send + Sync,
{
    fn emit(&self, event: &AgentEvent) {
        self(event)
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &AgentEvent) {
        match event {
            AgentEvent::InstallStarted { version, assets } => {
                info!(version = version, assets = assets, "Installing cache version")
            }
            AgentEvent::Installed { version, partition } => {
                info!(version = version, partition = %partition, "Critical assets cached")
            }
            AgentEvent::InstallFailed { version, path, reason } => {
                warn!(version = version, path = %path, reason = %reason, "Install failed")
            }
            AgentEvent::UpdateAvailable { version } => {
                info!(version = version, "New version installed and waiting")
            }
            AgentEvent::Activated { version, clients } => {
                info!(version = version, clients = clients, "Cache version activated")
            }
            AgentEvent::PartitionDeleted { name } => info!(partition = %name, "Deleted cache partition"),
            AgentEvent::Redundant { version } => debug!(version = version, "Version made redundant"),
            AgentEvent::CacheHit { key, partition } => {
                debug!(key = %key, partition = %partition, "Cache hit")
            }
            AgentEvent::CacheMiss { key } => debug!(key = %key, "Cache miss"),
            AgentEvent::Stored { partition, key } => {
                debug!(key = %key, partition = %partition, "Stored response")
            }
            AgentEvent::StoreSkipped { key, status } => {
                debug!(key = %key, status = status, "Response not cacheable")
            }
            AgentEvent::NetworkFailed { key, reason } => {
                debug!(key = %key, reason = %reason, "Network fetch failed")
            }
            AgentEvent::OfflineFallback { key } => debug!(key = %key, "Serving offline page"),
            AgentEvent::Passthrough { method, key } => {
                debug!(method = %method, key = %key, "Passing request through")
            }
            AgentEvent::SyncTriggered { tag } => info!(tag = %tag, "Background sync triggered"),
            AgentEvent::CacheCleared { partitions } => {
                info!(partitions = partitions, "App cache cleared")
            }
        }
    }
}

/// Keeps every event in memory. Useful for hosts that display an activity
/// log, and for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AgentEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, predicate: impl Fn(&AgentEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &AgentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_sink() {
        let seen = AtomicUsize::new(0);
        let sink = |_: &AgentEvent| {
            seen.fetch_add(1, Ordering::SeqCst);
        };
        sink.emit(&AgentEvent::CacheMiss { key: "/".to_string() });
        sink.emit(&AgentEvent::SyncTriggered { tag: "background-sync".to_string() });
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.emit(&AgentEvent::PartitionDeleted { name: "kbs-calculator-static-v2".to_string() });
        sink.emit(&AgentEvent::CacheMiss { key: "/".to_string() });
        assert_eq!(sink.events().len(), 2);
        assert_eq!(
            sink.count(|e| matches!(e, AgentEvent::PartitionDeleted { .. })),
            1
        );
    }
}
