//! In-crate test doubles for the network and storage capabilities.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::agent::Capabilities;
use crate::cache::{CacheStorage, MemoryStorage};
use crate::config::CRITICAL_ASSETS;
use crate::error::{self, AgentError};
use crate::events::RecordingSink;
use crate::host::HeadlessHost;
use crate::models::{Request, ResponseSnapshot};
use crate::network::{Network, NetworkError};

/// Network that answers from a fixed table. Unknown URLs get a 404.
pub struct StubNetwork {
    responses: Mutex<HashMap<String, ResponseSnapshot>>,
    failing: Mutex<HashSet<String>>,
    online: AtomicBool,
    calls: AtomicUsize,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            online: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// Serves every critical asset with body `content of <path>`.
    pub fn site() -> Self {
        let network = Self::new();
        for path in CRITICAL_ASSETS {
            network.serve(path, ResponseSnapshot::ok(format!("content of {}", path)));
        }
        network
    }

    pub fn serve(&self, url: &str, response: ResponseSnapshot) {
        self.responses
            .lock()
            .expect("stub lock")
            .insert(url.to_string(), response);
    }

    /// Make one URL unreachable.
    pub fn fail(&self, url: &str) {
        self.failing.lock().expect("stub lock").insert(url.to_string());
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.online.load(Ordering::SeqCst)
            || self.failing.lock().expect("stub lock").contains(&request.url)
        {
            return Err(NetworkError::Unreachable(format!("{} is offline", request.url)));
        }
        Ok(self
            .responses
            .lock()
            .expect("stub lock")
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| ResponseSnapshot::new(404, Vec::new(), "not found")))
    }
}

/// Memory storage whose partition listing can be switched to fail.
#[derive(Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_listing: AtomicBool,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn partitions(&self) -> error::Result<Vec<String>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(AgentError::Storage("partition listing failed".to_string()));
        }
        self.inner.partitions().await
    }

    async fn open(&self, partition: &str) -> error::Result<()> {
        self.inner.open(partition).await
    }

    async fn get(&self, partition: &str, key: &str) -> error::Result<Option<ResponseSnapshot>> {
        self.inner.get(partition, key).await
    }

    async fn put(&self, partition: &str, key: &str, response: ResponseSnapshot) -> error::Result<()> {
        self.inner.put(partition, key, response).await
    }

    async fn put_all(&self, partition: &str, entries: Vec<(String, ResponseSnapshot)>) -> error::Result<()> {
        self.inner.put_all(partition, entries).await
    }

    async fn delete(&self, partition: &str) -> error::Result<bool> {
        self.inner.delete(partition).await
    }

    async fn keys(&self, partition: &str) -> error::Result<Vec<String>> {
        self.inner.keys(partition).await
    }
}

/// Everything a test needs to build agents and inspect what they did.
pub struct Harness {
    pub network: Arc<StubNetwork>,
    pub storage: Arc<dyn CacheStorage>,
    pub host: Arc<HeadlessHost>,
    pub events: Arc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()))
    }

    pub fn with_storage(storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            network: Arc::new(StubNetwork::site()),
            storage,
            host: Arc::new(HeadlessHost::default()),
            events: Arc::new(RecordingSink::new()),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::new(self.network.clone(), self.storage.clone(), self.host.clone())
            .with_events(self.events.clone())
    }
}
