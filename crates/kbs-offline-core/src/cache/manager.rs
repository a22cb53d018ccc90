use std::sync::Arc;

use tracing::debug;

use super::storage::CacheStorage;
use crate::error::Result;
use crate::events::{AgentEvent, EventSink};
use crate::models::ResponseSnapshot;

/// Partition-level operations over the injected storage.
///
/// Enforces the storage contract the rest of the agent relies on: only
/// 200 responses are persisted, and what gets persisted is a copy of the
/// caller's response, never the caller's value itself.
/// Clone is cheap - both fields are Arcs.
#[derive(Clone)]
pub struct CacheManager {
    storage: Arc<dyn CacheStorage>,
    events: Arc<dyn EventSink>,
}

impl CacheManager {
    pub fn new(storage: Arc<dyn CacheStorage>, events: Arc<dyn EventSink>) -> Self {
        Self { storage, events }
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub async fn get(&self, partition: &str, key: &str) -> Result<Option<ResponseSnapshot>> {
        self.storage.get(partition, key).await
    }

    /// Look a key up in every partition, oldest partition first.
    /// Returns the partition it was found in alongside the response.
    pub async fn match_any(&self, key: &str) -> Result<Option<(String, ResponseSnapshot)>> {
        for partition in self.storage.partitions().await? {
            if let Some(response) = self.storage.get(&partition, key).await? {
                return Ok(Some((partition, response)));
            }
        }
        Ok(None)
    }

    /// Store a copy of `response`. Returns false without touching storage
    /// when the status is anything other than 200.
    pub async fn put(&self, partition: &str, key: &str, response: &ResponseSnapshot) -> Result<bool> {
        if !response.is_ok() {
            self.events.emit(&AgentEvent::StoreSkipped {
                key: key.to_string(),
                status: response.status(),
            });
            return Ok(false);
        }

        self.storage.put(partition, key, response.clone()).await?;
        self.events.emit(&AgentEvent::Stored {
            partition: partition.to_string(),
            key: key.to_string(),
        });
        Ok(true)
    }

    /// Store a batch in one storage operation. Non-200 entries are dropped.
    pub async fn put_all(&self, partition: &str, entries: Vec<(String, ResponseSnapshot)>) -> Result<usize> {
        let cacheable: Vec<_> = entries.into_iter().filter(|(_, r)| r.is_ok()).collect();
        let count = cacheable.len();
        self.storage.put_all(partition, cacheable).await?;
        debug!(partition = partition, entries = count, "Stored batch");
        Ok(count)
    }

    pub async fn open(&self, partition: &str) -> Result<()> {
        self.storage.open(partition).await
    }

    pub async fn delete_partition(&self, name: &str) -> Result<bool> {
        let deleted = self.storage.delete(name).await?;
        if deleted {
            self.events.emit(&AgentEvent::PartitionDeleted {
                name: name.to_string(),
            });
        }
        Ok(deleted)
    }

    pub async fn list_partitions(&self) -> Result<Vec<String>> {
        self.storage.partitions().await
    }

    pub async fn contains(&self, partition: &str, key: &str) -> Result<bool> {
        Ok(self.storage.get(partition, key).await?.is_some())
    }

    pub async fn partition_len(&self, partition: &str) -> Result<usize> {
        Ok(self.storage.keys(partition).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::events::RecordingSink;

    fn manager() -> (CacheManager, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let manager = CacheManager::new(Arc::new(MemoryStorage::new()), sink.clone());
        (manager, sink)
    }

    #[tokio::test]
    async fn test_put_only_persists_200() {
        let (cache, sink) = manager();
        let missing = ResponseSnapshot::new(404, Vec::new(), "not found");
        assert!(!cache.put("dyn", "/gone", &missing).await.expect("put"));
        assert!(cache.get("dyn", "/gone").await.expect("get").is_none());

        let error = ResponseSnapshot::new(500, Vec::new(), "boom");
        assert!(!cache.put("dyn", "/err", &error).await.expect("put"));
        assert!(cache.list_partitions().await.expect("list").is_empty());

        assert!(cache.put("dyn", "/ok", &ResponseSnapshot::ok("ok")).await.expect("put"));
        assert!(cache.contains("dyn", "/ok").await.expect("contains"));
        assert_eq!(
            sink.count(|e| matches!(e, AgentEvent::StoreSkipped { .. })),
            2
        );
    }

    #[tokio::test]
    async fn test_stored_copy_is_independent_of_caller() {
        let (cache, _) = manager();
        let response = ResponseSnapshot::ok("rates");
        cache.put("dyn", "/api/rates", &response).await.expect("put");

        // The caller still owns its value and can consume it
        let delivered = response;
        let stored = cache.get("dyn", "/api/rates").await.expect("get").expect("present");
        assert_eq!(delivered, stored);
        assert_eq!(delivered.text(), "rates");
    }

    #[tokio::test]
    async fn test_match_any_searches_oldest_first() {
        let (cache, _) = manager();
        cache.put("static", "/", &ResponseSnapshot::ok("static")).await.expect("put");
        cache.put("dynamic", "/", &ResponseSnapshot::ok("dynamic")).await.expect("put");
        cache.put("dynamic", "/app.js", &ResponseSnapshot::ok("js")).await.expect("put");

        let (partition, hit) = cache.match_any("/").await.expect("match").expect("hit");
        assert_eq!(partition, "static");
        assert_eq!(hit.text(), "static");

        let (partition, _) = cache.match_any("/app.js").await.expect("match").expect("hit");
        assert_eq!(partition, "dynamic");
        assert!(cache.match_any("/nope").await.expect("match").is_none());
    }

    #[tokio::test]
    async fn test_put_all_drops_non_200_and_counts() {
        let (cache, _) = manager();
        let stored = cache
            .put_all(
                "static",
                vec![
                    ("/".to_string(), ResponseSnapshot::ok("root")),
                    ("/bad".to_string(), ResponseSnapshot::new(503, Vec::new(), "")),
                ],
            )
            .await
            .expect("put_all");
        assert_eq!(stored, 1);
        assert_eq!(cache.partition_len("static").await.expect("len"), 1);
    }

    #[tokio::test]
    async fn test_delete_partition_reports_event() {
        let (cache, sink) = manager();
        cache.open("old-v1").await.expect("open");
        assert!(cache.delete_partition("old-v1").await.expect("delete"));
        assert!(!cache.delete_partition("old-v1").await.expect("delete again"));
        assert_eq!(
            sink.count(|e| matches!(e, AgentEvent::PartitionDeleted { .. })),
            1
        );
    }
}
