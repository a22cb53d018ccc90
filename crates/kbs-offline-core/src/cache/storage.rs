//! Versioned key -> response store capability.
//!
//! `CacheStorage` is what the host provides: a set of named partitions,
//! each an ordered map from request key to `ResponseSnapshot`. Per-key
//! reads and writes are atomic; `put_all` writes a whole batch or nothing.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::models::ResponseSnapshot;

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Partition names, in creation order.
    async fn partitions(&self) -> Result<Vec<String>>;

    /// Create the partition if it does not exist.
    async fn open(&self, partition: &str) -> Result<()>;

    async fn get(&self, partition: &str, key: &str) -> Result<Option<ResponseSnapshot>>;

    /// Insert or replace one entry, creating the partition on first use.
    async fn put(&self, partition: &str, key: &str, response: ResponseSnapshot) -> Result<()>;

    /// Insert or replace a batch of entries as one operation.
    async fn put_all(&self, partition: &str, entries: Vec<(String, ResponseSnapshot)>) -> Result<()>;

    /// Delete a partition and everything in it. Returns false if it did not exist.
    async fn delete(&self, partition: &str) -> Result<bool>;

    /// Keys stored in a partition, in insertion order. Empty if absent.
    async fn keys(&self, partition: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Default)]
struct Partition {
    name: String,
    entries: Vec<(String, ResponseSnapshot)>,
}

impl Partition {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&ResponseSnapshot> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Replace in place so insertion order reflects first store.
    fn insert(&mut self, key: String, response: ResponseSnapshot) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = response,
            None => self.entries.push((key, response)),
        }
    }
}

/// In-process storage. Holds everything in memory behind one lock.
#[derive(Debug)]
pub struct MemoryStorage {
    available: bool,
    partitions: RwLock<Vec<Partition>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            available: true,
            partitions: RwLock::new(Vec::new()),
        }
    }

    /// A store on a host without cache support; every call fails with
    /// `StorageUnavailable`.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            partitions: RwLock::new(Vec::new()),
        }
    }

    fn check(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(AgentError::StorageUnavailable)
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Vec<Partition>) -> T) -> Result<T> {
        self.check()?;
        let guard = self
            .partitions
            .read()
            .map_err(|_| AgentError::Storage("cache lock poisoned".to_string()))?;
        Ok(f(&guard))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Vec<Partition>) -> T) -> Result<T> {
        self.check()?;
        let mut guard = self
            .partitions
            .write()
            .map_err(|_| AgentError::Storage("cache lock poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

fn open_in<'a>(partitions: &'a mut Vec<Partition>, name: &str) -> &'a mut Partition {
    let index = match partitions.iter().position(|p| p.name == name) {
        Some(index) => index,
        None => {
            partitions.push(Partition::new(name));
            partitions.len() - 1
        }
    };
    &mut partitions[index]
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn partitions(&self) -> Result<Vec<String>> {
        self.read(|parts| parts.iter().map(|p| p.name.clone()).collect())
    }

    async fn open(&self, partition: &str) -> Result<()> {
        self.write(|parts| {
            open_in(parts, partition);
        })
    }

    async fn get(&self, partition: &str, key: &str) -> Result<Option<ResponseSnapshot>> {
        self.read(|parts| {
            parts
                .iter()
                .find(|p| p.name == partition)
                .and_then(|p| p.get(key))
                .cloned()
        })
    }

    async fn put(&self, partition: &str, key: &str, response: ResponseSnapshot) -> Result<()> {
        self.write(|parts| open_in(parts, partition).insert(key.to_string(), response))
    }

    async fn put_all(&self, partition: &str, entries: Vec<(String, ResponseSnapshot)>) -> Result<()> {
        self.write(|parts| {
            let target = open_in(parts, partition);
            for (key, response) in entries {
                target.insert(key, response);
            }
        })
    }

    async fn delete(&self, partition: &str) -> Result<bool> {
        self.write(|parts| {
            let before = parts.len();
            parts.retain(|p| p.name != partition);
            parts.len() != before
        })
    }

    async fn keys(&self, partition: &str) -> Result<Vec<String>> {
        self.read(|parts| {
            parts
                .iter()
                .find(|p| p.name == partition)
                .map(|p| p.entries.iter().map(|(k, _)| k.clone()).collect())
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_partition_in_order() {
        let store = MemoryStorage::new();
        store.put("b", "/x", ResponseSnapshot::ok("x")).await.expect("put");
        store.open("a").await.expect("open");
        store.open("b").await.expect("reopen is a no-op");
        assert_eq!(store.partitions().await.expect("list"), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_put_replaces_wholesale() {
        let store = MemoryStorage::new();
        store.put("p", "/a", ResponseSnapshot::ok("one")).await.expect("put");
        store.put("p", "/b", ResponseSnapshot::ok("two")).await.expect("put");
        store.put("p", "/a", ResponseSnapshot::ok("three")).await.expect("put");

        let got = store.get("p", "/a").await.expect("get").expect("present");
        assert_eq!(got.text(), "three");
        assert_eq!(store.keys("p").await.expect("keys"), vec!["/a", "/b"]);
    }

    #[tokio::test]
    async fn test_delete_partition() {
        let store = MemoryStorage::new();
        store.put("p", "/a", ResponseSnapshot::ok("a")).await.expect("put");
        assert!(store.delete("p").await.expect("delete"));
        assert!(!store.delete("p").await.expect("delete again"));
        assert!(store.get("p", "/a").await.expect("get").is_none());
        assert!(store.keys("p").await.expect("keys").is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_storage_errors() {
        let store = MemoryStorage::unavailable();
        assert!(matches!(
            store.partitions().await,
            Err(AgentError::StorageUnavailable)
        ));
        assert!(matches!(
            store.put("p", "/", ResponseSnapshot::ok("")).await,
            Err(AgentError::StorageUnavailable)
        ));
    }
}
