//! On-disk `CacheStorage`.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<hex(partition)>/partition.json       partition name and creation time
//! <root>/<hex(partition)>/<sha256(key)>.json  one stored response per key
//! ```
//!
//! Entry file names have a fixed length whatever the key; the key itself
//! lives inside the entry.
//!
//! Every file is written to a temporary path and renamed into place, so a
//! reader never sees a half-written entry. A batch into a new partition is
//! assembled in a staging directory and renamed in one step.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::storage::CacheStorage;
use crate::error::Result;
use crate::models::ResponseSnapshot;

/// Partition metadata file name
const PARTITION_FILE: &str = "partition.json";

/// Prefix for directories that are still being assembled
const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PartitionMeta {
    name: String,
    created_at: DateTime<Utc>,
}

/// A stored response together with when it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: String,
    pub response: ResponseSnapshot,
    pub cached_at: DateTime<Utc>,
}

impl CachedEntry {
    pub fn new(key: String, response: ResponseSnapshot) -> Self {
        Self {
            key,
            response,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }
}

pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, partition: &str) -> PathBuf {
        self.root.join(hex::encode(partition))
    }

    fn entry_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{}.json", hex::encode(Sha256::digest(key.as_bytes()))))
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read(path)?;
        Ok(Some(serde_json::from_slice(&contents)?))
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(value)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn write_staged(tmp: &Path, entry: &CachedEntry) -> Result<()> {
        std::fs::write(tmp, serde_json::to_vec(entry)?)?;
        Ok(())
    }

    fn create_partition(&self, dir: &Path, partition: &str) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let meta = PartitionMeta {
            name: partition.to_string(),
            created_at: Utc::now(),
        };
        Self::write_json(&dir.join(PARTITION_FILE), &meta)
    }

    fn ensure_partition(&self, partition: &str) -> Result<PathBuf> {
        let dir = self.partition_dir(partition);
        if !dir.join(PARTITION_FILE).exists() {
            self.create_partition(&dir, partition)?;
            debug!(partition = partition, "Created cache partition");
        }
        Ok(dir)
    }

    fn load_entries(dir: &Path) -> Result<Vec<CachedEntry>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for item in std::fs::read_dir(dir)? {
            let path = item?.path();
            let is_entry = path.extension().is_some_and(|ext| ext == "json")
                && path.file_name().is_some_and(|name| name != PARTITION_FILE);
            if !is_entry {
                continue;
            }
            match Self::read_json::<CachedEntry>(&path) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry"),
            }
        }
        entries.sort_by(|a, b| a.cached_at.cmp(&b.cached_at).then_with(|| a.key.cmp(&b.key)));
        Ok(entries)
    }

    /// Stored entry with its timestamp.
    pub fn entry(&self, partition: &str, key: &str) -> Result<Option<CachedEntry>> {
        Self::read_json(&Self::entry_path(&self.partition_dir(partition), key))
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn partitions(&self) -> Result<Vec<String>> {
        let mut metas = Vec::new();
        for item in std::fs::read_dir(&self.root)? {
            let path = item?.path();
            let staging = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(STAGING_PREFIX));
            if !path.is_dir() || staging {
                continue;
            }
            if let Some(meta) = Self::read_json::<PartitionMeta>(&path.join(PARTITION_FILE))? {
                metas.push(meta);
            }
        }
        metas.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(metas.into_iter().map(|m| m.name).collect())
    }

    async fn open(&self, partition: &str) -> Result<()> {
        self.ensure_partition(partition).map(|_| ())
    }

    async fn get(&self, partition: &str, key: &str) -> Result<Option<ResponseSnapshot>> {
        Ok(self.entry(partition, key)?.map(|entry| entry.response))
    }

    async fn put(&self, partition: &str, key: &str, response: ResponseSnapshot) -> Result<()> {
        let dir = self.ensure_partition(partition)?;
        let entry = CachedEntry::new(key.to_string(), response);
        Self::write_json(&Self::entry_path(&dir, key), &entry)
    }

    async fn put_all(&self, partition: &str, entries: Vec<(String, ResponseSnapshot)>) -> Result<()> {
        let dir = self.partition_dir(partition);

        if !dir.join(PARTITION_FILE).exists() {
            let staging = self
                .root
                .join(format!("{}{}", STAGING_PREFIX, hex::encode(partition)));
            if staging.exists() {
                std::fs::remove_dir_all(&staging)?;
            }
            self.create_partition(&staging, partition)?;
            for (key, response) in entries {
                let path = Self::entry_path(&staging, &key);
                Self::write_json(&path, &CachedEntry::new(key, response))?;
            }
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
            std::fs::rename(&staging, &dir)?;
            return Ok(());
        }

        // Existing partition: stage every file before renaming any of them
        let mut staged = Vec::with_capacity(entries.len());
        for (key, response) in entries {
            let path = Self::entry_path(&dir, &key);
            let tmp = path.with_extension("json.tmp");
            if let Err(e) = Self::write_staged(&tmp, &CachedEntry::new(key, response)) {
                for (tmp, _) in &staged {
                    let _ = std::fs::remove_file(tmp);
                }
                return Err(e);
            }
            staged.push((tmp, path));
        }
        for (tmp, path) in staged {
            std::fs::rename(tmp, path)?;
        }
        Ok(())
    }

    async fn delete(&self, partition: &str) -> Result<bool> {
        let dir = self.partition_dir(partition);
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir)?;
        Ok(true)
    }

    async fn keys(&self, partition: &str) -> Result<Vec<String>> {
        Ok(Self::load_entries(&self.partition_dir(partition))?
            .into_iter()
            .map(|entry| entry.key)
            .collect())
    }
}
