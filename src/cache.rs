//! Versioned key-value cache for generated content.
//!
//! Values are JSON strings under `{prefix}{key}`. Bumping the prefix orphans
//! every older entry without deleting it. Write failures are logged and
//! swallowed: a broken cache only means content gets regenerated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};

use crate::util::{normalize_name, strip_whitespace, trunc_for_log};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
  #[error("cache io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("cache serialization error: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// Raw string store underneath `CacheStore`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
  async fn load(&self, key: &str) -> Option<String>;
  async fn store(&self, key: &str, value: String) -> Result<(), CacheError>;
}

/// Process-lifetime store.
#[derive(Default)]
pub struct MemoryStore {
  entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
  async fn load(&self, key: &str) -> Option<String> {
    self.entries.read().await.get(key).cloned()
  }

  async fn store(&self, key: &str, value: String) -> Result<(), CacheError> {
    self.entries.write().await.insert(key.to_string(), value);
    Ok(())
  }
}

/// Whole map persisted as one JSON object file.
///
/// Each write rewrites the file through a temp file + rename while holding
/// the write lock, so the file on disk is always a complete snapshot.
pub struct FileStore {
  path: PathBuf,
  entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
  /// Open (or lazily create) the store at `path`. A missing file is an empty
  /// store; an unreadable one is logged and also starts empty.
  pub async fn open(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let entries = match tokio::fs::read_to_string(&path).await {
      Ok(text) => match serde_json::from_str::<HashMap<String, String>>(&text) {
        Ok(map) => {
          debug!(target: "cache", path = %path.display(), entries = map.len(), "Loaded cache file");
          map
        }
        Err(e) => {
          error!(target: "cache", path = %path.display(), error = %e, "Corrupt cache file; starting empty");
          HashMap::new()
        }
      },
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
      Err(e) => {
        error!(target: "cache", path = %path.display(), error = %e, "Failed to read cache file; starting empty");
        HashMap::new()
      }
    };
    Self { path, entries: RwLock::new(entries) }
  }

  pub fn path(&self) -> &Path { &self.path }

  async fn flush(path: &Path, entries: &HashMap<String, String>) -> Result<(), CacheError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(dir).await?;
    }
    let body = serde_json::to_vec(entries)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
  }
}

#[async_trait]
impl KeyValueStore for FileStore {
  async fn load(&self, key: &str) -> Option<String> {
    self.entries.read().await.get(key).cloned()
  }

  async fn store(&self, key: &str, value: String) -> Result<(), CacheError> {
    let mut guard = self.entries.write().await;
    let previous = guard.insert(key.to_string(), value);
    if let Err(e) = Self::flush(&self.path, &guard).await {
      // Keep memory consistent with what is on disk.
      match previous {
        Some(old) => guard.insert(key.to_string(), old),
        None => guard.remove(key),
      };
      return Err(e);
    }
    Ok(())
  }
}

/// The cache the generation client talks to.
pub struct CacheStore {
  prefix: String,
  store: Box<dyn KeyValueStore>,
}

impl CacheStore {
  pub fn new(prefix: impl Into<String>, store: Box<dyn KeyValueStore>) -> Self {
    Self { prefix: prefix.into(), store }
  }

  /// Fresh in-memory cache, handy for tests and ephemeral runs.
  pub fn in_memory(prefix: impl Into<String>) -> Self {
    Self::new(prefix, Box::new(MemoryStore::new()))
  }

  #[allow(dead_code)]
  pub fn prefix(&self) -> &str { &self.prefix }

  fn full_key(&self, key: &str) -> String {
    format!("{}{}", self.prefix, key)
  }

  /// Read and decode a value. Entries that no longer decode count as absent.
  #[instrument(level = "debug", skip(self))]
  pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let raw = self.store.load(&self.full_key(key)).await?;
    match serde_json::from_str::<T>(&raw) {
      Ok(v) => Some(v),
      Err(e) => {
        warn!(target: "cache", %key, error = %e, preview = %trunc_for_log(&raw, 80), "Undecodable cache entry ignored");
        None
      }
    }
  }

  /// Encode and write a value. Never fails from the caller's point of view.
  #[instrument(level = "debug", skip(self, value))]
  pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
    let raw = match serde_json::to_string(value) {
      Ok(s) => s,
      Err(e) => {
        error!(target: "cache", %key, error = %e, "Failed to serialize cache value");
        return;
      }
    };
    let len = raw.len();
    match self.store.store(&self.full_key(key), raw).await {
      Ok(()) => debug!(target: "cache", %key, bytes = len, "Cache write"),
      Err(e) => error!(target: "cache", %key, error = %e, "Cache write failed; continuing without cache"),
    }
  }
}

pub fn topics_key(start_level: u32, count: usize) -> String {
  format!("topics_{}_{}", start_level, count)
}

pub fn location_key(name: &str) -> String {
  format!("location_{}", normalize_name(name))
}

pub fn leaderboard_key(topic: &str) -> String {
  format!("leaderboard_{}", strip_whitespace(topic))
}

#[cfg(test)]
mod tests {
  use super::*;

  struct BrokenStore;

  #[async_trait]
  impl KeyValueStore for BrokenStore {
    async fn load(&self, _key: &str) -> Option<String> { None }
    async fn store(&self, _key: &str, _value: String) -> Result<(), CacheError> {
      Err(CacheError::Io(std::io::Error::new(std::io::ErrorKind::Other, "quota exceeded")))
    }
  }

  #[tokio::test]
  async fn set_then_get_roundtrips_values() {
    let cache = CacheStore::in_memory("v1_");
    cache.set("k", &vec![1u32, 2, 3]).await;
    assert_eq!(cache.get::<Vec<u32>>("k").await, Some(vec![1, 2, 3]));
    assert_eq!(cache.get::<Vec<u32>>("missing").await, None);
  }

  #[tokio::test]
  async fn prefix_bump_orphans_old_entries() {
    let store = std::sync::Arc::new(MemoryStore::new());
    store.store("v1_k", "\"old\"".into()).await.unwrap();

    struct Shared(std::sync::Arc<MemoryStore>);
    #[async_trait]
    impl KeyValueStore for Shared {
      async fn load(&self, key: &str) -> Option<String> { self.0.load(key).await }
      async fn store(&self, key: &str, value: String) -> Result<(), CacheError> { self.0.store(key, value).await }
    }

    let v1 = CacheStore::new("v1_", Box::new(Shared(store.clone())));
    let v2 = CacheStore::new("v2_", Box::new(Shared(store)));
    assert_eq!(v1.get::<String>("k").await.as_deref(), Some("old"));
    assert_eq!(v2.get::<String>("k").await, None);
  }

  #[tokio::test]
  async fn write_failures_are_swallowed() {
    let cache = CacheStore::new("v1_", Box::new(BrokenStore));
    cache.set("k", &"value").await;
    assert_eq!(cache.get::<String>("k").await, None);
  }

  #[tokio::test]
  async fn undecodable_entry_reads_as_absent() {
    let cache = CacheStore::in_memory("v1_");
    cache.set("k", &"not a number").await;
    assert_eq!(cache.get::<u32>("k").await, None);
  }

  #[tokio::test]
  async fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.json");
    {
      let cache = CacheStore::new("v1_", Box::new(FileStore::open(&path).await));
      cache.set("topics_1_10", &vec!["a", "b"]).await;
    }
    let reopened = CacheStore::new("v1_", Box::new(FileStore::open(&path).await));
    assert_eq!(reopened.get::<Vec<String>>("topics_1_10").await, Some(vec!["a".to_string(), "b".to_string()]));
  }

  #[tokio::test]
  async fn corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, "{ not json").unwrap();
    let store = FileStore::open(&path).await;
    assert_eq!(store.load("anything").await, None);
    store.store("k", "1".into()).await.unwrap();
    assert_eq!(store.load("k").await.as_deref(), Some("1"));
  }

  #[test]
  fn keys_normalize_names() {
    assert_eq!(topics_key(1, 10), "topics_1_10");
    assert_eq!(location_key("Kitchen"), location_key("kitchen "));
    assert_ne!(location_key("Kitchen"), location_key("Garden"));
    assert_eq!(leaderboard_key("Food and Drink"), "leaderboard_FoodandDrink");
  }
}
