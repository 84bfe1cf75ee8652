//! Namespaced TTL cache over a durable storage backend.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::events::{CacheEvent, CacheNotifier};
use super::storage::Storage;
use super::traits::{millis_to_datetime, CacheEntry, CacheMetadata, CacheStats, Cached, EntryHeader};
use crate::clock::{Clock, SystemClock};

pub const DEFAULT_NAMESPACE: &str = "dnsdash_cache_";
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CAPACITY: usize = 50;

/// Tunables fixed for the lifetime of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
  /// Prefix isolating cache keys from other data in the same storage
  pub namespace: String,
  /// TTL applied by `set`
  pub default_ttl: Duration,
  /// Maximum number of entries kept after a write
  pub capacity: usize,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      namespace: DEFAULT_NAMESPACE.to_string(),
      default_ttl: DEFAULT_TTL,
      capacity: DEFAULT_CAPACITY,
    }
  }
}

/// TTL cache store.
///
/// None of the public operations fail: storage and decoding errors are logged
/// and turn writes into no-ops and reads into misses. Every cached value is a
/// disposable copy of server data, so losing one is never worse than a miss.
pub struct CacheStore<S: Storage> {
  storage: Arc<S>,
  clock: Arc<dyn Clock>,
  options: StoreOptions,
  notifier: Option<CacheNotifier>,
}

impl<S: Storage> CacheStore<S> {
  /// Create a store with default options and the system clock.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      clock: Arc::new(SystemClock),
      options: StoreOptions::default(),
      notifier: None,
    }
  }

  pub fn with_options(mut self, options: StoreOptions) -> Self {
    self.options = options;
    self
  }

  pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  /// Publish changes to `notifier`.
  pub fn with_notifier(mut self, notifier: CacheNotifier) -> Self {
    self.notifier = Some(notifier);
    self
  }

  /// Subscribe to changes, if the store was built with a notifier.
  pub fn subscribe(&self) -> Option<broadcast::Receiver<CacheEvent>> {
    self.notifier.as_ref().map(CacheNotifier::subscribe)
  }

  pub fn options(&self) -> &StoreOptions {
    &self.options
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Current time according to the store's clock.
  pub fn now(&self) -> DateTime<Utc> {
    millis_to_datetime(self.clock.now_millis())
  }

  /// Store `value` under `key` with the default TTL.
  pub fn set<T: Serialize>(&self, key: &str, value: &T) {
    self.set_with_ttl(key, value, self.options.default_ttl);
  }

  /// Store `value` under `key`, replacing any existing entry.
  pub fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
    if let Err(e) = self.try_set(key, value, ttl) {
      warn!(key, error = %e, "cache write skipped");
    }
  }

  fn try_set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
    let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    if ttl_millis == 0 {
      return Err(eyre!("TTL must be at least one millisecond"));
    }

    let entry = CacheEntry {
      key: key.to_string(),
      value,
      created_at: self.clock.now_millis(),
      ttl_millis,
    };
    let raw =
      serde_json::to_string(&entry).map_err(|e| eyre!("Failed to serialize entry: {}", e))?;

    let storage_key = self.storage_key(key);
    self.storage.set_item(&storage_key, &raw)?;
    self.publish(CacheEvent::Updated {
      key: key.to_string(),
    });

    match self.evict_overflow(&storage_key) {
      Ok(0) => {}
      Ok(evicted) => debug!(evicted, "evicted oldest cache entries"),
      Err(e) => warn!(error = %e, "cache eviction sweep failed"),
    }

    Ok(())
  }

  /// Remove the oldest entries until at most `capacity` remain.
  ///
  /// `written` is never a candidate, so a write is always readable right
  /// after it returns, even when it shares a timestamp with older entries.
  /// Walks every namespaced key, so the cost grows with capacity.
  fn evict_overflow(&self, written: &str) -> Result<usize> {
    let keys = self.namespaced_keys()?;
    if keys.len() <= self.options.capacity {
      return Ok(0);
    }
    let overflow = keys.len() - self.options.capacity;

    let mut by_age: Vec<(i64, String)> = keys
      .into_iter()
      .filter(|storage_key| storage_key != written)
      .map(|storage_key| {
        let created_at = self
          .storage
          .get_item(&storage_key)
          .ok()
          .flatten()
          .and_then(|raw| serde_json::from_str::<EntryHeader>(&raw).ok())
          .map(|header| header.created_at)
          .unwrap_or(0);
        (created_at, storage_key)
      })
      .collect();
    by_age.sort();
    by_age.truncate(overflow);

    for (_, storage_key) in &by_age {
      self.storage.remove_item(storage_key)?;
      if let Some(key) = storage_key.strip_prefix(&self.options.namespace) {
        self.publish(CacheEvent::Removed {
          key: key.to_string(),
        });
      }
    }

    Ok(by_age.len())
  }

  /// Get an unexpired entry. Expired entries found here are deleted.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<Cached<T>> {
    self.try_get(key).unwrap_or_else(|e| {
      warn!(key, error = %e, "cache read failed");
      None
    })
  }

  fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Cached<T>>> {
    let storage_key = self.storage_key(key);
    let Some(entry) = self.read_entry::<T>(&storage_key)? else {
      return Ok(None);
    };

    if entry.is_expired(self.clock.now_millis()) {
      debug!(key, "cache entry expired");
      self.storage.remove_item(&storage_key)?;
      self.publish(CacheEvent::Removed {
        key: key.to_string(),
      });
      return Ok(None);
    }

    Ok(Some(Cached {
      data: entry.value,
      metadata: CacheMetadata::hit(millis_to_datetime(entry.created_at)),
    }))
  }

  /// Get an entry regardless of expiry, marked as offline data.
  pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<Cached<T>> {
    let result = self
      .read_entry::<T>(&self.storage_key(key))
      .map(|entry| {
        entry.map(|entry| Cached {
          data: entry.value,
          metadata: CacheMetadata::offline(millis_to_datetime(entry.created_at)),
        })
      });

    result.unwrap_or_else(|e| {
      warn!(key, error = %e, "stale cache read failed");
      None
    })
  }

  /// Read and decode an entry. Undecodable payloads read as absent.
  fn read_entry<T: DeserializeOwned>(&self, storage_key: &str) -> Result<Option<CacheEntry<T>>> {
    let Some(raw) = self.storage.get_item(storage_key)? else {
      return Ok(None);
    };

    match serde_json::from_str::<CacheEntry<T>>(&raw) {
      Ok(entry) => Ok(Some(entry)),
      Err(e) => {
        debug!(storage_key, error = %e, "ignoring undecodable cache entry");
        Ok(None)
      }
    }
  }

  /// Delete a single entry.
  pub fn remove(&self, key: &str) {
    match self.storage.remove_item(&self.storage_key(key)) {
      Ok(()) => self.publish(CacheEvent::Removed {
        key: key.to_string(),
      }),
      Err(e) => warn!(key, error = %e, "cache remove failed"),
    }
  }

  /// Delete every entry in this store's namespace.
  pub fn clear(&self) {
    match self.try_clear() {
      Ok(removed) => {
        debug!(removed, "cache cleared");
        self.publish(CacheEvent::Cleared);
      }
      Err(e) => warn!(error = %e, "cache clear failed"),
    }
  }

  fn try_clear(&self) -> Result<usize> {
    let keys = self.namespaced_keys()?;
    for storage_key in &keys {
      self.storage.remove_item(storage_key)?;
    }
    Ok(keys.len())
  }

  /// Summarize the entries currently present, expired ones included.
  pub fn stats(&self) -> CacheStats {
    self.try_stats().unwrap_or_else(|e| {
      warn!(error = %e, "cache stats unavailable");
      CacheStats::default()
    })
  }

  fn try_stats(&self) -> Result<CacheStats> {
    let mut stats = CacheStats::default();
    let mut oldest: Option<i64> = None;
    let mut newest: Option<i64> = None;

    for storage_key in self.namespaced_keys()? {
      let Some(raw) = self.storage.get_item(&storage_key)? else {
        continue;
      };
      stats.total_entries += 1;
      stats.total_size += storage_key.len() + raw.len();

      if let Ok(header) = serde_json::from_str::<EntryHeader>(&raw) {
        oldest = Some(oldest.map_or(header.created_at, |o| o.min(header.created_at)));
        newest = Some(newest.map_or(header.created_at, |n| n.max(header.created_at)));
      }
    }

    stats.oldest_entry = oldest.map(millis_to_datetime);
    stats.newest_entry = newest.map(millis_to_datetime);
    Ok(stats)
  }

  fn storage_key(&self, key: &str) -> String {
    format!("{}{}", self.options.namespace, key)
  }

  fn namespaced_keys(&self) -> Result<Vec<String>> {
    Ok(
      self
        .storage
        .keys()?
        .into_iter()
        .filter(|k| k.starts_with(&self.options.namespace))
        .collect(),
    )
  }

  fn publish(&self, event: CacheEvent) {
    if let Some(notifier) = &self.notifier {
      notifier.publish(event);
    }
  }
}

impl<S: Storage> Clone for CacheStore<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      clock: Arc::clone(&self.clock),
      options: self.options.clone(),
      notifier: self.notifier.clone(),
    }
  }
}
