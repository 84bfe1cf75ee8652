//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trait for values that can identify a cache entry.
///
/// Plain strings are used verbatim; structured keys hash themselves into a
/// stable string.
pub trait QueryKey {
  /// Key under which the entry is stored (before namespacing)
  fn cache_hash(&self) -> String;

  /// Human readable description, used in logs
  fn description(&self) -> String {
    self.cache_hash()
  }
}

impl QueryKey for str {
  fn cache_hash(&self) -> String {
    self.to_string()
  }
}

impl QueryKey for String {
  fn cache_hash(&self) -> String {
    self.clone()
  }
}

/// Where a returned value came from and how old it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
  /// Served from the stale fallback because the live source was unavailable
  pub is_offline: bool,
  /// When the value was produced
  pub last_updated: DateTime<Utc>,
  /// Served from the cache rather than a live fetch
  pub cache_hit: bool,
}

impl CacheMetadata {
  /// Metadata for a value that was just produced.
  pub fn fresh(now: DateTime<Utc>) -> Self {
    Self {
      is_offline: false,
      last_updated: now,
      cache_hit: false,
    }
  }

  /// Metadata for an unexpired cache hit.
  pub fn hit(created_at: DateTime<Utc>) -> Self {
    Self {
      is_offline: false,
      last_updated: created_at,
      cache_hit: true,
    }
  }

  /// Metadata for a value served regardless of expiry.
  pub fn offline(created_at: DateTime<Utc>) -> Self {
    Self {
      is_offline: true,
      last_updated: created_at,
      cache_hit: true,
    }
  }
}

/// A value together with its cache metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cached<T> {
  pub data: T,
  pub metadata: CacheMetadata,
}

impl<T> Cached<T> {
  pub fn is_offline(&self) -> bool {
    self.metadata.is_offline
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Cached<U> {
    Cached {
      data: f(self.data),
      metadata: self.metadata,
    }
  }
}

/// Persisted form of a cache entry.
///
/// Decoding ignores unknown fields so newer writers stay readable; anything
/// that fails to decode is treated as a miss by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
  pub key: String,
  pub value: T,
  /// Epoch milliseconds
  pub created_at: i64,
  pub ttl_millis: u64,
}

impl<T> CacheEntry<T> {
  /// Whether the entry has outlived its TTL at `now` (epoch millis).
  pub fn is_expired(&self, now: i64) -> bool {
    now.saturating_sub(self.created_at) > self.ttl_millis.min(i64::MAX as u64) as i64
  }
}

/// Header of a persisted entry, decoded without touching the payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EntryHeader {
  pub created_at: i64,
}

/// Snapshot of what the store currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
  pub total_entries: usize,
  /// Approximate bytes of keys plus serialized payloads
  pub total_size: usize,
  pub oldest_entry: Option<DateTime<Utc>>,
  pub newest_entry: Option<DateTime<Utc>>,
}

/// Convert epoch milliseconds to a timestamp, clamping values chrono rejects.
pub(crate) fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
  DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_entry_expiry_boundary() {
    let entry = CacheEntry {
      key: "k".to_string(),
      value: 1,
      created_at: 1_000,
      ttl_millis: 500,
    };

    assert!(!entry.is_expired(1_500));
    assert!(entry.is_expired(1_501));
  }

  #[test]
  fn test_entry_wire_format() {
    let entry = CacheEntry {
      key: "stats".to_string(),
      value: serde_json::json!({ "total": 5 }),
      created_at: 10,
      ttl_millis: 30_000,
    };

    let encoded = serde_json::to_value(&entry).unwrap();
    assert_eq!(
      encoded,
      serde_json::json!({
        "key": "stats",
        "value": { "total": 5 },
        "createdAt": 10,
        "ttlMillis": 30000
      })
    );
  }

  #[test]
  fn test_entry_decode_ignores_unknown_fields() {
    let raw = r#"{"key":"a","value":3,"createdAt":1,"ttlMillis":2,"version":7}"#;
    let entry: CacheEntry<i32> = serde_json::from_str(raw).unwrap();
    assert_eq!(entry.value, 3);
  }

  #[test]
  fn test_string_keys_are_verbatim() {
    assert_eq!("stats".cache_hash(), "stats");
    assert_eq!(String::from("logs").description(), "logs");
  }
}
