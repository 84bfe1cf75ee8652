//! Change notifications for cache entries.
//!
//! The store only publishes; how events travel between processes (if at all)
//! is up to whoever holds the sender.

use tokio::sync::broadcast;

/// A change made to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  /// An entry was written
  Updated { key: String },
  /// An entry was deleted, explicitly or by expiry/eviction
  Removed { key: String },
  /// Every entry in the namespace was deleted
  Cleared,
}

/// Publisher side of the change channel.
#[derive(Debug, Clone)]
pub struct CacheNotifier {
  tx: broadcast::Sender<CacheEvent>,
}

impl CacheNotifier {
  pub fn new(capacity: usize) -> Self {
    let (tx, _rx) = broadcast::channel(capacity.max(1));
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
    self.tx.subscribe()
  }

  /// Publish an event. Having no subscribers is not an error.
  pub fn publish(&self, event: CacheEvent) {
    let _ = self.tx.send(event);
  }
}

impl Default for CacheNotifier {
  fn default() -> Self {
    Self::new(64)
  }
}
