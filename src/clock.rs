//! Time source used by the cache store.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
  fn now_millis(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_millis(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

/// Manually driven clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
  now: Arc<AtomicI64>,
}

impl ManualClock {
  pub fn new(start_millis: i64) -> Self {
    Self {
      now: Arc::new(AtomicI64::new(start_millis)),
    }
  }

  /// Move forward by `by`, saturating at `i64::MAX`.
  pub fn advance(&self, by: Duration) {
    let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
    let _ = self
      .now
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
        Some(now.saturating_add(by))
      });
  }

  pub fn set(&self, millis: i64) {
    self.now.store(millis, Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now_millis(&self) -> i64 {
    self.now.load(Ordering::SeqCst)
  }
}
