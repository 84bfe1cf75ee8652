//! Async query abstraction for polled data fetching.
//!
//! A `Query<T>` owns a fetcher closure, runs it on the tokio runtime and
//! collects the result through a channel, so a tick-driven loop can poll it
//! without blocking.
//!
//! # Example
//!
//! ```ignore
//! let client = client.clone();
//! let mut query = Query::new(move || {
//!     let client = client.clone();
//!     async move { client.health().await.map_err(|e| e.to_string()) }
//! })
//! .with_stale_time(Duration::from_secs(30));
//!
//! // In event loop tick
//! query.poll();
//! if query.is_stale() {
//!     query.fetch();
//! }
//! let status = status::aggregate(&[query.snapshot()]);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::status::QuerySnapshot;

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query for data fetching with state management.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure)
/// - The last successful data, kept while later fetches fail
/// - The latest error and the number of consecutive failures
/// - Async result handling via channels
/// - A stale time after which the data should be refetched
pub struct Query<T> {
  data: Option<T>,
  error: Option<String>,
  failure_count: u32,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
  fetched_at: Option<Instant>,
  failed_at: Option<Instant>,
  stale_time: Duration,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It will be called
  /// each time `fetch()` or `refetch()` is invoked.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      data: None,
      error: None,
      failure_count: 0,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      fetched_at: None,
      failed_at: None,
      stale_time: Duration::from_secs(60), // Default 1 minute
    }
  }

  /// Set the stale time for this query.
  ///
  /// After this duration, the data is considered stale and `is_stale()` returns true.
  pub fn with_stale_time(mut self, duration: Duration) -> Self {
    self.stale_time = duration;
    self
  }

  /// Get the data from the last successful fetch.
  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  /// Get the error message of the latest fetch, if it failed.
  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  /// Consecutive failed fetches since the last success.
  pub fn failure_count(&self) -> u32 {
    self.failure_count
  }

  /// Whether a fetch is in flight.
  pub fn is_fetching(&self) -> bool {
    self.receiver.is_some()
  }

  /// Initial load: fetching with nothing to show yet.
  pub fn is_loading(&self) -> bool {
    self.is_fetching() && self.data.is_none()
  }

  /// Check if the query succeeded on its latest fetch.
  pub fn is_success(&self) -> bool {
    self.data.is_some() && self.error.is_none()
  }

  /// Check if the latest fetch failed.
  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }

  /// Whether a new fetch is due: never fetched, or the latest fetch (successful
  /// or not) settled more than stale_time ago.
  pub fn is_stale(&self) -> bool {
    if self.is_fetching() {
      return false;
    }
    let settled_at = if self.error.is_some() {
      self.failed_at
    } else {
      self.fetched_at
    };
    settled_at.map_or(true, |t| t.elapsed() >= self.stale_time)
  }

  /// Start fetching data if not already fetching.
  pub fn fetch(&mut self) {
    if self.is_fetching() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, even if already fetching.
  pub fn refetch(&mut self) {
    // Cancel any pending fetch by dropping the receiver
    self.receiver = None;
    self.start_fetch();
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    // Try to receive without blocking
    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.data = Some(data);
        self.error = None;
        self.failure_count = 0;
        self.fetched_at = Some(Instant::now());
        self.receiver = None;
        true
      }
      Ok(Err(error)) => self.fail(error),
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.fail("Query was cancelled".to_string())
      }
    }
  }

  /// Snapshot for the connection status aggregator.
  pub fn snapshot(&self) -> QuerySnapshot {
    QuerySnapshot {
      has_data: self.data.is_some(),
      error: self.error.clone(),
      is_loading: self.is_loading(),
      failure_count: self.failure_count,
    }
  }

  fn fail(&mut self, error: String) -> bool {
    self.error = Some(error);
    self.failure_count = self.failure_count.saturating_add(1);
    self.failed_at = Some(Instant::now());
    self.receiver = None;
    true
  }

  /// Internal: start the fetch operation
  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("data", &self.data)
      .field("error", &self.error)
      .field("failure_count", &self.failure_count)
      .field("fetched_at", &self.fetched_at)
      .field("failed_at", &self.failed_at)
      .field("stale_time", &self.stale_time)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });

    assert!(query.data().is_none());
    assert!(query.is_stale());

    query.fetch();
    assert!(query.is_loading());

    // Wait for the result
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert!(!query.is_loading());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|| async { Err("Something went wrong".to_string()) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some("Something went wrong"));
    assert_eq!(query.failure_count(), 1);
  }

  #[tokio::test]
  async fn test_data_survives_failed_refetch() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      let counter = counter.clone();
      async move {
        match counter.fetch_add(1, Ordering::SeqCst) {
          0 => Ok(7),
          1 | 2 => Err("503".to_string()),
          _ => Ok(8),
        }
      }
    });

    for _ in 0..3 {
      query.refetch();
      tokio::time::sleep(Duration::from_millis(10)).await;
      query.poll();
    }
    assert_eq!(query.data(), Some(&7));
    assert_eq!(query.failure_count(), 2);
    assert!(!query.is_loading());

    let snapshot = query.snapshot();
    assert!(snapshot.has_data);
    assert_eq!(snapshot.error.as_deref(), Some("503"));

    query.refetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(query.data(), Some(&8));
    assert_eq!(query.failure_count(), 0);
    assert!(query.error().is_none());
  }

  #[tokio::test]
  async fn test_query_stale() {
    let mut query = Query::new(|| async { Ok::<_, String>(42) }).with_stale_time(Duration::ZERO);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    // With zero stale time, should immediately be stale
    assert!(query.is_stale());
  }

  #[tokio::test]
  async fn test_fresh_query_is_not_stale() {
    let mut query =
      Query::new(|| async { Ok::<_, String>(42) }).with_stale_time(Duration::from_secs(60));

    query.fetch();
    assert!(!query.is_stale());
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert!(!query.is_stale());
  }

  #[tokio::test]
  async fn test_failed_query_waits_for_stale_time() {
    let mut query: Query<i32> =
      Query::new(|| async { Err("connection refused".to_string()) })
        .with_stale_time(Duration::from_secs(60));

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(query.poll());

    assert!(query.is_error());
    assert!(!query.is_stale());
  }

  #[tokio::test]
  async fn test_failed_query_is_stale_after_stale_time() {
    let mut query: Query<i32> =
      Query::new(|| async { Err("connection refused".to_string()) }).with_stale_time(Duration::ZERO);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    assert!(query.is_stale());
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let mut query = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok::<_, String>(42)
    });

    query.fetch();
    assert!(query.is_loading());

    // Second fetch should be no-op
    query.fetch();
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn test_refetch_cancels_pending() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst))
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Refetch should cancel the first and start a new one
    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    query.poll();
    // Only the second fetch should have completed and been received
    assert_eq!(query.data(), Some(&1));
  }
}
