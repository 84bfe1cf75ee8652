//! Retry and backoff decisions for requests against the dashboard API.
//!
//! Client errors (4xx) are permanent: credentials or request shape are wrong
//! and asking again cannot help. Everything else, including transport errors
//! that carry no status at all, is treated as transient and retried with
//! exponential backoff up to a per-query ceiling.

use color_eyre::{Report, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{is_client_error, status_of};

/// Upper bound on any single backoff delay.
pub const MAX_DELAY: Duration = Duration::from_secs(30);

/// Verdict for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
  pub retry: bool,
  /// How long to wait before the next attempt
  pub delay: Duration,
}

/// Retry ceiling and backoff base for one kind of query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub base_delay: Duration,
}

impl RetryPolicy {
  pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
    Self {
      max_retries,
      base_delay,
    }
  }

  /// Periodic health checks: tolerate the most transient noise.
  pub const fn critical() -> Self {
    Self::new(5, Duration::from_secs(1))
  }

  /// Log and statistics queries.
  pub const fn bulk() -> Self {
    Self::new(2, Duration::from_secs(1))
  }

  /// High-frequency polling, where retries would pile up behind the next poll.
  pub const fn realtime() -> Self {
    Self::new(1, Duration::from_secs(1))
  }

  /// Never retry.
  pub const fn none() -> Self {
    Self::new(0, Duration::ZERO)
  }

  /// Decide whether attempt number `attempt` (0 for the first failure) should
  /// be retried, given the HTTP status of its failure if it had one.
  pub fn decide(&self, attempt: u32, status: Option<u16>) -> RetryDecision {
    let retry = match status {
      Some(status) if is_client_error(status) => false,
      _ => attempt < self.max_retries,
    };

    RetryDecision {
      retry,
      delay: self.backoff(attempt),
    }
  }

  /// Same as [`decide`](Self::decide), reading the status out of `err`.
  pub fn decide_error(&self, attempt: u32, err: &Report) -> RetryDecision {
    self.decide(attempt, status_of(err))
  }

  /// `base_delay * 2^attempt`, capped at [`MAX_DELAY`].
  pub fn backoff(&self, attempt: u32) -> Duration {
    2u32
      .checked_pow(attempt)
      .and_then(|factor| self.base_delay.checked_mul(factor))
      .map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY))
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::bulk()
  }
}

/// Run `op` until it succeeds or `policy` refuses another attempt.
///
/// The error of the last attempt is returned unchanged.
pub async fn run<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let mut attempt = 0;
  loop {
    match op().await {
      Ok(value) => return Ok(value),
      Err(err) => {
        let decision = policy.decide_error(attempt, &err);
        if !decision.retry {
          return Err(err);
        }
        debug!(
          attempt,
          delay_ms = decision.delay.as_millis() as u64,
          error = %err,
          "retrying after failure"
        );
        tokio::time::sleep(decision.delay).await;
        attempt += 1;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::FetchFailed;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  fn failed(status: Option<u16>) -> Report {
    Report::new(FetchFailed::new(status, "request failed"))
  }

  #[test]
  fn test_client_errors_never_retry() {
    let policy = RetryPolicy::critical();
    assert!(!policy.decide(0, Some(401)).retry);
    assert!(!policy.decide(0, Some(400)).retry);
    assert!(!policy.decide(0, Some(429)).retry);
  }

  #[test]
  fn test_server_error_backoff() {
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));
    let decision = policy.decide(2, Some(503));
    assert_eq!(
      decision,
      RetryDecision {
        retry: true,
        delay: Duration::from_millis(4000)
      }
    );
  }

  #[test]
  fn test_retry_ceiling() {
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));
    assert!(policy.decide(2, Some(503)).retry);
    assert!(!policy.decide(3, Some(503)).retry);
    assert!(!policy.decide(10, Some(503)).retry);
  }

  #[test]
  fn test_transport_errors_are_transient() {
    let policy = RetryPolicy::bulk();
    assert!(policy.decide(0, None).retry);
    assert!(policy.decide(1, Some(500)).retry);
    assert!(!policy.decide(2, None).retry);
  }

  #[test]
  fn test_backoff_is_capped() {
    let policy = RetryPolicy::new(100, Duration::from_millis(1000));
    assert_eq!(policy.backoff(0), Duration::from_millis(1000));
    assert_eq!(policy.backoff(4), Duration::from_millis(16_000));
    assert_eq!(policy.backoff(5), MAX_DELAY);
    assert_eq!(policy.backoff(64), MAX_DELAY);
  }

  #[test]
  fn test_decide_error_reads_status() {
    let policy = RetryPolicy::critical();
    assert!(!policy.decide_error(0, &failed(Some(403))).retry);
    assert!(policy.decide_error(0, &failed(Some(502))).retry);
  }

  #[test]
  fn test_presets_are_ordered() {
    assert!(RetryPolicy::critical().max_retries > RetryPolicy::bulk().max_retries);
    assert!(RetryPolicy::bulk().max_retries > RetryPolicy::realtime().max_retries);
  }

  #[tokio::test(start_paused = true)]
  async fn test_run_retries_until_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let started = tokio::time::Instant::now();

    let result = run(&RetryPolicy::new(3, Duration::from_millis(100)), || {
      let counter = counter.clone();
      async move {
        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
          Err(failed(Some(503)))
        } else {
          Ok("up")
        }
      }
    })
    .await;

    assert_eq!(result.unwrap(), "up");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 100ms + 200ms of backoff
    assert!(started.elapsed() >= Duration::from_millis(300));
  }

  #[tokio::test(start_paused = true)]
  async fn test_run_gives_up_after_ceiling() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result: Result<()> = run(&RetryPolicy::new(2, Duration::from_millis(10)), || {
      counter.fetch_add(1, Ordering::SeqCst);
      async { Err(failed(Some(500))) }
    })
    .await;

    let err = result.unwrap_err();
    assert_eq!(status_of(&err), Some(500));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_run_stops_on_client_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result: Result<()> = run(&RetryPolicy::critical(), || {
      counter.fetch_add(1, Ordering::SeqCst);
      async { Err(failed(Some(401))) }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
