//! Connection status derived from the queries a view is polling.

use serde::Serialize;

/// What the aggregator needs to know about one polled query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySnapshot {
  pub has_data: bool,
  pub error: Option<String>,
  /// Initial load in progress (no data yet)
  pub is_loading: bool,
  /// Consecutive failures, reset by the query on success
  pub failure_count: u32,
}

/// Combined health signal for the whole dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
  pub is_connected: bool,
  pub is_loading: bool,
  pub is_offline: bool,
  pub total_retries: u32,
}

impl ConnectionStatus {
  pub fn label(&self) -> &'static str {
    if self.is_connected {
      "connected"
    } else if self.is_loading {
      "loading"
    } else {
      "offline"
    }
  }
}

/// Combine query snapshots into one status.
///
/// Connected means at least one query has data and none is currently failing.
pub fn aggregate(queries: &[QuerySnapshot]) -> ConnectionStatus {
  let has_data = queries.iter().any(|q| q.has_data);
  let no_errors = queries.iter().all(|q| q.error.is_none());
  let is_connected = has_data && no_errors;
  let is_loading = queries.iter().any(|q| q.is_loading);

  ConnectionStatus {
    is_connected,
    is_loading,
    is_offline: !is_connected && !is_loading,
    total_retries: queries
      .iter()
      .fold(0u32, |sum, q| sum.saturating_add(q.failure_count)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ok() -> QuerySnapshot {
    QuerySnapshot {
      has_data: true,
      ..Default::default()
    }
  }

  fn failing(count: u32) -> QuerySnapshot {
    QuerySnapshot {
      has_data: true,
      error: Some("503".to_string()),
      failure_count: count,
      ..Default::default()
    }
  }

  #[test]
  fn test_all_healthy_is_connected() {
    let status = aggregate(&[ok(), ok()]);
    assert!(status.is_connected);
    assert!(!status.is_offline);
    assert_eq!(status.label(), "connected");
  }

  #[test]
  fn test_any_error_disconnects() {
    let status = aggregate(&[ok(), failing(2), failing(1)]);
    assert!(!status.is_connected);
    assert!(status.is_offline);
    assert_eq!(status.total_retries, 3);
  }

  #[test]
  fn test_loading_without_data() {
    let loading = QuerySnapshot {
      is_loading: true,
      ..Default::default()
    };
    let status = aggregate(&[loading.clone(), loading]);
    assert!(!status.is_connected);
    assert!(status.is_loading);
    assert!(!status.is_offline);
    assert_eq!(status.label(), "loading");
  }

  #[test]
  fn test_one_query_with_data_is_enough() {
    let loading = QuerySnapshot {
      is_loading: true,
      ..Default::default()
    };
    let status = aggregate(&[loading, ok()]);
    assert!(status.is_connected);
    assert!(status.is_loading);
  }

  #[test]
  fn test_no_queries_is_offline() {
    let status = aggregate(&[]);
    assert!(!status.is_connected);
    assert!(!status.is_loading);
    assert!(status.is_offline);
    assert_eq!(status.total_retries, 0);
  }
}
