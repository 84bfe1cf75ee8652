//! Cache keys for dashboard API calls.

use sha2::{Digest, Sha256};

use crate::cache::QueryKey;

use super::client::LogsQuery;

/// Query key types for dashboard API calls.
#[derive(Clone, Debug)]
pub enum DashboardQueryKey {
  Health,
  HealthDetailed,
  Stats,
  /// A page of logs; differing exclude lists are different entries
  Logs(LogsQuery),
}

impl QueryKey for DashboardQueryKey {
  fn cache_hash(&self) -> String {
    match self {
      Self::Health => "health".to_string(),
      Self::HealthDetailed => "health_detailed".to_string(),
      Self::Stats => "stats".to_string(),
      Self::Logs(query) => {
        let input = format!(
          "logs:{}:{}:{}",
          normalize_excludes(&query.exclude).join(","),
          query.limit,
          query.offset
        );

        // SHA256 hash for stable, fixed-length keys
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        format!("logs:{}", hex::encode(hasher.finalize()))
      }
    }
  }

  fn description(&self) -> String {
    match self {
      Self::Health => "health".to_string(),
      Self::HealthDetailed => "detailed health".to_string(),
      Self::Stats => "stats".to_string(),
      Self::Logs(query) => {
        if query.exclude.is_empty() {
          format!("logs {}+{}", query.offset, query.limit)
        } else {
          format!(
            "logs {}+{} excluding {}",
            query.offset,
            query.limit,
            query.exclude.join(", ")
          )
        }
      }
    }
  }
}

/// Normalize exclude lists so equivalent filters share a cache entry.
/// Trims, lowercases, sorts and dedups.
fn normalize_excludes(exclude: &[String]) -> Vec<String> {
  let mut domains: Vec<String> = exclude
    .iter()
    .map(|d| d.trim().to_lowercase())
    .filter(|d| !d.is_empty())
    .collect();
  domains.sort();
  domains.dedup();
  domains
}
