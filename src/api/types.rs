//! Response types of the dashboard backend.
//!
//! These round-trip through the cache as well as the network, so every type
//! is both `Serialize` and `Deserialize`, and optional fields default when
//! absent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
  pub status: String,
  pub healthy: bool,
}

/// Host resources reported by `GET /health/detailed`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemResources {
  pub cpu_percent: f64,
  pub memory_total: u64,
  pub memory_available: u64,
  pub memory_percent: f64,
  pub disk_total: u64,
  pub disk_used: u64,
  pub disk_percent: f64,
  pub uptime_seconds: f64,
}

/// `GET /health/detailed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedHealth {
  pub status_api: String,
  pub status_db: String,
  pub healthy: bool,
  pub total_dns_records: u64,
  pub fetch_interval_minutes: u32,
  pub log_level: String,
  #[serde(default)]
  pub system_resources: SystemResources,
  #[serde(default)]
  pub server_info: BTreeMap<String, serde_json::Value>,
  pub timestamp: String,
}

/// `GET /stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
  pub total_records: u64,
  pub message: String,
}

/// A single DNS query log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsLog {
  pub id: i64,
  pub timestamp: String,
  pub domain: String,
  pub action: String,
  #[serde(default)]
  pub device: Option<serde_json::Value>,
  #[serde(default)]
  pub client_ip: Option<String>,
  #[serde(default = "default_query_type")]
  pub query_type: String,
  #[serde(default)]
  pub blocked: bool,
  #[serde(default)]
  pub profile_id: Option<String>,
  #[serde(default)]
  pub data: Option<serde_json::Value>,
  pub created_at: String,
}

fn default_query_type() -> String {
  "A".to_string()
}

/// `GET /logs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logs {
  pub data: Vec<DnsLog>,
  pub total_records: u64,
  pub returned_records: u64,
  #[serde(default)]
  pub excluded_domains: Option<Vec<String>>,
}
