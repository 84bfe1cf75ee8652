//! Offline-tolerant client core for a DNS query log dashboard.
//!
//! - [`cache`]: TTL cache over durable storage and the cache-aware fetch wrapper
//! - [`retry`]: retry/backoff decisions separating transient from permanent failures
//! - [`status`]: connection status aggregated from polled queries
//! - [`api`]: typed client for the dashboard backend, plain and cached

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod query;
pub mod retry;
pub mod status;
