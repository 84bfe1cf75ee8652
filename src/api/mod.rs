//! Client for the DNS log dashboard backend.

pub mod cache;
pub mod cached_client;
pub mod client;
pub mod types;

#[cfg(test)]
mod test_server;

pub use cache::DashboardQueryKey;
pub use cached_client::{open_store, CachedDashboardClient, EndpointPolicies};
pub use client::{DashboardClient, LogsQuery};
