//! Cached dashboard client that wraps DashboardClient with transparent caching.

use color_eyre::Result;
use tracing::info;

use crate::cache::{
  CacheLayer, CacheNotifier, CacheStore, Cached, NoopStorage, SqliteStorage, Storage,
};
use crate::config::Config;
use crate::retry::RetryPolicy;

use super::cache::DashboardQueryKey;
use super::client::{DashboardClient, LogsQuery};
use super::types::{DetailedHealth, Health, Logs, Stats};

/// Retry policy per endpoint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPolicies {
  pub health: RetryPolicy,
  pub stats: RetryPolicy,
  pub logs: RetryPolicy,
}

impl Default for EndpointPolicies {
  fn default() -> Self {
    Self {
      health: RetryPolicy::critical(),
      stats: RetryPolicy::realtime(),
      logs: RetryPolicy::bulk(),
    }
  }
}

/// Dashboard client with transparent caching support.
///
/// This wraps the underlying DashboardClient and provides the same API,
/// but retries transient failures, caches results and serves stale data
/// when the backend is unreachable.
pub struct CachedDashboardClient<S: Storage = Box<dyn Storage>> {
  inner: DashboardClient,
  cache: CacheLayer<S>,
  policies: EndpointPolicies,
}

impl CachedDashboardClient {
  /// Create a cached client from configuration.
  pub fn new(config: &Config) -> Result<Self> {
    let inner = DashboardClient::new(config)?;
    let store = open_store(config)?;

    Ok(Self::with_cache(inner, CacheLayer::new(store)))
  }
}

/// Open the cache store described by the configuration.
pub fn open_store(config: &Config) -> Result<CacheStore<Box<dyn Storage>>> {
  let storage: Box<dyn Storage> = if config.cache.enabled {
    let storage = match &config.cache.path {
      Some(path) => SqliteStorage::open_at(path)?,
      None => SqliteStorage::open()?,
    };
    Box::new(storage)
  } else {
    info!("caching disabled");
    Box::new(NoopStorage)
  };

  Ok(
    CacheStore::new(storage)
      .with_options(config.cache.store_options())
      .with_notifier(CacheNotifier::default()),
  )
}

impl<S: Storage> CachedDashboardClient<S> {
  pub fn with_cache(inner: DashboardClient, cache: CacheLayer<S>) -> Self {
    Self {
      inner,
      cache,
      policies: EndpointPolicies::default(),
    }
  }

  pub fn with_policies(mut self, policies: EndpointPolicies) -> Self {
    self.policies = policies;
    self
  }

  /// The uncached client.
  pub fn inner(&self) -> &DashboardClient {
    &self.inner
  }

  /// The underlying cache store.
  pub fn store(&self) -> &CacheStore<S> {
    self.cache.store()
  }

  /// Get API health with caching.
  pub async fn health(&self) -> Result<Cached<Health>> {
    self
      .cache
      .wrap_with_retry(&DashboardQueryKey::Health, None, &self.policies.health, || {
        let inner = self.inner.clone();
        async move { inner.health().await }
      })
      .await
  }

  /// Get detailed health with caching.
  pub async fn health_detailed(&self) -> Result<Cached<DetailedHealth>> {
    self
      .cache
      .wrap_with_retry(
        &DashboardQueryKey::HealthDetailed,
        None,
        &self.policies.health,
        || {
          let inner = self.inner.clone();
          async move { inner.health_detailed().await }
        },
      )
      .await
  }

  /// Get record statistics with caching.
  pub async fn stats(&self) -> Result<Cached<Stats>> {
    self
      .cache
      .wrap_with_retry(&DashboardQueryKey::Stats, None, &self.policies.stats, || {
        let inner = self.inner.clone();
        async move { inner.stats().await }
      })
      .await
  }

  /// Get a page of logs with caching.
  pub async fn logs(&self, query: &LogsQuery) -> Result<Cached<Logs>> {
    // Invalid parameters are a local mistake, not an outage
    query.validate()?;

    let key = DashboardQueryKey::Logs(query.clone());
    self
      .cache
      .wrap_with_retry(&key, None, &self.policies.logs, || {
        let inner = self.inner.clone();
        let query = query.clone();
        async move { inner.logs(&query).await }
      })
      .await
  }
}

impl<S: Storage> Clone for CachedDashboardClient<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
      policies: self.policies,
    }
  }
}
