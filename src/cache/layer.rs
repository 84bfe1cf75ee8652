//! Cache layer that orchestrates caching logic with network fetching.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use super::storage::Storage;
use super::store::CacheStore;
use super::traits::{CacheMetadata, Cached, QueryKey};
use crate::error::{is_client_error, status_of};
use crate::retry::{self, RetryPolicy};

/// Cache layer that manages caching logic and network fetching.
///
/// Every call goes to the network first. Successful results refresh the
/// cache; failed ones fall back to whatever the cache still holds, however
/// old, so the caller keeps something to show while the backend is down.
pub struct CacheLayer<S: Storage> {
  store: CacheStore<S>,
}

impl<S: Storage> CacheLayer<S> {
  /// Create a new cache layer over the given store.
  pub fn new(store: CacheStore<S>) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &CacheStore<S> {
    &self.store
  }

  /// Fetch through `producer`, falling back to stale cache on failure.
  ///
  /// 1. Invoke the producer
  /// 2. On success, cache the result (a failed write is only logged)
  /// 3. On a client error (4xx), return the error as-is
  /// 4. On any other failure, serve the stale entry marked offline, or
  ///    return the original error if there is none
  ///
  /// `ttl` defaults to the store's default TTL.
  pub async fn wrap<K, T, F, Fut>(
    &self,
    key: &K,
    ttl: Option<Duration>,
    producer: F,
  ) -> Result<Cached<T>>
  where
    K: QueryKey + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let result = producer().await;
    self.settle(key, ttl, result)
  }

  /// Like [`wrap`](Self::wrap), but retries the producer per `policy` before
  /// falling back to the cache.
  pub async fn wrap_with_retry<K, T, F, Fut>(
    &self,
    key: &K,
    ttl: Option<Duration>,
    policy: &RetryPolicy,
    producer: F,
  ) -> Result<Cached<T>>
  where
    K: QueryKey + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let result = retry::run(policy, producer).await;
    self.settle(key, ttl, result)
  }

  fn settle<K, T>(&self, key: &K, ttl: Option<Duration>, result: Result<T>) -> Result<Cached<T>>
  where
    K: QueryKey + ?Sized,
    T: Serialize + DeserializeOwned,
  {
    let cache_key = key.cache_hash();

    match result {
      Ok(data) => {
        let ttl = ttl.unwrap_or(self.store.options().default_ttl);
        self.store.set_with_ttl(&cache_key, &data, ttl);
        Ok(Cached {
          data,
          metadata: CacheMetadata::fresh(self.store.now()),
        })
      }
      Err(err) => {
        let status = status_of(&err);
        if status.is_some_and(is_client_error) {
          debug!(key = %key.description(), ?status, "client error, not serving cache");
          return Err(err);
        }

        match self.store.get_stale::<T>(&cache_key) {
          Some(stale) => {
            info!(
              key = %key.description(),
              cached_at = %stale.metadata.last_updated,
              error = %err,
              "serving stale cache"
            );
            Ok(stale)
          }
          None => Err(err),
        }
      }
    }
  }
}

impl<S: Storage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
    }
  }
}
