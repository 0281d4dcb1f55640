//! Per-key fetch lifecycle over the cache store.
//!
//! The controller decides, at subscription time, whether a key needs a
//! network fetch at all: fresh data is served as-is, stale data is served
//! immediately while a background refetch runs (no loading flash), and an
//! in-flight fetch is joined rather than duplicated. Fetch completions are
//! the only place query results enter the store.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheKey, CacheStore, EntryStatus, Subscription};
use crate::client::{ApiClient, RequestSpec, Transport};

/// A cache key paired with the request that fetches it and the staleness
/// window for its query kind.
#[derive(Debug, Clone)]
pub struct QuerySpec {
  pub key: CacheKey,
  pub request: RequestSpec,
  pub stale_for: chrono::Duration,
}

impl QuerySpec {
  pub fn new(key: CacheKey, request: RequestSpec, stale_for: chrono::Duration) -> Self {
    Self {
      key,
      request,
      stale_for,
    }
  }
}

/// Drives fetches for subscribed keys.
pub struct QueryController<T: Transport> {
  store: CacheStore,
  client: Arc<ApiClient<T>>,
}

impl<T: Transport> Clone for QueryController<T> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      client: Arc::clone(&self.client),
    }
  }
}

impl<T: Transport> QueryController<T> {
  pub fn new(store: CacheStore, client: Arc<ApiClient<T>>) -> Self {
    Self { store, client }
  }

  /// Subscribe to a query's cache entry, fetching if the key has no
  /// usable data.
  ///
  /// - entry absent or never confirmed: fetch, subscriber sees `Fetching`
  /// - fetch already in flight: attach to it, no duplicate call
  /// - fresh data: serve from cache, no network traffic
  /// - stale data (window elapsed or invalidated): serve the cached
  ///   payload immediately and refresh in the background
  pub fn subscribe(&self, query: &QuerySpec) -> Subscription {
    // Opportunistic eviction of entries idle past the GC window.
    self.store.sweep();

    let subscription = self.store.subscribe(&query.key);
    let entry = subscription.entry();

    let needs_fetch = match entry.status {
      EntryStatus::Fetching => false,
      _ => !entry.has_data() || self.store.is_stale(&query.key, query.stale_for),
    };
    if needs_fetch {
      self.spawn_fetch(query);
    }

    subscription
  }

  /// Force a background refresh, regardless of freshness. Still joins an
  /// in-flight fetch instead of stacking a second call.
  pub fn refetch(&self, query: &QuerySpec) {
    self.spawn_fetch(query);
  }

  /// Current entry for a key without subscribing.
  pub fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
    self.store.get(key)
  }

  fn spawn_fetch(&self, query: &QuerySpec) {
    // The Fetching flip is synchronous, so at most one task per key gets
    // past this point.
    if !self.store.begin_fetch(&query.key) {
      debug!(key = %query.key, "fetch already in flight, attaching");
      return;
    }

    let store = self.store.clone();
    let client = Arc::clone(&self.client);
    let key = query.key.clone();
    let request = query.request.clone();

    tokio::spawn(async move {
      match client.fetch(&request).await {
        Ok(payload) => {
          debug!(key = %key, "fetch completed");
          store.set(&key, payload);
        }
        Err(error) => {
          // Last-good data stays in the entry; the error rides alongside.
          warn!(key = %key, error = %error, "fetch failed");
          store.set_error(&key, error);
        }
      }
    });
  }
}
