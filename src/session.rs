//! Session wiring.
//!
//! One [`Storefront`] per application session owns the cache store, the
//! request executor, and both controllers. The store is never a global:
//! everything that reads or writes it gets its handle from here, and the
//! whole cache dies with the session.

use std::sync::Arc;

use color_eyre::Result;

use crate::cache::{CacheEntry, CacheKey, CacheStore};
use crate::client::{ApiClient, HttpTransport, Transport};
use crate::config::Config;
use crate::mutation::MutationController;
use crate::query::QueryController;
use crate::shop::{CartApi, CatalogApi, OrdersApi};

/// The composition root of the data layer.
pub struct Storefront<T: Transport = HttpTransport> {
  config: Config,
  store: CacheStore,
  queries: QueryController<T>,
  mutations: MutationController<T>,
}

impl Storefront<HttpTransport> {
  /// Build the production session from configuration.
  pub fn new(config: Config) -> Result<Self> {
    let client = ApiClient::new(&config)?;
    Ok(Self::assemble(config, client))
  }
}

impl<T: Transport> Storefront<T> {
  /// Build a session over a custom transport. Tests and embedders with
  /// their own wire layer come through here.
  pub fn with_transport(transport: T, config: Config) -> Self {
    let client = ApiClient::with_transport(transport, &config);
    Self::assemble(config, client)
  }

  fn assemble(config: Config, client: ApiClient<T>) -> Self {
    let store = CacheStore::new(config.cache.gc_idle());
    let client = Arc::new(client);
    let queries = QueryController::new(store.clone(), Arc::clone(&client));
    let mutations = MutationController::new(store.clone(), client);
    Self {
      config,
      store,
      queries,
      mutations,
    }
  }

  pub fn catalog(&self) -> CatalogApi<T> {
    CatalogApi::new(self.queries.clone(), self.config.cache.catalog_stale())
  }

  pub fn cart(&self) -> CartApi<T> {
    CartApi::new(
      self.queries.clone(),
      self.mutations.clone(),
      self.config.cache.cart_stale(),
    )
  }

  pub fn orders(&self) -> OrdersApi<T> {
    OrdersApi::new(
      self.queries.clone(),
      self.mutations.clone(),
      self.config.cache.orders_stale(),
    )
  }

  /// Current entry for a key, without subscribing.
  pub fn read_entry(&self, key: &CacheKey) -> Option<CacheEntry> {
    self.store.get(key)
  }

  /// Mark a key or prefix stale; matching entries refetch on next access.
  pub fn invalidate(&self, key: &CacheKey) {
    self.store.invalidate(key);
  }

  /// Evict entries idle past the GC window. The query controller already
  /// does this opportunistically; hosts with long quiet periods can call
  /// it on a timer.
  pub fn collect_garbage(&self) -> usize {
    self.store.sweep()
  }

  pub fn config(&self) -> &Config {
    &self.config
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::client::testing::{test_config, FakeTransport, Step};
  use crate::shop::keys;
  use serde_json::json;
  use std::sync::Arc;

  #[tokio::test(start_paused = true)]
  async fn session_wires_one_store_for_all_facades() {
    let transport = Arc::new(FakeTransport::scripted([Step::ok(json!({
      "id": "c-1",
      "items": [],
      "itemCount": 0,
      "subtotal": 0,
      "total": 0,
      "promoCode": null
    }))]));
    let session = Storefront::with_transport(Arc::clone(&transport), test_config());

    let cart = session.cart();
    let mut sub = cart.subscribe();
    loop {
      if sub.entry().has_data() {
        break;
      }
      sub.changed().await.unwrap();
    }

    // The facade and the session read the same entry.
    assert_eq!(cart.read().unwrap().id, "c-1");
    assert!(session.read_entry(&keys::cart()).unwrap().has_data());

    session.invalidate(&keys::cart());
    assert_eq!(transport.calls(), 1);
  }
}
