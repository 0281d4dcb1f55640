//! Optimistic write protocol.
//!
//! A mutation snapshots its affected entries, publishes a speculative
//! transform of them, and only then talks to the server. Success replaces
//! the speculation with the server's authoritative payload; any failure —
//! business rule, timeout, exhausted retries — restores the snapshots
//! exactly. The controller itself never retries: transport-level retry
//! policy lives in the executor, and business failures are terminal.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheKey, CacheStore};
use crate::client::{ApiClient, RequestSpec, Transport};
use crate::error::ApiError;

/// Pure edit applied to each affected entry before the network round trip.
pub type ForwardTransform = Arc<dyn Fn(CacheEntry) -> CacheEntry + Send + Sync>;

/// One write operation against the remote service, with its optimistic
/// cache edit and the keys to invalidate once the server confirms.
#[derive(Clone)]
pub struct Mutation {
  /// Keys whose entries the forward transform edits. May be empty for
  /// writes with no sensible speculation (checkout, for instance).
  pub affected_keys: Vec<CacheKey>,
  pub transform: Option<ForwardTransform>,
  pub request: RequestSpec,
  /// Keys or prefixes marked stale after a successful commit, so
  /// dependent views refetch on their next access.
  pub invalidate_on_success: Vec<CacheKey>,
}

impl Mutation {
  pub fn new(request: RequestSpec) -> Self {
    Self {
      affected_keys: Vec::new(),
      transform: None,
      request,
      invalidate_on_success: Vec::new(),
    }
  }

  /// Attach the optimistic edit and the keys it touches.
  pub fn with_optimistic(
    mut self,
    keys: Vec<CacheKey>,
    transform: impl Fn(CacheEntry) -> CacheEntry + Send + Sync + 'static,
  ) -> Self {
    self.affected_keys = keys;
    self.transform = Some(Arc::new(transform));
    self
  }

  pub fn invalidating(mut self, keys: Vec<CacheKey>) -> Self {
    self.invalidate_on_success = keys;
    self
  }
}

/// Lifecycle of one mutation. Terminal states are reached exactly once;
/// completion is reported through the single `Result` returned by
/// [`MutationController::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
  Idle,
  Optimistic,
  Committed,
  RolledBack,
}

impl MutationState {
  fn may_become(self, next: MutationState) -> bool {
    matches!(
      (self, next),
      (Self::Idle, Self::Optimistic)
        | (Self::Optimistic, Self::Committed)
        | (Self::Optimistic, Self::RolledBack)
    )
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Committed | Self::RolledBack)
  }
}

struct Lifecycle {
  state: MutationState,
}

impl Lifecycle {
  fn start() -> Self {
    Self {
      state: MutationState::Idle,
    }
  }

  fn advance(&mut self, next: MutationState) {
    debug_assert!(
      self.state.may_become(next),
      "invalid mutation transition {:?} -> {:?}",
      self.state,
      next
    );
    self.state = next;
  }
}

/// Executes mutations against the store and the remote service.
pub struct MutationController<T: Transport> {
  store: CacheStore,
  client: Arc<ApiClient<T>>,
}

impl<T: Transport> Clone for MutationController<T> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      client: Arc::clone(&self.client),
    }
  }
}

impl<T: Transport> MutationController<T> {
  pub fn new(store: CacheStore, client: Arc<ApiClient<T>>) -> Self {
    Self { store, client }
  }

  /// Run a mutation to a terminal state.
  ///
  /// The snapshot and optimistic apply happen synchronously in this call,
  /// before the returned future is awaited — concurrent mutations
  /// therefore apply in submission order, and each snapshots the state as
  /// of its own invocation. A later mutation's rollback restores the
  /// optimistic state an earlier one left behind, not the pre-sequence
  /// state (last-applied-wins).
  pub fn run(&self, mutation: Mutation) -> impl Future<Output = Result<Value, ApiError>> + '_ {
    let mut lifecycle = Lifecycle::start();

    let transform = mutation
      .transform
      .unwrap_or_else(|| Arc::new(|entry: CacheEntry| entry));
    let snapshots = self
      .store
      .apply_optimistic(&mutation.affected_keys, &*transform);
    lifecycle.advance(MutationState::Optimistic);
    debug!(
      keys = mutation.affected_keys.len(),
      "optimistic state published"
    );

    let request = mutation.request;
    let affected_keys = mutation.affected_keys;
    let invalidate_on_success = mutation.invalidate_on_success;

    async move {
      match self.client.execute(&request).await {
        Ok(payload) => {
          // The server's payload wins over the speculative guess.
          self.store.commit(&affected_keys, &payload);
          for key in &invalidate_on_success {
            self.store.invalidate(key);
          }
          lifecycle.advance(MutationState::Committed);
          debug!(state = ?lifecycle.state, "mutation settled");
          Ok(payload)
        }
        Err(error) => {
          // All-or-nothing: every affected entry returns to its exact
          // pre-mutation value and status.
          self.store.restore(snapshots);
          lifecycle.advance(MutationState::RolledBack);
          warn!(state = ?lifecycle.state, error = %error, "mutation rolled back");
          Err(error)
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::EntryStatus;
  use crate::client::testing::{test_config, FakeTransport, Step};
  use serde_json::json;
  use std::time::Duration;

  fn harness(
    steps: impl IntoIterator<Item = Step>,
  ) -> (MutationController<Arc<FakeTransport>>, Arc<FakeTransport>, CacheStore) {
    let transport = Arc::new(FakeTransport::scripted(steps));
    let client = Arc::new(ApiClient::with_transport(Arc::clone(&transport), &test_config()));
    let store = CacheStore::new(Duration::from_secs(300));
    (MutationController::new(store.clone(), client), transport, store)
  }

  fn cart_key() -> CacheKey {
    CacheKey::of(["shop", "cart"])
  }

  fn add_item_mutation() -> Mutation {
    Mutation::new(RequestSpec::post(
      "/cart/items",
      json!({"vehicleId": "v-100", "quantity": 1}),
    ))
    .with_optimistic(vec![cart_key()], |mut entry| {
      entry.data = Some(json!({"itemCount": 1, "subtotal": 50_000}));
      entry
    })
  }

  #[tokio::test(start_paused = true)]
  async fn optimistic_state_is_visible_before_the_network_resolves() {
    let server_cart = json!({"itemCount": 1, "subtotal": 50_000, "total": 51_200});
    let (mutations, _transport, store) =
      harness([Step::ok_after(Duration::from_millis(100), server_cart.clone())]);
    store.set(&cart_key(), json!({"itemCount": 0}));

    let future = mutations.run(add_item_mutation());
    // The apply already happened — before any await, before any network.
    assert_eq!(
      store.get(&cart_key()).unwrap().data,
      Some(json!({"itemCount": 1, "subtotal": 50_000}))
    );

    let payload = future.await.unwrap();
    assert_eq!(payload, server_cart);
    // Committed entries hold the authoritative payload, not the guess.
    assert_eq!(store.get(&cart_key()).unwrap().data, Some(server_cart));
  }

  #[tokio::test(start_paused = true)]
  async fn failure_reverts_to_the_exact_pre_mutation_state() {
    let (mutations, transport, store) = harness([Step::status(
      400,
      r#"{"message":"vehicle out of stock","code":"out_of_stock"}"#,
    )]);
    store.set(&cart_key(), json!({"itemCount": 0}));
    let before = store.get(&cart_key()).unwrap();

    let err = mutations.run(add_item_mutation()).await.unwrap_err();
    assert_eq!(err.code(), Some("out_of_stock"));
    // Business failures are terminal: one call, no controller retry.
    assert_eq!(transport.calls(), 1);

    assert_eq!(store.get(&cart_key()).unwrap(), before);
  }

  #[tokio::test(start_paused = true)]
  async fn rollback_is_exact_for_any_transform() {
    let (mutations, _transport, store) =
      harness([Step::status(500, "boom"), Step::status(500, "boom"), Step::status(500, "boom")]);
    store.set(&cart_key(), json!({"itemCount": 4, "promoCode": "SPRING"}));
    store.set_error(&cart_key(), ApiError::Network { message: "blip".into() });
    let before = store.get(&cart_key()).unwrap();

    // A transform that mangles everything it can reach.
    let mutation = Mutation::new(RequestSpec::post("/cart/items", json!({})))
      .with_optimistic(vec![cart_key()], |mut entry| {
        entry.data = None;
        entry.status = EntryStatus::Idle;
        entry.error = None;
        entry.last_success_at = None;
        entry
      });

    let err = mutations.run(mutation).await.unwrap_err();
    assert!(matches!(err, ApiError::MaxRetriesExceeded { .. }));
    assert_eq!(store.get(&cart_key()).unwrap(), before);
  }

  #[tokio::test(start_paused = true)]
  async fn rollback_restores_entries_that_did_not_exist() {
    let (mutations, _transport, store) = harness([Step::status(404, r#"{"message":"no cart"}"#)]);

    let err = mutations.run(add_item_mutation()).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound { .. }));

    // The entry was created by the apply; rollback returns it to Idle.
    let entry = store.get(&cart_key()).unwrap();
    assert_eq!(entry, CacheEntry::default());
  }

  #[tokio::test(start_paused = true)]
  async fn overlapping_mutations_apply_in_submission_order() {
    // M1 bumps quantity 1 -> 2 and fails; M2 bumps 2 -> 3 and succeeds.
    let (mutations, _transport, store) = harness([
      Step::status_after(
        Duration::from_millis(10),
        400,
        r#"{"message":"rejected","code":"out_of_stock"}"#,
      ),
      Step::ok_after(Duration::from_millis(50), json!({"quantity": 3})),
    ]);
    store.set(&cart_key(), json!({"quantity": 1}));

    let m1 = Mutation::new(RequestSpec::patch("/cart/items/i-1", json!({"quantity": 2})))
      .with_optimistic(vec![cart_key()], |mut entry| {
        entry.data = Some(json!({"quantity": 2}));
        entry
      });
    let m2 = Mutation::new(RequestSpec::patch("/cart/items/i-1", json!({"quantity": 3})))
      .with_optimistic(vec![cart_key()], |mut entry| {
        entry.data = Some(json!({"quantity": 3}));
        entry
      });

    // Both submitted before either resolves; apply order = call order.
    let f1 = mutations.run(m1);
    let f2 = mutations.run(m2);
    assert_eq!(store.get(&cart_key()).unwrap().data, Some(json!({"quantity": 3})));

    let (r1, r2) = tokio::join!(f1, f2);
    r1.unwrap_err();
    r2.unwrap();

    // M1's rollback restored its own snapshot, then M2's commit landed:
    // the final state is M2's server value, not a merge.
    assert_eq!(store.get(&cart_key()).unwrap().data, Some(json!({"quantity": 3})));
  }

  #[tokio::test(start_paused = true)]
  async fn empty_affected_set_still_invalidates_on_success() {
    let (mutations, _transport, store) = harness([Step::ok(json!({"orderId": "o-9"}))]);
    let orders_prefix = CacheKey::of(["orders", "list"]);
    let orders = orders_prefix.clone().with_segment("d-7");
    store.set(&orders, json!([]));
    store.set(&cart_key(), json!({"itemCount": 1}));

    let checkout = Mutation::new(RequestSpec::post("/checkout", json!({"dealerId": "d-7"})))
      .invalidating(vec![cart_key(), orders_prefix]);

    let payload = mutations.run(checkout).await.unwrap();
    assert_eq!(payload, json!({"orderId": "o-9"}));

    // Nothing was replaced, but dependents were marked stale.
    assert_eq!(store.get(&cart_key()).unwrap().data, Some(json!({"itemCount": 1})));
    assert!(store.is_stale(&cart_key(), chrono::Duration::minutes(5)));
    assert!(store.is_stale(&orders, chrono::Duration::minutes(5)));
  }

  #[tokio::test(start_paused = true)]
  async fn timeout_runs_the_full_rollback_path() {
    let (mutations, _transport, store) = harness([Step::Hang]);
    store.set(&cart_key(), json!({"itemCount": 0}));
    let before = store.get(&cart_key()).unwrap();

    let mutation = Mutation::new(
      RequestSpec::post("/cart/items", json!({"vehicleId": "v-100"}))
        .with_timeout(Duration::from_millis(30_000)),
    )
    .with_optimistic(vec![cart_key()], |mut entry| {
      entry.data = Some(json!({"itemCount": 1}));
      entry
    });

    let err = mutations.run(mutation).await.unwrap_err();
    assert_eq!(err, ApiError::Timeout { timeout_ms: 30_000 });
    // A cancelled mutation is a failure, never a silent no-op.
    assert_eq!(store.get(&cart_key()).unwrap(), before);
  }

  #[test]
  fn state_machine_transitions() {
    use MutationState::*;
    assert!(Idle.may_become(Optimistic));
    assert!(Optimistic.may_become(Committed));
    assert!(Optimistic.may_become(RolledBack));

    assert!(!Idle.may_become(Committed));
    assert!(!Committed.may_become(Optimistic));
    assert!(!RolledBack.may_become(Committed));
    assert!(Committed.is_terminal() && RolledBack.is_terminal());
    assert!(!Idle.is_terminal() && !Optimistic.is_terminal());
  }
}
