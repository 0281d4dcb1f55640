//! In-memory keyed store of server-derived state.
//!
//! One store instance backs the whole session. Entries hold type-erased
//! JSON payloads; every write publishes the new entry on that key's watch
//! channel before the writing call returns, so subscribers always observe
//! writes in the order they happened. All operations are short critical
//! sections on one lock and never suspend while holding it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ApiError;

use super::key::CacheKey;

/// Fetch lifecycle of a cache entry.
///
/// Transitions only as Idle → Fetching → {Success, Error} → Fetching → …;
/// Success never returns directly to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryStatus {
  #[default]
  Idle,
  Fetching,
  Success,
  Error,
}

/// Stored data + status + error for one cache key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheEntry {
  /// Last committed payload. Survives fetch errors (stale-while-error).
  pub data: Option<Value>,
  pub status: EntryStatus,
  /// When `data` was last confirmed by the server.
  pub last_success_at: Option<DateTime<Utc>>,
  /// Most recent failure, cleared on the next success.
  pub error: Option<ApiError>,
}

impl CacheEntry {
  pub fn has_data(&self) -> bool {
    self.data.is_some()
  }

  /// Decode the payload into a domain type. `None` when there is no data
  /// or the payload does not match the expected shape.
  pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
    self
      .data
      .as_ref()
      .and_then(|v| serde_json::from_value(v.clone()).ok())
  }
}

struct Slot {
  entry: CacheEntry,
  /// Set by invalidation; cleared by the next successful write.
  stale: bool,
  tx: watch::Sender<CacheEntry>,
  subscribers: usize,
  /// When the subscriber count last dropped to zero.
  idle_since: Option<Instant>,
}

impl Slot {
  fn new() -> Self {
    let entry = CacheEntry::default();
    let (tx, _rx) = watch::channel(entry.clone());
    Self {
      entry,
      stale: false,
      tx,
      subscribers: 0,
      idle_since: Some(Instant::now()),
    }
  }

  fn publish(&self) {
    self.tx.send_replace(self.entry.clone());
  }
}

type Slots = HashMap<CacheKey, Slot>;

/// Keyed store of [`CacheEntry`] values with subscription notification,
/// invalidation, and reference-counted eviction.
///
/// Cloning is cheap and shares the same underlying map. Only the query
/// and mutation controllers write to the store; UI consumers read through
/// subscriptions.
#[derive(Clone)]
pub struct CacheStore {
  slots: Arc<Mutex<Slots>>,
  gc_idle: std::time::Duration,
}

impl CacheStore {
  /// Create a store whose entries are evicted after sitting unsubscribed
  /// for `gc_idle`.
  pub fn new(gc_idle: std::time::Duration) -> Self {
    Self {
      slots: Arc::new(Mutex::new(HashMap::new())),
      gc_idle,
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Slots> {
    // Poisoning means a writer panicked mid-update; the map cannot be
    // trusted after that, so there is nothing to salvage here.
    self.slots.lock().expect("cache store lock poisoned")
  }

  /// Current entry for a key, if one exists.
  pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
    self.lock().get(key).map(|slot| slot.entry.clone())
  }

  /// Whether a fetch for this key should bypass the cached data: the entry
  /// is absent, was never confirmed, was invalidated, or its last success
  /// is older than `window`.
  pub fn is_stale(&self, key: &CacheKey, window: chrono::Duration) -> bool {
    let slots = self.lock();
    match slots.get(key) {
      Some(slot) => {
        slot.stale
          || match slot.entry.last_success_at {
            Some(at) => Utc::now() - at > window,
            None => true,
          }
      }
      None => true,
    }
  }

  /// Replace the entry's data with a confirmed payload: status Success,
  /// `last_success_at` stamped, error and stale flag cleared.
  pub fn set(&self, key: &CacheKey, data: Value) {
    let mut slots = self.lock();
    let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
    slot.entry.data = Some(data);
    slot.entry.status = EntryStatus::Success;
    slot.entry.last_success_at = Some(Utc::now());
    slot.entry.error = None;
    slot.stale = false;
    slot.publish();
  }

  /// Record a fetch failure. Prior data, if any, is preserved so the UI
  /// keeps rendering the last good payload next to the error.
  pub fn set_error(&self, key: &CacheKey, error: ApiError) {
    let mut slots = self.lock();
    let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
    slot.entry.status = EntryStatus::Error;
    slot.entry.error = Some(error);
    slot.publish();
  }

  /// Flip the entry to Fetching, creating it (Idle → Fetching) if absent.
  ///
  /// Returns `false` when a fetch is already in flight — the caller must
  /// not issue another call. This is the de-duplication point: the flip is
  /// synchronous, so it happens before any competing subscriber can check.
  pub fn begin_fetch(&self, key: &CacheKey) -> bool {
    let mut slots = self.lock();
    let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
    if slot.entry.status == EntryStatus::Fetching {
      return false;
    }
    slot.entry.status = EntryStatus::Fetching;
    slot.publish();
    true
  }

  /// Mark every entry under `prefix` stale without discarding displayed
  /// data. Stale entries refetch on their next access or subscription,
  /// not immediately. Calling this twice has the same effect as once.
  pub fn invalidate(&self, prefix: &CacheKey) -> usize {
    let mut slots = self.lock();
    let mut marked = 0;
    for (key, slot) in slots.iter_mut() {
      if key.starts_with(prefix) {
        slot.stale = true;
        marked += 1;
      }
    }
    debug!(prefix = %prefix, marked, "invalidated cache entries");
    marked
  }

  /// Register for change notification on a key, creating the entry if
  /// absent. The returned subscription pins the entry against eviction
  /// until it is dropped.
  pub fn subscribe(&self, key: &CacheKey) -> Subscription {
    let mut slots = self.lock();
    let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
    slot.subscribers += 1;
    slot.idle_since = None;
    let rx = slot.tx.subscribe();
    drop(slots);

    Subscription {
      rx,
      _guard: SubscriptionGuard {
        slots: Arc::clone(&self.slots),
        key: key.clone(),
      },
    }
  }

  /// Number of live subscriptions for a key.
  pub fn subscriber_count(&self, key: &CacheKey) -> usize {
    self.lock().get(key).map(|s| s.subscribers).unwrap_or(0)
  }

  /// Evict entries that have had zero subscribers for longer than the GC
  /// idle window. Returns how many were removed.
  pub fn sweep(&self) -> usize {
    let gc_idle = self.gc_idle;
    let mut slots = self.lock();
    let before = slots.len();
    slots.retain(|_, slot| {
      slot.subscribers > 0
        || slot
          .idle_since
          .map(|at| at.elapsed() < gc_idle)
          .unwrap_or(true)
    });
    let evicted = before - slots.len();
    if evicted > 0 {
      debug!(evicted, "evicted idle cache entries");
    }
    evicted
  }

  // --------------------------------------------------------------------
  // Mutation-controller primitives
  //
  // Snapshot + optimistic apply happen under one lock acquisition, so the
  // pair is atomic with respect to every other cache operation and the
  // optimistic state is published before the caller can issue its network
  // request.
  // --------------------------------------------------------------------

  /// Snapshot each affected entry, apply `transform` to it, and publish
  /// the result. Returns the pre-transform snapshots for rollback.
  pub fn apply_optimistic(
    &self,
    keys: &[CacheKey],
    transform: &(dyn Fn(CacheEntry) -> CacheEntry + Send + Sync),
  ) -> Vec<(CacheKey, CacheEntry)> {
    let mut slots = self.lock();
    let mut snapshots = Vec::with_capacity(keys.len());
    for key in keys {
      let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
      let snapshot = slot.entry.clone();
      slot.entry = transform(snapshot.clone());
      slot.publish();
      snapshots.push((key.clone(), snapshot));
    }
    snapshots
  }

  /// Restore every snapshotted entry to its exact pre-mutation value and
  /// status, as one atomic operation from the caller's point of view.
  pub fn restore(&self, snapshots: Vec<(CacheKey, CacheEntry)>) {
    let mut slots = self.lock();
    for (key, snapshot) in snapshots {
      let slot = slots.entry(key).or_insert_with(Slot::new);
      slot.entry = snapshot;
      slot.publish();
    }
  }

  /// Replace every affected entry with the server's authoritative payload.
  pub fn commit(&self, keys: &[CacheKey], payload: &Value) {
    let mut slots = self.lock();
    for key in keys {
      let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
      slot.entry.data = Some(payload.clone());
      slot.entry.status = EntryStatus::Success;
      slot.entry.last_success_at = Some(Utc::now());
      slot.entry.error = None;
      slot.stale = false;
      slot.publish();
    }
  }
}

/// Live binding from a consumer to a cache key.
///
/// Holds the latest entry and resolves `changed()` whenever the entry is
/// rewritten. Dropping the subscription releases the reference count that
/// keeps the entry alive.
pub struct Subscription {
  rx: watch::Receiver<CacheEntry>,
  _guard: SubscriptionGuard,
}

impl Subscription {
  /// The entry as of now.
  pub fn entry(&self) -> CacheEntry {
    self.rx.borrow().clone()
  }

  /// Wait for the next write to this key and return the new entry.
  /// Returns `None` if the entry was evicted out from under us (only
  /// possible once this subscription's own guard no longer pins it).
  pub async fn changed(&mut self) -> Option<CacheEntry> {
    self.rx.changed().await.ok()?;
    Some(self.rx.borrow_and_update().clone())
  }
}

struct SubscriptionGuard {
  slots: Arc<Mutex<Slots>>,
  key: CacheKey,
}

impl Drop for SubscriptionGuard {
  fn drop(&mut self) {
    if let Ok(mut slots) = self.slots.lock() {
      if let Some(slot) = slots.get_mut(&self.key) {
        slot.subscribers = slot.subscribers.saturating_sub(1);
        if slot.subscribers == 0 {
          slot.idle_since = Some(Instant::now());
        }
      }
    }
  }
}
