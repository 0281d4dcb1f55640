//! Session-scoped resource cache.
//!
//! This module provides the storage half of the data layer:
//! - Value-equal [`CacheKey`]s with prefix matching for invalidation
//! - A keyed [`CacheStore`] of JSON entries with watch-channel
//!   subscriptions, stale-while-error semantics, and reference-counted
//!   eviction
//!
//! Fetch scheduling lives in [`crate::query`]; the optimistic write
//! protocol lives in [`crate::mutation`].

mod key;
mod store;

pub use key::{CacheKey, KeySegment};
pub use store::{CacheEntry, CacheStore, EntryStatus, Subscription};
