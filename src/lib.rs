//! Client-side data layer for a vehicle-ordering storefront.
//!
//! The UI renders; this crate fetches, caches, and writes. It is built
//! around four pieces:
//!
//! - [`client`] - the request executor: one logical call with a deadline,
//!   linear-backoff retries for transport failures, and classified errors
//! - [`cache`] - the keyed store of server-derived entries, with watch
//!   subscriptions, invalidation, and reference-counted eviction
//! - [`query`] - per-key fetch lifecycle: de-duplication and
//!   staleness-driven background refresh
//! - [`mutation`] - optimistic writes: snapshot, speculative apply,
//!   commit-or-rollback
//!
//! [`session::Storefront`] owns one instance of everything and hands out
//! the typed facades in [`shop`]: catalog browsing, the session cart, and
//! dealer order management.
//!
//! # Example
//!
//! ```ignore
//! let config = showroom::Config::load(None)?;
//! let session = showroom::Storefront::new(config)?;
//!
//! let cart = session.cart();
//! let mut sub = cart.subscribe();
//!
//! // Optimistic: subscribers see the new line before the server answers.
//! cart.add_item("v-100", "Aurora GT", 1, 50_000).await?;
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod mutation;
pub mod query;
pub mod session;
pub mod shop;

pub use cache::{CacheEntry, CacheKey, CacheStore, EntryStatus, Subscription};
pub use client::{ApiClient, HttpTransport, Method, RequestSpec, Transport};
pub use config::Config;
pub use error::ApiError;
pub use mutation::{Mutation, MutationController, MutationState};
pub use query::{QueryController, QuerySpec};
pub use session::Storefront;
