//! Storefront domain layer.
//!
//! Typed facades over the query and mutation controllers, one per
//! resource family:
//! - [`catalog`] - vehicle browsing and configuration pricing
//! - [`cart`] - the session cart with optimistic edits
//! - [`orders`] - dealer order management and tracking
//!
//! Payloads cross the cache as JSON values; these modules are where they
//! regain their domain shape.

pub mod api_types;
pub mod catalog;
pub mod cart;
pub mod keys;
pub mod orders;
pub mod types;

pub use api_types::{CheckoutRequest, PaymentMethod};
pub use catalog::{CatalogApi, VehicleFilter};
pub use cart::CartApi;
pub use orders::{OrderFilter, OrdersApi};
pub use types::{
  Cart, CartItem, DealerOrder, OrderStatus, OrderSummary, Powertrain, PriceQuote, TrackingEvent,
  Vehicle, VehicleOption, VehicleSummary,
};
