//! Domain types for the storefront.
//!
//! These round-trip through the type-erased cache as JSON, so they carry
//! serde derives and mirror the service's camelCase wire shape directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Drivetrain of a catalog vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Powertrain {
  Gasoline,
  Hybrid,
  Electric,
}

impl Powertrain {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Gasoline => "gasoline",
      Self::Hybrid => "hybrid",
      Self::Electric => "electric",
    }
  }
}

/// Catalog listing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSummary {
  pub id: String,
  pub model: String,
  pub trim: String,
  pub powertrain: Powertrain,
  pub base_price: u64,
}

/// A single configurable option on a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleOption {
  pub code: String,
  pub name: String,
  pub price: u64,
}

/// Full vehicle details for the configuration page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
  pub id: String,
  pub model: String,
  pub trim: String,
  pub powertrain: Powertrain,
  pub base_price: u64,
  pub description: Option<String>,
  #[serde(default)]
  pub options: Vec<VehicleOption>,
}

/// Price quote for one vehicle + option-code configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
  pub vehicle_id: String,
  #[serde(default)]
  pub option_codes: Vec<String>,
  pub base_price: u64,
  pub options_price: u64,
  pub destination_fee: u64,
  pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
  pub id: String,
  pub vehicle_id: String,
  pub description: String,
  pub quantity: u32,
  pub unit_price: u64,
}

/// The session cart as the server last confirmed it (or as an optimistic
/// edit guessed it, until the server answers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
  pub id: String,
  #[serde(default)]
  pub items: Vec<CartItem>,
  pub item_count: u32,
  pub subtotal: u64,
  #[serde(default)]
  pub discount: u64,
  pub total: u64,
  pub promo_code: Option<String>,
}

impl Cart {
  /// Rederive the totals from the line items. Optimistic edits call this
  /// after touching `items`; the server's own math replaces the result as
  /// soon as the mutation commits.
  pub fn recalculate(&mut self) {
    self.item_count = self.items.iter().map(|i| i.quantity).sum();
    self.subtotal = self
      .items
      .iter()
      .map(|i| u64::from(i.quantity) * i.unit_price)
      .sum();
    self.total = self.subtotal.saturating_sub(self.discount);
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Placed,
  Confirmed,
  InProduction,
  InTransit,
  Delivered,
  Cancelled,
}

impl std::fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      Self::Placed => "placed",
      Self::Confirmed => "confirmed",
      Self::InProduction => "in_production",
      Self::InTransit => "in_transit",
      Self::Delivered => "delivered",
      Self::Cancelled => "cancelled",
    };
    write!(f, "{}", label)
  }
}

/// One step of an order's progress, rendered by the tracking view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
  pub status: OrderStatus,
  pub note: Option<String>,
  pub at: DateTime<Utc>,
}

/// Listing row in the dealer order-management view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
  pub id: String,
  pub customer_name: String,
  pub vehicle: String,
  pub status: OrderStatus,
  pub total: u64,
  pub placed_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Full order details with tracking history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerOrder {
  pub id: String,
  pub dealer_id: String,
  pub customer_name: String,
  #[serde(default)]
  pub items: Vec<CartItem>,
  pub status: OrderStatus,
  pub total: u64,
  pub placed_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub tracking: Vec<TrackingEvent>,
}
