//! Serde-serializable request bodies for the order/cart service.
//!
//! These mirror the wire contract and stay separate from the domain types
//! in [`super::types`], which model what the rest of the application
//! consumes.

use serde::Serialize;
use serde_json::Value;

use super::types::OrderStatus;

/// Serialize a request body. Wire types are plain data, so this cannot
/// fail in practice; a `Null` body would surface server-side as a
/// validation error rather than panic the client.
pub(crate) fn body<T: Serialize>(request: &T) -> Value {
  serde_json::to_value(request).unwrap_or(Value::Null)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest<'a> {
  pub vehicle_id: &'a str,
  pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
  pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPromoRequest<'a> {
  pub code: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
  Cash,
  Financing,
  Lease,
}

/// Checkout submission. The cart itself is server-side state; the body
/// only carries what the cart does not already know.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
  pub dealer_id: String,
  pub customer_name: String,
  pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
  pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn request_bodies_use_the_wire_casing() {
    let add = body(&AddItemRequest {
      vehicle_id: "v-100",
      quantity: 1,
    });
    assert_eq!(add, json!({"vehicleId": "v-100", "quantity": 1}));

    let checkout = body(&CheckoutRequest {
      dealer_id: "d-7".into(),
      customer_name: "Ada Lovelace".into(),
      payment_method: PaymentMethod::Financing,
    });
    assert_eq!(checkout["dealerId"], "d-7");
    assert_eq!(checkout["paymentMethod"], "financing");

    let status = body(&UpdateStatusRequest {
      status: OrderStatus::InTransit,
    });
    assert_eq!(status, json!({"status": "in_transit"}));
  }
}
