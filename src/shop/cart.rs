//! Cart queries and optimistic cart mutations.
//!
//! Every cart write follows the same shape: guess the server's answer
//! locally (append the line, bump the totals), publish the guess, send
//! the request, and let the commit replace the guess with the server's
//! cart. A rejected write reverts the guess entirely.

use crate::cache::{CacheEntry, Subscription};
use crate::client::{RequestSpec, Transport};
use crate::error::ApiError;
use crate::mutation::{Mutation, MutationController};
use crate::query::{QueryController, QuerySpec};

use super::api_types::{
  self, AddItemRequest, ApplyPromoRequest, CheckoutRequest, UpdateQuantityRequest,
};
use super::keys;
use super::types::{Cart, CartItem, DealerOrder};

/// Apply a pure edit to the cart payload inside an entry. Entries that do
/// not hold a decodable cart pass through untouched — there is nothing to
/// speculate on before the first fetch lands.
fn edit_cart(mut entry: CacheEntry, edit: impl Fn(&mut Cart)) -> CacheEntry {
  if let Some(mut cart) = entry.decode::<Cart>() {
    edit(&mut cart);
    if let Ok(value) = serde_json::to_value(&cart) {
      entry.data = Some(value);
    }
  }
  entry
}

/// Typed facade over the controllers for the session cart.
pub struct CartApi<T: Transport> {
  queries: QueryController<T>,
  mutations: MutationController<T>,
  stale_for: chrono::Duration,
}

impl<T: Transport> CartApi<T> {
  pub(crate) fn new(
    queries: QueryController<T>,
    mutations: MutationController<T>,
    stale_for: chrono::Duration,
  ) -> Self {
    Self {
      queries,
      mutations,
      stale_for,
    }
  }

  pub fn query(&self) -> QuerySpec {
    QuerySpec::new(keys::cart(), RequestSpec::get("/cart"), self.stale_for)
  }

  pub fn subscribe(&self) -> Subscription {
    self.queries.subscribe(&self.query())
  }

  pub fn read(&self) -> Option<Cart> {
    self.queries.read(&keys::cart()).and_then(|entry| entry.decode())
  }

  pub fn refetch(&self) {
    self.queries.refetch(&self.query());
  }

  /// Add a vehicle to the cart. The optimistic line carries a pending id
  /// until the server assigns the real one on commit.
  pub async fn add_item(
    &self,
    vehicle_id: &str,
    description: &str,
    quantity: u32,
    unit_price: u64,
  ) -> Result<Cart, ApiError> {
    let request = RequestSpec::post(
      "/cart/items",
      api_types::body(&AddItemRequest {
        vehicle_id,
        quantity,
      }),
    );

    let vehicle_id = vehicle_id.to_string();
    let description = description.to_string();
    let mutation = Mutation::new(request).with_optimistic(vec![keys::cart()], move |entry| {
      edit_cart(entry, |cart| {
        cart.items.push(CartItem {
          id: format!("pending-{}", vehicle_id),
          vehicle_id: vehicle_id.clone(),
          description: description.clone(),
          quantity,
          unit_price,
        });
        cart.recalculate();
      })
    });

    self.run(mutation).await
  }

  pub async fn update_quantity(&self, item_id: &str, quantity: u32) -> Result<Cart, ApiError> {
    let request = RequestSpec::patch(
      format!("/cart/items/{}", item_id),
      api_types::body(&UpdateQuantityRequest { quantity }),
    );

    let item_id = item_id.to_string();
    let mutation = Mutation::new(request).with_optimistic(vec![keys::cart()], move |entry| {
      edit_cart(entry, |cart| {
        if let Some(item) = cart.items.iter_mut().find(|i| i.id == item_id) {
          item.quantity = quantity;
        }
        cart.recalculate();
      })
    });

    self.run(mutation).await
  }

  pub async fn remove_item(&self, item_id: &str) -> Result<Cart, ApiError> {
    let request = RequestSpec::delete(format!("/cart/items/{}", item_id));

    let item_id = item_id.to_string();
    let mutation = Mutation::new(request).with_optimistic(vec![keys::cart()], move |entry| {
      edit_cart(entry, |cart| {
        cart.items.retain(|i| i.id != item_id);
        cart.recalculate();
      })
    });

    self.run(mutation).await
  }

  /// Apply a promo code. Only the code itself is guessed — the discount
  /// amount is the server's call, and an expired or invalid code comes
  /// back as a business-rule violation that reverts the guess.
  pub async fn apply_promo(&self, code: &str) -> Result<Cart, ApiError> {
    let request = RequestSpec::post("/cart/promo", api_types::body(&ApplyPromoRequest { code }));

    let code = code.to_string();
    let mutation = Mutation::new(request).with_optimistic(vec![keys::cart()], move |entry| {
      edit_cart(entry, |cart| {
        cart.promo_code = Some(code.clone());
      })
    });

    self.run(mutation).await
  }

  /// Submit the cart as an order. There is no credible speculation for an
  /// order confirmation, so the affected set is empty; success invalidates
  /// the cart and every order listing so both refetch on next view.
  pub async fn checkout(&self, request: CheckoutRequest) -> Result<DealerOrder, ApiError> {
    let mutation = Mutation::new(RequestSpec::post("/checkout", api_types::body(&request)))
      .invalidating(vec![keys::cart(), keys::all_order_lists()]);

    let payload = self.mutations.run(mutation).await?;
    serde_json::from_value(payload).map_err(ApiError::parse_failure)
  }

  async fn run(&self, mutation: Mutation) -> Result<Cart, ApiError> {
    let payload = self.mutations.run(mutation).await?;
    serde_json::from_value(payload).map_err(ApiError::parse_failure)
  }
}
