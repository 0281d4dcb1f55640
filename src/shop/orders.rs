//! Dealer order management and order tracking.
//!
//! Listings are per-dealer, optionally filtered by status, and paginated.
//! Status changes are optimistic on the order-detail entry; the listing
//! family is invalidated on commit so the management view refetches on
//! its next access instead of holding a stale row.

use crate::cache::{CacheEntry, Subscription};
use crate::client::{RequestSpec, Transport};
use crate::error::ApiError;
use crate::mutation::{Mutation, MutationController};
use crate::query::{QueryController, QuerySpec};

use super::api_types::{self, UpdateStatusRequest};
use super::keys;
use super::types::{DealerOrder, OrderStatus, OrderSummary};

/// Page size for order listings.
const ORDERS_PAGE_SIZE: u32 = 50;

/// Listing filter for the dealer view.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
  pub status: Option<OrderStatus>,
}

impl OrderFilter {
  pub(crate) fn params(&self) -> Vec<(String, Option<String>)> {
    vec![("status".into(), self.status.map(|s| s.to_string()))]
  }
}

/// Apply a pure edit to the order payload inside an entry.
fn edit_order(mut entry: CacheEntry, edit: impl Fn(&mut DealerOrder)) -> CacheEntry {
  if let Some(mut order) = entry.decode::<DealerOrder>() {
    edit(&mut order);
    if let Ok(value) = serde_json::to_value(&order) {
      entry.data = Some(value);
    }
  }
  entry
}

/// Typed facade over the controllers for dealer orders.
pub struct OrdersApi<T: Transport> {
  queries: QueryController<T>,
  mutations: MutationController<T>,
  stale_for: chrono::Duration,
}

impl<T: Transport> OrdersApi<T> {
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

  pub fn list_query(&self, dealer_id: &str, filter: &OrderFilter) -> QuerySpec {
    let mut request = RequestSpec::get("/orders")
      .with_query("dealerId", Some(dealer_id))
      .with_page_size(ORDERS_PAGE_SIZE);
    for (name, value) in filter.params() {
      request = request.with_query(name, value);
    }
    QuerySpec::new(keys::order_list(dealer_id, filter), request, self.stale_for)
  }

  pub fn subscribe_list(&self, dealer_id: &str, filter: &OrderFilter) -> Subscription {
    self.queries.subscribe(&self.list_query(dealer_id, filter))
  }

  pub fn read_list(&self, dealer_id: &str, filter: &OrderFilter) -> Option<Vec<OrderSummary>> {
    self
      .queries
      .read(&keys::order_list(dealer_id, filter))
      .and_then(|entry| entry.decode())
  }

  pub fn detail_query(&self, order_id: &str) -> QuerySpec {
    QuerySpec::new(
      keys::order_detail(order_id),
      RequestSpec::get(format!("/orders/{}", order_id)),
      self.stale_for,
    )
  }

  pub fn subscribe_detail(&self, order_id: &str) -> Subscription {
    self.queries.subscribe(&self.detail_query(order_id))
  }

  pub fn read_detail(&self, order_id: &str) -> Option<DealerOrder> {
    self
      .queries
      .read(&keys::order_detail(order_id))
      .and_then(|entry| entry.decode())
  }

  pub fn refetch_list(&self, dealer_id: &str, filter: &OrderFilter) {
    self.queries.refetch(&self.list_query(dealer_id, filter));
  }

  /// Move an order to a new status. The detail entry flips immediately;
  /// the dealer's listings are marked stale once the server confirms.
  pub async fn update_status(
    &self,
    dealer_id: &str,
    order_id: &str,
    status: OrderStatus,
  ) -> Result<DealerOrder, ApiError> {
    let request = RequestSpec::patch(
      format!("/orders/{}/status", order_id),
      api_types::body(&UpdateStatusRequest { status }),
    );
    self.run_status_change(dealer_id, order_id, status, request).await
  }

  /// Cancel an order. Same optimistic shape as a status change.
  pub async fn cancel(&self, dealer_id: &str, order_id: &str) -> Result<DealerOrder, ApiError> {
    let request = RequestSpec::post(
      format!("/orders/{}/cancel", order_id),
      serde_json::json!({}),
    );
    self
      .run_status_change(dealer_id, order_id, OrderStatus::Cancelled, request)
      .await
  }

  async fn run_status_change(
    &self,
    dealer_id: &str,
    order_id: &str,
    status: OrderStatus,
    request: RequestSpec,
  ) -> Result<DealerOrder, ApiError> {
    let mutation = Mutation::new(request)
      .with_optimistic(vec![keys::order_detail(order_id)], move |entry| {
        edit_order(entry, |order| {
          order.status = status;
        })
      })
      .invalidating(vec![keys::dealer_orders(dealer_id)]);

    let payload = self.mutations.run(mutation).await?;
    serde_json::from_value(payload).map_err(ApiError::parse_failure)
  }
}
