//! Catalog browsing and configuration pricing.
//!
//! Read-only queries: vehicle listings (filtered, paginated), vehicle
//! details, and price quotes for a configuration. Catalog data changes
//! rarely, so these run on the longest staleness window.

use crate::cache::Subscription;
use crate::client::{RequestSpec, Transport};
use crate::query::{QueryController, QuerySpec};

use super::keys;
use super::types::{Powertrain, PriceQuote, Vehicle, VehicleSummary};

/// Page size for catalog listings.
const CATALOG_PAGE_SIZE: u32 = 50;

/// Listing filter. Unset fields are omitted from both the cache key and
/// the request, so "no filter" and "filter cleared" are the same query.
#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
  pub model: Option<String>,
  pub trim: Option<String>,
  pub powertrain: Option<Powertrain>,
}

impl VehicleFilter {
  pub(crate) fn params(&self) -> Vec<(String, Option<String>)> {
    vec![
      ("model".into(), self.model.clone()),
      ("trim".into(), self.trim.clone()),
      (
        "powertrain".into(),
        self.powertrain.map(|p| p.as_str().to_string()),
      ),
    ]
  }
}

/// Typed facade over the query controller for catalog resources.
pub struct CatalogApi<T: Transport> {
  queries: QueryController<T>,
  stale_for: chrono::Duration,
}

impl<T: Transport> CatalogApi<T> {
  pub(crate) fn new(queries: QueryController<T>, stale_for: chrono::Duration) -> Self {
    Self { queries, stale_for }
  }

  pub fn vehicles_query(&self, filter: &VehicleFilter) -> QuerySpec {
    let mut request = RequestSpec::get("/vehicles").with_page_size(CATALOG_PAGE_SIZE);
    for (name, value) in filter.params() {
      request = request.with_query(name, value);
    }
    QuerySpec::new(keys::vehicle_list(filter), request, self.stale_for)
  }

  pub fn subscribe_vehicles(&self, filter: &VehicleFilter) -> Subscription {
    self.queries.subscribe(&self.vehicles_query(filter))
  }

  pub fn read_vehicles(&self, filter: &VehicleFilter) -> Option<Vec<VehicleSummary>> {
    self
      .queries
      .read(&keys::vehicle_list(filter))
      .and_then(|entry| entry.decode())
  }

  pub fn vehicle_query(&self, vehicle_id: &str) -> QuerySpec {
    QuerySpec::new(
      keys::vehicle_detail(vehicle_id),
      RequestSpec::get(format!("/vehicles/{}", vehicle_id)),
      self.stale_for,
    )
  }

  pub fn subscribe_vehicle(&self, vehicle_id: &str) -> Subscription {
    self.queries.subscribe(&self.vehicle_query(vehicle_id))
  }

  pub fn read_vehicle(&self, vehicle_id: &str) -> Option<Vehicle> {
    self
      .queries
      .read(&keys::vehicle_detail(vehicle_id))
      .and_then(|entry| entry.decode())
  }

  /// Price quote for a vehicle and a set of option codes. The code set is
  /// sorted into the key and the request, so equivalent configurations
  /// share one cache entry.
  pub fn quote_query(&self, vehicle_id: &str, option_codes: &[String]) -> QuerySpec {
    let mut codes: Vec<&str> = option_codes.iter().map(String::as_str).collect();
    codes.sort_unstable();

    QuerySpec::new(
      keys::price_quote(vehicle_id, option_codes),
      RequestSpec::get(format!("/pricing/{}", vehicle_id))
        .with_query("options", Some(codes.join("+"))),
      self.stale_for,
    )
  }

  pub fn subscribe_quote(&self, vehicle_id: &str, option_codes: &[String]) -> Subscription {
    self.queries.subscribe(&self.quote_query(vehicle_id, option_codes))
  }

  pub fn read_quote(&self, vehicle_id: &str, option_codes: &[String]) -> Option<PriceQuote> {
    self
      .queries
      .read(&keys::price_quote(vehicle_id, option_codes))
      .and_then(|entry| entry.decode())
  }

  pub fn refetch_vehicles(&self, filter: &VehicleFilter) {
    self.queries.refetch(&self.vehicles_query(filter));
  }
}
