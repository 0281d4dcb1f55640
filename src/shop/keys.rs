//! Cache key constructors for shop resources.
//!
//! Keys follow domain : kind : identifier : parameters, so that a shorter
//! key invalidates a whole family: `dealer_orders(d)` covers every
//! filtered listing for that dealer, `vehicles()` covers the entire
//! catalog.

use crate::cache::CacheKey;

use super::catalog::VehicleFilter;
use super::orders::OrderFilter;

/// Prefix covering every catalog entry (listings and details).
pub fn vehicles() -> CacheKey {
  CacheKey::of(["shop", "vehicles"])
}

pub fn vehicle_list(filter: &VehicleFilter) -> CacheKey {
  CacheKey::of(["shop", "vehicles", "list"]).with_params(filter.params())
}

pub fn vehicle_detail(vehicle_id: &str) -> CacheKey {
  CacheKey::of(["shop", "vehicles", "detail"]).with_segment(vehicle_id)
}

/// A quote is keyed by vehicle and the sorted option-code set, so the
/// same configuration reached through any click order shares one entry.
pub fn price_quote(vehicle_id: &str, option_codes: &[String]) -> CacheKey {
  let mut codes: Vec<&str> = option_codes.iter().map(String::as_str).collect();
  codes.sort_unstable();
  CacheKey::of(["shop", "pricing"])
    .with_segment(vehicle_id)
    .with_params([("options", Some(codes.join("+")))])
}

/// The session cart. One per store instance.
pub fn cart() -> CacheKey {
  CacheKey::of(["shop", "cart"])
}

/// Prefix covering every order listing for a dealer, whatever the filter.
pub fn dealer_orders(dealer_id: &str) -> CacheKey {
  CacheKey::of(["orders", "list"]).with_segment(dealer_id)
}

/// Prefix covering all order listings for all dealers.
pub fn all_order_lists() -> CacheKey {
  CacheKey::of(["orders", "list"])
}

pub fn order_list(dealer_id: &str, filter: &OrderFilter) -> CacheKey {
  dealer_orders(dealer_id).with_params(filter.params())
}

pub fn order_detail(order_id: &str) -> CacheKey {
  CacheKey::of(["orders", "detail"]).with_segment(order_id)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn listings_fall_under_the_dealer_prefix() {
    let filtered = order_list(
      "d-7",
      &OrderFilter {
        status: Some(crate::shop::OrderStatus::Placed),
      },
    );
    let unfiltered = order_list("d-7", &OrderFilter::default());

    assert!(filtered.starts_with(&dealer_orders("d-7")));
    assert!(unfiltered.starts_with(&dealer_orders("d-7")));
    assert!(!filtered.starts_with(&dealer_orders("d-8")));
    assert_ne!(filtered, unfiltered);
  }

  #[test]
  fn detail_keys_do_not_collide_with_listing_keys() {
    let list = vehicle_list(&VehicleFilter::default());
    let detail = vehicle_detail("v-100");
    assert!(!detail.starts_with(&list));
    assert!(detail.starts_with(&vehicles()));
    assert!(list.starts_with(&vehicles()));
  }

  #[test]
  fn quotes_ignore_option_order() {
    let a = price_quote("v-100", &["tow".into(), "sunroof".into()]);
    let b = price_quote("v-100", &["sunroof".into(), "tow".into()]);
    assert_eq!(a, b);
  }
}
