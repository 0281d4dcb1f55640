//! Value-equal keys identifying cached result sets.

use std::collections::BTreeMap;
use std::fmt;

/// One segment of a [`CacheKey`].
///
/// Keys are built from a resource domain, a resource kind, an optional
/// identifier, and an optional parameter set. Parameter sets compare
/// order-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySegment {
  Literal(String),
  Params(BTreeMap<String, String>),
}

impl fmt::Display for KeySegment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Literal(s) => write!(f, "{}", s),
      Self::Params(params) => {
        let joined = params
          .iter()
          .map(|(k, v)| format!("{}={}", k, v))
          .collect::<Vec<_>>()
          .join(",");
        write!(f, "{{{}}}", joined)
      }
    }
  }
}

/// Identifier for one cached result set, compared by deep value equality.
///
/// Two keys built independently from the same segments are the same key;
/// identity plays no part. A shorter key acts as a prefix for invalidating
/// whole families of entries (e.g. every order listing for a dealer).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  segments: Vec<KeySegment>,
}

impl CacheKey {
  /// Build a key from literal segments.
  pub fn of<I, S>(segments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      segments: segments
        .into_iter()
        .map(|s| KeySegment::Literal(s.into()))
        .collect(),
    }
  }

  /// Append a literal segment (an identifier, usually).
  pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
    self.segments.push(KeySegment::Literal(segment.into()));
    self
  }

  /// Append a parameter-set segment. Empty values are dropped so that a
  /// filter left blank and a filter never set produce the same key; an
  /// entirely empty set appends nothing.
  pub fn with_params<I, K, V>(mut self, params: I) -> Self
  where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: Into<String>,
    V: Into<String>,
  {
    let set: BTreeMap<String, String> = params
      .into_iter()
      .filter_map(|(k, v)| {
        let value: String = v?.into();
        if value.is_empty() {
          return None;
        }
        Some((k.into(), value))
      })
      .collect();

    if !set.is_empty() {
      self.segments.push(KeySegment::Params(set));
    }
    self
  }

  /// Whether `prefix`'s segments equal this key's leading segments.
  /// Every key is a prefix of itself.
  pub fn starts_with(&self, prefix: &CacheKey) -> bool {
    prefix.segments.len() <= self.segments.len()
      && self.segments[..prefix.segments.len()] == prefix.segments[..]
  }

  pub fn segments(&self) -> &[KeySegment] {
    &self.segments
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, segment) in self.segments.iter().enumerate() {
      if i > 0 {
        write!(f, ":")?;
      }
      write!(f, "{}", segment)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keys_compare_by_value() {
    let a = CacheKey::of(["shop", "vehicles"]).with_segment("v-100");
    let b = CacheKey::of(["shop", "vehicles"]).with_segment("v-100");
    assert_eq!(a, b);

    let c = CacheKey::of(["shop", "vehicles"]).with_segment("v-101");
    assert_ne!(a, c);
  }

  #[test]
  fn param_sets_are_order_insensitive() {
    let a = CacheKey::of(["shop", "vehicles"])
      .with_params([("model", Some("aurora")), ("powertrain", Some("electric"))]);
    let b = CacheKey::of(["shop", "vehicles"])
      .with_params([("powertrain", Some("electric")), ("model", Some("aurora"))]);
    assert_eq!(a, b);
  }

  #[test]
  fn empty_params_do_not_change_the_key() {
    let bare = CacheKey::of(["shop", "vehicles"]);
    let with_empty =
      CacheKey::of(["shop", "vehicles"]).with_params([("model", None::<String>), ("trim", Some(String::new()))]);
    assert_eq!(bare, with_empty);
  }

  #[test]
  fn prefix_matching() {
    let prefix = CacheKey::of(["orders", "list"]).with_segment("d-7");
    let full = CacheKey::of(["orders", "list"])
      .with_segment("d-7")
      .with_params([("status", Some("placed"))]);

    assert!(full.starts_with(&prefix));
    assert!(full.starts_with(&full));
    assert!(!prefix.starts_with(&full));

    let other_dealer = CacheKey::of(["orders", "list"]).with_segment("d-8");
    assert!(!other_dealer.starts_with(&prefix));
  }

  #[test]
  fn display_is_stable() {
    let key = CacheKey::of(["shop", "pricing"])
      .with_segment("v-100")
      .with_params([("opts", Some("sunroof+tow"))]);
    assert_eq!(key.to_string(), "shop:pricing:v-100:{opts=sunroof+tow}");
  }
}
