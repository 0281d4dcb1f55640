//! Application configuration.
//!
//! Everything the core consumes is tunable here: the remote service base
//! address, the executor's deadline and retry knobs, per-query-kind
//! staleness windows, and the cache GC idle window. Every knob except the
//! base address defaults in code, so a minimal file is one line.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::client::parse_base_url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

/// Remote service address and request-execution tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base address of the remote order/cart service.
  #[serde(deserialize_with = "deserialize_base_url")]
  pub base_url: Url,
  /// Overall call deadline in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Total attempts for retriable failures.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Base for the linear inter-attempt delay, in milliseconds.
  #[serde(default = "default_retry_base_delay_ms")]
  pub retry_base_delay_ms: u64,
}

/// Staleness windows per query kind, plus the eviction window for entries
/// nobody subscribes to anymore.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Catalog data changes rarely; keep it fresh for longer.
  #[serde(default = "default_catalog_stale_ms")]
  pub catalog_stale_ms: u64,
  /// The cart is the most contended resource; refresh eagerly.
  #[serde(default = "default_cart_stale_ms")]
  pub cart_stale_ms: u64,
  #[serde(default = "default_orders_stale_ms")]
  pub orders_stale_ms: u64,
  /// How long an entry with zero subscribers survives before eviction.
  #[serde(default = "default_gc_idle_ms")]
  pub gc_idle_ms: u64,
}

fn default_timeout_ms() -> u64 {
  30_000
}

fn default_max_retries() -> u32 {
  3
}

fn default_retry_base_delay_ms() -> u64 {
  1_000
}

fn default_catalog_stale_ms() -> u64 {
  10 * 60 * 1_000
}

fn default_cart_stale_ms() -> u64 {
  2 * 60 * 1_000
}

fn default_orders_stale_ms() -> u64 {
  5 * 60 * 1_000
}

fn default_gc_idle_ms() -> u64 {
  5 * 60 * 1_000
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      catalog_stale_ms: default_catalog_stale_ms(),
      cart_stale_ms: default_cart_stale_ms(),
      orders_stale_ms: default_orders_stale_ms(),
      gc_idle_ms: default_gc_idle_ms(),
    }
  }
}

fn deserialize_base_url<'de, D>(deserializer: D) -> std::result::Result<Url, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = String::deserialize(deserializer)?;
  parse_base_url(&raw).map_err(serde::de::Error::custom)
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }

  pub fn retry_base_delay(&self) -> Duration {
    Duration::from_millis(self.retry_base_delay_ms)
  }
}

impl CacheConfig {
  pub fn catalog_stale(&self) -> chrono::Duration {
    chrono::Duration::milliseconds(self.catalog_stale_ms as i64)
  }

  pub fn cart_stale(&self) -> chrono::Duration {
    chrono::Duration::milliseconds(self.cart_stale_ms as i64)
  }

  pub fn orders_stale(&self) -> chrono::Duration {
    chrono::Duration::milliseconds(self.orders_stale_ms as i64)
  }

  pub fn gc_idle(&self) -> Duration {
    Duration::from_millis(self.gc_idle_ms)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./showroom.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/showroom/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/showroom/config.yaml\n\
                 with at least `api.base_url`."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("showroom.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("showroom").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Programmatic configuration with defaults for everything but the base
  /// address. Used by embedding applications and tests.
  pub fn for_base_url(raw: &str) -> Result<Self> {
    Ok(Self {
      api: ApiConfig {
        base_url: parse_base_url(raw)?,
        timeout_ms: default_timeout_ms(),
        max_retries: default_max_retries(),
        retry_base_delay_ms: default_retry_base_delay_ms(),
      },
      cache: CacheConfig::default(),
    })
  }

  /// Session token for the remote service, if the environment carries one.
  /// Anonymous browsing works without it; cart and order calls need it.
  pub fn session_token() -> Option<String> {
    std::env::var("SHOWROOM_API_TOKEN").ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn minimal_file_gets_defaults() {
    let config: Config =
      serde_yaml::from_str("api:\n  base_url: https://api.example.test/v1\n").unwrap();

    assert_eq!(config.api.base_url.as_str(), "https://api.example.test/v1/");
    assert_eq!(config.api.timeout(), Duration::from_millis(30_000));
    assert_eq!(config.api.max_retries, 3);
    assert_eq!(config.api.retry_base_delay(), Duration::from_millis(1_000));
    assert_eq!(config.cache.gc_idle(), Duration::from_millis(300_000));
    assert_eq!(config.cache.cart_stale(), chrono::Duration::minutes(2));
  }

  #[test]
  fn overrides_are_respected() {
    let config: Config = serde_yaml::from_str(
      "api:\n  base_url: https://api.example.test/v1\n  timeout_ms: 5000\n  max_retries: 1\ncache:\n  cart_stale_ms: 0\n",
    )
    .unwrap();

    assert_eq!(config.api.timeout(), Duration::from_millis(5_000));
    assert_eq!(config.api.max_retries, 1);
    assert_eq!(config.cache.cart_stale_ms, 0);
    // Untouched knobs keep their defaults.
    assert_eq!(config.cache.orders_stale(), chrono::Duration::minutes(5));
  }
}
