//! Request executor for the remote order/cart service.
//!
//! One logical call = build the target URL, send through the transport,
//! classify the outcome, and retry transport-level failures with linear
//! backoff under an overall deadline. The executor is stateless across
//! calls; retry policy and classification live here, above the
//! [`Transport`] seam, so tests can script transport outcomes directly.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::ApiError;

pub use reqwest::Method;

/// A boxed future, the shape trait objects can return.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One remote call as the executor sees it: method, endpoint path, query
/// parameters, optional JSON body, and an optional per-call deadline
/// override.
#[derive(Debug, Clone)]
pub struct RequestSpec {
  pub method: Method,
  pub path: String,
  /// `None` and empty values are omitted from the URL, never sent blank.
  pub query: Vec<(String, Option<String>)>,
  pub body: Option<Value>,
  pub timeout: Option<Duration>,
  /// When set, the endpoint is paginated: the executor repeats the call
  /// with `offset`/`limit` parameters and concatenates the pages.
  pub page_size: Option<u32>,
}

impl RequestSpec {
  fn new(method: Method, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      query: Vec::new(),
      body: None,
      timeout: None,
      page_size: None,
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(Method::GET, path)
  }

  pub fn post(path: impl Into<String>, body: Value) -> Self {
    let mut spec = Self::new(Method::POST, path);
    spec.body = Some(body);
    spec
  }

  pub fn patch(path: impl Into<String>, body: Value) -> Self {
    let mut spec = Self::new(Method::PATCH, path);
    spec.body = Some(body);
    spec
  }

  pub fn delete(path: impl Into<String>) -> Self {
    Self::new(Method::DELETE, path)
  }

  pub fn with_query(mut self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
    self.query.push((name.into(), value.map(Into::into)));
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn with_page_size(mut self, page_size: u32) -> Self {
    self.page_size = Some(page_size);
    self
  }
}

/// What the transport hands to the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
  pub method: Method,
  pub url: Url,
  pub body: Option<Value>,
  pub bearer_token: Option<String>,
}

/// Raw response before classification.
#[derive(Debug, Clone)]
pub struct TransportResponse {
  pub status: u16,
  pub body: String,
}

/// The seam between the executor and the wire. The production impl is
/// [`HttpTransport`]; tests substitute a scripted double.
pub trait Transport: Send + Sync + 'static {
  fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, ApiError>>;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
  fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, ApiError>> {
    (**self).send(request)
  }
}

/// reqwest-backed transport.
#[derive(Clone, Default)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Transport for HttpTransport {
  fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, ApiError>> {
    let client = self.client.clone();
    Box::pin(async move {
      let mut builder = client.request(request.method, request.url);
      if let Some(token) = request.bearer_token {
        builder = builder.bearer_auth(token);
      }
      if let Some(body) = request.body {
        builder = builder.json(&body);
      }

      let response = builder.send().await.map_err(|e| ApiError::Network {
        message: e.to_string(),
      })?;

      let status = response.status().as_u16();
      let body = response.text().await.map_err(|e| ApiError::Network {
        message: e.to_string(),
      })?;

      Ok(TransportResponse { status, body })
    })
  }
}

/// Wire envelope for paginated list endpoints.
#[derive(Debug, Deserialize)]
struct Page {
  #[serde(default)]
  items: Vec<Value>,
  #[serde(default)]
  total: u64,
}

/// Executor for calls against the remote order/cart service.
pub struct ApiClient<T: Transport = HttpTransport> {
  transport: T,
  base_url: Url,
  token: Option<String>,
  timeout: Duration,
  max_retries: u32,
  retry_base_delay: Duration,
}

impl ApiClient<HttpTransport> {
  /// Build the production client from configuration. The session token,
  /// when present in the environment, is attached to every call.
  pub fn new(config: &Config) -> Result<Self> {
    Ok(Self::with_transport(HttpTransport::new(), config))
  }
}

impl<T: Transport> ApiClient<T> {
  pub fn with_transport(transport: T, config: &Config) -> Self {
    Self {
      transport,
      base_url: config.api.base_url.clone(),
      token: Config::session_token(),
      timeout: config.api.timeout(),
      max_retries: config.api.max_retries.max(1),
      retry_base_delay: config.api.retry_base_delay(),
    }
  }

  /// Execute one logical call and return the JSON payload.
  ///
  /// Retriable failures (no response, 5xx) are attempted up to
  /// `max_retries` times with a delay of `base_delay * attempt` between
  /// attempts; exhausting them yields [`ApiError::MaxRetriesExceeded`]
  /// wrapping the final cause. Everything else — 4xx, timeout, a success
  /// body that fails to parse — propagates on first occurrence.
  pub async fn execute(&self, spec: &RequestSpec) -> Result<Value, ApiError> {
    let url = self.build_url(spec)?;
    let timeout = spec.timeout.unwrap_or(self.timeout);
    let mut last_failure: Option<ApiError> = None;

    for attempt in 1..=self.max_retries {
      let request = TransportRequest {
        method: spec.method.clone(),
        url: url.clone(),
        body: spec.body.clone(),
        bearer_token: self.token.clone(),
      };

      debug!(method = %request.method, url = %request.url, attempt, "issuing request");

      let failure = match tokio::time::timeout(timeout, self.transport.send(request)).await {
        // Deadline fired: the in-flight call is dropped, and the timeout
        // classification is terminal.
        Err(_) => {
          return Err(ApiError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
          })
        }
        Ok(Ok(response)) if response.status < 300 => {
          return serde_json::from_str(&response.body).map_err(ApiError::parse_failure);
        }
        Ok(Ok(response)) => ApiError::from_response(response.status, &response.body),
        Ok(Err(network)) => network,
      };

      if !failure.is_retriable() {
        return Err(failure);
      }

      warn!(attempt, error = %failure, "retriable failure");
      if attempt < self.max_retries {
        tokio::time::sleep(self.retry_base_delay * attempt).await;
      }
      last_failure = Some(failure);
    }

    Err(ApiError::MaxRetriesExceeded {
      attempts: self.max_retries,
      // The loop always runs at least once before reaching this point.
      source: Box::new(last_failure.expect("at least one attempt was made")),
    })
  }

  /// Execute, following pagination when the spec asks for it.
  pub async fn fetch(&self, spec: &RequestSpec) -> Result<Value, ApiError> {
    match spec.page_size {
      Some(page_size) => self.execute_paged(spec, page_size).await,
      None => self.execute(spec).await,
    }
  }

  /// Execute and decode the payload into a typed value.
  pub async fn execute_as<D: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<D, ApiError> {
    let value = self.execute(spec).await?;
    serde_json::from_value(value).map_err(ApiError::parse_failure)
  }

  /// Repeated calls with `offset`/`limit` until the reported total is
  /// reached; pages are concatenated into one JSON array.
  async fn execute_paged(&self, spec: &RequestSpec, page_size: u32) -> Result<Value, ApiError> {
    let mut items = Vec::new();
    let mut offset = 0u64;

    loop {
      let page_spec = spec
        .clone()
        .with_query("offset", Some(offset.to_string()))
        .with_query("limit", Some(page_size.to_string()));

      let page: Page =
        serde_json::from_value(self.execute(&page_spec).await?).map_err(ApiError::parse_failure)?;

      let count = page.items.len() as u64;
      items.extend(page.items);

      if count == 0 || offset + count >= page.total {
        break;
      }
      offset += count;
    }

    Ok(Value::Array(items))
  }

  /// Target address from the base, the endpoint path, and the non-empty
  /// query parameters only.
  fn build_url(&self, spec: &RequestSpec) -> Result<Url, ApiError> {
    let mut url = self
      .base_url
      .join(spec.path.trim_start_matches('/'))
      .map_err(|e| ApiError::Validation {
        message: format!("invalid request target '{}': {}", spec.path, e),
        details: None,
      })?;

    {
      let mut pairs = url.query_pairs_mut();
      for (name, value) in &spec.query {
        if let Some(value) = value {
          if !value.is_empty() {
            pairs.append_pair(name, value);
          }
        }
      }
    }

    Ok(url)
  }
}

/// Parse and normalize a base address so endpoint paths join under it
/// instead of replacing its final segment.
pub fn parse_base_url(raw: &str) -> Result<Url> {
  let normalized = if raw.ends_with('/') {
    raw.to_string()
  } else {
    format!("{}/", raw)
  };
  Url::parse(&normalized).map_err(|e| eyre!("invalid service base address '{}': {}", raw, e))
}

#[cfg(test)]
pub(crate) mod testing {
  //! Scripted transport double shared by executor, query, and mutation
  //! tests.

  use super::*;
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Mutex;

  pub(crate) enum Step {
    Respond {
      status: u16,
      body: String,
      delay: Duration,
    },
    Fail {
      error: ApiError,
      delay: Duration,
    },
    /// Never resolves; the executor's deadline has to fire.
    Hang,
  }

  impl Step {
    pub(crate) fn ok(body: Value) -> Self {
      Step::Respond {
        status: 200,
        body: body.to_string(),
        delay: Duration::ZERO,
      }
    }

    pub(crate) fn ok_after(delay: Duration, body: Value) -> Self {
      Step::Respond {
        status: 200,
        body: body.to_string(),
        delay,
      }
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
      Step::Respond {
        status,
        body: body.to_string(),
        delay: Duration::ZERO,
      }
    }

    pub(crate) fn status_after(delay: Duration, status: u16, body: &str) -> Self {
      Step::Respond {
        status,
        body: body.to_string(),
        delay,
      }
    }

    pub(crate) fn network_error() -> Self {
      Step::Fail {
        error: ApiError::Network {
          message: "connection refused".into(),
        },
        delay: Duration::ZERO,
      }
    }
  }

  #[derive(Default)]
  pub(crate) struct FakeTransport {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    requests: Mutex<Vec<TransportRequest>>,
  }

  impl FakeTransport {
    pub(crate) fn scripted(steps: impl IntoIterator<Item = Step>) -> Self {
      Self {
        script: Mutex::new(steps.into_iter().collect()),
        calls: AtomicU32::new(0),
        requests: Mutex::new(Vec::new()),
      }
    }

    pub(crate) fn calls(&self) -> u32 {
      self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
      self.requests.lock().unwrap().clone()
    }
  }

  impl Transport for FakeTransport {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportResponse, ApiError>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.requests.lock().unwrap().push(request);
      let step = self.script.lock().unwrap().pop_front();

      Box::pin(async move {
        match step {
          Some(Step::Respond { status, body, delay }) => {
            if !delay.is_zero() {
              tokio::time::sleep(delay).await;
            }
            Ok(TransportResponse { status, body })
          }
          Some(Step::Fail { error, delay }) => {
            if !delay.is_zero() {
              tokio::time::sleep(delay).await;
            }
            Err(error)
          }
          Some(Step::Hang) => std::future::pending().await,
          None => Err(ApiError::Network {
            message: "transport script exhausted".into(),
          }),
        }
      })
    }
  }

  pub(crate) fn test_config() -> Config {
    Config::for_base_url("https://api.example.test/v1").expect("static test url")
  }

  pub(crate) fn client(steps: impl IntoIterator<Item = Step>) -> ApiClient<FakeTransport> {
    ApiClient::with_transport(FakeTransport::scripted(steps), &test_config())
  }
}
