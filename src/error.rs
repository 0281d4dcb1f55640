//! Classified errors for remote calls and cache operations.
//!
//! Every failure surfaced by the data layer is one of these tagged values.
//! The executor decides retry eligibility from the classification alone;
//! callers match on the variant instead of inspecting strings.

use serde::Deserialize;
use thiserror::Error;

/// A structured error from the remote order/cart service or the transport
/// underneath it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
  /// 400-class response with field-level validation details.
  #[error("{message}")]
  Validation {
    message: String,
    details: Option<serde_json::Value>,
  },

  /// 404 - the requested resource does not exist.
  #[error("not found: {message}")]
  NotFound { message: String },

  /// 403 - the session is not allowed to perform the operation.
  #[error("forbidden: {message}")]
  Forbidden { message: String },

  /// 400-class response carrying a domain rule code such as
  /// `out_of_stock` or `promo_expired`. Never retried.
  #[error("{message} ({code})")]
  BusinessRule {
    message: String,
    code: String,
    details: Option<serde_json::Value>,
  },

  /// The call deadline fired before a response arrived. Synthetic 408.
  #[error("request timed out after {timeout_ms} ms")]
  Timeout { timeout_ms: u64 },

  /// 5xx response, or a response body that failed to parse.
  #[error("server error: {message}")]
  Server {
    message: String,
    code: Option<String>,
  },

  /// No response was received at all (connect failure, reset, DNS).
  #[error("network error: {message}")]
  Network { message: String },

  /// Every allowed attempt failed with a retriable error. Synthetic 503
  /// wrapping the final cause.
  #[error("request failed after {attempts} attempts: {source}")]
  MaxRetriesExceeded {
    attempts: u32,
    #[source]
    source: Box<ApiError>,
  },
}

/// Wire shape of an error response body from the service.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
  #[serde(default)]
  pub message: String,
  pub code: Option<String>,
  pub details: Option<serde_json::Value>,
}

impl ApiError {
  /// HTTP status code this classification maps to. Synthetic kinds use
  /// 408 (timeout) and 503 (retries exhausted); a network failure that
  /// never saw a response has none.
  pub fn status_code(&self) -> Option<u16> {
    match self {
      Self::Validation { .. } | Self::BusinessRule { .. } => Some(400),
      Self::Forbidden { .. } => Some(403),
      Self::NotFound { .. } => Some(404),
      Self::Timeout { .. } => Some(408),
      Self::Server { .. } => Some(500),
      Self::Network { .. } => None,
      Self::MaxRetriesExceeded { .. } => Some(503),
    }
  }

  /// Domain or diagnostic code, when the service supplied one.
  pub fn code(&self) -> Option<&str> {
    match self {
      Self::BusinessRule { code, .. } => Some(code),
      Self::Server { code, .. } => code.as_deref(),
      _ => None,
    }
  }

  /// Whether the executor may issue another attempt for this failure.
  /// Only transport-level trouble qualifies; everything the service
  /// decided on purpose is terminal.
  pub fn is_retriable(&self) -> bool {
    matches!(self, Self::Network { .. } | Self::Server { .. })
  }

  /// Classify a non-success HTTP response.
  ///
  /// The body is decoded as `{ message, code, details }` when possible;
  /// otherwise the raw text becomes the message. 400-class responses with
  /// a domain code are business-rule violations, the rest are validation
  /// failures.
  pub fn from_response(status: u16, body: &str) -> Self {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_else(|_| ErrorBody {
      message: body.trim().to_string(),
      code: None,
      details: None,
    });

    let message = if parsed.message.is_empty() {
      format!("request failed with status {}", status)
    } else {
      parsed.message
    };

    match status {
      403 => Self::Forbidden { message },
      404 => Self::NotFound { message },
      400..=499 => match parsed.code {
        Some(code) => Self::BusinessRule {
          message,
          code,
          details: parsed.details,
        },
        None => Self::Validation {
          message,
          details: parsed.details,
        },
      },
      _ => Self::Server {
        message,
        code: parsed.code,
      },
    }
  }

  /// A parse failure on a body the service claimed was a success.
  pub fn parse_failure(err: impl std::fmt::Display) -> Self {
    Self::Server {
      message: format!("failed to parse response body: {}", err),
      code: Some("parse_error".to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_by_status_and_code() {
    let err = ApiError::from_response(404, r#"{"message":"no such order"}"#);
    assert_eq!(err, ApiError::NotFound { message: "no such order".into() });

    let err = ApiError::from_response(403, "{}");
    assert!(matches!(err, ApiError::Forbidden { .. }));

    let err = ApiError::from_response(400, r#"{"message":"sold out","code":"out_of_stock"}"#);
    assert_eq!(err.code(), Some("out_of_stock"));
    assert!(!err.is_retriable());

    let err = ApiError::from_response(
      400,
      r#"{"message":"invalid","details":{"quantity":"must be positive"}}"#,
    );
    assert!(matches!(err, ApiError::Validation { details: Some(_), .. }));

    let err = ApiError::from_response(502, "bad gateway");
    assert!(err.is_retriable());
    assert_eq!(err.status_code(), Some(500));
  }

  #[test]
  fn non_json_body_becomes_message() {
    let err = ApiError::from_response(500, "Internal Server Error");
    assert_eq!(
      err,
      ApiError::Server {
        message: "Internal Server Error".into(),
        code: None
      }
    );
  }

  #[test]
  fn synthetic_kinds_carry_expected_status() {
    assert_eq!(ApiError::Timeout { timeout_ms: 30_000 }.status_code(), Some(408));

    let exhausted = ApiError::MaxRetriesExceeded {
      attempts: 3,
      source: Box::new(ApiError::Network { message: "connection reset".into() }),
    };
    assert_eq!(exhausted.status_code(), Some(503));
    assert!(!exhausted.is_retriable());

    assert_eq!(ApiError::Network { message: "refused".into() }.status_code(), None);
  }

  #[test]
  fn parse_failure_is_terminal_server_error() {
    let err = ApiError::parse_failure("expected value at line 1");
    assert_eq!(err.code(), Some("parse_error"));
    assert!(matches!(err, ApiError::Server { .. }));
  }
}
