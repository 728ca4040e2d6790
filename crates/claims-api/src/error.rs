//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("{0}")]
  Claims(#[from] claims_core::Error),

  /// A store failure. Any [`claims_core::Error`] in its source chain decides
  /// the response status.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  /// Status code and error name.
  pub fn classify(&self) -> (StatusCode, &'static str) {
    match self {
      Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
      Self::Claims(e) => classify_core(e),
      Self::Store(e) => {
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(e.as_ref());
        while let Some(err) = source {
          if let Some(core) = err.downcast_ref::<claims_core::Error>() {
            return classify_core(core);
          }
          source = err.source();
        }
        (StatusCode::INTERNAL_SERVER_ERROR, "StoreError")
      }
    }
  }
}

fn classify_core(e: &claims_core::Error) -> (StatusCode, &'static str) {
  use claims_core::Error;
  match e {
    Error::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
    Error::Decode(_) | Error::Truncated | Error::Cid(_) => {
      (StatusCode::BAD_REQUEST, "DecodeError")
    }
    Error::Authorization(_) => (StatusCode::FORBIDDEN, "AuthorizationError"),
    Error::Resolution { .. } => (StatusCode::SERVICE_UNAVAILABLE, "ResolutionError"),
    Error::Archive(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ArchiveError"),
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, name) = self.classify();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string(), "name": name }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Error)]
  #[error("wrapped: {0}")]
  struct Wrapper(#[source] claims_core::Error);

  #[test]
  fn status_follows_the_core_error_in_the_chain() {
    let resolution = claims_core::Error::Resolution {
      attempts: 3,
      source:   "timeout".into(),
    };
    let err = ApiError::store(Wrapper(resolution));
    assert_eq!(err.classify(), (StatusCode::SERVICE_UNAVAILABLE, "ResolutionError"));

    let err = ApiError::store(std::io::Error::other("disk full"));
    assert_eq!(err.classify().0, StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn core_errors_map_to_statuses() {
    let cases = [
      (claims_core::Error::Validation("x".into()), StatusCode::BAD_REQUEST),
      (claims_core::Error::Decode("x".into()), StatusCode::BAD_REQUEST),
      (claims_core::Error::Authorization("x".into()), StatusCode::FORBIDDEN),
      (claims_core::Error::Archive("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).classify().0, status);
    }
  }
}
