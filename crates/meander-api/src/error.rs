//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use meander_core::{EngineError, Error as CoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Collapse an engine error into an HTTP classification.
  ///
  /// `RouteNotActive` reads as 404: from the caller's point of view there is
  /// no active route to mutate, and the distinction leaks nothing.
  pub fn from_engine<E>(e: EngineError<E>) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    match e {
      EngineError::Domain(d) => match d {
        CoreError::CircuitNotFound(_)
        | CoreError::RouteNotFound(_)
        | CoreError::RouteNotActive(_)
        | CoreError::NotInCircuit { .. } => ApiError::NotFound(d.to_string()),
        CoreError::NotACircuitRoute(_) => ApiError::BadRequest(d.to_string()),
        CoreError::Serialization(_) => ApiError::Store(Box::new(d)),
      },
      EngineError::Store(e) => ApiError::Store(Box::new(e)),
    }
  }

  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    ApiError::Store(Box::new(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
