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
  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Unprocessable(String),

  #[error("{0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<ssc_core::Error> for ApiError {
  fn from(e: ssc_core::Error) -> Self {
    use ssc_core::Error as E;
    match e {
      E::VersionNotFound(_) | E::PillarNotFound(_) | E::ThemeNotFound(_) | E::SubthemeNotFound(_) => {
        ApiError::NotFound(e.to_string())
      }
      E::Validation(_) => ApiError::Unprocessable(e.to_string()),
      E::InvalidState { .. }
      | E::InvalidTransition { .. }
      | E::DanglingReference { .. }
      | E::IncoherentTree { .. }
      | E::ConcurrentEdit { .. }
      | E::Constraint(_) => ApiError::Conflict(e.to_string()),
      E::Storage(source) => ApiError::Store(source),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  #[test]
  fn core_errors_map_to_statuses() {
    let id = Uuid::new_v4();
    let cases = [
      (ssc_core::Error::VersionNotFound(id), StatusCode::NOT_FOUND),
      (ssc_core::Error::Validation("bad".into()), StatusCode::UNPROCESSABLE_ENTITY),
      (ssc_core::Error::Constraint("in use".into()), StatusCode::CONFLICT),
      (ssc_core::Error::ConcurrentEdit { version_id: id }, StatusCode::CONFLICT),
      (
        ssc_core::Error::IncoherentTree { version_id: id, reason: "orphan".into() },
        StatusCode::CONFLICT,
      ),
      (ssc_core::Error::Storage("disk full".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
      assert_eq!(ApiError::from(err).into_response().status(), status);
    }
  }
}
