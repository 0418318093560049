//! Error type for `ssc-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  Core(#[from] ssc_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  /// A UNIQUE, FOREIGN KEY or CHECK constraint rejected a write.
  #[error("constraint violated: {0}")]
  Constraint(String),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown version status in database: {0:?}")]
  UnknownStatus(String),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(failure, message))
        if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
      {
        Error::Constraint(message.unwrap_or_else(|| failure.to_string()))
      }
      other => Error::Database(other),
    }
  }
}

/// Domain errors pass through untouched; constraint violations keep their
/// meaning; everything else is a storage failure.
impl From<Error> for ssc_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(e) => e,
      Error::Constraint(message) => ssc_core::Error::Constraint(message),
      other => ssc_core::Error::Storage(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
