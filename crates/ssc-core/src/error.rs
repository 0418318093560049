//! Error types for `ssc-core`.
//!
//! Every variant names the offending entity so that an administrator can act
//! on the message without consulting logs.

use thiserror::Error;
use uuid::Uuid;

use crate::{refcode::Level, version::VersionStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("framework version not found: {0}")]
  VersionNotFound(Uuid),

  #[error("pillar not found: {0}")]
  PillarNotFound(Uuid),

  #[error("theme not found: {0}")]
  ThemeNotFound(Uuid),

  #[error("subtheme not found: {0}")]
  SubthemeNotFound(Uuid),

  #[error("validation failed: {0}")]
  Validation(String),

  #[error("cannot {action} framework version {version_id} while it is {status}")]
  InvalidState {
    version_id: Uuid,
    status:     VersionStatus,
    action:     &'static str,
  },

  #[error("framework version {version_id} cannot move from {from} to {to}")]
  InvalidTransition {
    version_id: Uuid,
    from:       VersionStatus,
    to:         VersionStatus,
  },

  #[error("framework version {version_id} references {level} {id}, which is not in the catalogue")]
  DanglingReference {
    version_id: Uuid,
    level:      Level,
    id:         Uuid,
  },

  #[error("framework version {version_id} has an incoherent tree: {reason}")]
  IncoherentTree { version_id: Uuid, reason: String },

  #[error("framework version {version_id} changed while it was being published")]
  ConcurrentEdit { version_id: Uuid },

  #[error("storage constraint violated: {0}")]
  Constraint(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Whether this error means "the referenced id does not exist".
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::VersionNotFound(_)
        | Self::PillarNotFound(_)
        | Self::ThemeNotFound(_)
        | Self::SubthemeNotFound(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Lift a backend result into the core error type.
pub trait IntoCore<T> {
  fn into_core(self) -> Result<T>;
}

impl<T, E: Into<Error>> IntoCore<T> for std::result::Result<T, E> {
  fn into_core(self) -> Result<T> { self.map_err(Into::into) }
}
