//! Catalogue entities: the master, version-independent Pillars, Themes and
//! Subthemes.
//!
//! Versions never own catalogue entities; they only reference them by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Entities ────────────────────────────────────────────────────────────────

/// The coarsest level of the classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pillar {
  pub pillar_id:   Uuid,
  pub name:        String,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
}

/// A theme belongs to exactly one pillar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
  pub theme_id:    Uuid,
  pub pillar_id:   Uuid,
  pub name:        String,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
}

/// A subtheme belongs to exactly one theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtheme {
  pub subtheme_id: Uuid,
  pub theme_id:    Uuid,
  pub name:        String,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to the catalogue `create_*` operations. The parent id, when there is
/// one, is passed separately.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEntry {
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
}

impl NewEntry {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), description: None }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  /// Trim the name and reject blank ones.
  pub fn normalized(self) -> Result<Self> {
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::Validation("catalogue entries need a name".into()));
    }
    let description = self
      .description
      .map(|d| d.trim().to_owned())
      .filter(|d| !d.is_empty());
    Ok(Self { name, description })
  }
}

/// A partial edit of a catalogue entry. `None` leaves the field untouched; a
/// blank description clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogueEdit {
  pub name:        Option<String>,
  pub description: Option<String>,
}

impl CatalogueEdit {
  /// Validate the edit and split it into the new name (if any) and the new
  /// description (if any; `Some(None)` clears).
  pub fn normalized(self) -> Result<(Option<String>, Option<Option<String>>)> {
    let name = match self.name.map(|n| n.trim().to_owned()) {
      Some(n) if n.is_empty() => {
        return Err(Error::Validation("catalogue entries need a name".into()));
      }
      other => other,
    };
    let description = self.description.map(|d| {
      let d = d.trim().to_owned();
      (!d.is_empty()).then_some(d)
    });
    Ok((name, description))
  }
}
