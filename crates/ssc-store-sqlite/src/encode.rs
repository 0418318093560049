//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order equals time order. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use ssc_core::{
  catalogue::{Pillar, Subtheme, Theme},
  version::{ActiveVersion, FrameworkVersion, FrameworkVersionItem, VersionStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// The current time at the precision the store keeps, so values handed back
/// from writes compare equal to values read later.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── VersionStatus ────────────────────────────────────────────────────────────

pub fn encode_status(s: VersionStatus) -> &'static str { s.as_str() }

pub fn decode_status(s: &str) -> Result<VersionStatus> {
  VersionStatus::ALL
    .into_iter()
    .find(|status| status.as_str() == s)
    .ok_or_else(|| Error::UnknownStatus(s.to_owned()))
}

// ─── Row types ────────────────────────────────────────────────────────────────

/// Raw strings read from a `pillars` row.
pub struct RawPillar {
  pub pillar_id:   String,
  pub name:        String,
  pub description: Option<String>,
  pub created_at:  String,
}

impl RawPillar {
  pub const COLUMNS: &'static str = "pillar_id, name, description, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      pillar_id:   row.get(0)?,
      name:        row.get(1)?,
      description: row.get(2)?,
      created_at:  row.get(3)?,
    })
  }

  pub fn into_pillar(self) -> Result<Pillar> {
    Ok(Pillar {
      pillar_id:   decode_uuid(&self.pillar_id)?,
      name:        self.name,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `themes` row.
pub struct RawTheme {
  pub theme_id:    String,
  pub pillar_id:   String,
  pub name:        String,
  pub description: Option<String>,
  pub created_at:  String,
}

impl RawTheme {
  pub const COLUMNS: &'static str = "theme_id, pillar_id, name, description, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      theme_id:    row.get(0)?,
      pillar_id:   row.get(1)?,
      name:        row.get(2)?,
      description: row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_theme(self) -> Result<Theme> {
    Ok(Theme {
      theme_id:    decode_uuid(&self.theme_id)?,
      pillar_id:   decode_uuid(&self.pillar_id)?,
      name:        self.name,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `subthemes` row.
pub struct RawSubtheme {
  pub subtheme_id: String,
  pub theme_id:    String,
  pub name:        String,
  pub description: Option<String>,
  pub created_at:  String,
}

impl RawSubtheme {
  pub const COLUMNS: &'static str = "subtheme_id, theme_id, name, description, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subtheme_id: row.get(0)?,
      theme_id:    row.get(1)?,
      name:        row.get(2)?,
      description: row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_subtheme(self) -> Result<Subtheme> {
    Ok(Subtheme {
      subtheme_id: decode_uuid(&self.subtheme_id)?,
      theme_id:    decode_uuid(&self.theme_id)?,
      name:        self.name,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `framework_versions` row.
pub struct RawVersion {
  pub version_id:   String,
  pub name:         String,
  pub status:       String,
  pub created_at:   String,
  pub published_at: Option<String>,
}

impl RawVersion {
  pub const COLUMNS: &'static str = "version_id, name, status, created_at, published_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:   row.get(0)?,
      name:         row.get(1)?,
      status:       row.get(2)?,
      created_at:   row.get(3)?,
      published_at: row.get(4)?,
    })
  }

  pub fn into_version(self) -> Result<FrameworkVersion> {
    Ok(FrameworkVersion {
      version_id:   decode_uuid(&self.version_id)?,
      name:         self.name,
      status:       decode_status(&self.status)?,
      created_at:   decode_dt(&self.created_at)?,
      published_at: self.published_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw values read from a `framework_version_items` row.
pub struct RawItem {
  pub version_id:  String,
  pub pillar_id:   Option<String>,
  pub theme_id:    Option<String>,
  pub subtheme_id: Option<String>,
  pub ref_code:    String,
  pub sort_order:  i64,
}

impl RawItem {
  pub const COLUMNS: &'static str =
    "version_id, pillar_id, theme_id, subtheme_id, ref_code, sort_order";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:  row.get(0)?,
      pillar_id:   row.get(1)?,
      theme_id:    row.get(2)?,
      subtheme_id: row.get(3)?,
      ref_code:    row.get(4)?,
      sort_order:  row.get(5)?,
    })
  }

  pub fn into_item(self) -> Result<FrameworkVersionItem> {
    Ok(FrameworkVersionItem {
      version_id:  decode_uuid(&self.version_id)?,
      pillar_id:   decode_opt_uuid(self.pillar_id)?,
      theme_id:    decode_opt_uuid(self.theme_id)?,
      subtheme_id: decode_opt_uuid(self.subtheme_id)?,
      ref_code:    self.ref_code,
      sort_order:  self.sort_order,
    })
  }
}

/// Raw strings read from the `active_version` row.
pub struct RawActive {
  pub version_id:   String,
  pub activated_at: String,
}

impl RawActive {
  pub fn into_active(self) -> Result<ActiveVersion> {
    Ok(ActiveVersion {
      version_id:   decode_uuid(&self.version_id)?,
      activated_at: decode_dt(&self.activated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(900_000);
    let c = a + chrono::Duration::microseconds(1_000_001);
    let (ea, eb, ec) = (encode_dt(a), encode_dt(b), encode_dt(c));
    assert!(ea < eb && eb < ec, "{ea} {eb} {ec}");
    assert_eq!(ea.len(), ec.len());
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn status_roundtrips_and_rejects_unknown() {
    for s in VersionStatus::ALL {
      assert_eq!(encode_status(s), s.to_string());
      assert_eq!(decode_status(encode_status(s)).unwrap(), s);
    }
    assert!(matches!(decode_status("archived"), Err(Error::UnknownStatus(_))));
  }
}
