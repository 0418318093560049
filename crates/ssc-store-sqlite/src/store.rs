//! [`SqliteStore`] — the SQLite implementation of the catalogue and version
//! repositories.

use std::path::Path;

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use ssc_core::{
  catalogue::{CatalogueEdit, NewEntry, Pillar, Subtheme, Theme},
  store::{CatalogueRepository, VersionRepository},
  version::{
    ActiveVersion, FrameworkVersion, FrameworkVersionItem, VersionStatus, validate_items,
  },
};

use crate::{
  Error, Result,
  encode::{
    RawActive, RawItem, RawPillar, RawSubtheme, RawTheme, RawVersion, decode_status, encode_dt,
    encode_status, encode_uuid, now,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A framework store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All calls
/// are serialized on the connection's worker thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Table and key column of one catalogue level.
struct CatalogueTable {
  table:  &'static str,
  id_col: &'static str,
}

const PILLARS: CatalogueTable = CatalogueTable { table: "pillars", id_col: "pillar_id" };
const THEMES: CatalogueTable = CatalogueTable { table: "themes", id_col: "theme_id" };
const SUBTHEMES: CatalogueTable = CatalogueTable { table: "subthemes", id_col: "subtheme_id" };

fn exists(conn: &rusqlite::Connection, table: &CatalogueTable, id: &str) -> rusqlite::Result<bool> {
  let sql = format!("SELECT 1 FROM {} WHERE {} = ?1", table.table, table.id_col);
  Ok(conn.query_row(&sql, rusqlite::params![id], |_| Ok(())).optional()?.is_some())
}

fn insert_items(
  conn: &rusqlite::Connection,
  id_str: &str,
  items: &[FrameworkVersionItem],
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO framework_version_items
       (version_id, pillar_id, theme_id, subtheme_id, ref_code, sort_order)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
  )?;
  for item in items {
    stmt.execute(rusqlite::params![
      id_str,
      item.pillar_id.map(encode_uuid),
      item.theme_id.map(encode_uuid),
      item.subtheme_id.map(encode_uuid),
      item.ref_code,
      item.sort_order,
    ])?;
  }
  Ok(())
}

fn version_status(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT status FROM framework_versions WHERE version_id = ?1",
      rusqlite::params![id],
      |r| r.get(0),
    )
    .optional()
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch at most one row by id.
  async fn fetch_one<T>(
    &self,
    sql: String,
    id: Uuid,
    map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
  ) -> Result<Option<T>>
  where
    T: Send + 'static,
  {
    let id_str = encode_uuid(id);
    Ok(
      self
        .conn
        .call(move |conn| Ok(conn.query_row(&sql, rusqlite::params![id_str], map).optional()?))
        .await?,
    )
  }

  /// Fetch the children of `parent` (or every row when `parent` is `None`)
  /// in catalogue order. Returns `None` when the parent does not exist.
  async fn fetch_children<T>(
    &self,
    sql: String,
    parent: Option<(CatalogueTable, Uuid)>,
    map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
  ) -> Result<Option<Vec<T>>>
  where
    T: Send + 'static,
  {
    let parent = parent.map(|(table, id)| (table, encode_uuid(id)));
    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let rows = match &parent {
            Some((table, id)) => {
              if !exists(conn, table, id)? {
                return Ok(None);
              }
              stmt.query_map(rusqlite::params![id], map)?.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => stmt.query_map([], map)?.collect::<rusqlite::Result<Vec<_>>>()?,
          };
          Ok(Some(rows))
        })
        .await?,
    )
  }

  /// Insert a catalogue row after checking its parent exists. Returns
  /// `false` if the parent is missing.
  async fn insert_entry(
    &self,
    sql: &'static str,
    parent: Option<(CatalogueTable, Uuid)>,
    params: Vec<Option<String>>,
  ) -> Result<bool> {
    let parent = parent.map(|(table, id)| (table, encode_uuid(id)));
    Ok(
      self
        .conn
        .call(move |conn| {
          if let Some((table, id)) = &parent
            && !exists(conn, table, id)?
          {
            return Ok(false);
          }
          conn.execute(sql, rusqlite::params_from_iter(params))?;
          Ok(true)
        })
        .await?,
    )
  }

  /// Apply a catalogue edit. Returns `false` if no row has `id`.
  async fn edit_entry(&self, table: CatalogueTable, id: Uuid, edit: CatalogueEdit) -> Result<bool> {
    let (name, description) = edit.normalized()?;
    let id_str = encode_uuid(id);
    let sql = format!(
      "UPDATE {} SET name = COALESCE(?2, name),
                     description = CASE WHEN ?3 THEN ?4 ELSE description END
       WHERE {} = ?1",
      table.table, table.id_col,
    );
    let changed = self
      .conn
      .call(move |conn| {
        let clears = description.is_some();
        Ok(conn.execute(&sql, rusqlite::params![id_str, name, clears, description.flatten()])?)
      })
      .await?;
    Ok(changed > 0)
  }

  /// Delete a catalogue row. Returns `false` if no row has `id`; references
  /// from children or version items surface as [`Error::Constraint`].
  async fn delete_entry(&self, table: CatalogueTable, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let sql = format!("DELETE FROM {} WHERE {} = ?1", table.table, table.id_col);
    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![id_str])?))
      .await?;
    Ok(changed > 0)
  }
}

// ─── CatalogueRepository impl ────────────────────────────────────────────────

impl CatalogueRepository for SqliteStore {
  type Error = Error;

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn list_pillars(&self) -> Result<Vec<Pillar>> {
    let sql = format!("SELECT {} FROM pillars ORDER BY rowid", RawPillar::COLUMNS);
    let raws = self.fetch_children(sql, None, RawPillar::from_row).await?.unwrap_or_default();
    raws.into_iter().map(RawPillar::into_pillar).collect()
  }

  async fn list_themes(&self, pillar_id: Uuid) -> Result<Vec<Theme>> {
    let sql = format!(
      "SELECT {} FROM themes WHERE pillar_id = ?1 ORDER BY rowid",
      RawTheme::COLUMNS
    );
    let raws = self
      .fetch_children(sql, Some((PILLARS, pillar_id)), RawTheme::from_row)
      .await?
      .ok_or(ssc_core::Error::PillarNotFound(pillar_id))?;
    raws.into_iter().map(RawTheme::into_theme).collect()
  }

  async fn list_subthemes(&self, theme_id: Uuid) -> Result<Vec<Subtheme>> {
    let sql = format!(
      "SELECT {} FROM subthemes WHERE theme_id = ?1 ORDER BY rowid",
      RawSubtheme::COLUMNS
    );
    let raws = self
      .fetch_children(sql, Some((THEMES, theme_id)), RawSubtheme::from_row)
      .await?
      .ok_or(ssc_core::Error::ThemeNotFound(theme_id))?;
    raws.into_iter().map(RawSubtheme::into_subtheme).collect()
  }

  async fn get_pillar(&self, pillar_id: Uuid) -> Result<Option<Pillar>> {
    let sql = format!("SELECT {} FROM pillars WHERE pillar_id = ?1", RawPillar::COLUMNS);
    let raw = self.fetch_one(sql, pillar_id, RawPillar::from_row).await?;
    raw.map(RawPillar::into_pillar).transpose()
  }

  async fn get_theme(&self, theme_id: Uuid) -> Result<Option<Theme>> {
    let sql = format!("SELECT {} FROM themes WHERE theme_id = ?1", RawTheme::COLUMNS);
    let raw = self.fetch_one(sql, theme_id, RawTheme::from_row).await?;
    raw.map(RawTheme::into_theme).transpose()
  }

  async fn get_subtheme(&self, subtheme_id: Uuid) -> Result<Option<Subtheme>> {
    let sql = format!("SELECT {} FROM subthemes WHERE subtheme_id = ?1", RawSubtheme::COLUMNS);
    let raw = self.fetch_one(sql, subtheme_id, RawSubtheme::from_row).await?;
    raw.map(RawSubtheme::into_subtheme).transpose()
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn create_pillar(&self, entry: NewEntry) -> Result<Pillar> {
    let entry = entry.normalized()?;
    let pillar = Pillar {
      pillar_id:   Uuid::new_v4(),
      name:        entry.name,
      description: entry.description,
      created_at:  now(),
    };

    self
      .insert_entry(
        "INSERT INTO pillars (pillar_id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        None,
        vec![
          Some(encode_uuid(pillar.pillar_id)),
          Some(pillar.name.clone()),
          pillar.description.clone(),
          Some(encode_dt(pillar.created_at)),
        ],
      )
      .await?;

    Ok(pillar)
  }

  async fn create_theme(&self, pillar_id: Uuid, entry: NewEntry) -> Result<Theme> {
    let entry = entry.normalized()?;
    let theme = Theme {
      theme_id: Uuid::new_v4(),
      pillar_id,
      name: entry.name,
      description: entry.description,
      created_at: now(),
    };

    let inserted = self
      .insert_entry(
        "INSERT INTO themes (theme_id, pillar_id, name, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        Some((PILLARS, pillar_id)),
        vec![
          Some(encode_uuid(theme.theme_id)),
          Some(encode_uuid(pillar_id)),
          Some(theme.name.clone()),
          theme.description.clone(),
          Some(encode_dt(theme.created_at)),
        ],
      )
      .await?;
    if !inserted {
      return Err(ssc_core::Error::PillarNotFound(pillar_id).into());
    }

    Ok(theme)
  }

  async fn create_subtheme(&self, theme_id: Uuid, entry: NewEntry) -> Result<Subtheme> {
    let entry = entry.normalized()?;
    let subtheme = Subtheme {
      subtheme_id: Uuid::new_v4(),
      theme_id,
      name: entry.name,
      description: entry.description,
      created_at: now(),
    };

    let inserted = self
      .insert_entry(
        "INSERT INTO subthemes (subtheme_id, theme_id, name, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        Some((THEMES, theme_id)),
        vec![
          Some(encode_uuid(subtheme.subtheme_id)),
          Some(encode_uuid(theme_id)),
          Some(subtheme.name.clone()),
          subtheme.description.clone(),
          Some(encode_dt(subtheme.created_at)),
        ],
      )
      .await?;
    if !inserted {
      return Err(ssc_core::Error::ThemeNotFound(theme_id).into());
    }

    Ok(subtheme)
  }

  async fn update_pillar(&self, pillar_id: Uuid, edit: CatalogueEdit) -> Result<Pillar> {
    let missing = || Error::from(ssc_core::Error::PillarNotFound(pillar_id));
    if !self.edit_entry(PILLARS, pillar_id, edit).await? {
      return Err(missing());
    }
    self.get_pillar(pillar_id).await?.ok_or_else(missing)
  }

  async fn update_theme(&self, theme_id: Uuid, edit: CatalogueEdit) -> Result<Theme> {
    let missing = || Error::from(ssc_core::Error::ThemeNotFound(theme_id));
    if !self.edit_entry(THEMES, theme_id, edit).await? {
      return Err(missing());
    }
    self.get_theme(theme_id).await?.ok_or_else(missing)
  }

  async fn update_subtheme(&self, subtheme_id: Uuid, edit: CatalogueEdit) -> Result<Subtheme> {
    let missing = || Error::from(ssc_core::Error::SubthemeNotFound(subtheme_id));
    if !self.edit_entry(SUBTHEMES, subtheme_id, edit).await? {
      return Err(missing());
    }
    self.get_subtheme(subtheme_id).await?.ok_or_else(missing)
  }

  async fn delete_pillar(&self, pillar_id: Uuid) -> Result<()> {
    if !self.delete_entry(PILLARS, pillar_id).await? {
      return Err(ssc_core::Error::PillarNotFound(pillar_id).into());
    }
    Ok(())
  }

  async fn delete_theme(&self, theme_id: Uuid) -> Result<()> {
    if !self.delete_entry(THEMES, theme_id).await? {
      return Err(ssc_core::Error::ThemeNotFound(theme_id).into());
    }
    Ok(())
  }

  async fn delete_subtheme(&self, subtheme_id: Uuid) -> Result<()> {
    if !self.delete_entry(SUBTHEMES, subtheme_id).await? {
      return Err(ssc_core::Error::SubthemeNotFound(subtheme_id).into());
    }
    Ok(())
  }
}

// ─── VersionRepository impl ──────────────────────────────────────────────────

impl VersionRepository for SqliteStore {
  type Error = Error;

  async fn list_versions(&self) -> Result<Vec<FrameworkVersion>> {
    let sql = format!(
      "SELECT {} FROM framework_versions ORDER BY created_at DESC, rowid DESC",
      RawVersion::COLUMNS
    );
    let raws = self.fetch_children(sql, None, RawVersion::from_row).await?.unwrap_or_default();
    raws.into_iter().map(RawVersion::into_version).collect()
  }

  async fn get_version(&self, version_id: Uuid) -> Result<Option<FrameworkVersion>> {
    let sql = format!(
      "SELECT {} FROM framework_versions WHERE version_id = ?1",
      RawVersion::COLUMNS
    );
    let raw = self.fetch_one(sql, version_id, RawVersion::from_row).await?;
    raw.map(RawVersion::into_version).transpose()
  }

  async fn get_version_items(&self, version_id: Uuid) -> Result<Vec<FrameworkVersionItem>> {
    let id_str = encode_uuid(version_id);
    let sql = format!(
      "SELECT {} FROM framework_version_items WHERE version_id = ?1 ORDER BY sort_order",
      RawItem::COLUMNS
    );

    let raws: Option<Vec<RawItem>> = self
      .conn
      .call(move |conn| {
        if version_status(conn, &id_str)?.is_none() {
          return Ok(None);
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(rows))
      })
      .await?;

    let raws = raws.ok_or(ssc_core::Error::VersionNotFound(version_id))?;
    raws.into_iter().map(RawItem::into_item).collect()
  }

  async fn create_version(&self, name: String) -> Result<FrameworkVersion> {
    self.create_version_with_items(Uuid::new_v4(), name, Vec::new()).await
  }

  async fn create_version_with_items(
    &self,
    version_id: Uuid,
    name: String,
    items: Vec<FrameworkVersionItem>,
  ) -> Result<FrameworkVersion> {
    validate_items(version_id, &items)?;

    let version = FrameworkVersion {
      version_id,
      name,
      status: VersionStatus::Draft,
      created_at: now(),
      published_at: None,
    };

    let id_str = encode_uuid(version_id);
    let name = version.name.clone();
    let status = encode_status(version.status);
    let at_str = encode_dt(version.created_at);
    let count = items.len();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO framework_versions (version_id, name, status, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, status, at_str],
        )?;
        insert_items(&tx, &id_str, &items)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(%version_id, items = count, "created version");
    Ok(version)
  }

  async fn replace_items(&self, version_id: Uuid, items: Vec<FrameworkVersionItem>) -> Result<()> {
    let id_str = encode_uuid(version_id);
    let count = items.len();

    let outcome: Result<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(status) = version_status(&tx, &id_str)? else {
          return Ok(Err(ssc_core::Error::VersionNotFound(version_id).into()));
        };
        match decode_status(&status) {
          Err(e) => return Ok(Err(e)),
          Ok(status @ VersionStatus::Published) => {
            return Ok(Err(
              ssc_core::Error::InvalidState { version_id, status, action: "replace items of" }
                .into(),
            ));
          }
          Ok(VersionStatus::Draft) => {}
        }
        if let Err(e) = validate_items(version_id, &items) {
          return Ok(Err(e.into()));
        }

        tx.execute(
          "DELETE FROM framework_version_items WHERE version_id = ?1",
          rusqlite::params![id_str],
        )?;
        insert_items(&tx, &id_str, &items)?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    outcome?;
    tracing::debug!(%version_id, items = count, "replaced version items");
    Ok(())
  }

  async fn set_status(&self, version_id: Uuid, to: VersionStatus) -> Result<FrameworkVersion> {
    let id_str = encode_uuid(version_id);
    let select = format!(
      "SELECT {} FROM framework_versions WHERE version_id = ?1",
      RawVersion::COLUMNS
    );

    let raw: Result<RawVersion> = self
      .conn
      .call(move |conn| {
        let Some(current) = version_status(conn, &id_str)? else {
          return Ok(Err(ssc_core::Error::VersionNotFound(version_id).into()));
        };
        let from = match decode_status(&current) {
          Ok(from) => from,
          Err(e) => return Ok(Err(e)),
        };
        let illegal = || -> Result<RawVersion> {
          Err(ssc_core::Error::InvalidTransition { version_id, from, to }.into())
        };
        if !from.can_transition_to(to) {
          return Ok(illegal());
        }

        let published_at = (to == VersionStatus::Published).then(|| encode_dt(now()));
        let changed = conn.execute(
          "UPDATE framework_versions
           SET status = ?2, published_at = COALESCE(?3, published_at)
           WHERE version_id = ?1 AND status = ?4",
          rusqlite::params![id_str, encode_status(to), published_at, current],
        )?;
        if changed == 0 {
          return Ok(illegal());
        }

        Ok(Ok(conn.query_row(&select, rusqlite::params![id_str], RawVersion::from_row)?))
      })
      .await?;

    raw?.into_version()
  }

  async fn publish_checked(
    &self,
    version_id: Uuid,
    checked: Vec<FrameworkVersionItem>,
  ) -> Result<FrameworkVersion> {
    let id_str = encode_uuid(version_id);
    let select_items = format!(
      "SELECT {} FROM framework_version_items WHERE version_id = ?1 ORDER BY sort_order",
      RawItem::COLUMNS
    );
    let select_version = format!(
      "SELECT {} FROM framework_versions WHERE version_id = ?1",
      RawVersion::COLUMNS
    );
    let mut checked = checked;
    checked.sort_by_key(|item| item.sort_order);

    let raw: Result<RawVersion> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(current) = version_status(&tx, &id_str)? else {
          return Ok(Err(ssc_core::Error::VersionNotFound(version_id).into()));
        };
        let from = match decode_status(&current) {
          Ok(from) => from,
          Err(e) => return Ok(Err(e)),
        };
        let to = VersionStatus::Published;
        if !from.can_transition_to(to) {
          return Ok(Err(ssc_core::Error::InvalidTransition { version_id, from, to }.into()));
        }

        let stored = {
          let mut stmt = tx.prepare(&select_items)?;
          stmt
            .query_map(rusqlite::params![id_str], RawItem::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        let stored = match stored.into_iter().map(RawItem::into_item).collect::<Result<Vec<_>>>() {
          Ok(stored) => stored,
          Err(e) => return Ok(Err(e)),
        };
        if stored != checked {
          return Ok(Err(ssc_core::Error::ConcurrentEdit { version_id }.into()));
        }

        tx.execute(
          "UPDATE framework_versions SET status = ?2, published_at = ?3 WHERE version_id = ?1",
          rusqlite::params![id_str, encode_status(to), encode_dt(now())],
        )?;
        let raw = tx.query_row(&select_version, rusqlite::params![id_str], RawVersion::from_row)?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    raw?.into_version()
  }

  async fn delete_version(&self, version_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(version_id);

    let outcome: Result<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(status) = version_status(&tx, &id_str)? else {
          return Ok(Err(ssc_core::Error::VersionNotFound(version_id).into()));
        };
        match decode_status(&status) {
          Err(e) => return Ok(Err(e)),
          Ok(status @ VersionStatus::Published) => {
            return Ok(Err(
              ssc_core::Error::InvalidState { version_id, status, action: "delete" }.into(),
            ));
          }
          Ok(VersionStatus::Draft) => {}
        }

        tx.execute(
          "DELETE FROM framework_version_items WHERE version_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM framework_versions WHERE version_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    outcome
  }

  // ── Active pointer ────────────────────────────────────────────────────────

  async fn get_active(&self) -> Result<Option<ActiveVersion>> {
    let raw: Option<RawActive> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT version_id, activated_at FROM active_version WHERE slot = 1",
              [],
              |row| Ok(RawActive { version_id: row.get(0)?, activated_at: row.get(1)? }),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawActive::into_active).transpose()
  }

  async fn set_active(&self, version_id: Uuid) -> Result<ActiveVersion> {
    let active = ActiveVersion { version_id, activated_at: now() };
    let id_str = encode_uuid(version_id);
    let at_str = encode_dt(active.activated_at);

    let found = self
      .conn
      .call(move |conn| {
        if version_status(conn, &id_str)?.is_none() {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO active_version (slot, version_id, activated_at) VALUES (1, ?1, ?2)
           ON CONFLICT (slot) DO UPDATE
             SET version_id = excluded.version_id, activated_at = excluded.activated_at",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(true)
      })
      .await?;

    if !found {
      return Err(ssc_core::Error::VersionNotFound(version_id).into());
    }
    Ok(active)
  }
}
