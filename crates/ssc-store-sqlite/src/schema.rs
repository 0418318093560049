//! SQL schema for the SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Catalogue. Rows are listed in insertion (rowid) order.
CREATE TABLE IF NOT EXISTS pillars (
    pillar_id   TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS themes (
    theme_id    TEXT PRIMARY KEY,
    pillar_id   TEXT NOT NULL REFERENCES pillars(pillar_id),
    name        TEXT NOT NULL,
    description TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subthemes (
    subtheme_id TEXT PRIMARY KEY,
    theme_id    TEXT NOT NULL REFERENCES themes(theme_id),
    name        TEXT NOT NULL,
    description TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS framework_versions (
    version_id   TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    status       TEXT NOT NULL CHECK (status IN ('draft', 'published')),
    created_at   TEXT NOT NULL,   -- fixed-width RFC 3339 UTC; sorts lexically
    published_at TEXT
);

-- One row per member node. Level is implied by which ids are NULL.
CREATE TABLE IF NOT EXISTS framework_version_items (
    version_id  TEXT NOT NULL REFERENCES framework_versions(version_id) ON DELETE CASCADE,
    pillar_id   TEXT NOT NULL REFERENCES pillars(pillar_id),
    theme_id    TEXT REFERENCES themes(theme_id),
    subtheme_id TEXT REFERENCES subthemes(subtheme_id),
    ref_code    TEXT NOT NULL,
    sort_order  INTEGER NOT NULL,
    CHECK (subtheme_id IS NULL OR theme_id IS NOT NULL),
    UNIQUE (version_id, sort_order),
    UNIQUE (version_id, ref_code)
);

CREATE UNIQUE INDEX IF NOT EXISTS framework_version_items_node_idx
    ON framework_version_items (version_id, pillar_id, IFNULL(theme_id, ''), IFNULL(subtheme_id, ''));
CREATE INDEX IF NOT EXISTS themes_pillar_idx    ON themes(pillar_id);
CREATE INDEX IF NOT EXISTS subthemes_theme_idx  ON subthemes(theme_id);

-- The version currently in effect. At most one row.
CREATE TABLE IF NOT EXISTS active_version (
    slot         INTEGER PRIMARY KEY CHECK (slot = 1),
    version_id   TEXT NOT NULL REFERENCES framework_versions(version_id),
    activated_at TEXT NOT NULL
);

PRAGMA user_version = 1;
";
