//! Handlers for `/catalogue` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/catalogue/pillars` | Catalogue order |
//! | `POST` | `/catalogue/pillars` | Body: `{"name":"Shelter","description":null}` |
//! | `GET`  | `/catalogue/pillars/{id}/themes` | 404 if the pillar is unknown |
//! | `POST` | `/catalogue/pillars/{id}/themes` | Body as above |
//! | `GET`  | `/catalogue/themes/{id}/subthemes` | 404 if the theme is unknown |
//! | `POST` | `/catalogue/themes/{id}/subthemes` | Body as above |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ssc_core::{
  catalogue::{NewEntry, Pillar, Subtheme, Theme},
  error::IntoCore as _,
  lifecycle::Lifecycle,
  store::{CatalogueRepository, VersionRepository},
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Pillars ─────────────────────────────────────────────────────────────────

/// `GET /catalogue/pillars`
pub async fn list_pillars<S>(
  State(lc): State<Lifecycle<S>>,
) -> Result<Json<Vec<Pillar>>, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let pillars = lc.store().list_pillars().await.into_core()?;
  Ok(Json(pillars))
}

/// `POST /catalogue/pillars` — returns 201 + the stored pillar.
pub async fn create_pillar<S>(
  State(lc): State<Lifecycle<S>>,
  Json(body): Json<NewEntry>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let pillar = lc.store().create_pillar(body).await.into_core()?;
  tracing::info!(pillar_id = %pillar.pillar_id, name = %pillar.name, "created pillar");
  Ok((StatusCode::CREATED, Json(pillar)))
}

// ─── Themes ──────────────────────────────────────────────────────────────────

/// `GET /catalogue/pillars/{id}/themes`
pub async fn list_themes<S>(
  State(lc): State<Lifecycle<S>>,
  Path(pillar_id): Path<Uuid>,
) -> Result<Json<Vec<Theme>>, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let themes = lc.store().list_themes(pillar_id).await.into_core()?;
  Ok(Json(themes))
}

/// `POST /catalogue/pillars/{id}/themes`
pub async fn create_theme<S>(
  State(lc): State<Lifecycle<S>>,
  Path(pillar_id): Path<Uuid>,
  Json(body): Json<NewEntry>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let theme = lc.store().create_theme(pillar_id, body).await.into_core()?;
  tracing::info!(theme_id = %theme.theme_id, %pillar_id, name = %theme.name, "created theme");
  Ok((StatusCode::CREATED, Json(theme)))
}

// ─── Subthemes ───────────────────────────────────────────────────────────────

/// `GET /catalogue/themes/{id}/subthemes`
pub async fn list_subthemes<S>(
  State(lc): State<Lifecycle<S>>,
  Path(theme_id): Path<Uuid>,
) -> Result<Json<Vec<Subtheme>>, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let subthemes = lc.store().list_subthemes(theme_id).await.into_core()?;
  Ok(Json(subthemes))
}

/// `POST /catalogue/themes/{id}/subthemes`
pub async fn create_subtheme<S>(
  State(lc): State<Lifecycle<S>>,
  Path(theme_id): Path<Uuid>,
  Json(body): Json<NewEntry>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let subtheme = lc.store().create_subtheme(theme_id, body).await.into_core()?;
  tracing::info!(
    subtheme_id = %subtheme.subtheme_id,
    %theme_id,
    name = %subtheme.name,
    "created subtheme"
  );
  Ok((StatusCode::CREATED, Json(subtheme)))
}
