//! Handlers for `/versions` and `/active` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/versions` | Newest first |
//! | `POST`   | `/versions` | Body: [`CreateBody`]; returns 201 + the draft |
//! | `GET`    | `/versions/{id}` | 404 if not found |
//! | `DELETE` | `/versions/{id}` | Drafts only; 204 |
//! | `GET`    | `/versions/{id}/items` | Flat rows in sort order |
//! | `PUT`    | `/versions/{id}/items` | Body: ordered list of nodes; drafts only |
//! | `GET`    | `/versions/{id}/tree` | Nested tree with an `ETag`; honours `If-None-Match` |
//! | `POST`   | `/versions/{id}/publish` | Draft → published |
//! | `POST`   | `/versions/{id}/activate` | Published versions only |
//! | `GET`    | `/active` | 404 if no version is active |

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde::Deserialize;
use ssc_core::{
  error::IntoCore as _,
  lifecycle::Lifecycle,
  store::{CatalogueRepository, VersionRepository},
  tree::tree_fingerprint,
  version::{ActiveVersion, FrameworkVersion, FrameworkVersionItem, NodeRef},
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── List / get ──────────────────────────────────────────────────────────────

/// `GET /versions`
pub async fn list<S>(
  State(lc): State<Lifecycle<S>>,
) -> Result<Json<Vec<FrameworkVersion>>, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let versions = lc.store().list_versions().await.into_core()?;
  Ok(Json(versions))
}

/// `GET /versions/{id}`
pub async fn get_one<S>(
  State(lc): State<Lifecycle<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<FrameworkVersion>, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let version = lc
    .store()
    .get_version(id)
    .await
    .into_core()?
    .ok_or_else(|| ApiError::NotFound(format!("framework version {id} not found")))?;
  Ok(Json(version))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// Where a new draft takes its members from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DraftSource {
  #[default]
  Blank,
  Catalogue,
  Clone {
    version_id: Uuid,
  },
}

/// JSON body accepted by `POST /versions`, e.g.
/// `{"name":"2025","source":{"kind":"clone","version_id":"…"}}`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:   String,
  #[serde(default)]
  pub source: DraftSource,
}

/// `POST /versions`
pub async fn create<S>(
  State(lc): State<Lifecycle<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let version = match body.source {
    DraftSource::Blank => lc.create_blank_draft(&body.name).await?,
    DraftSource::Catalogue => lc.create_draft_from_catalogue(&body.name).await?,
    DraftSource::Clone { version_id } => lc.clone_version(version_id, &body.name).await?,
  };
  Ok((StatusCode::CREATED, Json(version)))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /versions/{id}`
pub async fn delete_one<S>(
  State(lc): State<Lifecycle<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  lc.delete_version(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Items ───────────────────────────────────────────────────────────────────

/// `GET /versions/{id}/items`
pub async fn items<S>(
  State(lc): State<Lifecycle<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<FrameworkVersionItem>>, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let items = lc.store().get_version_items(id).await.into_core()?;
  Ok(Json(items))
}

/// `PUT /versions/{id}/items` — body is the full ordered node list; codes
/// are derived server-side and the stored rows are returned.
pub async fn set_items<S>(
  State(lc): State<Lifecycle<S>>,
  Path(id): Path<Uuid>,
  Json(nodes): Json<Vec<NodeRef>>,
) -> Result<Json<Vec<FrameworkVersionItem>>, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let items = lc.set_composition(id, nodes).await?;
  Ok(Json(items))
}

// ─── Tree ────────────────────────────────────────────────────────────────────

/// `GET /versions/{id}/tree`
pub async fn tree<S>(
  State(lc): State<Lifecycle<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let tree = lc.build_tree(id).await?;
  let etag = format!("\"{}\"", tree_fingerprint(&tree));

  let unchanged = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v.split(',').any(|tag| tag.trim() == etag || tag.trim() == "*"));
  if unchanged {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }

  Ok(([(header::ETAG, etag)], Json(tree)).into_response())
}

// ─── Transitions ─────────────────────────────────────────────────────────────

/// `POST /versions/{id}/publish`
pub async fn publish<S>(
  State(lc): State<Lifecycle<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<FrameworkVersion>, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  Ok(Json(lc.publish_version(id).await?))
}

/// `POST /versions/{id}/activate`
pub async fn activate<S>(
  State(lc): State<Lifecycle<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ActiveVersion>, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  Ok(Json(lc.activate_version(id).await?))
}

/// `GET /active`
pub async fn active<S>(
  State(lc): State<Lifecycle<S>>,
) -> Result<Json<FrameworkVersion>, ApiError>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  let version = lc
    .active_version()
    .await?
    .ok_or_else(|| ApiError::NotFound("no framework version is active".into()))?;
  Ok(Json(version))
}
