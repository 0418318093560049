//! JSON REST API for the framework engine.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`ssc_core::store::CatalogueRepository`] and
//! [`ssc_core::store::VersionRepository`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ssc_api::api_router(store.clone()))
//! ```

pub mod catalogue;
pub mod error;
pub mod versions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use ssc_core::{
  lifecycle::Lifecycle,
  store::{CatalogueRepository, VersionRepository},
};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: CatalogueRepository + VersionRepository + 'static,
{
  Router::new()
    // Catalogue
    .route(
      "/catalogue/pillars",
      get(catalogue::list_pillars::<S>).post(catalogue::create_pillar::<S>),
    )
    .route(
      "/catalogue/pillars/{id}/themes",
      get(catalogue::list_themes::<S>).post(catalogue::create_theme::<S>),
    )
    .route(
      "/catalogue/themes/{id}/subthemes",
      get(catalogue::list_subthemes::<S>).post(catalogue::create_subtheme::<S>),
    )
    // Versions
    .route("/versions", get(versions::list::<S>).post(versions::create::<S>))
    .route("/versions/{id}", get(versions::get_one::<S>).delete(versions::delete_one::<S>))
    .route("/versions/{id}/items", get(versions::items::<S>).put(versions::set_items::<S>))
    .route("/versions/{id}/tree", get(versions::tree::<S>))
    .route("/versions/{id}/publish", post(versions::publish::<S>))
    .route("/versions/{id}/activate", post(versions::activate::<S>))
    .route("/active", get(versions::active::<S>))
    .with_state(Lifecycle::new(store))
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use serde_json::{Value, json};
  use ssc_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  async fn router() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    api_router(Arc::new(store))
  }

  async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  /// Seed Shelter → Adequacy → {Space, Weatherproofing} through the API.
  async fn seed(app: &Router) {
    let resp = send(app, "POST", "/catalogue/pillars", Some(json!({ "name": "Shelter" }))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let pillar_id = json_body(resp).await["pillar_id"].as_str().unwrap().to_owned();

    let resp = send(
      app,
      "POST",
      &format!("/catalogue/pillars/{pillar_id}/themes"),
      Some(json!({ "name": "Adequacy" })),
    )
    .await;
    let theme_id = json_body(resp).await["theme_id"].as_str().unwrap().to_owned();

    for name in ["Space", "Weatherproofing"] {
      let resp = send(
        app,
        "POST",
        &format!("/catalogue/themes/{theme_id}/subthemes"),
        Some(json!({ "name": name })),
      )
      .await;
      assert_eq!(resp.status(), StatusCode::CREATED);
    }
  }

  async fn create_draft(app: &Router, source: Value) -> String {
    let resp = send(app, "POST", "/versions", Some(json!({ "name": "v1", "source": source }))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await["version_id"].as_str().unwrap().to_owned()
  }

  // ── Catalogue ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn themes_of_unknown_pillar_is_404() {
    let app = router().await;
    let resp = send(
      &app,
      "GET",
      "/catalogue/pillars/00000000-0000-0000-0000-000000000000/themes",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(json_body(resp).await["error"].as_str().unwrap().contains("pillar"));
  }

  #[tokio::test]
  async fn blank_pillar_name_is_422() {
    let app = router().await;
    let resp = send(&app, "POST", "/catalogue/pillars", Some(json!({ "name": "  " }))).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }

  // ── Versions ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn catalogue_draft_tree_has_codes_and_etag() {
    let app = router().await;
    seed(&app).await;
    let id = create_draft(&app, json!({ "kind": "catalogue" })).await;

    let resp = send(&app, "GET", &format!("/versions/{id}/tree"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let etag = resp.headers().get(header::ETAG).unwrap().to_str().unwrap().to_owned();
    let tree = json_body(resp).await;
    assert_eq!(tree[0]["ref_code"], "P1");
    assert_eq!(tree[0]["pillar"]["name"], "Shelter");
    assert_eq!(tree[0]["themes"][0]["ref_code"], "P1.T1");
    assert_eq!(tree[0]["themes"][0]["subthemes"][1]["ref_code"], "P1.T1.S2");
    assert_eq!(tree[0]["themes"][0]["subthemes"][1]["subtheme"]["name"], "Weatherproofing");

    let req = Request::builder()
      .uri(format!("/versions/{id}/tree"))
      .header(header::IF_NONE_MATCH, &etag)
      .body(Body::empty())
      .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
  }

  #[tokio::test]
  async fn publish_twice_is_409() {
    let app = router().await;
    seed(&app).await;
    let id = create_draft(&app, json!({ "kind": "catalogue" })).await;

    let resp = send(&app, "POST", &format!("/versions/{id}/publish"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "published");

    let resp = send(&app, "POST", &format!("/versions/{id}/publish"), None).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(&app, "DELETE", &format!("/versions/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn put_items_renumbers_and_rejects_orphans() {
    let app = router().await;
    seed(&app).await;
    let source = create_draft(&app, json!({ "kind": "catalogue" })).await;
    let items = json_body(send(&app, "GET", &format!("/versions/{source}/items"), None).await).await;
    let pillar_id = items[0]["pillar_id"].clone();
    let theme_id = items[1]["theme_id"].clone();
    let space_id = items[2]["subtheme_id"].clone();

    let id = create_draft(&app, json!({ "kind": "blank" })).await;
    let uri = format!("/versions/{id}/items");

    let orphan = json!([{ "level": "theme", "pillar_id": pillar_id, "theme_id": theme_id }]);
    let resp = send(&app, "PUT", &uri, Some(orphan)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let nodes = json!([
      { "level": "pillar", "pillar_id": pillar_id },
      { "level": "theme", "pillar_id": pillar_id, "theme_id": theme_id },
      { "level": "subtheme", "pillar_id": pillar_id, "theme_id": theme_id, "subtheme_id": space_id },
    ]);
    let resp = send(&app, "PUT", &uri, Some(nodes)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stored = json_body(resp).await;
    let codes: Vec<_> = stored.as_array().unwrap().iter().map(|i| i["ref_code"].clone()).collect();
    assert_eq!(codes, [json!("P1"), json!("P1.T1"), json!("P1.T1.S1")]);
  }

  #[tokio::test]
  async fn activation_flow() {
    let app = router().await;
    seed(&app).await;
    let id = create_draft(&app, json!({ "kind": "catalogue" })).await;

    let resp = send(&app, "GET", "/active", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app, "POST", &format!("/versions/{id}/activate"), None).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    send(&app, "POST", &format!("/versions/{id}/publish"), None).await;
    let resp = send(&app, "POST", &format!("/versions/{id}/activate"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let active = json_body(send(&app, "GET", "/active", None).await).await;
    assert_eq!(active["version_id"], id.as_str());
  }

  #[tokio::test]
  async fn clone_of_unknown_version_is_404() {
    let app = router().await;
    let resp = send(
      &app,
      "POST",
      "/versions",
      Some(json!({
        "name": "copy",
        "source": { "kind": "clone", "version_id": "00000000-0000-0000-0000-000000000000" },
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
