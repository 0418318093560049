//! Async HTTP client wrapping the framework JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use ssc_core::{
  catalogue::Pillar,
  tree::PillarNode,
  version::{ActiveVersion, FrameworkVersion},
};
use uuid::Uuid;

/// Connection settings for the framework API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
}

/// Where a new draft takes its members from.
#[derive(Debug, Clone, Copy)]
pub enum DraftSource {
  Blank,
  Catalogue,
  Clone(Uuid),
}

impl DraftSource {
  fn to_json(self) -> Value {
    match self {
      DraftSource::Blank => json!({ "kind": "blank" }),
      DraftSource::Catalogue => json!({ "kind": "catalogue" }),
      DraftSource::Clone(version_id) => json!({ "kind": "clone", "version_id": version_id }),
    }
  }
}

/// Async HTTP client for the framework JSON REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    self.client.request(method, self.url(path))
  }

  /// Send `req`, turning a non-2xx answer into an error carrying the
  /// server's message.
  async fn send(req: RequestBuilder, what: &str) -> Result<Response> {
    let resp = req.send().await.with_context(|| format!("{what} failed"))?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }

    let message = resp
      .json::<Value>()
      .await
      .ok()
      .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_owned))
      .unwrap_or_else(|| status.to_string());
    Err(anyhow!("{what} → {status}: {message}"))
  }

  async fn fetch<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T> {
    let what = format!("{method} {path}");
    Self::send(self.request(method, path), &what)
      .await?
      .json()
      .await
      .with_context(|| format!("deserialising response of {what}"))
  }

  // ── Catalogue ─────────────────────────────────────────────────────────────

  /// `GET /api/catalogue/pillars`
  pub async fn list_pillars(&self) -> Result<Vec<Pillar>> {
    self.fetch(Method::GET, "/catalogue/pillars").await
  }

  // ── Versions ──────────────────────────────────────────────────────────────

  /// `GET /api/versions`
  pub async fn list_versions(&self) -> Result<Vec<FrameworkVersion>> {
    self.fetch(Method::GET, "/versions").await
  }

  /// `GET /api/versions/{id}/tree`
  pub async fn tree(&self, version_id: Uuid) -> Result<Vec<PillarNode>> {
    self.fetch(Method::GET, &format!("/versions/{version_id}/tree")).await
  }

  /// `POST /api/versions`
  pub async fn create_draft(&self, name: &str, source: DraftSource) -> Result<FrameworkVersion> {
    let req = self
      .request(Method::POST, "/versions")
      .json(&json!({ "name": name, "source": source.to_json() }));
    Self::send(req, "POST /versions")
      .await?
      .json()
      .await
      .context("deserialising new draft")
  }

  /// `POST /api/versions/{id}/publish`
  pub async fn publish(&self, version_id: Uuid) -> Result<FrameworkVersion> {
    self.fetch(Method::POST, &format!("/versions/{version_id}/publish")).await
  }

  /// `POST /api/versions/{id}/activate`
  pub async fn activate(&self, version_id: Uuid) -> Result<ActiveVersion> {
    self.fetch(Method::POST, &format!("/versions/{version_id}/activate")).await
  }

  /// `DELETE /api/versions/{id}`
  pub async fn delete(&self, version_id: Uuid) -> Result<()> {
    let path = format!("/versions/{version_id}");
    Self::send(self.request(Method::DELETE, &path), &format!("DELETE {path}")).await?;
    Ok(())
  }

  /// `GET /api/active` — `None` when no version is active.
  pub async fn active(&self) -> Result<Option<FrameworkVersion>> {
    let resp = self
      .request(Method::GET, "/active")
      .send()
      .await
      .context("GET /active failed")?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if !resp.status().is_success() {
      return Err(anyhow!("GET /active → {}", resp.status()));
    }
    resp.json().await.map(Some).context("deserialising active version")
  }
}
