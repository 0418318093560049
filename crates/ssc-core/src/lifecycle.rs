//! The version lifecycle manager.
//!
//! Versions are created as drafts (blank, snapshotted from the catalogue, or
//! cloned from another version), edited while draft, and published exactly
//! once. Publishing freezes a version; activating it makes it the one in
//! effect. The two are separate steps.
//!
//! Every change to a draft's composition re-derives all reference codes and
//! sort keys from scratch and goes through
//! [`VersionRepository::replace_items`] as one atomic write.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error, Result,
  error::IntoCore as _,
  store::{CatalogueRepository, VersionRepository},
  tree::{self, CatalogueArena, PillarNode, Skeleton},
  version::{
    ActiveVersion, FrameworkVersion, FrameworkVersionItem, NodeRef, VersionStatus,
  },
};

/// Derive membership rows for `version_id` from a node list.
///
/// Pillars are numbered in first-seen order; themes and subthemes in the
/// order they appear within their parent.
pub fn renumber(version_id: Uuid, nodes: Vec<NodeRef>) -> Result<Vec<FrameworkVersionItem>> {
  Skeleton::from_nodes(version_id, nodes.into_iter().map(|n| (n, ())))?.to_items(version_id)
}

fn normalize_name(name: &str) -> Result<String> {
  let name = name.trim();
  if name.is_empty() {
    return Err(Error::Validation("framework versions need a name".into()));
  }
  Ok(name.to_owned())
}

/// Lifecycle operations over a store that holds both the catalogue and the
/// versions.
///
/// Cloning is cheap; the store is reference-counted.
pub struct Lifecycle<S> {
  store: Arc<S>,
}

impl<S> Clone for Lifecycle<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S> Lifecycle<S>
where
  S: CatalogueRepository + VersionRepository,
{
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &S { &self.store }

  async fn require_version(&self, version_id: Uuid) -> Result<FrameworkVersion> {
    self
      .store
      .get_version(version_id)
      .await
      .into_core()?
      .ok_or(Error::VersionNotFound(version_id))
  }

  async fn require_draft(
    &self,
    version_id: Uuid,
    action: &'static str,
  ) -> Result<FrameworkVersion> {
    let version = self.require_version(version_id).await?;
    if !version.is_draft() {
      return Err(Error::InvalidState { version_id, status: version.status, action });
    }
    Ok(version)
  }

  async fn current_nodes(&self, version_id: Uuid) -> Result<Vec<NodeRef>> {
    let mut items = self.store.get_version_items(version_id).await.into_core()?;
    items.sort_by_key(|item| item.sort_order);
    items.iter().map(FrameworkVersionItem::node).collect()
  }

  /// Create a draft already filled with `nodes`, in a single store call.
  async fn create_populated(&self, name: String, nodes: Vec<NodeRef>) -> Result<FrameworkVersion> {
    let version_id = Uuid::new_v4();
    let items = renumber(version_id, nodes)?;
    self.store.create_version_with_items(version_id, name, items).await.into_core()
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Reconstruct the nested tree of a version.
  pub async fn build_tree(&self, version_id: Uuid) -> Result<Vec<PillarNode>> {
    tree::build_tree(&*self.store, &*self.store, version_id).await
  }

  /// The currently active version, if any.
  pub async fn active_version(&self) -> Result<Option<FrameworkVersion>> {
    match self.store.get_active().await.into_core()? {
      Some(active) => self.require_version(active.version_id).await.map(Some),
      None => Ok(None),
    }
  }

  // ── Draft creation ────────────────────────────────────────────────────────

  /// Create an empty draft.
  pub async fn create_blank_draft(&self, name: &str) -> Result<FrameworkVersion> {
    let version = self.store.create_version(normalize_name(name)?).await.into_core()?;
    tracing::info!(version_id = %version.version_id, name = %version.name, "created blank draft");
    Ok(version)
  }

  /// Create a draft holding every pillar, theme and subtheme of the
  /// catalogue, numbered in catalogue order.
  ///
  /// The catalogue is read level by level without a snapshot; an edit that
  /// lands mid-copy can be missed or half-applied. Catalogue edits and draft
  /// creation are expected to be serialized by the administrators.
  pub async fn create_draft_from_catalogue(&self, name: &str) -> Result<FrameworkVersion> {
    let name = normalize_name(name)?;

    let mut nodes = Vec::new();
    for pillar in self.store.list_pillars().await.into_core()? {
      let pillar_id = pillar.pillar_id;
      nodes.push(NodeRef::Pillar { pillar_id });
      for theme in self.store.list_themes(pillar_id).await.into_core()? {
        let theme_id = theme.theme_id;
        nodes.push(NodeRef::Theme { pillar_id, theme_id });
        for sub in self.store.list_subthemes(theme_id).await.into_core()? {
          nodes.push(NodeRef::Subtheme { pillar_id, theme_id, subtheme_id: sub.subtheme_id });
        }
      }
    }

    let count = nodes.len();
    let version = self.create_populated(name, nodes).await?;
    tracing::info!(
      version_id = %version.version_id,
      name = %version.name,
      items = count,
      "created draft from catalogue"
    );
    Ok(version)
  }

  /// Create a draft with the same members, in the same relative order, as
  /// `source_id`. Codes are re-derived rather than copied.
  pub async fn clone_version(&self, source_id: Uuid, new_name: &str) -> Result<FrameworkVersion> {
    let name = normalize_name(new_name)?;
    self.require_version(source_id).await?;
    let nodes = self.current_nodes(source_id).await?;

    let count = nodes.len();
    let version = self.create_populated(name, nodes).await?;
    tracing::info!(
      version_id = %version.version_id,
      %source_id,
      items = count,
      "cloned framework version"
    );
    Ok(version)
  }

  // ── Draft editing ─────────────────────────────────────────────────────────

  /// Replace the composition of a draft. Every node must exist in the
  /// catalogue under the parent it is listed with.
  pub async fn set_composition(
    &self,
    version_id: Uuid,
    nodes: Vec<NodeRef>,
  ) -> Result<Vec<FrameworkVersionItem>> {
    self.require_draft(version_id, "edit").await?;

    let skeleton = Skeleton::from_nodes(version_id, nodes.into_iter().map(|n| (n, ())))?;
    let arena = CatalogueArena::load(&*self.store, &skeleton).await?;
    skeleton.check_catalogue(version_id, &arena)?;

    let items = skeleton.to_items(version_id)?;
    self.store.replace_items(version_id, items.clone()).await.into_core()?;
    tracing::info!(%version_id, items = items.len(), "replaced draft composition");
    Ok(items)
  }

  /// Add one node to a draft, last among its siblings. Its parent must
  /// already be part of the version.
  pub async fn add_node(
    &self,
    version_id: Uuid,
    node: NodeRef,
  ) -> Result<Vec<FrameworkVersionItem>> {
    self.require_draft(version_id, "edit").await?;
    let mut nodes = self.current_nodes(version_id).await?;
    nodes.push(node);
    self.set_composition(version_id, nodes).await
  }

  /// Remove a node and everything beneath it from a draft.
  ///
  /// The catalogue is not consulted, so this also repairs drafts whose
  /// members have since left the catalogue.
  pub async fn remove_node(
    &self,
    version_id: Uuid,
    node: NodeRef,
  ) -> Result<Vec<FrameworkVersionItem>> {
    self.require_draft(version_id, "edit").await?;
    let nodes = self.current_nodes(version_id).await?;
    if !nodes.contains(&node) {
      return Err(Error::Validation(format!(
        "{node} is not part of version {version_id}"
      )));
    }

    let kept: Vec<_> = nodes.into_iter().filter(|n| !n.is_within(&node)).collect();
    let items = renumber(version_id, kept)?;
    self.store.replace_items(version_id, items.clone()).await.into_core()?;
    tracing::info!(%version_id, removed = %node, "removed node from draft");
    Ok(items)
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Publish a draft. The version's tree must build cleanly first, and the
  /// rows that were checked must still be the stored ones when the status
  /// flips.
  pub async fn publish_version(&self, version_id: Uuid) -> Result<FrameworkVersion> {
    let version = self.require_version(version_id).await?;
    if !version.status.can_transition_to(VersionStatus::Published) {
      return Err(Error::InvalidTransition {
        version_id,
        from: version.status,
        to: VersionStatus::Published,
      });
    }

    let items = self.store.get_version_items(version_id).await.into_core()?;
    tree::build_tree_from_items(&*self.store, version_id, items.clone()).await?;

    let published = self.store.publish_checked(version_id, items).await.into_core()?;
    tracing::info!(%version_id, name = %published.name, "published framework version");
    Ok(published)
  }

  /// Make a published version the one in effect.
  pub async fn activate_version(&self, version_id: Uuid) -> Result<ActiveVersion> {
    let version = self.require_version(version_id).await?;
    if version.status != VersionStatus::Published {
      return Err(Error::InvalidState { version_id, status: version.status, action: "activate" });
    }

    let active = self.store.set_active(version_id).await.into_core()?;
    tracing::info!(%version_id, name = %version.name, "activated framework version");
    Ok(active)
  }

  /// Delete a draft.
  pub async fn delete_version(&self, version_id: Uuid) -> Result<()> {
    self.store.delete_version(version_id).await.into_core()?;
    tracing::info!(%version_id, "deleted draft version");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_names_are_rejected() {
    assert!(matches!(normalize_name("   "), Err(Error::Validation(_))));
    assert_eq!(normalize_name(" 2024 revision ").unwrap(), "2024 revision");
  }

  #[test]
  fn renumber_rejects_duplicates() {
    let v = Uuid::new_v4();
    let pillar_id = Uuid::new_v4();
    let nodes = vec![NodeRef::Pillar { pillar_id }, NodeRef::Pillar { pillar_id }];
    assert!(matches!(renumber(v, nodes), Err(Error::Validation(_))));
  }

  #[test]
  fn renumbered_items_are_nested_and_dense() {
    let v = Uuid::new_v4();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let (ta, tb) = (Uuid::new_v4(), Uuid::new_v4());
    let nodes = vec![
      NodeRef::Pillar { pillar_id: a },
      NodeRef::Pillar { pillar_id: b },
      NodeRef::Theme { pillar_id: b, theme_id: tb },
      NodeRef::Theme { pillar_id: a, theme_id: ta },
      NodeRef::Subtheme { pillar_id: b, theme_id: tb, subtheme_id: Uuid::new_v4() },
    ];
    let items = renumber(v, nodes).unwrap();
    crate::version::validate_items(v, &items).unwrap();

    let codes: Vec<_> = items.iter().map(|i| i.ref_code.as_str()).collect();
    assert!(codes.contains(&"P2.T1.S1"), "{codes:?}");
    assert!(codes.contains(&"P1.T1"), "{codes:?}");
  }

  #[test]
  fn renumber_of_nothing_is_empty() {
    assert!(renumber(Uuid::new_v4(), Vec::new()).unwrap().is_empty());
  }
}
