//! Tree reconstruction: flat version items in, nested Pillar → Theme →
//! Subtheme nodes out.
//!
//! Construction happens in two linear phases:
//!
//! 1. [`Skeleton::from_nodes`] buckets the rows by level and parent id,
//!    rejecting duplicates and orphans. No catalogue access is needed, so
//!    structural faults surface as [`Error::IncoherentTree`] even when the
//!    referenced entities are also gone.
//! 2. [`Skeleton::resolve`] swaps ids for catalogue entities looked up in a
//!    [`CatalogueArena`]; a missing entity is an [`Error::DanglingReference`].
//!
//! The tree is a read model: it is never stored and is rebuilt on every read.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
  Error, Result,
  catalogue::{Pillar, Subtheme, Theme},
  error::IntoCore as _,
  refcode::{Level, MAX_CHILDREN, Position},
  store::{CatalogueRepository, VersionRepository},
  version::{FrameworkVersionItem, NodeRef},
};

// ─── Read model ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarNode {
  pub pillar:     Pillar,
  pub ref_code:   String,
  pub sort_order: i64,
  pub themes:     Vec<ThemeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeNode {
  pub theme:      Theme,
  pub ref_code:   String,
  pub sort_order: i64,
  /// Empty when the theme row has no subtheme rows.
  pub subthemes:  Vec<SubthemeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubthemeNode {
  pub subtheme:   Subtheme,
  pub ref_code:   String,
  pub sort_order: i64,
}

// ─── Skeleton ────────────────────────────────────────────────────────────────

/// The id-only shape of a version, each slot carrying a payload `T`.
#[derive(Debug, Clone)]
pub struct Skeleton<T> {
  pub pillars: Vec<PillarSlot<T>>,
}

#[derive(Debug, Clone)]
pub struct PillarSlot<T> {
  pub pillar_id: Uuid,
  pub payload:   T,
  pub themes:    Vec<ThemeSlot<T>>,
}

#[derive(Debug, Clone)]
pub struct ThemeSlot<T> {
  pub theme_id:  Uuid,
  pub payload:   T,
  pub subthemes: Vec<SubthemeSlot<T>>,
}

#[derive(Debug, Clone)]
pub struct SubthemeSlot<T> {
  pub subtheme_id: Uuid,
  pub payload:     T,
}

impl<T> Skeleton<T> {
  /// Bucket `entries` by level. Within each parent, children keep the order
  /// in which they appear in `entries`.
  pub fn from_nodes(
    version_id: Uuid,
    entries: impl IntoIterator<Item = (NodeRef, T)>,
  ) -> Result<Self> {
    let mut pillar_rows = Vec::new();
    let mut theme_rows = Vec::new();
    let mut subtheme_rows = Vec::new();
    for (node, payload) in entries {
      match node.level() {
        Level::Pillar => pillar_rows.push((node, payload)),
        Level::Theme => theme_rows.push((node, payload)),
        Level::Subtheme => subtheme_rows.push((node, payload)),
      }
    }

    let duplicate = |node: NodeRef| {
      Error::Validation(format!("{node} appears more than once in version {version_id}"))
    };

    let mut pillars: Vec<PillarSlot<T>> = Vec::with_capacity(pillar_rows.len());
    let mut pillar_index: HashMap<Uuid, usize> = HashMap::new();
    for (node, payload) in pillar_rows {
      let pillar_id = node.pillar_id();
      if pillar_index.insert(pillar_id, pillars.len()).is_some() {
        return Err(duplicate(node));
      }
      pillars.push(PillarSlot { pillar_id, payload, themes: Vec::new() });
    }

    let mut theme_index: HashMap<(Uuid, Uuid), (usize, usize)> = HashMap::new();
    for (node, payload) in theme_rows {
      let (pillar_id, theme_id) = (node.pillar_id(), node.entity_id());
      let &p = pillar_index.get(&pillar_id).ok_or_else(|| Error::IncoherentTree {
        version_id,
        reason: format!(
          "theme {theme_id} sits under pillar {pillar_id}, which is not part of the version"
        ),
      })?;
      let themes = &mut pillars[p].themes;
      if theme_index.insert((pillar_id, theme_id), (p, themes.len())).is_some() {
        return Err(duplicate(node));
      }
      themes.push(ThemeSlot { theme_id, payload, subthemes: Vec::new() });
    }

    for (node, payload) in subtheme_rows {
      let (pillar_id, subtheme_id) = (node.pillar_id(), node.entity_id());
      let theme_id = node.theme_id().unwrap_or_default();
      let &(p, t) = theme_index.get(&(pillar_id, theme_id)).ok_or_else(|| {
        Error::IncoherentTree {
          version_id,
          reason: format!(
            "subtheme {subtheme_id} sits under theme {theme_id} of pillar {pillar_id}, \
             which is not part of the version"
          ),
        }
      })?;
      let subthemes = &mut pillars[p].themes[t].subthemes;
      if subthemes.iter().any(|s| s.subtheme_id == subtheme_id) {
        return Err(duplicate(node));
      }
      subthemes.push(SubthemeSlot { subtheme_id, payload });
    }

    Ok(Self { pillars })
  }

  /// Every node with its position, in document order.
  pub fn positions(&self) -> Vec<(NodeRef, Position)> {
    let mut out = Vec::new();
    for (p, pillar) in self.pillars.iter().enumerate() {
      let pillar_id = pillar.pillar_id;
      out.push((NodeRef::Pillar { pillar_id }, Position::Pillar(p)));
      for (t, theme) in pillar.themes.iter().enumerate() {
        let theme_id = theme.theme_id;
        out.push((NodeRef::Theme { pillar_id, theme_id }, Position::Theme(p, t)));
        for (s, sub) in theme.subthemes.iter().enumerate() {
          out.push((
            NodeRef::Subtheme { pillar_id, theme_id, subtheme_id: sub.subtheme_id },
            Position::Subtheme(p, t, s),
          ));
        }
      }
    }
    out
  }

  /// Derive fresh membership rows for `version_id` from this shape.
  ///
  /// Fails with a validation error when a parent has more children than the
  /// sort key can encode.
  pub fn to_items(&self, version_id: Uuid) -> Result<Vec<FrameworkVersionItem>> {
    let over_capacity = |parent: String, count: usize| {
      Error::Validation(format!(
        "{parent} in version {version_id} has {count} children; at most {MAX_CHILDREN} are supported"
      ))
    };
    for pillar in &self.pillars {
      if pillar.themes.len() > MAX_CHILDREN {
        return Err(over_capacity(format!("pillar {}", pillar.pillar_id), pillar.themes.len()));
      }
      for theme in &pillar.themes {
        if theme.subthemes.len() > MAX_CHILDREN {
          return Err(over_capacity(format!("theme {}", theme.theme_id), theme.subthemes.len()));
        }
      }
    }

    Ok(
      self
        .positions()
        .into_iter()
        .map(|(node, position)| FrameworkVersionItem::new(version_id, node, position))
        .collect(),
    )
  }

  /// Check every slot against `arena`, failing on the first entity that is
  /// missing or catalogued under a different parent.
  pub fn check_catalogue(&self, version_id: Uuid, arena: &CatalogueArena) -> Result<()> {
    let dangling = |level, id| Error::DanglingReference { version_id, level, id };
    for pillar in &self.pillars {
      if !arena.pillars.contains_key(&pillar.pillar_id) {
        return Err(dangling(Level::Pillar, pillar.pillar_id));
      }
      for theme in &pillar.themes {
        match arena.themes.get(&theme.theme_id) {
          Some(t) if t.pillar_id == pillar.pillar_id => {}
          _ => return Err(dangling(Level::Theme, theme.theme_id)),
        }
        for sub in &theme.subthemes {
          match arena.subthemes.get(&sub.subtheme_id) {
            Some(s) if s.theme_id == theme.theme_id => {}
            _ => return Err(dangling(Level::Subtheme, sub.subtheme_id)),
          }
        }
      }
    }
    Ok(())
  }
}

/// Code and key carried from a stored row into its tree node.
#[derive(Debug, Clone)]
pub struct Placement {
  pub ref_code:   String,
  pub sort_order: i64,
}

impl Skeleton<Placement> {
  /// Bucket stored rows. Rows are ordered by `sort_order` first, so the
  /// result does not depend on the order the store returned them in.
  pub fn from_items(version_id: Uuid, mut items: Vec<FrameworkVersionItem>) -> Result<Self> {
    items.sort_by_key(|item| item.sort_order);
    let entries = items
      .into_iter()
      .map(|item| {
        let node = item.node()?;
        Ok((node, Placement { ref_code: item.ref_code, sort_order: item.sort_order }))
      })
      .collect::<Result<Vec<_>>>()?;
    Self::from_nodes(version_id, entries)
  }

  /// Replace ids with catalogue entities.
  pub fn resolve(self, version_id: Uuid, arena: &CatalogueArena) -> Result<Vec<PillarNode>> {
    let dangling = |level, id| Error::DanglingReference { version_id, level, id };

    self
      .pillars
      .into_iter()
      .map(|slot| {
        let pillar = arena
          .pillars
          .get(&slot.pillar_id)
          .ok_or_else(|| dangling(Level::Pillar, slot.pillar_id))?;

        let themes = slot
          .themes
          .into_iter()
          .map(|theme_slot| {
            let theme = arena
              .themes
              .get(&theme_slot.theme_id)
              .filter(|t| t.pillar_id == slot.pillar_id)
              .ok_or_else(|| dangling(Level::Theme, theme_slot.theme_id))?;

            let subthemes = theme_slot
              .subthemes
              .into_iter()
              .map(|sub_slot| {
                let subtheme = arena
                  .subthemes
                  .get(&sub_slot.subtheme_id)
                  .filter(|s| s.theme_id == theme_slot.theme_id)
                  .ok_or_else(|| dangling(Level::Subtheme, sub_slot.subtheme_id))?;
                Ok(SubthemeNode {
                  subtheme:   subtheme.clone(),
                  ref_code:   sub_slot.payload.ref_code,
                  sort_order: sub_slot.payload.sort_order,
                })
              })
              .collect::<Result<Vec<_>>>()?;

            Ok(ThemeNode {
              theme: theme.clone(),
              ref_code: theme_slot.payload.ref_code,
              sort_order: theme_slot.payload.sort_order,
              subthemes,
            })
          })
          .collect::<Result<Vec<_>>>()?;

        Ok(PillarNode {
          pillar: pillar.clone(),
          ref_code: slot.payload.ref_code,
          sort_order: slot.payload.sort_order,
          themes,
        })
      })
      .collect()
  }
}

// ─── Catalogue arena ─────────────────────────────────────────────────────────

/// Catalogue entities keyed by id.
#[derive(Debug, Clone, Default)]
pub struct CatalogueArena {
  pub pillars:   HashMap<Uuid, Pillar>,
  pub themes:    HashMap<Uuid, Theme>,
  pub subthemes: HashMap<Uuid, Subtheme>,
}

impl CatalogueArena {
  /// Load the part of the catalogue that `skeleton` refers to: every pillar,
  /// plus the children of each referenced parent that still exists.
  pub async fn load<C, T>(catalogue: &C, skeleton: &Skeleton<T>) -> Result<Self>
  where
    C: CatalogueRepository,
  {
    let pillars = catalogue.list_pillars().await.into_core()?;
    let mut arena = Self {
      pillars: pillars.into_iter().map(|p| (p.pillar_id, p)).collect(),
      ..Self::default()
    };

    for pillar in &skeleton.pillars {
      if pillar.themes.is_empty() || !arena.pillars.contains_key(&pillar.pillar_id) {
        continue;
      }
      let themes = catalogue.list_themes(pillar.pillar_id).await.into_core()?;
      arena.themes.extend(themes.into_iter().map(|t| (t.theme_id, t)));

      for theme in &pillar.themes {
        if theme.subthemes.is_empty() || !arena.themes.contains_key(&theme.theme_id) {
          continue;
        }
        let subthemes = catalogue.list_subthemes(theme.theme_id).await.into_core()?;
        arena.subthemes.extend(subthemes.into_iter().map(|s| (s.subtheme_id, s)));
      }
    }

    Ok(arena)
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Reconstruct the nested tree of a version.
///
/// Fails with a not-found error for an unknown version, an incoherent-tree
/// error for orphaned rows, and a dangling-reference error when a row points
/// at an entity the catalogue no longer holds (or holds under another
/// parent).
pub async fn build_tree<C, V>(catalogue: &C, versions: &V, version_id: Uuid) -> Result<Vec<PillarNode>>
where
  C: CatalogueRepository,
  V: VersionRepository,
{
  let items = versions.get_version_items(version_id).await.into_core()?;
  build_tree_from_items(catalogue, version_id, items).await
}

/// Like [`build_tree`], over item rows the caller has already fetched.
pub async fn build_tree_from_items<C>(
  catalogue: &C,
  version_id: Uuid,
  items: Vec<FrameworkVersionItem>,
) -> Result<Vec<PillarNode>>
where
  C: CatalogueRepository,
{
  let count = items.len();
  let skeleton = Skeleton::from_items(version_id, items)?;
  let arena = CatalogueArena::load(catalogue, &skeleton).await?;
  let tree = skeleton.resolve(version_id, &arena)?;
  tracing::debug!(%version_id, items = count, pillars = tree.len(), "built version tree");
  Ok(tree)
}

/// SHA-256 over the `(ref_code, entity id)` pairs of a tree, in order.
///
/// Equal trees always hash equal; any change in membership or ordering
/// changes the hash.
pub fn tree_fingerprint(tree: &[PillarNode]) -> String {
  let mut hasher = Sha256::new();
  let mut feed = |code: &str, id: &Uuid| {
    hasher.update(code.as_bytes());
    hasher.update([0]);
    hasher.update(id.as_bytes());
  };
  for pillar in tree {
    feed(&pillar.ref_code, &pillar.pillar.pillar_id);
    for theme in &pillar.themes {
      feed(&theme.ref_code, &theme.theme.theme_id);
      for sub in &theme.subthemes {
        feed(&sub.ref_code, &sub.subtheme.subtheme_id);
      }
    }
  }
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  struct Fixture {
    arena:    CatalogueArena,
    shelter:  Uuid,
    access:   Uuid,
    adequacy: Uuid,
    space:    Uuid,
    weather:  Uuid,
  }

  fn fixture() -> Fixture {
    let mut arena = CatalogueArena::default();
    let pillar = |name: &str| Pillar {
      pillar_id:   Uuid::new_v4(),
      name:        name.into(),
      description: None,
      created_at:  Utc::now(),
    };
    let shelter = pillar("Shelter");
    let access = pillar("Access");
    let adequacy = Theme {
      theme_id:    Uuid::new_v4(),
      pillar_id:   shelter.pillar_id,
      name:        "Adequacy".into(),
      description: None,
      created_at:  Utc::now(),
    };
    let sub = |name: &str| Subtheme {
      subtheme_id: Uuid::new_v4(),
      theme_id:    adequacy.theme_id,
      name:        name.into(),
      description: None,
      created_at:  Utc::now(),
    };
    let space = sub("Space");
    let weather = sub("Weatherproofing");

    let ids = (
      shelter.pillar_id,
      access.pillar_id,
      adequacy.theme_id,
      space.subtheme_id,
      weather.subtheme_id,
    );
    arena.pillars.insert(shelter.pillar_id, shelter);
    arena.pillars.insert(access.pillar_id, access);
    arena.themes.insert(adequacy.theme_id, adequacy);
    arena.subthemes.insert(space.subtheme_id, space);
    arena.subthemes.insert(weather.subtheme_id, weather);

    Fixture {
      arena,
      shelter: ids.0,
      access: ids.1,
      adequacy: ids.2,
      space: ids.3,
      weather: ids.4,
    }
  }

  fn shelter_nodes(f: &Fixture) -> Vec<NodeRef> {
    vec![
      NodeRef::Pillar { pillar_id: f.shelter },
      NodeRef::Theme { pillar_id: f.shelter, theme_id: f.adequacy },
      NodeRef::Subtheme { pillar_id: f.shelter, theme_id: f.adequacy, subtheme_id: f.space },
      NodeRef::Subtheme { pillar_id: f.shelter, theme_id: f.adequacy, subtheme_id: f.weather },
    ]
  }

  fn items_for(version_id: Uuid, nodes: Vec<NodeRef>) -> Vec<FrameworkVersionItem> {
    Skeleton::from_nodes(version_id, nodes.into_iter().map(|n| (n, ())))
      .unwrap()
      .to_items(version_id)
      .unwrap()
  }

  #[test]
  fn builds_the_documented_scenario() {
    let f = fixture();
    let v = Uuid::new_v4();
    let items = items_for(v, shelter_nodes(&f));

    let tree = Skeleton::from_items(v, items).unwrap().resolve(v, &f.arena).unwrap();

    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].pillar.name, "Shelter");
    assert_eq!(tree[0].ref_code, "P1");
    assert_eq!(tree[0].themes.len(), 1);
    assert_eq!(tree[0].themes[0].ref_code, "P1.T1");
    let subs: Vec<_> = tree[0].themes[0]
      .subthemes
      .iter()
      .map(|s| (s.ref_code.as_str(), s.subtheme.name.as_str()))
      .collect();
    assert_eq!(subs, [("P1.T1.S1", "Space"), ("P1.T1.S2", "Weatherproofing")]);
  }

  #[test]
  fn fetch_order_does_not_matter() {
    let f = fixture();
    let v = Uuid::new_v4();
    let mut nodes = shelter_nodes(&f);
    nodes.push(NodeRef::Pillar { pillar_id: f.access });
    let items = items_for(v, nodes);

    let mut shuffled = items.clone();
    shuffled.reverse();
    shuffled.swap(0, 2);

    let a = Skeleton::from_items(v, items).unwrap().resolve(v, &f.arena).unwrap();
    let b = Skeleton::from_items(v, shuffled).unwrap().resolve(v, &f.arena).unwrap();
    assert_eq!(a, b);
    assert_eq!(tree_fingerprint(&a), tree_fingerprint(&b));
    assert_eq!(a[1].pillar.name, "Access");
    assert!(a[1].themes.is_empty());
  }

  #[test]
  fn theme_without_subthemes_keeps_empty_list() {
    let f = fixture();
    let v = Uuid::new_v4();
    let items = items_for(v, shelter_nodes(&f)[..2].to_vec());
    let tree = Skeleton::from_items(v, items).unwrap().resolve(v, &f.arena).unwrap();
    assert_eq!(tree[0].themes.len(), 1);
    assert!(tree[0].themes[0].subthemes.is_empty());
  }

  #[test]
  fn orphan_theme_is_incoherent() {
    let f = fixture();
    let v = Uuid::new_v4();
    let nodes = vec![
      NodeRef::Pillar { pillar_id: f.access },
      NodeRef::Theme { pillar_id: f.shelter, theme_id: f.adequacy },
    ];
    let err = Skeleton::from_nodes(v, nodes.into_iter().map(|n| (n, ()))).unwrap_err();
    assert!(matches!(err, Error::IncoherentTree { version_id, .. } if version_id == v), "{err}");
  }

  #[test]
  fn orphan_subtheme_is_incoherent() {
    let f = fixture();
    let v = Uuid::new_v4();
    let nodes = vec![
      NodeRef::Pillar { pillar_id: f.shelter },
      NodeRef::Subtheme { pillar_id: f.shelter, theme_id: f.adequacy, subtheme_id: f.space },
    ];
    let err = Skeleton::from_nodes(v, nodes.into_iter().map(|n| (n, ()))).unwrap_err();
    assert!(matches!(err, Error::IncoherentTree { .. }), "{err}");
    assert!(err.to_string().contains(&f.space.to_string()));
  }

  #[test]
  fn missing_pillar_is_dangling() {
    let mut f = fixture();
    let v = Uuid::new_v4();
    let items = items_for(v, shelter_nodes(&f));
    f.arena.pillars.remove(&f.shelter);

    let err = Skeleton::from_items(v, items).unwrap().resolve(v, &f.arena).unwrap_err();
    assert!(
      matches!(err, Error::DanglingReference { level: Level::Pillar, id, .. } if id == f.shelter),
      "{err}"
    );
  }

  #[test]
  fn theme_under_wrong_pillar_is_dangling() {
    let f = fixture();
    let v = Uuid::new_v4();
    let items = items_for(
      v,
      vec![
        NodeRef::Pillar { pillar_id: f.access },
        NodeRef::Theme { pillar_id: f.access, theme_id: f.adequacy },
      ],
    );
    let err = Skeleton::from_items(v, items).unwrap().resolve(v, &f.arena).unwrap_err();
    assert!(
      matches!(err, Error::DanglingReference { level: Level::Theme, id, .. } if id == f.adequacy),
      "{err}"
    );
  }

  #[test]
  fn renumbering_follows_parent_grouping() {
    let f = fixture();
    let v = Uuid::new_v4();
    // Subthemes listed before their parents still land under them, and the
    // second pillar keeps its first-seen rank.
    let mut nodes = shelter_nodes(&f);
    nodes.rotate_left(2);
    nodes.push(NodeRef::Pillar { pillar_id: f.access });

    let items = items_for(v, nodes);
    let codes: Vec<_> = items.iter().map(|i| i.ref_code.as_str()).collect();
    assert_eq!(codes, ["P1", "P1.T1", "P1.T1.S1", "P1.T1.S2", "P2"]);
    assert_eq!(items[4].pillar_id, Some(f.access));
    crate::version::validate_items(v, &items).unwrap();
  }

  #[test]
  fn too_many_children_are_rejected() {
    let v = Uuid::new_v4();
    let pillar_id = Uuid::new_v4();
    let nodes = std::iter::once(NodeRef::Pillar { pillar_id }).chain(
      (0..=MAX_CHILDREN).map(|_| NodeRef::Theme { pillar_id, theme_id: Uuid::new_v4() }),
    );
    let skeleton = Skeleton::from_nodes(v, nodes.map(|n| (n, ()))).unwrap();
    assert!(matches!(skeleton.to_items(v), Err(Error::Validation(_))));
  }

  #[test]
  fn fingerprint_tracks_order() {
    let f = fixture();
    let v = Uuid::new_v4();
    let mut nodes = shelter_nodes(&f);
    let a = Skeleton::from_items(v, items_for(v, nodes.clone()))
      .unwrap()
      .resolve(v, &f.arena)
      .unwrap();
    nodes.swap(2, 3);
    let b = Skeleton::from_items(v, items_for(v, nodes)).unwrap().resolve(v, &f.arena).unwrap();
    assert_ne!(tree_fingerprint(&a), tree_fingerprint(&b));
  }
}
