//! Framework versions and their flat membership rows.
//!
//! A version is a named selection and ordering of catalogue entities. Its
//! composition is stored as one [`FrameworkVersionItem`] per member node;
//! the nested tree is reconstructed on read (see [`crate::tree`]).

use std::{
  collections::{HashMap, HashSet},
  fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  refcode::{Level, Position},
};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of a version. `Draft` is initial, `Published` terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
  Draft,
  Published,
}

impl VersionStatus {
  pub const ALL: [Self; 2] = [Self::Draft, Self::Published];

  /// The lowercase name used on the wire and in storage.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::Published => "published",
    }
  }

  /// Whether the state machine allows moving from `self` to `to`.
  pub fn can_transition_to(self, to: Self) -> bool {
    matches!((self, to), (Self::Draft, Self::Published))
  }
}

impl fmt::Display for VersionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Version ─────────────────────────────────────────────────────────────────

/// A named snapshot of the framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkVersion {
  pub version_id:   Uuid,
  pub name:         String,
  pub status:       VersionStatus,
  pub created_at:   DateTime<Utc>,
  pub published_at: Option<DateTime<Utc>>,
}

impl FrameworkVersion {
  pub fn is_draft(&self) -> bool { self.status == VersionStatus::Draft }
}

/// The pointer to the version currently in effect. Distinct from publishing:
/// a version becomes immutable when published and canonical when activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveVersion {
  pub version_id:   Uuid,
  pub activated_at: DateTime<Utc>,
}

// ─── Membership ──────────────────────────────────────────────────────────────

/// The catalogue node an item binds its version to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "lowercase")]
pub enum NodeRef {
  Pillar {
    pillar_id: Uuid,
  },
  Theme {
    pillar_id: Uuid,
    theme_id:  Uuid,
  },
  Subtheme {
    pillar_id:   Uuid,
    theme_id:    Uuid,
    subtheme_id: Uuid,
  },
}

impl NodeRef {
  pub fn level(&self) -> Level {
    match self {
      Self::Pillar { .. } => Level::Pillar,
      Self::Theme { .. } => Level::Theme,
      Self::Subtheme { .. } => Level::Subtheme,
    }
  }

  pub fn pillar_id(&self) -> Uuid {
    match *self {
      Self::Pillar { pillar_id }
      | Self::Theme { pillar_id, .. }
      | Self::Subtheme { pillar_id, .. } => pillar_id,
    }
  }

  pub fn theme_id(&self) -> Option<Uuid> {
    match *self {
      Self::Pillar { .. } => None,
      Self::Theme { theme_id, .. } | Self::Subtheme { theme_id, .. } => Some(theme_id),
    }
  }

  pub fn subtheme_id(&self) -> Option<Uuid> {
    match *self {
      Self::Subtheme { subtheme_id, .. } => Some(subtheme_id),
      _ => None,
    }
  }

  /// The id of the catalogue entity at this node's own level.
  pub fn entity_id(&self) -> Uuid {
    match *self {
      Self::Pillar { pillar_id } => pillar_id,
      Self::Theme { theme_id, .. } => theme_id,
      Self::Subtheme { subtheme_id, .. } => subtheme_id,
    }
  }

  /// Whether `self` is `ancestor` or lies beneath it.
  pub fn is_within(&self, ancestor: &NodeRef) -> bool {
    match *ancestor {
      NodeRef::Pillar { pillar_id } => self.pillar_id() == pillar_id,
      NodeRef::Theme { pillar_id, theme_id } => {
        self.pillar_id() == pillar_id && self.theme_id() == Some(theme_id)
      }
      NodeRef::Subtheme { .. } => self == ancestor,
    }
  }
}

impl fmt::Display for NodeRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.level(), self.entity_id())
  }
}

/// A membership row. The three ids mirror the stored columns; use
/// [`FrameworkVersionItem::node`] to obtain a validated [`NodeRef`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkVersionItem {
  pub version_id:  Uuid,
  pub pillar_id:   Option<Uuid>,
  pub theme_id:    Option<Uuid>,
  pub subtheme_id: Option<Uuid>,
  /// Derived from the position; never edited by hand.
  pub ref_code:    String,
  /// Derived from the position; never edited by hand.
  pub sort_order:  i64,
}

impl FrameworkVersionItem {
  /// Build a row for `node` at `position`.
  pub fn new(version_id: Uuid, node: NodeRef, position: Position) -> Self {
    Self {
      version_id,
      pillar_id: Some(node.pillar_id()),
      theme_id: node.theme_id(),
      subtheme_id: node.subtheme_id(),
      ref_code: position.ref_code(),
      sort_order: position.sort_key(),
    }
  }

  /// Interpret the nullable id columns as a node reference.
  pub fn node(&self) -> Result<NodeRef> {
    match (self.pillar_id, self.theme_id, self.subtheme_id) {
      (Some(pillar_id), None, None) => Ok(NodeRef::Pillar { pillar_id }),
      (Some(pillar_id), Some(theme_id), None) => Ok(NodeRef::Theme { pillar_id, theme_id }),
      (Some(pillar_id), Some(theme_id), Some(subtheme_id)) => {
        Ok(NodeRef::Subtheme { pillar_id, theme_id, subtheme_id })
      }
      _ => Err(Error::Validation(format!(
        "item {} of version {} has a malformed level (pillar {:?}, theme {:?}, subtheme {:?})",
        self.ref_code, self.version_id, self.pillar_id, self.theme_id, self.subtheme_id,
      ))),
    }
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Check the membership invariants a full item set must satisfy before it
/// replaces a version's composition.
///
/// Beyond the per-row checks, every row whose parent row is present must be
/// coded inside its parent's position, and siblings must be numbered densely
/// from 1. Rows whose parent row is missing are let through so that tree
/// building can report them as incoherent.
pub fn validate_items(version_id: Uuid, items: &[FrameworkVersionItem]) -> Result<()> {
  let mut placed: HashMap<NodeRef, Position> = HashMap::with_capacity(items.len());
  let mut order = Vec::with_capacity(items.len());
  let mut keys = HashSet::with_capacity(items.len());

  for item in items {
    if item.version_id != version_id {
      return Err(Error::Validation(format!(
        "item {} belongs to version {}, not {version_id}",
        item.ref_code, item.version_id,
      )));
    }

    let node = item.node()?;
    if placed.contains_key(&node) {
      return Err(Error::Validation(format!(
        "{node} appears more than once in version {version_id}"
      )));
    }

    let position = Position::from_sort_key(item.sort_order).ok_or_else(|| {
      Error::Validation(format!(
        "sort order {} of {node} in version {version_id} is not a valid position",
        item.sort_order,
      ))
    })?;
    if position.level() != node.level() {
      return Err(Error::Validation(format!(
        "{node} in version {version_id} sits at {} position {position}",
        position.level(),
      )));
    }
    let coded: Position = item
      .ref_code
      .parse()
      .map_err(|e| Error::Validation(format!("{node} in version {version_id}: {e}")))?;
    if coded != position {
      return Err(Error::Validation(format!(
        "{node} in version {version_id} has ref code {} but sort order {} encodes {position}",
        item.ref_code, item.sort_order,
      )));
    }

    if !keys.insert(item.sort_order) {
      return Err(Error::Validation(format!(
        "position {position} is used more than once in version {version_id}"
      )));
    }
    placed.insert(node, position);
    order.push((node, position));
  }

  check_nesting(version_id, &placed, &order)
}

fn check_nesting(
  version_id: Uuid,
  placed: &HashMap<NodeRef, Position>,
  order: &[(NodeRef, Position)],
) -> Result<()> {
  let misplaced = |node: NodeRef, position: Position, parent: NodeRef, at: Position| {
    Error::Validation(format!(
      "{node} in version {version_id} is coded {position}, outside its parent {parent} at {at}"
    ))
  };

  // Sibling indices keyed by parent node; `None` collects the pillars.
  let mut siblings: HashMap<Option<NodeRef>, Vec<usize>> = HashMap::new();
  for &(node, position) in order {
    let (parent, index) = match (node, position) {
      (NodeRef::Pillar { .. }, Position::Pillar(p)) => (None, p),
      (NodeRef::Theme { pillar_id, .. }, Position::Theme(p, t)) => {
        let parent = NodeRef::Pillar { pillar_id };
        if let Some(&at) = placed.get(&parent)
          && at != Position::Pillar(p)
        {
          return Err(misplaced(node, position, parent, at));
        }
        (Some(parent), t)
      }
      (NodeRef::Subtheme { pillar_id, theme_id, .. }, Position::Subtheme(p, t, s)) => {
        let parent = NodeRef::Theme { pillar_id, theme_id };
        if let Some(&at) = placed.get(&parent)
          && at != Position::Theme(p, t)
        {
          return Err(misplaced(node, position, parent, at));
        }
        (Some(parent), s)
      }
      _ => {
        return Err(Error::Validation(format!(
          "{node} in version {version_id} sits at {} position {position}",
          position.level(),
        )));
      }
    };
    siblings.entry(parent).or_default().push(index);
  }

  for (parent, mut indices) in siblings {
    indices.sort_unstable();
    if let Some((expected, _)) = indices.iter().enumerate().find(|(i, n)| i != *n) {
      let group = match parent {
        Some(parent) => format!("children of {parent}"),
        None => "pillars".to_string(),
      };
      return Err(Error::Validation(format!(
        "{group} in version {version_id} are not numbered consecutively: position {} is missing",
        expected + 1,
      )));
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pillar_item(version_id: Uuid, pillar_id: Uuid, p: usize) -> FrameworkVersionItem {
    FrameworkVersionItem::new(version_id, NodeRef::Pillar { pillar_id }, Position::Pillar(p))
  }

  #[test]
  fn only_draft_to_published_is_legal() {
    use VersionStatus::*;
    assert!(Draft.can_transition_to(Published));
    assert!(!Published.can_transition_to(Draft));
    assert!(!Draft.can_transition_to(Draft));
    assert!(!Published.can_transition_to(Published));
  }

  #[test]
  fn node_rejects_malformed_levels() {
    let v = Uuid::new_v4();
    let mut item = pillar_item(v, Uuid::new_v4(), 0);
    item.pillar_id = None;
    assert!(matches!(item.node(), Err(Error::Validation(_))));

    let mut item = pillar_item(v, Uuid::new_v4(), 0);
    item.subtheme_id = Some(Uuid::new_v4());
    assert!(matches!(item.node(), Err(Error::Validation(_))));
  }

  #[test]
  fn valid_items_pass() {
    let v = Uuid::new_v4();
    let (p, t) = (Uuid::new_v4(), Uuid::new_v4());
    let items = vec![
      pillar_item(v, p, 0),
      FrameworkVersionItem::new(
        v,
        NodeRef::Theme { pillar_id: p, theme_id: t },
        Position::Theme(0, 0),
      ),
    ];
    validate_items(v, &items).unwrap();
  }

  #[test]
  fn duplicate_membership_is_rejected() {
    let v = Uuid::new_v4();
    let p = Uuid::new_v4();
    let items = vec![pillar_item(v, p, 0), pillar_item(v, p, 1)];
    let err = validate_items(v, &items).unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains(&p.to_string())), "{err}");
  }

  #[test]
  fn duplicate_positions_are_rejected() {
    let v = Uuid::new_v4();
    let items = vec![pillar_item(v, Uuid::new_v4(), 0), pillar_item(v, Uuid::new_v4(), 0)];
    assert!(matches!(validate_items(v, &items), Err(Error::Validation(_))));
  }

  #[test]
  fn hand_edited_codes_are_rejected() {
    let v = Uuid::new_v4();
    let mut item = pillar_item(v, Uuid::new_v4(), 0);
    item.ref_code = "P7".into();
    assert!(matches!(validate_items(v, &[item]), Err(Error::Validation(_))));

    let mut item = pillar_item(v, Uuid::new_v4(), 0);
    item.sort_order = Position::Theme(0, 0).sort_key();
    item.ref_code = "P1.T1".into();
    assert!(matches!(validate_items(v, &[item]), Err(Error::Validation(_))));
  }

  #[test]
  fn unparseable_codes_are_rejected() {
    let v = Uuid::new_v4();
    let mut item = pillar_item(v, Uuid::new_v4(), 0);
    item.ref_code = "pillar one".into();
    let err = validate_items(v, &[item]).unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains("pillar one")), "{err}");
  }

  #[test]
  fn theme_coded_under_another_pillar_is_rejected() {
    let v = Uuid::new_v4();
    let (a, b, t) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let items = vec![
      pillar_item(v, a, 0),
      pillar_item(v, b, 1),
      FrameworkVersionItem::new(
        v,
        NodeRef::Theme { pillar_id: b, theme_id: t },
        Position::Theme(0, 0),
      ),
    ];
    let err = validate_items(v, &items).unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains(&t.to_string())), "{err}");
  }

  #[test]
  fn subtheme_coded_under_another_theme_is_rejected() {
    let v = Uuid::new_v4();
    let (p, t1, t2, s) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let items = vec![
      pillar_item(v, p, 0),
      FrameworkVersionItem::new(
        v,
        NodeRef::Theme { pillar_id: p, theme_id: t1 },
        Position::Theme(0, 0),
      ),
      FrameworkVersionItem::new(
        v,
        NodeRef::Theme { pillar_id: p, theme_id: t2 },
        Position::Theme(0, 1),
      ),
      FrameworkVersionItem::new(
        v,
        NodeRef::Subtheme { pillar_id: p, theme_id: t2, subtheme_id: s },
        Position::Subtheme(0, 0, 0),
      ),
    ];
    assert!(matches!(validate_items(v, &items), Err(Error::Validation(_))));
  }

  #[test]
  fn sibling_numbering_must_be_dense() {
    let v = Uuid::new_v4();
    let items = vec![pillar_item(v, Uuid::new_v4(), 0), pillar_item(v, Uuid::new_v4(), 2)];
    let err = validate_items(v, &items).unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains("position 2 is missing")), "{err}");

    let p = Uuid::new_v4();
    let items = vec![
      pillar_item(v, p, 0),
      FrameworkVersionItem::new(
        v,
        NodeRef::Theme { pillar_id: p, theme_id: Uuid::new_v4() },
        Position::Theme(0, 4),
      ),
    ];
    let err = validate_items(v, &items).unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains("position 1 is missing")), "{err}");
  }

  #[test]
  fn rows_without_parent_row_are_left_to_tree_building() {
    let v = Uuid::new_v4();
    let items = vec![
      pillar_item(v, Uuid::new_v4(), 0),
      FrameworkVersionItem::new(
        v,
        NodeRef::Theme { pillar_id: Uuid::new_v4(), theme_id: Uuid::new_v4() },
        Position::Theme(0, 0),
      ),
    ];
    validate_items(v, &items).unwrap();
  }

  #[test]
  fn status_names_match_serde() {
    for status in VersionStatus::ALL {
      let json = serde_json::to_string(&status).unwrap();
      assert_eq!(json, format!("\"{}\"", status.as_str()));
      assert_eq!(status.to_string(), status.as_str());
    }
  }

  #[test]
  fn foreign_items_are_rejected() {
    let item = pillar_item(Uuid::new_v4(), Uuid::new_v4(), 0);
    assert!(matches!(validate_items(Uuid::new_v4(), &[item]), Err(Error::Validation(_))));
  }

  #[test]
  fn is_within_covers_descendants() {
    let (p, t, s) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let pillar = NodeRef::Pillar { pillar_id: p };
    let theme = NodeRef::Theme { pillar_id: p, theme_id: t };
    let sub = NodeRef::Subtheme { pillar_id: p, theme_id: t, subtheme_id: s };
    assert!(sub.is_within(&pillar));
    assert!(sub.is_within(&theme));
    assert!(theme.is_within(&pillar));
    assert!(!pillar.is_within(&theme));
    assert!(!theme.is_within(&sub));
  }
}
