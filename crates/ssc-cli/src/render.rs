//! Plain-text rendering of API responses.

use std::fmt::Write as _;

use ssc_core::{tree::PillarNode, version::FrameworkVersion};

/// One `ref_code  name` line per node, indented two spaces per level.
pub fn tree(nodes: &[PillarNode]) -> String {
  let mut out = String::new();
  for pillar in nodes {
    let _ = writeln!(out, "{}  {}", pillar.ref_code, pillar.pillar.name);
    for theme in &pillar.themes {
      let _ = writeln!(out, "  {}  {}", theme.ref_code, theme.theme.name);
      for sub in &theme.subthemes {
        let _ = writeln!(out, "    {}  {}", sub.ref_code, sub.subtheme.name);
      }
    }
  }
  out
}

/// One line per version: id, status, creation date and name.
pub fn version_line(v: &FrameworkVersion) -> String {
  format!(
    "{}  {:<9}  {}  {}",
    v.version_id,
    v.status.to_string(),
    v.created_at.format("%Y-%m-%d"),
    v.name
  )
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use ssc_core::{
    catalogue::{Pillar, Subtheme, Theme},
    tree::{SubthemeNode, ThemeNode},
  };
  use uuid::Uuid;

  use super::*;

  #[test]
  fn tree_is_indented_by_level() {
    let now = Utc::now();
    let pillar = Pillar {
      pillar_id:   Uuid::new_v4(),
      name:        "Shelter".into(),
      description: None,
      created_at:  now,
    };
    let theme = Theme {
      theme_id:    Uuid::new_v4(),
      pillar_id:   pillar.pillar_id,
      name:        "Adequacy".into(),
      description: None,
      created_at:  now,
    };
    let sub = Subtheme {
      subtheme_id: Uuid::new_v4(),
      theme_id:    theme.theme_id,
      name:        "Space".into(),
      description: None,
      created_at:  now,
    };
    let nodes = vec![PillarNode {
      pillar,
      ref_code: "P1".into(),
      sort_order: 1_000_000,
      themes: vec![ThemeNode {
        theme,
        ref_code: "P1.T1".into(),
        sort_order: 1_001_000,
        subthemes: vec![SubthemeNode {
          subtheme:   sub,
          ref_code:   "P1.T1.S1".into(),
          sort_order: 1_001_001,
        }],
      }],
    }];

    assert_eq!(tree(&nodes), "P1  Shelter\n  P1.T1  Adequacy\n    P1.T1.S1  Space\n");
  }
}
