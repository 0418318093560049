//! Reference codes and sort keys, the canonical encoding of a node's
//! position in the Pillar → Theme → Subtheme hierarchy.
//!
//! Positions are 0-based internally and rendered 1-based: the first theme of
//! the second pillar is `Position::Theme(1, 0)`, reference code `P2.T1`,
//! sort key `2_001_000`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Weight of the pillar index in a sort key.
const PILLAR_WEIGHT: i64 = 1_000_000;
/// Weight of the theme index in a sort key.
const THEME_WEIGHT: i64 = 1_000;

/// Maximum number of themes under one pillar, or subthemes under one theme,
/// that the arithmetic sort key can encode without collision.
pub const MAX_CHILDREN: usize = 999;

// ─── Level ───────────────────────────────────────────────────────────────────

/// The three levels of the classification hierarchy, coarsest first.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
  Pillar,
  Theme,
  Subtheme,
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Pillar => "pillar",
      Self::Theme => "theme",
      Self::Subtheme => "subtheme",
    })
  }
}

// ─── Position ────────────────────────────────────────────────────────────────

/// A 0-based position in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
  Pillar(usize),
  Theme(usize, usize),
  Subtheme(usize, usize, usize),
}

impl Position {
  pub fn level(&self) -> Level {
    match self {
      Self::Pillar(_) => Level::Pillar,
      Self::Theme(..) => Level::Theme,
      Self::Subtheme(..) => Level::Subtheme,
    }
  }

  /// Human-readable dotted code, e.g. `P1.T2.S3`.
  pub fn ref_code(&self) -> String {
    match *self {
      Self::Pillar(p) => format!("P{}", p + 1),
      Self::Theme(p, t) => format!("P{}.T{}", p + 1, t + 1),
      Self::Subtheme(p, t, s) => format!("P{}.T{}.S{}", p + 1, t + 1, s + 1),
    }
  }

  /// Integer key whose ordering equals document order, provided no theme or
  /// subtheme index reaches [`MAX_CHILDREN`].
  pub fn sort_key(&self) -> i64 {
    let (p, t, s) = match *self {
      Self::Pillar(p) => (p, None, None),
      Self::Theme(p, t) => (p, Some(t), None),
      Self::Subtheme(p, t, s) => (p, Some(t), Some(s)),
    };
    (p as i64 + 1) * PILLAR_WEIGHT
      + t.map_or(0, |t| (t as i64 + 1) * THEME_WEIGHT)
      + s.map_or(0, |s| s as i64 + 1)
  }

  /// Invert [`Position::sort_key`]. Returns `None` for integers that no
  /// position encodes to.
  pub fn from_sort_key(key: i64) -> Option<Self> {
    if key < PILLAR_WEIGHT {
      return None;
    }
    let p = (key / PILLAR_WEIGHT - 1) as usize;
    let rest = key % PILLAR_WEIGHT;
    let t = (rest / THEME_WEIGHT) as usize;
    let s = (rest % THEME_WEIGHT) as usize;
    match (t, s) {
      (0, 0) => Some(Self::Pillar(p)),
      (0, _) => None,
      (t, 0) => Some(Self::Theme(p, t - 1)),
      (t, s) => Some(Self::Subtheme(p, t - 1, s - 1)),
    }
  }
}

impl fmt::Display for Position {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.ref_code())
  }
}

/// Error returned when a string is not a well-formed reference code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed reference code: {0:?}")]
pub struct ParseRefCodeError(pub String);

impl FromStr for Position {
  type Err = ParseRefCodeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let err = || ParseRefCodeError(s.to_owned());
    let mut indices = Vec::with_capacity(3);
    for (segment, prefix) in s.split('.').zip(['P', 'T', 'S']) {
      let digits = segment.strip_prefix(prefix).ok_or_else(err)?;
      if digits.starts_with('0') {
        return Err(err());
      }
      let n: usize = digits.parse().map_err(|_| err())?;
      indices.push(n - 1);
    }
    if s.split('.').count() != indices.len() {
      return Err(err());
    }
    match indices[..] {
      [p] => Ok(Self::Pillar(p)),
      [p, t] => Ok(Self::Theme(p, t)),
      [p, t, s] => Ok(Self::Subtheme(p, t, s)),
      _ => Err(err()),
    }
  }
}

// ─── Free functions ──────────────────────────────────────────────────────────

fn position(pillar: usize, theme: Option<usize>, subtheme: Option<usize>) -> Position {
  match (theme, subtheme) {
    (None, _) => Position::Pillar(pillar),
    (Some(t), None) => Position::Theme(pillar, t),
    (Some(t), Some(s)) => Position::Subtheme(pillar, t, s),
  }
}

/// Reference code for 0-based indices. A subtheme index without a theme
/// index is ignored.
pub fn ref_code(pillar: usize, theme: Option<usize>, subtheme: Option<usize>) -> String {
  position(pillar, theme, subtheme).ref_code()
}

/// Sort key for 0-based indices. A subtheme index without a theme index is
/// ignored.
pub fn sort_key(pillar: usize, theme: Option<usize>, subtheme: Option<usize>) -> i64 {
  position(pillar, theme, subtheme).sort_key()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes_are_one_based() {
    assert_eq!(ref_code(0, None, None), "P1");
    assert_eq!(ref_code(0, Some(0), None), "P1.T1");
    assert_eq!(ref_code(2, Some(1), Some(4)), "P3.T2.S5");
  }

  #[test]
  fn keys_follow_the_documented_formula() {
    assert_eq!(sort_key(0, None, None), 1_000_000);
    assert_eq!(sort_key(0, Some(0), None), 1_001_000);
    assert_eq!(sort_key(0, Some(0), Some(1)), 1_001_002);
    assert_eq!(sort_key(1, Some(2), Some(3)), 2_003_004);
  }

  #[test]
  fn subtheme_without_theme_is_a_pillar() {
    assert_eq!(ref_code(4, None, Some(7)), "P5");
    assert_eq!(sort_key(4, None, Some(7)), 5_000_000);
  }

  #[test]
  fn segment_count_matches_level() {
    for pos in [
      Position::Pillar(3),
      Position::Theme(3, 9),
      Position::Subtheme(3, 9, 11),
    ] {
      let segments = pos.ref_code().split('.').count();
      let expected = match pos.level() {
        Level::Pillar => 1,
        Level::Theme => 2,
        Level::Subtheme => 3,
      };
      assert_eq!(segments, expected, "{pos}");
    }
  }

  #[test]
  fn key_order_is_document_order() {
    // Positions listed in document order; every later one must compare
    // greater both by key and by parsed integer segments.
    let mut doc = Vec::new();
    for p in 0..3 {
      doc.push(Position::Pillar(p));
      for t in [0, 1, 998] {
        doc.push(Position::Theme(p, t));
        for s in [0, 9, 998] {
          doc.push(Position::Subtheme(p, t, s));
        }
      }
    }

    let segments = |pos: &Position| -> Vec<usize> {
      pos
        .ref_code()
        .split('.')
        .map(|seg| seg[1..].parse().unwrap())
        .collect()
    };

    for pair in doc.windows(2) {
      assert!(pair[0].sort_key() < pair[1].sort_key(), "{} vs {}", pair[0], pair[1]);
      assert!(segments(&pair[0]) < segments(&pair[1]), "{} vs {}", pair[0], pair[1]);
    }
  }

  #[test]
  fn from_sort_key_inverts_sort_key() {
    for pos in [
      Position::Pillar(0),
      Position::Theme(0, 998),
      Position::Subtheme(41, 0, 998),
    ] {
      assert_eq!(Position::from_sort_key(pos.sort_key()), Some(pos));
    }
    assert_eq!(Position::from_sort_key(999_999), None);
    assert_eq!(Position::from_sort_key(1_000_005), None);
  }

  #[test]
  fn parses_ref_codes() {
    assert_eq!("P1".parse(), Ok(Position::Pillar(0)));
    assert_eq!("P2.T10".parse(), Ok(Position::Theme(1, 9)));
    assert_eq!("P1.T1.S2".parse(), Ok(Position::Subtheme(0, 0, 1)));
    assert!("T1".parse::<Position>().is_err());
    assert!("P0".parse::<Position>().is_err());
    assert!("P1.S1".parse::<Position>().is_err());
    assert!("P1.T1.S1.X1".parse::<Position>().is_err());
    assert!("P1.".parse::<Position>().is_err());
  }
}
