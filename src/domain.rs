//! Domain models used by the backend: clues, ratings, categories, the board and
//! the per-tier difficulty adjustment map.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five canonical point values shared by every category.
pub const TIERS: [u32; 5] = [200, 400, 600, 800, 1000];
pub const CATEGORY_COUNT: usize = 6;
pub const DAILY_DOUBLE_COUNT: usize = 2;
/// Bound of a difficulty adjustment, in both directions.
pub const MAX_ADJUSTMENT: i8 = 2;

/// Binary outcome recorded when a clue is resolved in play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  /// Somebody answered correctly and was awarded points.
  Good,
  /// Nobody got it, or at least one player was deducted.
  Bad,
}

impl Outcome {
  pub fn as_str(&self) -> &'static str {
    match self {
      Outcome::Good => "good",
      Outcome::Bad => "bad",
    }
  }
}

impl std::fmt::Display for Outcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Immutable once created; appended to a clue's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating {
  pub outcome: Outcome,
  pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clue {
  pub text: String,
  pub answer: String,
  pub value: u32,
  #[serde(default)] pub revealed: bool,
  #[serde(default)] pub answered: bool,
  #[serde(default)] pub daily_double: bool,
  /// Reason attached by the validator when the clue breaks a content rule.
  #[serde(default)] pub rule_violation: Option<String>,
  #[serde(default)] pub ratings: Vec<Rating>,
  /// How many entries of `ratings` were already forwarded to the quality log.
  #[serde(skip)] pub logged: usize,
}

impl Clue {
  pub fn new(text: impl Into<String>, answer: impl Into<String>, value: u32) -> Self {
    Self {
      text: text.into(),
      answer: answer.into(),
      value,
      revealed: false,
      answered: false,
      daily_double: false,
      rule_violation: None,
      ratings: Vec::new(),
      logged: 0,
    }
  }
}

/// Map from tier to an integer in `[-MAX_ADJUSTMENT, MAX_ADJUSTMENT]`.
///
/// Keys are always exactly the five canonical tiers. Whatever comes in through
/// deserialization is normalized: unknown tiers are dropped, missing tiers read
/// as 0 and out-of-range values are clamped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<u32, i64>", into = "BTreeMap<u32, i8>")]
pub struct DifficultyAdjustment(BTreeMap<u32, i8>);

impl Default for DifficultyAdjustment {
  fn default() -> Self {
    Self(TIERS.iter().map(|t| (*t, 0)).collect())
  }
}

impl From<BTreeMap<u32, i64>> for DifficultyAdjustment {
  fn from(raw: BTreeMap<u32, i64>) -> Self {
    let mut adj = Self::default();
    for (tier, v) in raw {
      let clamped = v.clamp(-(MAX_ADJUSTMENT as i64), MAX_ADJUSTMENT as i64) as i8;
      adj.set(tier, clamped);
    }
    adj
  }
}

impl From<DifficultyAdjustment> for BTreeMap<u32, i8> {
  fn from(adj: DifficultyAdjustment) -> Self {
    adj.0
  }
}

impl DifficultyAdjustment {
  pub fn get(&self, tier: u32) -> i8 {
    self.0.get(&tier).copied().unwrap_or(0)
  }

  /// Sets a tier's value, clamped to the bound. Unknown tiers are ignored.
  pub fn set(&mut self, tier: u32, value: i8) {
    if let Some(slot) = self.0.get_mut(&tier) {
      *slot = value.clamp(-MAX_ADJUSTMENT, MAX_ADJUSTMENT);
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (u32, i8)> + '_ {
    self.0.iter().map(|(t, v)| (*t, *v))
  }

  pub fn is_neutral(&self) -> bool {
    self.0.values().all(|v| *v == 0)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  pub title: String,
  /// One clue per tier, ordered by tier.
  pub clues: Vec<Clue>,
  #[serde(default)] pub difficulty_adjustment: DifficultyAdjustment,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Board {
  pub id: String,
  pub categories: Vec<Category>,
}

impl Board {
  pub fn clue_mut(&mut self, category: usize, clue: usize) -> Option<&mut Clue> {
    self.categories.get_mut(category)?.clues.get_mut(clue)
  }

  pub fn titles(&self) -> Vec<String> {
    self.categories.iter().map(|c| c.title.clone()).collect()
  }

  pub fn daily_double_count(&self) -> usize {
    self.categories
      .iter()
      .flat_map(|c| c.clues.iter())
      .filter(|c| c.daily_double)
      .count()
  }

  pub fn all_answered(&self) -> bool {
    self.categories.iter().all(|c| c.clues.iter().all(|q| q.answered))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn adjustment_defaults_to_all_five_tiers_at_zero() {
    let adj = DifficultyAdjustment::default();
    let tiers: Vec<u32> = adj.iter().map(|(t, _)| t).collect();
    assert_eq!(tiers, TIERS.to_vec());
    assert!(adj.is_neutral());
  }

  #[test]
  fn adjustment_deserialization_normalizes_keys_and_bounds() {
    let adj: DifficultyAdjustment =
      serde_json::from_str(r#"{"200": 7, "1000": -1, "300": 2}"#).expect("parse");
    assert_eq!(adj.get(200), 2);
    assert_eq!(adj.get(1000), -1);
    assert_eq!(adj.get(600), 0);
    assert_eq!(adj.iter().count(), 5);
    assert_eq!(adj.get(300), 0);
  }

  #[test]
  fn set_ignores_unknown_tiers_and_clamps() {
    let mut adj = DifficultyAdjustment::default();
    adj.set(500, 1);
    adj.set(800, -9);
    assert_eq!(adj.get(500), 0);
    assert_eq!(adj.get(800), -2);
  }
}
