//! Per-category, per-tier difficulty aggregation.
//!
//! Every resolved clue feeds a rating into its category. Once a tier has at
//! least `MIN_RATINGS` ratings, its success rate moves the tier's adjustment:
//!
//! | success rate    | new adjustment         |
//! |-----------------|------------------------|
//! | > 0.85          | +2                     |
//! | (0.65, 0.85]    | min(previous + 1, +2)  |
//! | [0.35, 0.65]    | previous               |
//! | [0.15, 0.35)    | max(previous - 1, -2)  |
//! | < 0.15          | -2                     |
//!
//! Extreme bands snap to the bound; the adjacent bands step by one. The rule is
//! applied to the previous value each pass, so repeated passes over the same
//! history keep stepping until they saturate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{Category, DifficultyAdjustment, Outcome, Rating, MAX_ADJUSTMENT, TIERS};
use crate::store::{
  append_log, load_log, load_typed, save_typed, KeyValueStore, StoreError, DIFFICULTY_ADJUSTMENTS_KEY,
  QUALITY_RATINGS_LOG_KEY,
};
use crate::util::fuzzy_title_match;

/// Below this many ratings a tier is left alone.
pub const MIN_RATINGS: usize = 3;

const SNAP_HARDER_ABOVE: f64 = 0.85;
const STEP_HARDER_ABOVE: f64 = 0.65;
const STEP_EASIER_BELOW: f64 = 0.35;
const SNAP_EASIER_BELOW: f64 = 0.15;

/// One rating as it lands in the analytics log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityLogEntry {
  pub category: String,
  pub value: u32,
  pub clue: String,
  pub answer: String,
  pub outcome: Outcome,
  pub timestamp: String,
}

/// Category title → adjustment map. Grows without eviction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DifficultyStore {
  entries: BTreeMap<String, DifficultyAdjustment>,
}

impl DifficultyStore {
  /// Loads the persisted map; anything missing or corrupt loads as empty.
  pub fn load(store: &dyn KeyValueStore) -> Self {
    let loaded: Self = load_typed(store, DIFFICULTY_ADJUSTMENTS_KEY);
    info!(target: "clueboard", categories = loaded.len(), "Difficulty adjustments loaded");
    loaded
  }

  pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
    save_typed(store, DIFFICULTY_ADJUSTMENTS_KEY, self)
  }

  #[cfg(test)]
  pub fn get(&self, title: &str) -> Option<&DifficultyAdjustment> {
    self.entries.get(title)
  }

  /// Replaces one category's entry; all other categories are untouched.
  pub fn merge(&mut self, title: &str, adjustment: DifficultyAdjustment) {
    self.entries.insert(title.to_string(), adjustment);
  }

  /// Exact title first, then the first stored title that fuzzy-matches.
  pub fn find_match(&self, title: &str) -> Option<(&str, &DifficultyAdjustment)> {
    if let Some((k, v)) = self.entries.get_key_value(title) {
      return Some((k.as_str(), v));
    }
    self.entries
      .iter()
      .find(|(k, _)| fuzzy_title_match(k, title))
      .map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// The band rule for a single tier.
pub fn next_adjustment(previous: i8, success_rate: f64) -> i8 {
  if success_rate > SNAP_HARDER_ABOVE {
    MAX_ADJUSTMENT
  } else if success_rate > STEP_HARDER_ABOVE {
    (previous + 1).min(MAX_ADJUSTMENT)
  } else if success_rate >= STEP_EASIER_BELOW {
    previous
  } else if success_rate >= SNAP_EASIER_BELOW {
    (previous - 1).max(-MAX_ADJUSTMENT)
  } else {
    -MAX_ADJUSTMENT
  }
}

/// Share of `Good` outcomes, or `None` when there are too few ratings.
pub fn success_rate<'a>(ratings: impl IntoIterator<Item = &'a Rating>) -> Option<f64> {
  let (mut good, mut total) = (0usize, 0usize);
  for r in ratings {
    total += 1;
    if r.outcome == Outcome::Good {
      good += 1;
    }
  }
  if total < MIN_RATINGS {
    None
  } else {
    Some(good as f64 / total as f64)
  }
}

/// Pure part of the aggregation: the category's next adjustment map.
pub fn recompute_adjustment(category: &Category) -> DifficultyAdjustment {
  let mut next = category.difficulty_adjustment.clone();
  for tier in TIERS {
    let ratings = category
      .clues
      .iter()
      .filter(|c| c.value == tier)
      .flat_map(|c| c.ratings.iter());
    if let Some(rate) = success_rate(ratings) {
      let previous = next.get(tier);
      let updated = next_adjustment(previous, rate);
      if updated != previous {
        debug!(target: "clueboard", category = %category.title, tier, rate, previous, updated, "Tier adjustment moved");
      }
      next.set(tier, updated);
    }
  }
  next
}

/// Full aggregation pass for one category: recompute, persist the merged
/// store, and forward ratings not yet logged to the quality log.
pub fn recompute(
  category: &mut Category,
  difficulty: &mut DifficultyStore,
  store: &dyn KeyValueStore,
) -> DifficultyAdjustment {
  let next = recompute_adjustment(category);
  category.difficulty_adjustment = next.clone();
  difficulty.merge(&category.title, next.clone());
  if let Err(e) = difficulty.save(store) {
    warn!(target: "clueboard", category = %category.title, error = %e, "Failed to persist difficulty adjustments");
  }

  let (fresh, cursors) = unlogged(category);
  if !fresh.is_empty() {
    match append_log(store, QUALITY_RATINGS_LOG_KEY, &fresh) {
      Ok(total) => {
        for (clue, logged) in category.clues.iter_mut().zip(cursors) {
          clue.logged = logged;
        }
        debug!(target: "clueboard", added = fresh.len(), total, "Quality ratings logged");
      }
      Err(e) => warn!(target: "clueboard", error = %e, pending = fresh.len(), "Failed to append quality ratings; will retry on next pass"),
    }
  }
  next
}

/// Entries for every rating past each clue's `logged` cursor, plus the cursor
/// each clue should move to once the entries are written.
fn unlogged(category: &Category) -> (Vec<QualityLogEntry>, Vec<usize>) {
  let mut out = Vec::new();
  let mut cursors = Vec::with_capacity(category.clues.len());
  for clue in &category.clues {
    for r in clue.ratings.iter().skip(clue.logged) {
      out.push(QualityLogEntry {
        category: category.title.clone(),
        value: clue.value,
        clue: clue.text.clone(),
        answer: clue.answer.clone(),
        outcome: r.outcome,
        timestamp: r.timestamp.to_rfc3339(),
      });
    }
    cursors.push(clue.ratings.len());
  }
  (out, cursors)
}

pub fn load_quality_log(store: &dyn KeyValueStore) -> Vec<QualityLogEntry> {
  load_log(store, QUALITY_RATINGS_LOG_KEY)
}
