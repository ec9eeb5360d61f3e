//! Outcome recording for resolved clues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Clue, Outcome, Rating};

/// How the host closed a clue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
  /// A player answered correctly and was awarded points.
  Correct,
  /// A single player was judged wrong.
  Incorrect,
  /// Points deducted from several players at once.
  MultipleIncorrect { deductions: usize },
  /// Closed without awarding or deducting anything. Contributes no signal.
  NoPoints,
}

impl Resolution {
  pub fn outcome(&self) -> Option<Outcome> {
    match self {
      Resolution::Correct => Some(Outcome::Good),
      Resolution::Incorrect => Some(Outcome::Bad),
      Resolution::MultipleIncorrect { deductions } if *deductions > 0 => Some(Outcome::Bad),
      Resolution::MultipleIncorrect { .. } | Resolution::NoPoints => None,
    }
  }
}

pub fn record_outcome(clue: &mut Clue, outcome: Outcome) -> Rating {
  record_outcome_at(clue, outcome, Utc::now())
}

pub fn record_outcome_at(clue: &mut Clue, outcome: Outcome, timestamp: DateTime<Utc>) -> Rating {
  let rating = Rating { outcome, timestamp };
  clue.ratings.push(rating.clone());
  rating
}

/// Closes a clue and records the outcome its resolution implies, if any.
pub fn resolve_clue(clue: &mut Clue, resolution: Resolution) -> Option<Rating> {
  clue.revealed = true;
  clue.answered = true;
  resolution.outcome().map(|o| record_outcome(clue, o))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ratings_are_appended_in_order() {
    let mut clue = Clue::new("t", "a", 200);
    record_outcome(&mut clue, Outcome::Good);
    record_outcome(&mut clue, Outcome::Bad);
    let outcomes: Vec<Outcome> = clue.ratings.iter().map(|r| r.outcome).collect();
    assert_eq!(outcomes, vec![Outcome::Good, Outcome::Bad]);
  }

  #[test]
  fn resolution_maps_to_outcome() {
    assert_eq!(Resolution::Correct.outcome(), Some(Outcome::Good));
    assert_eq!(Resolution::Incorrect.outcome(), Some(Outcome::Bad));
    assert_eq!(Resolution::MultipleIncorrect { deductions: 2 }.outcome(), Some(Outcome::Bad));
    assert_eq!(Resolution::MultipleIncorrect { deductions: 0 }.outcome(), None);
    assert_eq!(Resolution::NoPoints.outcome(), None);
  }

  #[test]
  fn skipped_clue_is_closed_without_a_rating() {
    let mut clue = Clue::new("t", "a", 400);
    assert!(resolve_clue(&mut clue, Resolution::NoPoints).is_none());
    assert!(clue.answered);
    assert!(clue.ratings.is_empty());
  }

  #[test]
  fn resolution_deserializes_from_tagged_json() {
    let r: Resolution = serde_json::from_str(r#"{"kind":"multiple_incorrect","deductions":1}"#).expect("parse");
    assert_eq!(r, Resolution::MultipleIncorrect { deductions: 1 });
  }
}
