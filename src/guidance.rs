//! Turns stored difficulty adjustments into steering text for the next
//! generation request, with concrete past clues as counter-examples.

use std::collections::HashSet;

use crate::difficulty::{DifficultyStore, QualityLogEntry};
use crate::domain::{DifficultyAdjustment, Outcome};

pub const MAX_EXAMPLES_PER_TIER: usize = 2;

const GUIDANCE_HEADER: &str =
  "DIFFICULTY ADJUSTMENTS BASED ON PLAYER PERFORMANCE (apply to matching categories):";

/// Instruction block for one category, or an empty string when every tier is 0.
pub fn synthesize(category_title: &str, adjustment: &DifficultyAdjustment, history: &[QualityLogEntry]) -> String {
  if adjustment.is_neutral() {
    return String::new();
  }

  let mut out = format!("Category \"{}\":\n", category_title);
  for (tier, adj) in adjustment.iter().filter(|(_, v)| *v != 0) {
    let direction = if adj > 0 { "HARDER" } else { "EASIER" };
    let magnitude = if adj.abs() >= 2 { "significantly" } else { "somewhat" };
    out.push_str(&format!("- Make ${} clues {} {}.\n", tier, magnitude, direction));

    // Hardening: show what was too easy. Easing: show what was too hard.
    let (wanted, verdict) = if adj > 0 { (Outcome::Good, "too easy") } else { (Outcome::Bad, "too hard") };
    let examples = examples_for(category_title, tier, wanted, history);
    if !examples.is_empty() {
      out.push_str(&format!("  Players found these ${} clues {}; do not repeat them:\n", tier, verdict));
      for e in examples {
        out.push_str(&format!("  * Clue: \"{}\" / Answer: \"{}\"\n", e.clue, e.answer));
      }
    }
  }
  out
}

/// Most recent distinct clues for a category/tier with the given outcome.
fn examples_for<'a>(
  category_title: &str,
  tier: u32,
  wanted: Outcome,
  history: &'a [QualityLogEntry],
) -> Vec<&'a QualityLogEntry> {
  let mut seen = HashSet::new();
  history
    .iter()
    .rev()
    .filter(|e| e.category == category_title && e.value == tier && e.outcome == wanted)
    .filter(|e| seen.insert(e.clue.clone()))
    .take(MAX_EXAMPLES_PER_TIER)
    .collect()
}

/// Guidance for a set of category titles. Each title resolves to the first
/// stored category it matches; each stored category contributes at most once.
pub fn build_guidance(titles: &[String], difficulty: &DifficultyStore, history: &[QualityLogEntry]) -> String {
  let mut seen = HashSet::new();
  let blocks: Vec<String> = titles
    .iter()
    .filter_map(|t| difficulty.find_match(t))
    .filter(|(key, _)| seen.insert(key.to_string()))
    .map(|(key, adj)| synthesize(key, adj, history))
    .filter(|b| !b.is_empty())
    .collect();

  if blocks.is_empty() {
    String::new()
  } else {
    format!("{}\n{}", GUIDANCE_HEADER, blocks.join("\n"))
  }
}
