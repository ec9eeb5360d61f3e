//! Content rules for clue/answer pairs.
//!
//! Two checks, in priority order:
//! 1) word exclusion: the answer must not reuse a significant word (> 2 chars)
//!    of its clue or category title;
//! 2) specificity: the clue must not lean on phrases that typically admit
//!    several valid answers ("known for", "this country", ...).
//!
//! Validation is total: every input, including empty strings, yields a
//! `ValidationResult`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::{append_log, KeyValueStore, FORMAT_ISSUES_LOG_KEY};
use crate::util::normalize;

pub const VAGUE_PHRASES: &[&str] = &[
  "known for", "famous for", "renowned for", "recognized for", "celebrated for",
  "this country", "this nation", "this place", "this region", "this area", "this city",
  "this culture", "this tradition",
  "unique blend", "rich history", "diverse landscape",
];

pub const VAGUE_REASON: &str =
  "Question may be too vague and could accept multiple answers. Consider adding more specific, distinguishing details.";

const WORD_EXCLUSION_PREFIX: &str = "Answer contains words from the clue or category";

/// Tokens at or below this length are ignored on the clue/category side.
const MIN_SIGNIFICANT_LEN: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
  pub valid: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
}

impl ValidationResult {
  pub fn pass() -> Self {
    Self { valid: true, reason: None }
  }

  pub fn fail(reason: impl Into<String>) -> Self {
    Self { valid: false, reason: Some(reason.into()) }
  }

  /// True for the soft specificity failure an editor may choose to override.
  pub fn is_vague(&self) -> bool {
    !self.valid && self.reason.as_deref() == Some(VAGUE_REASON)
  }

  /// The value to store on `Clue::rule_violation`.
  pub fn violation(&self) -> Option<String> {
    if self.valid { None } else { self.reason.clone() }
  }
}

pub fn validate_clue(category_title: &str, clue_text: &str, answer_text: &str) -> ValidationResult {
  let category = normalize(category_title);
  let clue = normalize(clue_text);
  let answer = normalize(answer_text);

  let answer_words: Vec<&str> = answer.split_whitespace().collect();

  let mut overlapping: Vec<&str> = Vec::new();
  for word in significant_words(&category).chain(significant_words(&clue)) {
    if answer_words.contains(&word) && !overlapping.contains(&word) {
      overlapping.push(word);
    }
  }
  if !overlapping.is_empty() {
    return ValidationResult::fail(format!("{}: {}", WORD_EXCLUSION_PREFIX, overlapping.join(", ")));
  }

  if VAGUE_PHRASES.iter().any(|p| clue.contains(&normalize(p))) {
    return ValidationResult::fail(VAGUE_REASON);
  }

  ValidationResult::pass()
}

fn significant_words(text: &str) -> impl Iterator<Item = &str> {
  text.split_whitespace().filter(|w| w.chars().count() > MIN_SIGNIFICANT_LEN)
}

/// Record of a rule violation kept for later offline review.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormatIssue {
  pub category: String,
  pub clue: String,
  pub answer: String,
  pub issue: String,
  pub timestamp: String,
}

impl FormatIssue {
  pub fn new(category: &str, clue: &str, answer: &str, issue: &str) -> Self {
    Self {
      category: category.to_string(),
      clue: clue.to_string(),
      answer: answer.to_string(),
      issue: issue.to_string(),
      timestamp: Utc::now().to_rfc3339(),
    }
  }
}

/// Best effort: a failing write is logged and otherwise ignored.
pub fn log_format_issues(store: &dyn KeyValueStore, issues: &[FormatIssue]) {
  if let Err(e) = append_log(store, FORMAT_ISSUES_LOG_KEY, issues) {
    warn!(target: "clueboard", error = %e, count = issues.len(), "Failed to record format issues");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{load_log, MemoryStore};

  #[test]
  fn answer_reusing_clue_words_fails_word_exclusion() {
    let r = validate_clue(
      "Neighborhoods",
      "This Greenwich Village area was the epicenter of the Stonewall Riots",
      "What is Greenwich Village?",
    );
    assert!(!r.valid);
    assert_eq!(
      r.reason.as_deref(),
      Some("Answer contains words from the clue or category: greenwich, village")
    );
    assert!(!r.is_vague());
  }

  #[test]
  fn category_words_count_too() {
    let r = validate_clue("River Deltas", "It flows through Cairo", "What is the Nile River?");
    assert_eq!(
      r.reason.as_deref(),
      Some("Answer contains words from the clue or category: river")
    );
  }

  #[test]
  fn category_word_matches_after_normalization() {
    let r = validate_clue("Oceans!", "Largest one on Earth", "What is the Pacific (oceans)?");
    assert!(!r.valid);
    assert!(r.reason.unwrap().ends_with("oceans"));
  }

  #[test]
  fn short_words_do_not_trigger_exclusion() {
    let r = validate_clue("Science", "H2O is the formula of it", "What is it?");
    assert!(r.valid, "{:?}", r);
  }

  #[test]
  fn clean_specific_clue_passes() {
    let r = validate_clue(
      "LGBTQ+ History",
      "This 1969 uprising in Greenwich Village marked a turning point for gay rights",
      "What are the Stonewall Riots?",
    );
    assert_eq!(r, ValidationResult::pass());
  }

  #[test]
  fn vague_phrase_fails_specificity() {
    let r = validate_clue(
      "Asia",
      "This East Asian country is known for its unique blend of traditional and modern culture",
      "What is Japan?",
    );
    assert!(r.is_vague());
    assert_eq!(r.violation().as_deref(), Some(VAGUE_REASON));
  }

  #[test]
  fn word_exclusion_takes_priority_over_vagueness() {
    let r = validate_clue("Geography", "This country is famous for Seoul", "What is the country of Korea?");
    assert!(!r.valid);
    assert!(r.reason.unwrap().starts_with(WORD_EXCLUSION_PREFIX));
  }

  #[test]
  fn empty_inputs_pass() {
    assert!(validate_clue("", "", "").valid);
  }

  #[test]
  fn format_issues_append_to_log() {
    let store = MemoryStore::new();
    log_format_issues(&store, &[FormatIssue::new("Cat", "clue", "ans", VAGUE_REASON)]);
    log_format_issues(&store, &[FormatIssue::new("Cat", "clue2", "ans2", VAGUE_REASON)]);
    let all: Vec<FormatIssue> = load_log(&store, FORMAT_ISSUES_LOG_KEY);
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].clue, "clue2");
  }
}
