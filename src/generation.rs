//! Board generation plumbing around the model call: prompt assembly, tolerant
//! parsing of the reply, and the finalize pass that turns whatever came back
//! into a well-formed board.
//!
//! Finalize guarantees, in order:
//!   - every clue is validated; violations are flagged and kept (fail open)
//!   - each category holds exactly one clue per tier
//!   - exactly `CATEGORY_COUNT` categories (pad with placeholders or truncate)
//!   - each category inherits the first matching stored difficulty adjustment
//!   - exactly `DAILY_DOUBLE_COUNT` daily doubles (random demotion/promotion)

use rand::{seq::SliceRandom, Rng};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Prompts;
use crate::difficulty::DifficultyStore;
use crate::domain::{Board, Category, Clue, DifficultyAdjustment, CATEGORY_COUNT, DAILY_DOUBLE_COUNT, TIERS};
use crate::seeds::{padding_categories, placeholder_clue};
use crate::util::{fill_template, trunc_for_log};
use crate::validation::{validate_clue, FormatIssue};

pub fn build_prompt(prompts: &Prompts, current_titles: &[String], reference_text: &str, guidance: &str) -> String {
  let reference = if reference_text.trim().is_empty() {
    prompts.system_message.clone()
  } else {
    format!("{}\n\n{}", prompts.system_message, reference_text.trim())
  };
  let categories = current_titles.join(", ");
  let guidance = if guidance.is_empty() { String::new() } else { format!("\n{}\n", guidance) };

  fill_template(
    &prompts.board_template,
    &[("reference", &reference), ("categories", &categories), ("guidance", &guidance)],
  )
}

// --- Reply parsing ---

#[derive(Deserialize)]
struct RawBoard {
  #[serde(default)]
  categories: Vec<RawCategory>,
}

#[derive(Deserialize)]
struct RawCategory {
  #[serde(default)]
  title: String,
  #[serde(default, alias = "clues")]
  questions: Vec<RawClue>,
}

#[derive(Deserialize)]
struct RawClue {
  #[serde(default)]
  text: String,
  #[serde(default)]
  answer: String,
  #[serde(default)]
  value: Value,
  #[serde(default, rename = "dailyDouble", alias = "daily_double")]
  daily_double: Value,
}

/// Best-effort parse of a model reply. Code fences and any prose around the
/// outermost JSON object are ignored. Returns None when no usable categories
/// can be read.
pub fn parse_board_response(raw: &str) -> Option<Vec<Category>> {
  let body = extract_json_object(raw)?;
  let parsed: RawBoard = match serde_json::from_str(body) {
    Ok(b) => b,
    Err(e) => {
      warn!(target: "clueboard", error = %e, sample = %trunc_for_log(body, 200), "Model reply is not valid board JSON");
      return None;
    }
  };
  if parsed.categories.is_empty() {
    warn!(target: "clueboard", "Model reply has no categories");
    return None;
  }

  let categories = parsed
    .categories
    .into_iter()
    .map(|c| Category {
      title: c.title.trim().to_string(),
      clues: c
        .questions
        .into_iter()
        .map(|q| {
          let mut clue = Clue::new(q.text.trim(), q.answer.trim(), parse_value(&q.value).unwrap_or(0));
          clue.daily_double = q.daily_double == Value::Bool(true);
          clue
        })
        .collect(),
      difficulty_adjustment: DifficultyAdjustment::default(),
    })
    .collect();
  Some(categories)
}

fn extract_json_object(raw: &str) -> Option<&str> {
  let start = raw.find('{')?;
  let end = raw.rfind('}')?;
  if end <= start {
    return None;
  }
  Some(&raw[start..=end])
}

/// Accepts `200`, `200.0`, `"200"` and `"$200"`.
fn parse_value(v: &Value) -> Option<u32> {
  match v {
    Value::Number(n) => n
      .as_u64()
      .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
      .and_then(|n| u32::try_from(n).ok()),
    Value::String(s) => {
      let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
      digits.parse().ok()
    }
    _ => None,
  }
}

// --- Finalize ---

/// One clue per tier, in tier order. A clue whose value matches a tier claims
/// it; unmatched clues fill the remaining tiers in order; anything still
/// missing becomes a placeholder.
pub fn normalize_tiers(clues: Vec<Clue>) -> Vec<Clue> {
  let mut slots: Vec<Option<Clue>> = TIERS.iter().map(|_| None).collect();
  let mut leftovers = Vec::new();
  for clue in clues {
    match TIERS.iter().position(|t| *t == clue.value) {
      Some(i) if slots[i].is_none() => slots[i] = Some(clue),
      _ => leftovers.push(clue),
    }
  }

  let mut leftovers = leftovers.into_iter();
  TIERS
    .iter()
    .zip(slots)
    .map(|(tier, slot)| match slot {
      Some(c) => c,
      None => match leftovers.next() {
        Some(mut c) => {
          c.value = *tier;
          c
        }
        None => placeholder_clue(*tier),
      },
    })
    .collect()
}

/// Validates every clue in place and returns the issues found.
pub fn flag_violations(categories: &mut [Category]) -> Vec<FormatIssue> {
  let mut issues = Vec::new();
  for cat in categories.iter_mut() {
    for clue in cat.clues.iter_mut() {
      let result = validate_clue(&cat.title, &clue.text, &clue.answer);
      clue.rule_violation = result.violation();
      if let Some(reason) = &clue.rule_violation {
        warn!(target: "clueboard", category = %cat.title, value = clue.value, %reason, "Rule violation in generated clue");
        issues.push(FormatIssue::new(&cat.title, &clue.text, &clue.answer, reason));
      }
    }
  }
  issues
}

/// Demotes or promotes random clues until exactly `DAILY_DOUBLE_COUNT` are set.
pub fn enforce_daily_doubles<R: Rng + ?Sized>(categories: &mut [Category], rng: &mut R) {
  let mut marked = Vec::new();
  let mut unmarked = Vec::new();
  for (ci, cat) in categories.iter().enumerate() {
    for (qi, clue) in cat.clues.iter().enumerate() {
      if clue.daily_double { marked.push((ci, qi)) } else { unmarked.push((ci, qi)) }
    }
  }

  if marked.len() > DAILY_DOUBLE_COUNT {
    debug!(target: "clueboard", excess = marked.len() - DAILY_DOUBLE_COUNT, "Removing excess daily doubles");
    marked.shuffle(rng);
    for (ci, qi) in marked.into_iter().skip(DAILY_DOUBLE_COUNT) {
      categories[ci].clues[qi].daily_double = false;
    }
  } else if marked.len() < DAILY_DOUBLE_COUNT {
    let missing = DAILY_DOUBLE_COUNT - marked.len();
    debug!(target: "clueboard", missing, "Adding missing daily doubles");
    for (ci, qi) in unmarked.choose_multiple(rng, missing) {
      categories[*ci].clues[*qi].daily_double = true;
    }
  }
}

/// Turns parsed categories into a playable board. Returns the board plus the
/// rule violations found, for the format-issues log.
pub fn finalize_board<R: Rng + ?Sized>(
  categories: Vec<Category>,
  difficulty: &DifficultyStore,
  rng: &mut R,
) -> (Board, Vec<FormatIssue>) {
  let mut categories: Vec<Category> = categories
    .into_iter()
    .map(|mut c| {
      c.clues = normalize_tiers(std::mem::take(&mut c.clues));
      c
    })
    .collect();

  let received = categories.len();
  if received > CATEGORY_COUNT {
    info!(target: "clueboard", received, "Trimming board to six categories");
    categories.truncate(CATEGORY_COUNT);
  }

  // Only clues that reach the board are flagged; padding is added afterwards.
  let issues = flag_violations(&mut categories);

  if received < CATEGORY_COUNT {
    info!(target: "clueboard", received, "Padding board with placeholder categories");
    categories.extend(padding_categories(CATEGORY_COUNT - received));
  }

  for cat in categories.iter_mut() {
    if let Some((matched, adj)) = difficulty.find_match(&cat.title) {
      debug!(target: "clueboard", category = %cat.title, %matched, "Inheriting stored difficulty adjustment");
      cat.difficulty_adjustment = adj.clone();
    }
  }

  enforce_daily_doubles(&mut categories, rng);

  let board = Board { id: Uuid::new_v4().to_string(), categories };
  debug!(target: "clueboard", board = %board.id, daily_doubles = board.daily_double_count(), violations = issues.len(), "Board finalized");
  (board, issues)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::{rngs::StdRng, SeedableRng};

  fn rng() -> StdRng {
    StdRng::seed_from_u64(7)
  }

  fn category(title: &str, values: &[u32]) -> Category {
    Category {
      title: title.into(),
      clues: values
        .iter()
        .map(|v| Clue::new(format!("Clue for {}", v), "What is Pluto?", *v))
        .collect(),
      difficulty_adjustment: DifficultyAdjustment::default(),
    }
  }

  #[test]
  fn prompt_combines_system_reference_and_guidance() {
    let prompts = Prompts::default();
    let titles = vec!["Science".to_string(), "Sports".to_string()];
    let p = build_prompt(&prompts, &titles, "Photosynthesis notes", "DIFFICULTY ADJUSTMENTS: x");
    assert!(p.contains("STRICT WORD EXCLUSION RULE"));
    assert!(p.contains("Photosynthesis notes"));
    assert!(p.contains("Science, Sports"));
    assert!(p.contains("DIFFICULTY ADJUSTMENTS: x"));
    assert!(!p.contains("{guidance}"));
  }

  #[test]
  fn parses_fenced_reply_with_aliases_and_string_values() {
    let raw = "Here you go:\n```json\n{\"categories\":[{\"title\":\"Space\",\"clues\":[\
      {\"text\":\"Red planet\",\"answer\":\"What is Mars?\",\"value\":\"$400\",\"dailyDouble\":true},\
      {\"text\":\"Ringed\",\"answer\":\"What is Saturn?\",\"value\":200.0}]}]}\n```";
    let cats = parse_board_response(raw).expect("parsed");
    assert_eq!(cats.len(), 1);
    assert_eq!(cats[0].title, "Space");
    assert_eq!(cats[0].clues[0].value, 400);
    assert!(cats[0].clues[0].daily_double);
    assert_eq!(cats[0].clues[1].value, 200);
    assert!(!cats[0].clues[1].daily_double);
  }

  #[test]
  fn unparsable_reply_yields_none() {
    assert!(parse_board_response("Sorry, I cannot help with that.").is_none());
    assert!(parse_board_response("{\"categories\": [").is_none());
    assert!(parse_board_response("{\"categories\": []}").is_none());
  }

  #[test]
  fn tiers_are_filled_from_leftovers_then_placeholders() {
    let cat = category("X", &[400, 400, 1000, 9999]);
    let clues = normalize_tiers(cat.clues);
    let values: Vec<u32> = clues.iter().map(|c| c.value).collect();
    assert_eq!(values, TIERS.to_vec());
    assert_eq!(clues[0].text, "Clue for 400");
    assert_eq!(clues[1].text, "Clue for 400");
    assert_eq!(clues[2].text, "Clue for 9999");
    assert_eq!(clues[3].text, "This clue worth $800 needs to be filled in");
    assert_eq!(clues[4].text, "Clue for 1000");
  }

  #[test]
  fn short_board_is_padded_and_gets_two_daily_doubles() {
    let cats = vec![category("Astronomy", &TIERS), category("Mythology", &TIERS)];
    let (board, _) = finalize_board(cats, &DifficultyStore::default(), &mut rng());
    assert_eq!(board.categories.len(), CATEGORY_COUNT);
    assert_eq!(board.categories[2].title, "World History (Generated)");
    assert_eq!(board.categories[5].title, "Literature (Generated)");
    assert!(board.categories.iter().all(|c| c.clues.len() == TIERS.len()));
    assert_eq!(board.daily_double_count(), DAILY_DOUBLE_COUNT);
  }

  #[test]
  fn long_board_is_truncated_and_excess_daily_doubles_removed() {
    let mut cats: Vec<Category> = (0..8).map(|i| category(&format!("Topic {}", i), &TIERS)).collect();
    for c in cats.iter_mut() {
      c.clues[0].daily_double = true;
    }
    let (board, _) = finalize_board(cats, &DifficultyStore::default(), &mut rng());
    assert_eq!(board.categories.len(), CATEGORY_COUNT);
    assert_eq!(board.categories[5].title, "Topic 5");
    assert_eq!(board.daily_double_count(), DAILY_DOUBLE_COUNT);
  }

  #[test]
  fn violations_are_flagged_but_kept() {
    let mut cat = category("Planets", &TIERS);
    cat.clues[0].text = "This dwarf planet was demoted in 2006".into();
    cat.clues[0].answer = "What is the dwarf planet Pluto?".into();
    let (board, issues) = finalize_board(vec![cat], &DifficultyStore::default(), &mut rng());

    let clue = &board.categories[0].clues[0];
    assert_eq!(clue.text, "This dwarf planet was demoted in 2006");
    assert!(clue.rule_violation.as_deref().unwrap_or("").contains("dwarf, planet"));
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].category, "Planets");
  }

  #[test]
  fn dropped_categories_are_not_flagged() {
    let mut cats: Vec<Category> = (0..6).map(|i| category(&format!("Topic {}", i), &TIERS)).collect();
    let mut extra = category("Planets", &TIERS);
    extra.clues[0].text = "This dwarf planet was demoted in 2006".into();
    extra.clues[0].answer = "What is the dwarf planet Pluto?".into();
    cats.push(extra);

    let (board, issues) = finalize_board(cats, &DifficultyStore::default(), &mut rng());
    assert!(issues.is_empty());
    assert!(board.categories.iter().all(|c| c.title != "Planets"));
  }

  #[test]
  fn generated_category_inherits_fuzzy_matched_adjustment() {
    let mut d = DifficultyStore::default();
    let mut adj = DifficultyAdjustment::default();
    adj.set(1000, -2);
    d.merge("World History", adj.clone());

    let (board, _) = finalize_board(vec![category("Modern World History", &TIERS)], &d, &mut rng());
    assert_eq!(board.categories[0].difficulty_adjustment, adj);
    // Padding "World History (Generated)" matches too; "Science (Generated)" does not.
    assert_eq!(board.categories[1].difficulty_adjustment, adj);
    assert!(board.categories[2].difficulty_adjustment.is_neutral());
  }
}
