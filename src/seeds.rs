//! Default content: the starter board, placeholders used to pad a generated
//! board, and the fallback board served when model output cannot be parsed.

use uuid::Uuid;

use crate::domain::{Board, Category, Clue, DifficultyAdjustment, TIERS};

pub const DEFAULT_CATEGORIES: [&str; 6] = [
  "World History",
  "Science",
  "Pop Culture",
  "Literature",
  "Sports",
  "Geography",
];

pub fn placeholder_clue(value: u32) -> Clue {
  Clue::new(
    format!("This clue worth ${} needs to be filled in", value),
    "What is the answer?",
    value,
  )
}

pub fn placeholder_category(title: impl Into<String>) -> Category {
  Category {
    title: title.into(),
    clues: TIERS.iter().map(|v| placeholder_clue(*v)).collect(),
    difficulty_adjustment: DifficultyAdjustment::default(),
  }
}

/// The board a fresh session starts with.
pub fn default_board() -> Board {
  Board {
    id: Uuid::new_v4().to_string(),
    categories: DEFAULT_CATEGORIES.iter().map(|t| placeholder_category(*t)).collect(),
  }
}

/// `count` placeholder categories used to pad a short generated board.
pub fn padding_categories(count: usize) -> Vec<Category> {
  DEFAULT_CATEGORIES
    .iter()
    .cycle()
    .take(count)
    .map(|t| placeholder_category(format!("{} (Generated)", t)))
    .collect()
}

/// Served when the model's response cannot be parsed at all.
pub fn fallback_board() -> Board {
  let categories = DEFAULT_CATEGORIES
    .iter()
    .map(|t| Category {
      title: format!("{} (AI Error)", t),
      clues: TIERS
        .iter()
        .enumerate()
        .map(|(i, v)| {
          Clue::new(
            format!("JSON parse error occurred. This is a fallback question {} for {} points.", i + 1, v),
            "What is a JSON parsing error?",
            *v,
          )
        })
        .collect(),
      difficulty_adjustment: DifficultyAdjustment::default(),
    })
    .collect();
  Board { id: Uuid::new_v4().to_string(), categories }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::CATEGORY_COUNT;

  #[test]
  fn default_board_has_full_grid() {
    let b = default_board();
    assert_eq!(b.categories.len(), CATEGORY_COUNT);
    for c in &b.categories {
      let values: Vec<u32> = c.clues.iter().map(|q| q.value).collect();
      assert_eq!(values, TIERS.to_vec());
    }
    assert_eq!(b.categories[0].clues[0].text, "This clue worth $200 needs to be filled in");
  }

  #[test]
  fn padding_titles_are_marked_generated() {
    let pad = padding_categories(2);
    assert_eq!(pad[0].title, "World History (Generated)");
    assert_eq!(pad[1].title, "Science (Generated)");
  }
}
