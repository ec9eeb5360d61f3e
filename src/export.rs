//! Ratings export: a flat JSON array of rated clues that host tooling can post
//! to and later pull into a spreadsheet.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::Outcome;
use crate::store::{append_log, KeyValueStore, StoreError};

/// Stored as `<data_dir>/ratings-export.json` by the file store.
pub const RATINGS_EXPORT_KEY: &str = "ratings-export";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingExportEntry {
  pub category: String,
  pub clue: String,
  pub answer: String,
  pub rating: Outcome,
  pub timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaggedExport {
  Single { rating: RatingExportEntry },
  Batch { ratings: Vec<RatingExportEntry> },
}

/// Accepted request bodies: `{type:"single", rating}`, `{type:"batch", ratings}`
/// or a bare array of entries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ExportPayload {
  Tagged(TaggedExport),
  Direct(Vec<RatingExportEntry>),
}

impl ExportPayload {
  pub fn into_entries(self) -> Vec<RatingExportEntry> {
    match self {
      ExportPayload::Tagged(TaggedExport::Single { rating }) => vec![rating],
      ExportPayload::Tagged(TaggedExport::Batch { ratings }) => ratings,
      ExportPayload::Direct(ratings) => ratings,
    }
  }
}

/// Appends to the export file. Returns how many entries were written.
pub fn append_export(store: &dyn KeyValueStore, entries: &[RatingExportEntry]) -> Result<usize, StoreError> {
  let total = append_log(store, RATINGS_EXPORT_KEY, entries)?;
  info!(target: "clueboard", added = entries.len(), total, "Ratings exported");
  Ok(entries.len())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{load_log, JsonFileStore};
  use serde_json::json;

  fn entry_json(rating: &str) -> serde_json::Value {
    json!({
      "category": "Science",
      "clue": "This gas makes up most of Earth's atmosphere",
      "answer": "What is nitrogen?",
      "rating": rating,
      "timestamp": "2024-05-01T12:00:00Z"
    })
  }

  #[test]
  fn accepts_all_three_shapes() {
    let single: ExportPayload =
      serde_json::from_value(json!({"type": "single", "rating": entry_json("good")})).expect("single");
    assert_eq!(single.into_entries().len(), 1);

    let batch: ExportPayload =
      serde_json::from_value(json!({"type": "batch", "ratings": [entry_json("good"), entry_json("bad")]})).expect("batch");
    assert_eq!(batch.into_entries()[1].rating, Outcome::Bad);

    let direct: ExportPayload = serde_json::from_value(json!([entry_json("bad")])).expect("direct");
    assert_eq!(direct.into_entries().len(), 1);
  }

  #[test]
  fn rejects_unknown_shapes() {
    assert!(serde_json::from_value::<ExportPayload>(json!({"type": "other"})).is_err());
    assert!(serde_json::from_value::<ExportPayload>(json!({"rating": entry_json("good")})).is_err());
    assert!(serde_json::from_value::<ExportPayload>(json!([entry_json("meh")])).is_err());
  }

  #[test]
  fn export_appends_to_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonFileStore::new(dir.path());
    let e: RatingExportEntry = serde_json::from_value(entry_json("good")).expect("entry");

    append_export(&store, &[e.clone()]).expect("first");
    append_export(&store, &[e.clone(), e]).expect("second");

    assert!(dir.path().join("ratings-export.json").exists());
    let all: Vec<RatingExportEntry> = load_log(&store, RATINGS_EXPORT_KEY);
    assert_eq!(all.len(), 3);
  }
}
