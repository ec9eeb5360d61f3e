//! Key-value persistence used by the engine.
//!
//! The engine only ever talks to `KeyValueStore`; the medium behind it is a
//! JSON file per key (`JsonFileStore`) in production and `MemoryStore` in tests.
//! Reads never fail: an absent, unreadable or corrupt value reads as "nothing".

use std::{
  collections::HashMap,
  path::PathBuf,
  sync::Mutex,
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub const DIFFICULTY_ADJUSTMENTS_KEY: &str = "difficultyAdjustments";
pub const QUALITY_RATINGS_LOG_KEY: &str = "qualityRatingsLog";
pub const FORMAT_ISSUES_LOG_KEY: &str = "formatIssuesLog";

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to write '{key}': {source}")]
  Io {
    key: String,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to serialize '{key}': {source}")]
  Serialize {
    key: String,
    #[source]
    source: serde_json::Error,
  },
}

pub trait KeyValueStore: Send + Sync {
  fn load(&self, key: &str) -> Option<Value>;
  fn save(&self, key: &str, value: &Value) -> Result<(), StoreError>;
}

/// One `<key>.json` file per key inside `dir`.
pub struct JsonFileStore {
  dir: PathBuf,
}

impl JsonFileStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{key}.json"))
  }
}

impl KeyValueStore for JsonFileStore {
  fn load(&self, key: &str) -> Option<Value> {
    let path = self.path_for(key);
    let raw = match std::fs::read_to_string(&path) {
      Ok(s) => s,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
      Err(e) => {
        warn!(target: "clueboard_backend", path = %path.display(), error = %e, "Store read failed; treating as empty");
        return None;
      }
    };
    match serde_json::from_str(&raw) {
      Ok(v) => Some(v),
      Err(e) => {
        warn!(target: "clueboard_backend", path = %path.display(), error = %e, "Corrupt store value; treating as empty");
        None
      }
    }
  }

  fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io { key: key.to_string(), source };
    std::fs::create_dir_all(&self.dir).map_err(io_err)?;
    let body = serde_json::to_string_pretty(value)
      .map_err(|source| StoreError::Serialize { key: key.to_string(), source })?;

    // Write-then-rename so a crash never leaves half a file behind.
    let path = self.path_for(key);
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body).map_err(io_err)?;
    std::fs::rename(&tmp, &path).map_err(io_err)?;
    debug!(target: "clueboard_backend", path = %path.display(), "Store value written");
    Ok(())
  }
}

#[derive(Default)]
pub struct MemoryStore {
  inner: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KeyValueStore for MemoryStore {
  fn load(&self, key: &str) -> Option<Value> {
    let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    map.get(key).cloned()
  }

  fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
    let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
    map.insert(key.to_string(), value.clone());
    Ok(())
  }
}

/// Typed read; anything that does not deserialize reads as `T::default()`.
pub fn load_typed<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
  match store.load(key) {
    Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
      warn!(target: "clueboard_backend", %key, error = %e, "Stored value has unexpected shape; using default");
      T::default()
    }),
    None => T::default(),
  }
}

pub fn save_typed<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StoreError> {
  let v = serde_json::to_value(value)
    .map_err(|source| StoreError::Serialize { key: key.to_string(), source })?;
  store.save(key, &v)
}

/// Entries of an append-only log. Individual entries that fail to parse are
/// skipped rather than discarding the whole log.
pub fn load_log<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Vec<T> {
  match store.load(key) {
    Some(Value::Array(items)) => items
      .into_iter()
      .filter_map(|v| serde_json::from_value(v).ok())
      .collect(),
    _ => Vec::new(),
  }
}

/// Appends to an append-only log, keeping whatever was there before (even
/// entries this build cannot parse). Returns the new log length.
pub fn append_log<T: Serialize>(store: &dyn KeyValueStore, key: &str, entries: &[T]) -> Result<usize, StoreError> {
  let mut items = match store.load(key) {
    Some(Value::Array(items)) => items,
    _ => Vec::new(),
  };
  if entries.is_empty() {
    return Ok(items.len());
  }
  for e in entries {
    let v = serde_json::to_value(e)
      .map_err(|source| StoreError::Serialize { key: key.to_string(), source })?;
    items.push(v);
  }
  let len = items.len();
  store.save(key, &Value::Array(items))?;
  Ok(len)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn json_file_store_round_trips_and_tolerates_corruption() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonFileStore::new(dir.path().join("nested"));

    assert!(store.load("missing").is_none());

    store.save("k", &json!({"a": 1})).expect("save");
    assert_eq!(store.load("k"), Some(json!({"a": 1})));

    std::fs::write(dir.path().join("nested").join("broken.json"), "{not json").expect("write");
    assert!(store.load("broken").is_none());
  }

  #[test]
  fn append_log_keeps_existing_entries() {
    let store = MemoryStore::new();
    assert_eq!(append_log(&store, "log", &[json!({"n": 1})]).expect("append"), 1);
    assert_eq!(append_log(&store, "log", &[json!({"n": 2}), json!({"n": 3})]).expect("append"), 3);
    let all: Vec<Value> = load_log(&store, "log");
    assert_eq!(all.len(), 3);
  }

  #[test]
  fn log_with_non_array_value_reads_as_empty() {
    let store = MemoryStore::new();
    store.save("log", &json!("garbage")).expect("save");
    let all: Vec<Value> = load_log(&store, "log");
    assert!(all.is_empty());
    assert_eq!(append_log(&store, "log", &[json!(1)]).expect("append"), 1);
  }

  #[test]
  fn load_typed_falls_back_to_default_on_shape_mismatch() {
    let store = MemoryStore::new();
    store.save("m", &json!([1, 2, 3])).expect("save");
    let m: HashMap<String, u32> = load_typed(&store, "m");
    assert!(m.is_empty());
  }
}
