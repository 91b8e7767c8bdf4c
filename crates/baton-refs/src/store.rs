use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use crate::key::{Key, PATH_DELIMITER};

/// Errors raised when reading the runtime store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// Nothing has been written for the referenced resource yet.
  #[error("reference '{key}' has not been written")]
  NotFound { key: Key },
}

/// Keyed container for the values of a single flow invocation.
///
/// The store is shared between the concurrently running nodes of one
/// invocation. Each node only writes its own resource, and the dependency
/// graph guarantees a resource is written before anyone reads it, so the
/// lock only has to protect the map itself.
#[derive(Debug, Default)]
pub struct Store {
  values: RwLock<HashMap<Key, Value>>,
}

impl Store {
  pub fn new() -> Self {
    Self::default()
  }

  /// Write a value. An existing value under the same key is replaced.
  pub fn set(&self, key: Key, value: Value) {
    self.values.write().insert(key, value);
  }

  /// Read the value addressed by `key`.
  ///
  /// When the exact key was never written, the longest written prefix of
  /// the path is located and the remaining segments are walked into the
  /// JSON value (numeric segments index arrays). A written prefix missing
  /// the nested field yields `Null`. Returns `None` only when nothing has
  /// been written for the key or any of its prefixes.
  pub fn get(&self, key: &Key) -> Option<Value> {
    let values = self.values.read();

    if let Some(value) = values.get(key) {
      return Some(value.clone());
    }

    let segments = key.segments();
    let delimiter = PATH_DELIMITER.to_string();
    for split in (0..segments.len()).rev() {
      let prefix = Key::new(
        key.resource.clone(),
        segments[..split].join(delimiter.as_str()),
      );

      if let Some(root) = values.get(&prefix) {
        let value = walk(root, &segments[split..]).cloned();
        return Some(value.unwrap_or(Value::Null));
      }
    }

    None
  }

  /// Read a value that must have been written already.
  pub fn load(&self, key: &Key) -> Result<Value, StoreError> {
    self
      .get(key)
      .ok_or_else(|| StoreError::NotFound { key: key.clone() })
  }

  /// Number of written keys.
  pub fn len(&self) -> usize {
    self.values.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.read().is_empty()
  }
}

fn walk<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
  segments
    .iter()
    .try_fold(value, |current, segment| match current {
      Value::Object(map) => map.get(*segment),
      Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
      _ => None,
    })
}
