//! In-memory resource store for tests and offline experiments.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{ResourceStore, StoreError};

/// Resource store holding everything in process memory.
///
/// Create overwrites silently, the way a thin upserting REST backend would;
/// fetch, update and delete of an unknown name fail with `NotFound`.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct MemoryStore {
  resources: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
}

#[allow(dead_code)]
impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed a resource directly, bypassing the store contract.
  pub fn insert(&self, type_key: &str, name: &str, payload: Value) {
    self
      .resources
      .lock()
      .entry(type_key.to_string())
      .or_default()
      .insert(name.to_string(), payload);
  }

  /// Direct lookup, for assertions.
  pub fn get(&self, type_key: &str, name: &str) -> Option<Value> {
    self
      .resources
      .lock()
      .get(type_key)
      .and_then(|entries| entries.get(name))
      .cloned()
  }

  fn not_found(type_key: &str, name: &str) -> StoreError {
    StoreError::NotFound {
      type_key: type_key.to_string(),
      name: name.to_string(),
    }
  }
}

#[async_trait]
impl ResourceStore for MemoryStore {
  async fn list(&self, type_key: &str) -> Result<Vec<String>, StoreError> {
    Ok(
      self
        .resources
        .lock()
        .get(type_key)
        .map(|entries| entries.keys().cloned().collect())
        .unwrap_or_default(),
    )
  }

  async fn fetch(&self, type_key: &str, name: &str) -> Result<Value, StoreError> {
    self
      .get(type_key, name)
      .ok_or_else(|| Self::not_found(type_key, name))
  }

  async fn create(&self, type_key: &str, name: &str, payload: Value) -> Result<(), StoreError> {
    self.insert(type_key, name, payload);
    Ok(())
  }

  async fn update(&self, type_key: &str, name: &str, payload: Value) -> Result<(), StoreError> {
    let mut resources = self.resources.lock();
    match resources
      .get_mut(type_key)
      .and_then(|entries| entries.get_mut(name))
    {
      Some(slot) => {
        *slot = payload;
        Ok(())
      }
      None => Err(Self::not_found(type_key, name)),
    }
  }

  async fn delete(&self, type_key: &str, name: &str) -> Result<(), StoreError> {
    let mut resources = self.resources.lock();
    match resources
      .get_mut(type_key)
      .and_then(|entries| entries.remove(name))
    {
      Some(_) => Ok(()),
      None => Err(Self::not_found(type_key, name)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn round_trip() {
    let store = MemoryStore::new();

    store.create("switch", "s1", json!({"ports": 4})).await.unwrap();
    assert_eq!(store.fetch("switch", "s1").await.unwrap(), json!({"ports": 4}));
    assert_eq!(store.list("switch").await.unwrap(), vec!["s1".to_string()]);

    store.update("switch", "s1", json!({"ports": 8})).await.unwrap();
    assert_eq!(store.fetch("switch", "s1").await.unwrap(), json!({"ports": 8}));

    store.delete("switch", "s1").await.unwrap();
    assert!(matches!(
      store.fetch("switch", "s1").await,
      Err(StoreError::NotFound { .. })
    ));
  }

  #[tokio::test]
  async fn update_of_unknown_name_fails() {
    let store = MemoryStore::new();
    assert!(matches!(
      store.update("switch", "ghost", json!({})).await,
      Err(StoreError::NotFound { .. })
    ));
  }
}
