//! Remote resource store abstraction and its backends.

mod http;
mod memory;

pub use http::HttpStore;
// Exercised from the cache tests only; release builds never touch it.
#[allow(unused_imports)]
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure of a single store call.
#[derive(Debug, Error)]
pub enum StoreError {
  /// The request never produced a usable response.
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  /// The store has no such resource.
  #[error("{type_key}/{name} not found")]
  NotFound { type_key: String, name: String },

  /// The server answered with a non-success status.
  #[error("server returned {status}: {message}")]
  Server { status: u16, message: String },

  /// Backend-specific failure for non-HTTP stores.
  #[allow(dead_code)]
  #[error("{0}")]
  Unavailable(String),
}

/// Asynchronous CRUD access to named, typed resources.
///
/// Each call completes independently; ordering between outstanding calls is
/// not guaranteed and the cache does not rely on it.
#[async_trait]
pub trait ResourceStore: Send + Sync {
  /// List the names known for a resource type.
  async fn list(&self, type_key: &str) -> Result<Vec<String>, StoreError>;

  /// Fetch the raw payload of one resource. Not-found is a failure.
  async fn fetch(&self, type_key: &str, name: &str) -> Result<Value, StoreError>;

  /// Persist a resource that does not exist remotely yet.
  async fn create(&self, type_key: &str, name: &str, payload: Value) -> Result<(), StoreError>;

  /// Replace the remote payload of an existing resource.
  async fn update(&self, type_key: &str, name: &str, payload: Value) -> Result<(), StoreError>;

  /// Remove a resource from the remote store.
  async fn delete(&self, type_key: &str, name: &str) -> Result<(), StoreError>;
}
