//! Error types surfaced by cache operations.

use thiserror::Error;

use crate::store::StoreError;

/// Failure of a single cache operation.
///
/// No variant is fatal to the cache itself: a failed fetch stores nothing
/// and a failed save leaves every bucket intact for a later retry.
#[derive(Debug, Error)]
pub enum CacheError {
  /// The resource is queued for remote deletion and is logically gone,
  /// even though the remote delete has not been confirmed yet.
  #[error("{name} has been staged to be deleted")]
  StagedForDeletion { name: String },

  /// A remote store call failed.
  #[error(transparent)]
  Store(#[from] StoreError),

  /// An adapter could not convert between wire and editable form.
  #[error("adapter conversion failed: {0}")]
  Adapter(#[from] serde_json::Error),
}
