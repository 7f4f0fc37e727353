//! Staged write cache between an editor UI and the remote resource store.
//!
//! Every create, edit and delete lands in in-memory staging buckets, so a
//! whole editing session works offline; `save` reconciles each pending entry
//! with the store independently and on demand. Nothing here persists across
//! sessions.

mod error;
mod notify;
mod resource;
mod staged;

pub use error::CacheError;
pub use notify::ChangeNotifier;
pub use resource::{JsonAdapter, JsonResource};
pub use staged::StagedCache;
