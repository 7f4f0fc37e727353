//! The staged write cache at the heart of an editing session.

use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::CacheError;
use super::notify::{CacheSignal, ChangeNotifier};
use super::resource::{share, ResourceAdapter, SharedEditable};
use crate::store::ResourceStore;

/// A resource staged for remote deletion.
enum DeleteEntry {
  /// Previously fetched or saved; the object rides along until the remote
  /// delete is confirmed.
  Staged(#[allow(dead_code)] SharedEditable),
  /// Known only from a remote listing; nothing local to keep.
  Unfetched,
}

/// Two-level mapping: resource type -> resource name -> entry.
type Bucket<V> = HashMap<String, HashMap<String, V>>;

#[derive(Default)]
struct Buckets {
  /// Created locally, never persisted. POSTed on save.
  pending_create: Bucket<SharedEditable>,
  /// Fetched or saved at least once; dirty entries are PUT on save.
  pending_update: Bucket<SharedEditable>,
  /// Staged for remote deletion. DELETEd on save.
  pending_delete: Bucket<DeleteEntry>,
  /// Names last known to exist, per type. Only ever unioned into.
  names: HashMap<String, BTreeSet<String>>,
}

/// Which remote operation a save outcome describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOp {
  Create,
  Update,
  Delete,
}

impl std::fmt::Display for SaveOp {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SaveOp::Create => write!(f, "create"),
      SaveOp::Update => write!(f, "update"),
      SaveOp::Delete => write!(f, "delete"),
    }
  }
}

/// Outcome of reconciling one staged entry.
#[derive(Debug)]
pub struct SaveOutcome {
  pub op: SaveOp,
  pub type_key: String,
  pub name: String,
  pub result: Result<(), CacheError>,
}

/// Per-entry outcomes of one `save` pass.
///
/// Entries are reconciled independently; a failed entry stays staged (and
/// re-marked dirty where applicable) for the next save, which is also
/// signalled through the `Dirty` broadcast.
#[derive(Debug, Default)]
pub struct SaveReport {
  pub outcomes: Vec<SaveOutcome>,
}

impl SaveReport {
  /// True when every staged entry reconciled successfully.
  pub fn is_clean(&self) -> bool {
    self.outcomes.iter().all(|outcome| outcome.result.is_ok())
  }

  /// Outcomes for entries that failed and remain staged.
  pub fn failures(&self) -> impl Iterator<Item = &SaveOutcome> {
    self.outcomes.iter().filter(|outcome| outcome.result.is_err())
  }
}

/// One remote call captured from the buckets, with its payload already
/// converted so a concurrent edit cannot change what is sent.
enum SaveJob {
  Create {
    type_key: String,
    name: String,
    object: SharedEditable,
    payload: Value,
  },
  Update {
    type_key: String,
    name: String,
    object: SharedEditable,
    payload: Value,
  },
  Delete {
    type_key: String,
    name: String,
  },
}

/// Client-side staged write cache for named, typed resources.
///
/// Creates, edits and deletes are synchronous against in-memory buckets;
/// the network is touched only on a `get` miss, a `get_names` refresh and
/// during `save`. The bucket state lives behind one mutex that is never held
/// across a store call, so the cache stays usable for unrelated names while
/// a call is in flight. Overlapping saves may duplicate remote calls for the
/// same name; the transitions are idempotent, so a duplicate success simply
/// re-applies the same move.
pub struct StagedCache {
  store: Arc<dyn ResourceStore>,
  notifier: ChangeNotifier,
  buckets: Mutex<Buckets>,
}

impl StagedCache {
  pub fn new(store: Arc<dyn ResourceStore>, notifier: ChangeNotifier) -> Self {
    Self {
      store,
      notifier,
      buckets: Mutex::new(Buckets::default()),
    }
  }

  /// Look up `(type, name)` locally, fetching from the store only on a miss.
  ///
  /// A hit in the create or update bucket returns the identical shared
  /// object with no remote call. A name staged for deletion fails: it is
  /// logically gone from the local viewpoint. On a miss the raw payload is
  /// fetched, adapted and stored in the update bucket.
  pub async fn get(
    &self,
    type_key: &str,
    name: &str,
    adapter: &dyn ResourceAdapter,
  ) -> Result<SharedEditable, CacheError> {
    {
      let buckets = self.buckets.lock();
      if let Some(object) = buckets.pending_create.get(type_key).and_then(|b| b.get(name)) {
        return Ok(Arc::clone(object));
      }
      if let Some(object) = buckets.pending_update.get(type_key).and_then(|b| b.get(name)) {
        return Ok(Arc::clone(object));
      }
      if buckets
        .pending_delete
        .get(type_key)
        .is_some_and(|b| b.contains_key(name))
      {
        return Err(CacheError::StagedForDeletion {
          name: name.to_string(),
        });
      }
    }

    let raw = self.store.fetch(type_key, name).await?;
    let object = share(adapter.from_raw(name, raw)?);

    let mut buckets = self.buckets.lock();
    let entries = buckets.pending_update.entry(type_key.to_string()).or_default();
    // A concurrent get may have landed first; the stored object wins so both
    // callers end up sharing one handle.
    let object = entries.entry(name.to_string()).or_insert(object);
    Ok(Arc::clone(object))
  }

  /// Names known for a type, folding in local staging.
  ///
  /// With pending creates or deletes the listing is answered locally, so
  /// names that exist only here are not clobbered by the remote view.
  /// Otherwise the cached name set is refreshed from the store and unioned;
  /// a failed listing degrades to the cached set instead of failing the
  /// caller.
  pub async fn get_names(&self, type_key: &str) -> Vec<String> {
    {
      let mut buckets = self.buckets.lock();
      let has_pending = buckets
        .pending_create
        .get(type_key)
        .is_some_and(|b| !b.is_empty())
        || buckets
          .pending_delete
          .get(type_key)
          .is_some_and(|b| !b.is_empty());

      if has_pending {
        let created: Vec<String> = buckets
          .pending_create
          .get(type_key)
          .map(|b| b.keys().cloned().collect())
          .unwrap_or_default();
        buckets
          .names
          .entry(type_key.to_string())
          .or_default()
          .extend(created);

        let deleted = buckets.pending_delete.get(type_key);
        return buckets
          .names
          .get(type_key)
          .into_iter()
          .flatten()
          .filter(|name| !deleted.is_some_and(|b| b.contains_key(name.as_str())))
          .cloned()
          .collect();
      }
    }

    match self.store.list(type_key).await {
      Ok(listed) => {
        let mut buckets = self.buckets.lock();
        let names = buckets.names.entry(type_key.to_string()).or_default();
        names.extend(listed);
        names.iter().cloned().collect()
      }
      Err(err) => {
        warn!(type_key, error = %err, "listing failed, serving cached names");
        let buckets = self.buckets.lock();
        buckets
          .names
          .get(type_key)
          .map(|names| names.iter().cloned().collect())
          .unwrap_or_default()
      }
    }
  }

  /// Stage a brand new resource. Synchronous; no remote call until `save`.
  ///
  /// The returned object is shared with the cache: callers keep mutating it
  /// by reference and flag their edits through the dirty bit.
  pub fn create(
    &self,
    type_key: &str,
    name: &str,
    adapter: &dyn ResourceAdapter,
    initial: Value,
  ) -> Result<SharedEditable, CacheError> {
    let object = share(adapter.from_raw(name, initial)?);
    object.lock().set_dirty(true);

    {
      let mut buckets = self.buckets.lock();
      // Recreating a name staged for deletion cancels the delete: the name
      // still exists remotely, so the new object reconciles as an update.
      let was_deleted = buckets
        .pending_delete
        .get_mut(type_key)
        .and_then(|b| b.remove(name))
        .is_some();
      let bucket = if was_deleted {
        &mut buckets.pending_update
      } else {
        &mut buckets.pending_create
      };
      bucket
        .entry(type_key.to_string())
        .or_default()
        .insert(name.to_string(), Arc::clone(&object));
    }

    self.notifier.emit(CacheSignal::AssetUpdate);
    Ok(object)
  }

  /// Stage a deletion. Synchronous; the remote delete happens on `save`.
  ///
  /// An unsaved create is simply dropped, a fetched object moves into the
  /// delete bucket, and an unknown name is staged as a bare sentinel so the
  /// remote copy still gets deleted.
  pub fn destroy(&self, type_key: &str, name: &str) {
    {
      let mut buckets = self.buckets.lock();
      if buckets
        .pending_create
        .get_mut(type_key)
        .and_then(|b| b.remove(name))
        .is_some()
      {
        debug!(type_key, name, "dropped unsaved create");
      } else if let Some(object) = buckets
        .pending_update
        .get_mut(type_key)
        .and_then(|b| b.remove(name))
      {
        buckets
          .pending_delete
          .entry(type_key.to_string())
          .or_default()
          .insert(name.to_string(), DeleteEntry::Staged(object));
      } else {
        buckets
          .pending_delete
          .entry(type_key.to_string())
          .or_default()
          .insert(name.to_string(), DeleteEntry::Unfetched);
      }
    }

    self.notifier.emit(CacheSignal::Dirty);
    self.notifier.emit(CacheSignal::AssetUpdate);
  }

  /// Whether any staged work would be flushed by `save`.
  ///
  /// Recomputed on every call by scanning the buckets: any pending create,
  /// any dirty pending update, or any pending delete.
  pub fn is_dirty(&self) -> bool {
    let buckets = self.buckets.lock();

    let create_dirty = buckets.pending_create.values().any(|b| !b.is_empty());
    let update_dirty = buckets
      .pending_update
      .values()
      .flat_map(|b| b.values())
      .any(|object| object.lock().dirty());
    let delete_dirty = buckets.pending_delete.values().any(|b| !b.is_empty());

    create_dirty || update_dirty || delete_dirty
  }

  /// Flush every staged entry to the resource store.
  ///
  /// Entries are snapshotted under the lock first: dirty flags are cleared
  /// and payloads converted at that moment, so an edit landing while a call
  /// is in flight re-marks the object and rides the next save rather than
  /// this one. The remote calls then run concurrently and independently;
  /// each completion re-enters the cache to apply its bucket transition.
  pub async fn save(&self) -> SaveReport {
    let mut report = SaveReport::default();
    let mut jobs = Vec::new();

    {
      let buckets = self.buckets.lock();

      for (type_key, entries) in &buckets.pending_create {
        for (name, object) in entries {
          let payload = {
            let mut locked = object.lock();
            locked.set_dirty(false);
            locked.to_wire()
          };
          match payload {
            Ok(payload) => jobs.push(SaveJob::Create {
              type_key: type_key.clone(),
              name: name.clone(),
              object: Arc::clone(object),
              payload,
            }),
            Err(err) => {
              object.lock().set_dirty(true);
              self.notifier.emit(CacheSignal::Dirty);
              report.outcomes.push(SaveOutcome {
                op: SaveOp::Create,
                type_key: type_key.clone(),
                name: name.clone(),
                result: Err(CacheError::Adapter(err)),
              });
            }
          }
        }
      }

      for (type_key, entries) in &buckets.pending_update {
        for (name, object) in entries {
          let payload = {
            let mut locked = object.lock();
            if !locked.dirty() {
              continue;
            }
            locked.set_dirty(false);
            locked.to_wire()
          };
          match payload {
            Ok(payload) => jobs.push(SaveJob::Update {
              type_key: type_key.clone(),
              name: name.clone(),
              object: Arc::clone(object),
              payload,
            }),
            Err(err) => {
              object.lock().set_dirty(true);
              self.notifier.emit(CacheSignal::Dirty);
              report.outcomes.push(SaveOutcome {
                op: SaveOp::Update,
                type_key: type_key.clone(),
                name: name.clone(),
                result: Err(CacheError::Adapter(err)),
              });
            }
          }
        }
      }

      for (type_key, entries) in &buckets.pending_delete {
        for name in entries.keys() {
          jobs.push(SaveJob::Delete {
            type_key: type_key.clone(),
            name: name.clone(),
          });
        }
      }
    }

    let outcomes = join_all(jobs.into_iter().map(|job| self.run_job(job))).await;
    report.outcomes.extend(outcomes);
    report
  }

  /// Issue one remote call and apply its bucket transition.
  async fn run_job(&self, job: SaveJob) -> SaveOutcome {
    match job {
      SaveJob::Create {
        type_key,
        name,
        object,
        payload,
      } => match self.store.create(&type_key, &name, payload).await {
        Ok(()) => {
          let mut buckets = self.buckets.lock();
          // An entry destroyed mid-flight has already left the bucket;
          // re-applying the move would resurrect it.
          if buckets
            .pending_create
            .get_mut(&type_key)
            .and_then(|b| b.remove(&name))
            .is_some()
          {
            buckets
              .pending_update
              .entry(type_key.clone())
              .or_default()
              .insert(name.clone(), object);
            debug!(%type_key, %name, "created remotely");
          }
          SaveOutcome {
            op: SaveOp::Create,
            type_key,
            name,
            result: Ok(()),
          }
        }
        Err(err) => {
          object.lock().set_dirty(true);
          self.notifier.emit(CacheSignal::Dirty);
          SaveOutcome {
            op: SaveOp::Create,
            type_key,
            name,
            result: Err(err.into()),
          }
        }
      },

      SaveJob::Update {
        type_key,
        name,
        object,
        payload,
      } => match self.store.update(&type_key, &name, payload).await {
        Ok(()) => {
          debug!(%type_key, %name, "updated remotely");
          SaveOutcome {
            op: SaveOp::Update,
            type_key,
            name,
            result: Ok(()),
          }
        }
        Err(err) => {
          object.lock().set_dirty(true);
          self.notifier.emit(CacheSignal::Dirty);
          SaveOutcome {
            op: SaveOp::Update,
            type_key,
            name,
            result: Err(err.into()),
          }
        }
      },

      SaveJob::Delete { type_key, name } => match self.store.delete(&type_key, &name).await {
        Ok(()) => {
          let mut buckets = self.buckets.lock();
          if let Some(entries) = buckets.pending_delete.get_mut(&type_key) {
            entries.remove(&name);
          }
          debug!(%type_key, %name, "deleted remotely");
          SaveOutcome {
            op: SaveOp::Delete,
            type_key,
            name,
            result: Ok(()),
          }
        }
        Err(err) => {
          self.notifier.emit(CacheSignal::Dirty);
          SaveOutcome {
            op: SaveOp::Delete,
            type_key,
            name,
            result: Err(err.into()),
          }
        }
      },
    }
  }

  /// Drop all staged work for every type.
  ///
  /// The name memo survives: it holds no unsaved work and seeds the next
  /// listing. No remote calls, no notifications.
  pub fn clear(&self) {
    let mut buckets = self.buckets.lock();
    buckets.pending_create.clear();
    buckets.pending_update.clear();
    buckets.pending_delete.clear();
  }
}
