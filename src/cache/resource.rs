//! Editable resource objects and the adapter seam between wire and UI form.

use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// An in-memory, editable form of a remote resource.
///
/// The cache looks at nothing beyond the dirty flag and the wire conversion;
/// the concrete fields belong to the UI and to the adapter that built the
/// object. Setting the dirty flag is how callers tell the cache that an
/// object carries unsaved edits.
pub trait Editable: std::fmt::Debug + Send {
  /// Resource name, unique within its type.
  fn name(&self) -> &str;

  /// Whether the object carries unsaved edits.
  fn dirty(&self) -> bool;

  /// Set or clear the unsaved-edits flag.
  fn set_dirty(&mut self, dirty: bool);

  /// Convert back to the wire payload sent to the resource store.
  fn to_wire(&self) -> Result<Value, serde_json::Error>;

  /// Downcast support for callers that know the concrete type.
  fn as_any(&self) -> &dyn Any;

  /// Mutable downcast support for callers that know the concrete type.
  fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Shared handle to an editable object.
///
/// The cache keeps one clone in its buckets and hands another to the caller.
/// The dirty flag on the shared object is the sole coordination signal
/// between the two sides.
pub type SharedEditable = Arc<Mutex<Box<dyn Editable>>>;

/// Wrap a freshly built editable object into a shared handle.
pub(crate) fn share(object: Box<dyn Editable>) -> SharedEditable {
  Arc::new(Mutex::new(object))
}

/// Builds editable objects from raw wire data, one adapter per resource type.
pub trait ResourceAdapter: Send + Sync {
  /// Build the editable object for `name` from its raw payload.
  fn from_raw(&self, name: &str, data: Value) -> Result<Box<dyn Editable>, serde_json::Error>;
}

/// Schema-free editable resource: the raw JSON value plus a dirty flag.
#[derive(Debug, Clone)]
pub struct JsonResource {
  name: String,
  pub data: Value,
  dirty: bool,
}

impl JsonResource {
  pub fn new(name: impl Into<String>, data: Value) -> Self {
    Self {
      name: name.into(),
      data,
      dirty: false,
    }
  }
}

impl Editable for JsonResource {
  fn name(&self) -> &str {
    &self.name
  }

  fn dirty(&self) -> bool {
    self.dirty
  }

  fn set_dirty(&mut self, dirty: bool) {
    self.dirty = dirty;
  }

  fn to_wire(&self) -> Result<Value, serde_json::Error> {
    Ok(self.data.clone())
  }

  fn as_any(&self) -> &dyn Any {
    self
  }

  fn as_any_mut(&mut self) -> &mut dyn Any {
    self
  }
}

/// Adapter for resource types without a dedicated editable form.
///
/// Objects come back from the store clean; `StagedCache::create` marks
/// locally created ones dirty itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAdapter;

impl ResourceAdapter for JsonAdapter {
  fn from_raw(&self, name: &str, data: Value) -> Result<Box<dyn Editable>, serde_json::Error> {
    Ok(Box::new(JsonResource::new(name, data)))
  }
}
