//! Storage, permission and event interfaces.
//!
//! The engine never owns documents. It reads transient copies through
//! [`DocumentStore`] and writes diffs back through [`WriteGateway`].

mod delegate;
mod diff;
mod gateway;
mod history;
mod hooks;
mod memory;

pub use delegate::{
    DEFAULT_DELEGATE_TIMEOUT, DelegateChannel, DelegateMessage, DelegatedWrite, serve,
};
pub use diff::{apply_changes, diff_values, merge_changes};
pub use gateway::WriteGateway;
pub use history::{DEFAULT_DELETION_HISTORY, DeletionHistory};
pub use hooks::{EventHandler, HookId, HookRegistry, PostUpdateHook, PreUpdate, PreUpdateHook};
pub use memory::MemoryStore;

use crate::placeables::{Kind, ObjectId, ObjectKey, Placeable};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Storage error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identifier of a connected user.
pub type ActorId = String;

/// A partial update for one document: only changed fields, as a JSON
/// object diff. Removed keys are encoded as `"-=key": null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdate {
    pub id: ObjectId,
    pub changes: Map<String, Value>,
}

impl ObjectUpdate {
    pub fn new(id: impl Into<ObjectId>, changes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            changes,
        }
    }

    /// Update turning `before` into `after`, or `None` if nothing changed.
    pub fn diff(before: &Placeable, after: &Placeable) -> StorageResult<Option<Self>> {
        let before_value = serde_json::to_value(before)?;
        let after_value = serde_json::to_value(after)?;
        let mut changes = diff_values(&before_value, &after_value);
        changes.remove("id");
        Ok((!changes.is_empty()).then(|| Self::new(before.id.clone(), changes)))
    }

    /// Changes to the kind data (`data.*`), if any.
    pub fn data_changes(&self) -> Option<&Map<String, Value>> {
        self.changes.get("data").and_then(Value::as_object)
    }
}

/// Options carried alongside a write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateContext {
    /// Write must not trigger link propagation.
    #[serde(default)]
    pub ignore_links: bool,
    /// Logical timestamp shared by every write of one batch (ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<u64>,
    /// Actor that originated the edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_actor: Option<ActorId>,
    /// Linking suppressed for this edit (modifier key held).
    #[serde(default)]
    pub suppress_links: bool,
    /// Every object written in the same batch. Filled in by the store.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub batch: Vec<ObjectKey>,
}

impl UpdateContext {
    pub fn ignoring_links() -> Self {
        Self {
            ignore_links: true,
            ..Self::default()
        }
    }

    pub fn from_actor(actor: impl Into<ActorId>) -> Self {
        Self {
            origin_actor: Some(actor.into()),
            ..Self::default()
        }
    }

    pub fn with_modified_time(mut self, millis: u64) -> Self {
        self.modified_time = Some(millis);
        self
    }

    pub fn with_ignore_links(mut self) -> Self {
        self.ignore_links = true;
        self
    }
}

/// Document storage backend.
pub trait DocumentStore: Send + Sync {
    /// Transient copy of one document.
    fn get_document(&self, kind: Kind, id: &str) -> Option<Placeable>;

    /// Every document, optionally filtered by kind.
    fn documents(&self, kind: Option<Kind>) -> Vec<Placeable>;

    fn create_documents(
        &self,
        documents: Vec<Placeable>,
        context: UpdateContext,
    ) -> BoxFuture<'_, StorageResult<Vec<ObjectKey>>>;

    /// Apply partial updates to documents of one kind.
    fn update_documents(
        &self,
        kind: Kind,
        updates: Vec<ObjectUpdate>,
        context: UpdateContext,
    ) -> BoxFuture<'_, StorageResult<Vec<ObjectKey>>>;

    /// Delete documents and return what was deleted.
    fn delete_documents(
        &self,
        kind: Kind,
        ids: Vec<ObjectId>,
        context: UpdateContext,
    ) -> BoxFuture<'_, StorageResult<Vec<Placeable>>>;

    /// Pre/post update hooks and generic events.
    fn hooks(&self) -> &HookRegistry;
}

/// Answers whether the local actor may write directly.
pub trait PermissionGateway: Send + Sync {
    fn is_privileged(&self) -> bool;
}

/// Fixed permission answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub bool);

impl PermissionGateway for StaticPermission {
    fn is_privileged(&self) -> bool {
        self.0
    }
}

/// Add the keys of `updates` to the batch recorded on `context`.
pub(crate) fn extend_batch(context: &mut UpdateContext, kind: Kind, updates: &[ObjectUpdate]) {
    for update in updates {
        let key = ObjectKey::new(kind, update.id.clone());
        if !context.batch.contains(&key) {
            context.batch.push(key);
        }
    }
}
