//! Permission-aware write gateway.

use super::{
    DelegateChannel, DelegatedWrite, DeletionHistory, DocumentStore, ObjectUpdate,
    PermissionGateway, PreUpdate, StorageError, StorageResult, UpdateContext, extend_batch,
};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::placeables::{Kind, ObjectId, ObjectKey, Placeable};
use std::sync::{Arc, Mutex, PoisonError};

/// Routes writes either straight to the store or through a privileged
/// delegate, depending on the local actor's permission.
///
/// The permission check happens before every write, so a denied direct
/// write never reaches the store.
pub struct WriteGateway {
    store: Arc<dyn DocumentStore>,
    permission: Arc<dyn PermissionGateway>,
    delegate: Option<DelegateChannel>,
    clock: Arc<dyn Clock>,
    history: Mutex<DeletionHistory>,
}

impl WriteGateway {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        permission: Arc<dyn PermissionGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            permission,
            delegate: None,
            clock,
            history: Mutex::new(DeletionHistory::default()),
        }
    }

    /// Gateway keeping `config.deletion_history_len` deletion batches.
    pub fn from_config(
        store: Arc<dyn DocumentStore>,
        permission: Arc<dyn PermissionGateway>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(store, permission, clock).with_history_len(config.deletion_history_len)
    }

    /// Delegate writes through `channel` when not privileged.
    pub fn with_delegate(mut self, channel: DelegateChannel) -> Self {
        self.delegate = Some(channel);
        self
    }

    pub fn with_history_len(mut self, len: usize) -> Self {
        self.history = Mutex::new(DeletionHistory::new(len));
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn is_privileged(&self) -> bool {
        self.permission.is_privileged()
    }

    fn delegate(&self) -> StorageResult<&DelegateChannel> {
        self.delegate.as_ref().ok_or_else(|| {
            StorageError::PermissionDenied("no privileged delegate available".to_string())
        })
    }

    pub async fn create_documents(
        &self,
        documents: Vec<Placeable>,
        context: UpdateContext,
    ) -> StorageResult<Vec<ObjectKey>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        if self.is_privileged() {
            return self.store.create_documents(documents, context).await;
        }
        let delegate = self.delegate()?;
        Ok(delegate
            .request(DelegatedWrite::Create { documents, context })
            .await)
    }

    pub async fn update_documents(
        &self,
        kind: Kind,
        updates: Vec<ObjectUpdate>,
        mut context: UpdateContext,
    ) -> StorageResult<Vec<ObjectKey>> {
        if updates.is_empty() {
            return Ok(Vec::new());
        }
        if self.is_privileged() {
            return self.store.update_documents(kind, updates, context).await;
        }

        let delegate = self.delegate()?;
        // The remote store will not run our hooks, so interception happens
        // here, against the local replica.
        if context.modified_time.is_none() {
            context.modified_time = Some(self.clock.now_millis());
        }
        extend_batch(&mut context, kind, &updates);
        for update in &updates {
            if let Some(original) = self.store.get_document(kind, &update.id) {
                self.store.hooks().run_pre_update(&PreUpdate {
                    original: &original,
                    changes: &update.changes,
                    context: &context,
                });
            }
        }
        Ok(delegate
            .request(DelegatedWrite::Update {
                kind,
                updates,
                context,
            })
            .await)
    }

    /// Delete documents, keeping them in the bounded deletion history.
    pub async fn delete_documents(
        &self,
        kind: Kind,
        ids: Vec<ObjectId>,
        context: UpdateContext,
    ) -> StorageResult<Vec<ObjectKey>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if self.is_privileged() {
            let deleted = self.store.delete_documents(kind, ids, context).await?;
            let keys = deleted.iter().map(Placeable::key).collect();
            self.record_deletion(deleted);
            return Ok(keys);
        }

        let delegate = self.delegate()?;
        let snapshot: Vec<Placeable> = ids
            .iter()
            .filter_map(|id| self.store.get_document(kind, id))
            .collect();
        let keys = delegate
            .request(DelegatedWrite::Delete { kind, ids, context })
            .await;
        self.record_deletion(
            snapshot
                .into_iter()
                .filter(|doc| keys.contains(&doc.key()))
                .collect(),
        );
        Ok(keys)
    }

    fn record_deletion(&self, deleted: Vec<Placeable>) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(deleted);
    }

    pub fn deletion_history_len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Recreate the most recently deleted batch.
    pub async fn restore_last_deleted(&self) -> StorageResult<Vec<ObjectKey>> {
        let batch = self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match batch {
            Some(documents) => {
                self.create_documents(documents, UpdateContext::ignoring_links())
                    .await
            }
            None => Ok(Vec::new()),
        }
    }
}
