//! In-memory document store.

use super::{
    BoxFuture, DocumentStore, HookRegistry, ObjectUpdate, PreUpdate, StorageError, StorageResult,
    UpdateContext, apply_changes, extend_batch,
};
use crate::clock::{Clock, SystemClock};
use crate::placeables::{Kind, ObjectId, ObjectKey, Placeable};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

/// In-memory store for tests and ephemeral scenes.
///
/// Pre-update hooks run before the write lock is taken, so a hook may read
/// other documents. Post-update hooks run after it is released.
pub struct MemoryStore {
    documents: RwLock<BTreeMap<ObjectKey, Placeable>>,
    hooks: HookRegistry,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            hooks: HookRegistry::new(),
            clock,
        }
    }

    /// Insert documents directly, bypassing hooks.
    pub fn insert(&self, documents: impl IntoIterator<Item = Placeable>) -> StorageResult<()> {
        let mut docs = self.documents.write().map_err(lock_error)?;
        for doc in documents {
            docs.insert(doc.key(), doc);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryStore {
    fn get_document(&self, kind: Kind, id: &str) -> Option<Placeable> {
        let docs = self.documents.read().ok()?;
        docs.get(&ObjectKey::new(kind, id)).cloned()
    }

    fn documents(&self, kind: Option<Kind>) -> Vec<Placeable> {
        let Ok(docs) = self.documents.read() else {
            return Vec::new();
        };
        docs.values()
            .filter(|doc| kind.is_none_or(|k| doc.kind() == k))
            .cloned()
            .collect()
    }

    fn create_documents(
        &self,
        documents: Vec<Placeable>,
        context: UpdateContext,
    ) -> BoxFuture<'_, StorageResult<Vec<ObjectKey>>> {
        Box::pin(async move {
            let mut created: BTreeMap<Kind, Vec<Placeable>> = BTreeMap::new();
            {
                let mut docs = self.documents.write().map_err(lock_error)?;
                for doc in documents {
                    let key = doc.key();
                    if docs.contains_key(&key) {
                        log::warn!("Refusing to overwrite existing document {}", key);
                        continue;
                    }
                    docs.insert(key, doc.clone());
                    created.entry(doc.kind()).or_default().push(doc);
                }
            }
            let mut keys = Vec::new();
            for (kind, docs) in &created {
                keys.extend(docs.iter().map(Placeable::key));
                self.hooks.run_post_update(*kind, docs, &context);
            }
            Ok(keys)
        })
    }

    fn update_documents(
        &self,
        kind: Kind,
        updates: Vec<ObjectUpdate>,
        mut context: UpdateContext,
    ) -> BoxFuture<'_, StorageResult<Vec<ObjectKey>>> {
        Box::pin(async move {
            if context.modified_time.is_none() {
                context.modified_time = Some(self.clock.now_millis());
            }
            extend_batch(&mut context, kind, &updates);

            for update in &updates {
                let Some(original) = self.get_document(kind, &update.id) else {
                    continue;
                };
                self.hooks.run_pre_update(&PreUpdate {
                    original: &original,
                    changes: &update.changes,
                    context: &context,
                });
            }

            let mut merged = Vec::with_capacity(updates.len());
            {
                let mut docs = self.documents.write().map_err(lock_error)?;
                // Merge every update before committing any, so a bad diff
                // leaves the whole batch unwritten.
                for update in &updates {
                    let key = ObjectKey::new(kind, update.id.clone());
                    let Some(doc) = docs.get(&key) else {
                        log::debug!("Skipping update for missing document {}", key);
                        continue;
                    };
                    let mut next = doc.clone();
                    apply_changes(&mut next, &update.changes)?;
                    merged.push((key, next));
                }
                for (key, doc) in &merged {
                    docs.insert(key.clone(), doc.clone());
                }
            }
            let updated: Vec<Placeable> = merged.into_iter().map(|(_, doc)| doc).collect();

            self.hooks.run_post_update(kind, &updated, &context);
            Ok(updated.iter().map(Placeable::key).collect())
        })
    }

    fn delete_documents(
        &self,
        kind: Kind,
        ids: Vec<ObjectId>,
        _context: UpdateContext,
    ) -> BoxFuture<'_, StorageResult<Vec<Placeable>>> {
        Box::pin(async move {
            let mut docs = self.documents.write().map_err(lock_error)?;
            Ok(ids
                .into_iter()
                .filter_map(|id| docs.remove(&ObjectKey::new(kind, id)))
                .collect())
        })
    }

    fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::placeables::{PlaceableData, Token};
    use kurbo::Point;
    use serde_json::json;
    use std::sync::Mutex;

    fn token(id: &str, x: f64) -> Placeable {
        Placeable::with_id(id, PlaceableData::Token(Token::new(Point::new(x, 0.0), 100.0, 100.0)))
    }

    fn changes(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_update_merges_diff() {
        let store = MemoryStore::new();
        store.insert([token("a", 0.0)]).unwrap();

        let keys = store
            .update_documents(
                Kind::Token,
                vec![ObjectUpdate::new("a", changes(json!({"data": {"x": 50.0}})))],
                UpdateContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(keys, vec![ObjectKey::new(Kind::Token, "a")]);
        let Some(PlaceableData::Token(t)) = store.get_document(Kind::Token, "a").map(|d| d.data)
        else {
            panic!("token missing");
        };
        assert!((t.x - 50.0).abs() < f64::EPSILON);
        assert!((t.width - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_hooks_see_stamped_context() {
        let clock = Arc::new(ManualClock::new(42));
        let store = MemoryStore::with_clock(clock);
        store.insert([token("a", 0.0), token("b", 0.0)]).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.hooks().on_pre_update(move |event| {
            sink.lock().unwrap().push((
                event.original.id.clone(),
                event.context.modified_time,
                event.context.batch.len(),
            ));
        });

        store
            .update_documents(
                Kind::Token,
                vec![
                    ObjectUpdate::new("a", changes(json!({"data": {"y": 1.0}}))),
                    ObjectUpdate::new("b", changes(json!({"data": {"y": 1.0}}))),
                ],
                UpdateContext::default(),
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("a".to_string(), Some(42), 2),
                ("b".to_string(), Some(42), 2)
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_update_leaves_batch_unwritten() {
        let store = MemoryStore::new();
        store.insert([token("a", 0.0), token("b", 0.0)]).unwrap();
        let posted = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&posted);
        store.hooks().on_post_update(move |_, docs, _| {
            *sink.lock().unwrap() += docs.len();
        });

        let result = store
            .update_documents(
                Kind::Token,
                vec![
                    ObjectUpdate::new("a", changes(json!({"data": {"x": 50.0}}))),
                    ObjectUpdate::new("b", changes(json!({"data": {"x": "left"}}))),
                ],
                UpdateContext::default(),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(store.get_document(Kind::Token, "a"), Some(token("a", 0.0)));
        assert_eq!(*posted.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_returns_documents() {
        let store = MemoryStore::new();
        store.insert([token("a", 0.0)]).unwrap();
        let deleted = store
            .delete_documents(
                Kind::Token,
                vec!["a".into(), "missing".into()],
                UpdateContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(store.is_empty());
    }
}
