//! Update propagation coordinator.
//!
//! A cascade runs in six steps:
//!
//! 1. Trigger: a pre-update hook sees a geometric change on an object that
//!    owns at least one link able to propagate.
//! 2. Guard: foreign edits, `ignore_links` writes and suppressed edits do
//!    not cascade.
//! 3. Dedup: every link id is claimed in the [`IdempotencyWindow`] under
//!    the batch timestamp before it is expanded. Ids already claimed are
//!    dropped, so each id cascades once per window.
//! 4. Delta: [`derive_delta`] compares the stored state with the incoming
//!    change.
//! 5. Propagation: a depth-first walk from the root through links that
//!    propagate, applying the delta to every peer that accepts it. Peers
//!    become sources in turn. A link id is expanded once per cascade and an
//!    object is updated at most once.
//! 6. Commit: updates are grouped per kind and pushed onto the
//!    [`WriteQueue`] with `ignore_links` set.

mod delta;
mod queue;
mod window;

pub use delta::{DerivedDelta, derive_delta, is_single_endpoint_edit, touches_geometry};
pub use queue::{WriteJob, WriteQueue};
pub use window::{DEFAULT_WINDOW_TTL, IdempotencyWindow};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::geometry::{TransformDelta, Transformer};
use crate::links::{LinkGraph, LinkId};
use crate::placeables::{Kind, ObjectKey, Placeable, PlaceableData};
use crate::store::{
    ActorId, DocumentStore, HookId, ObjectUpdate, UpdateContext, WriteGateway, apply_changes,
};
use kurbo::Point;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

/// Event emitted on the store's hook registry after a cascade is queued.
pub const CASCADE_EVENT: &str = "placelink.cascade";

/// Mutable bookkeeping of one cascade. Never shared between cascades.
#[derive(Debug)]
pub struct PropagationContext {
    pub root: ObjectKey,
    pub processed_link_ids: HashSet<LinkId>,
    pub touched: HashSet<ObjectKey>,
    pub updates_by_kind: BTreeMap<Kind, Vec<ObjectUpdate>>,
}

impl PropagationContext {
    pub fn new(root: ObjectKey) -> Self {
        Self {
            root,
            processed_link_ids: HashSet::new(),
            touched: HashSet::new(),
            updates_by_kind: BTreeMap::new(),
        }
    }
}

/// Result of a cascade, ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadePlan {
    pub root: ObjectKey,
    pub delta: TransformDelta,
    pub origin: Point,
    pub modified_time: u64,
    pub updates_by_kind: BTreeMap<Kind, Vec<ObjectUpdate>>,
}

impl CascadePlan {
    /// Total number of peer updates.
    pub fn len(&self) -> usize {
        self.updates_by_kind.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn updates(&self, kind: Kind) -> &[ObjectUpdate] {
        self.updates_by_kind
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Observes primary edits and cascades them to linked peers.
pub struct Coordinator {
    store: Arc<dyn DocumentStore>,
    window: Arc<IdempotencyWindow>,
    queue: WriteQueue,
    transformer: Transformer,
    local_actor: ActorId,
    clock: Arc<dyn Clock>,
    hook: Mutex<Option<HookId>>,
}

impl Coordinator {
    /// Create a coordinator writing through `gateway`. Must be called
    /// inside a tokio runtime, which runs the write queue.
    pub fn new(
        gateway: Arc<WriteGateway>,
        window: Arc<IdempotencyWindow>,
        transformer: Transformer,
        local_actor: impl Into<ActorId>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let store = Arc::clone(gateway.store());
        Arc::new(Self {
            store,
            window,
            queue: WriteQueue::spawn(gateway),
            transformer,
            local_actor: local_actor.into(),
            clock,
            hook: Mutex::new(None),
        })
    }

    /// Coordinator with window, transformer and actor taken from `config`.
    pub fn from_config(
        gateway: Arc<WriteGateway>,
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let window = Arc::new(IdempotencyWindow::new(
            Arc::clone(&clock),
            config.idempotency_window(),
        ));
        Self::new(
            gateway,
            window,
            Transformer::new(config.three_d_active),
            config.local_actor.clone(),
            clock,
        )
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }

    pub fn local_actor(&self) -> &str {
        &self.local_actor
    }

    /// Register the pre-update hook on the store. Idempotent.
    pub fn install(self: &Arc<Self>) -> HookId {
        let mut hook = self.hook.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = *hook {
            return id;
        }
        let weak = Arc::downgrade(self);
        let id = self.store.hooks().on_pre_update(move |event| {
            let Some(coordinator) = weak.upgrade() else {
                return;
            };
            if let Some(plan) = coordinator.propagate(event.original, event.changes, event.context)
            {
                coordinator.commit(plan);
            }
        });
        *hook = Some(id);
        id
    }

    /// Remove the pre-update hook.
    pub fn uninstall(&self) -> bool {
        let id = self.hook.lock().unwrap_or_else(PoisonError::into_inner).take();
        id.is_some_and(|id| self.store.hooks().off(id))
    }

    /// Compute the cascade for `changes` about to be applied to `root`.
    ///
    /// Returns `None` when the edit does not cascade or reaches no peer.
    pub fn propagate(
        &self,
        root: &Placeable,
        changes: &Map<String, Value>,
        context: &UpdateContext,
    ) -> Option<CascadePlan> {
        let kind = root.kind();
        if !touches_geometry(kind, changes) {
            return None;
        }
        if !root
            .metadata
            .links
            .iter()
            .any(|link| link.link_type.propagates())
        {
            return None;
        }

        if context.ignore_links || context.suppress_links {
            log::debug!("Linking disabled for edit of {}", root.key());
            return None;
        }
        if context
            .origin_actor
            .as_ref()
            .is_some_and(|actor| *actor != self.local_actor)
        {
            return None;
        }

        let mut updated = root.clone();
        if let Err(e) = apply_changes(&mut updated, changes) {
            log::warn!("Cannot preview change to {}: {}", root.key(), e);
            return None;
        }
        if let (PlaceableData::Wall(before), PlaceableData::Wall(after)) =
            (&root.data, &updated.data)
        {
            if is_single_endpoint_edit(before, after) {
                log::debug!("Single endpoint edit of {}, not cascading", root.key());
                return None;
            }
        }

        let derived = derive_delta(&root.data, &updated.data)?;
        let timestamp = context
            .modified_time
            .unwrap_or_else(|| self.clock.now_millis());
        let plan = self.cascade(root.key(), derived, timestamp, &context.batch);
        (!plan.is_empty()).then_some(plan)
    }

    fn cascade(
        &self,
        root: ObjectKey,
        derived: DerivedDelta,
        timestamp: u64,
        batch: &[ObjectKey],
    ) -> CascadePlan {
        let documents = self.store.documents(None);
        let graph = LinkGraph::from_documents(&documents);
        let batch: HashSet<&ObjectKey> = batch.iter().collect();
        let mut cx = PropagationContext::new(root.clone());
        let mut stack = vec![root.clone()];

        while let Some(source) = stack.pop() {
            for link in graph.links_of(&source) {
                if !link.link_type.propagates() {
                    continue;
                }
                if !cx.processed_link_ids.insert(link.id.clone()) {
                    continue;
                }
                if !self.window.try_claim(timestamp, &link.id) {
                    log::debug!("Link {} already cascaded at {}", link.id, timestamp);
                    continue;
                }
                for member in graph.members(&link.id) {
                    if *member == cx.root || batch.contains(member) || cx.touched.contains(member) {
                        continue;
                    }
                    if !graph
                        .link_type(member, &link.id)
                        .is_some_and(|t| t.accepts())
                    {
                        continue;
                    }
                    cx.touched.insert(member.clone());
                    // A peer the delta leaves unchanged still relays it.
                    if let Some(update) = self.transform_peer(member, &derived) {
                        cx.updates_by_kind
                            .entry(member.kind)
                            .or_default()
                            .push(update);
                    }
                    stack.push(member.clone());
                }
            }
        }

        CascadePlan {
            root,
            delta: derived.delta,
            origin: derived.origin,
            modified_time: timestamp,
            updates_by_kind: cx.updates_by_kind,
        }
    }

    /// Apply the delta to a working copy of one peer and diff it.
    fn transform_peer(&self, key: &ObjectKey, derived: &DerivedDelta) -> Option<ObjectUpdate> {
        let peer = self.store.get_document(key.kind, &key.id)?;
        let mut working = peer.clone();
        if let Err(e) =
            self.transformer
                .apply(&mut working.data, derived.origin, &derived.delta, None)
        {
            log::warn!("Skipping {} in cascade: {}", key, e);
            return None;
        }
        match ObjectUpdate::diff(&peer, &working) {
            Ok(update) => update,
            Err(e) => {
                log::warn!("Cannot diff {}: {}", key, e);
                None
            }
        }
    }

    /// Queue the peer updates of a cascade, one job per kind.
    pub fn commit(&self, plan: CascadePlan) {
        log::info!(
            "Cascading {} from {} to {} objects",
            describe(&plan.delta),
            plan.root,
            plan.len()
        );
        let payload = serde_json::json!({
            "root": plan.root,
            "count": plan.len(),
            "modified_time": plan.modified_time,
        });
        for (kind, updates) in plan.updates_by_kind {
            self.queue.enqueue(WriteJob {
                kind,
                updates,
                context: UpdateContext {
                    ignore_links: true,
                    modified_time: Some(plan.modified_time),
                    origin_actor: Some(self.local_actor.clone()),
                    ..UpdateContext::default()
                },
            });
        }
        self.store.hooks().emit(CASCADE_EVENT, &payload);
    }

    /// Queue primary edits (for example a confirmed preview). The writes
    /// are ordinary edits, so their hooks cascade to linked peers.
    ///
    /// Every edited object is recorded in the batch of every job, so a
    /// cascade from one kind never overwrites a primary edit of another.
    pub fn commit_primary(&self, updates: Vec<(Kind, ObjectUpdate)>) {
        let mut context = UpdateContext::from_actor(self.local_actor.clone())
            .with_modified_time(self.clock.now_millis());
        let mut by_kind: BTreeMap<Kind, Vec<ObjectUpdate>> = BTreeMap::new();
        for (kind, update) in updates {
            context.batch.push(ObjectKey::new(kind, update.id.clone()));
            by_kind.entry(kind).or_default().push(update);
        }
        for (kind, updates) in by_kind {
            self.queue.enqueue(WriteJob {
                kind,
                updates,
                context: context.clone(),
            });
        }
    }

    /// Wait until every queued write has landed.
    pub async fn flush(&self) {
        self.queue.flush().await;
    }
}

fn describe(delta: &TransformDelta) -> String {
    let mut parts = vec![format!("move ({}, {})", delta.dx, delta.dy)];
    if let Some(r) = delta.rotation {
        parts.push(format!("rotate {r}"));
    }
    if let Some(dz) = delta.dz {
        parts.push(format!("elevate {dz}"));
    }
    parts.join(", ")
}
