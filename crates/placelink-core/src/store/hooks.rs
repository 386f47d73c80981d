//! Explicit hook registration points for document writes.

use super::UpdateContext;
use crate::placeables::{Kind, Placeable};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Handle returned by every registration, used to unregister.
pub type HookId = u64;

/// A document about to be updated.
#[derive(Debug, Clone, Copy)]
pub struct PreUpdate<'a> {
    /// Stored state before the write.
    pub original: &'a Placeable,
    /// Incoming diff.
    pub changes: &'a Map<String, Value>,
    pub context: &'a UpdateContext,
}

pub type PreUpdateHook = Arc<dyn Fn(&PreUpdate<'_>) + Send + Sync>;
pub type PostUpdateHook = Arc<dyn Fn(Kind, &[Placeable], &UpdateContext) + Send + Sync>;
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Registry of pre/post update hooks and named events.
///
/// Handlers are cloned out of the registry before they run, so a handler
/// may register or remove hooks without deadlocking.
#[derive(Default)]
pub struct HookRegistry {
    next_id: AtomicU64,
    pre_update: RwLock<Vec<(HookId, PreUpdateHook)>>,
    post_update: RwLock<Vec<(HookId, PostUpdateHook)>>,
    events: RwLock<HashMap<String, Vec<(HookId, EventHandler)>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> HookId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn on_pre_update(&self, hook: impl Fn(&PreUpdate<'_>) + Send + Sync + 'static) -> HookId {
        let id = self.next_id();
        self.pre_update
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(hook)));
        id
    }

    pub fn on_post_update(
        &self,
        hook: impl Fn(Kind, &[Placeable], &UpdateContext) + Send + Sync + 'static,
    ) -> HookId {
        let id = self.next_id();
        self.post_update
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(hook)));
        id
    }

    /// Register a handler for a named event.
    pub fn on(&self, event: &str, handler: impl Fn(&Value) + Send + Sync + 'static) -> HookId {
        let id = self.next_id();
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a hook or event handler. Returns whether it existed.
    pub fn off(&self, id: HookId) -> bool {
        let mut removed = false;
        {
            let mut pre = self.pre_update.write().unwrap_or_else(PoisonError::into_inner);
            let before = pre.len();
            pre.retain(|(hook_id, _)| *hook_id != id);
            removed |= pre.len() != before;
        }
        {
            let mut post = self.post_update.write().unwrap_or_else(PoisonError::into_inner);
            let before = post.len();
            post.retain(|(hook_id, _)| *hook_id != id);
            removed |= post.len() != before;
        }
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        for handlers in events.values_mut() {
            let before = handlers.len();
            handlers.retain(|(hook_id, _)| *hook_id != id);
            removed |= handlers.len() != before;
        }
        removed
    }

    /// Emit a named event. Returns the number of handlers called.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let handlers: Vec<EventHandler> = self
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn run_pre_update(&self, event: &PreUpdate<'_>) {
        let hooks: Vec<PreUpdateHook> = self
            .pre_update
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for hook in hooks {
            hook(event);
        }
    }

    pub fn run_post_update(&self, kind: Kind, documents: &[Placeable], context: &UpdateContext) {
        let hooks: Vec<PostUpdateHook> = self
            .post_update
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for hook in hooks {
            hook(kind, documents, context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_and_off() {
        let hooks = HookRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = hooks.on("placelink.cascade", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(hooks.emit("placelink.cascade", &Value::Null), 1);
        assert_eq!(hooks.emit("other", &Value::Null), 0);
        assert!(hooks.off(id));
        assert!(!hooks.off(id));
        assert_eq!(hooks.emit("placelink.cascade", &Value::Null), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
