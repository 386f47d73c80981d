#![allow(dead_code)]

use kurbo::Vec2;
use placelink_core::store::StaticPermission;
use placelink_core::{
    Coordinator, DocumentStore, EngineConfig, Kind, ManualClock, MemoryStore, ObjectKey,
    ObjectUpdate, Placeable, UpdateContext, WriteGateway,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub const START_MILLIS: u64 = 1_000;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A privileged scene with the coordinator installed.
pub struct Scene {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<WriteGateway>,
    pub coordinator: Arc<Coordinator>,
    /// Keys written with `ignore_links`, in write order.
    pub cascaded: Arc<Mutex<Vec<ObjectKey>>>,
}

impl Scene {
    pub fn new(documents: Vec<Placeable>) -> Self {
        init_logging();
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        store.insert(documents).unwrap();
        let config = EngineConfig::default();
        let gateway = Arc::new(WriteGateway::from_config(
            store.clone(),
            Arc::new(StaticPermission(true)),
            clock.clone(),
            &config,
        ));
        let coordinator = Coordinator::from_config(gateway.clone(), &config, clock.clone());
        coordinator.install();

        let cascaded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&cascaded);
        store.hooks().on_post_update(move |_kind, documents, context| {
            if context.ignore_links {
                sink.lock()
                    .unwrap()
                    .extend(documents.iter().map(Placeable::key));
            }
        });

        Self {
            clock,
            store,
            gateway,
            coordinator,
            cascaded,
        }
    }

    pub fn get(&self, kind: Kind, id: &str) -> Placeable {
        self.store.get_document(kind, id).unwrap()
    }

    pub fn cascaded(&self) -> Vec<ObjectKey> {
        self.cascaded.lock().unwrap().clone()
    }

    /// Move one object as a primary edit and wait for the cascade.
    pub async fn translate(&self, kind: Kind, id: &str, dx: f64, dy: f64, context: UpdateContext) {
        let before = self.get(kind, id);
        let mut after = before.clone();
        after.data.translate(Vec2::new(dx, dy), None);
        self.write(&before, &after, context).await;
    }

    /// Write `after` over `before` and wait for the cascade.
    pub async fn write(&self, before: &Placeable, after: &Placeable, context: UpdateContext) {
        let update = ObjectUpdate::diff(before, after).unwrap().unwrap();
        self.store
            .update_documents(before.kind(), vec![update], context)
            .await
            .unwrap();
        self.coordinator.flush().await;
    }
}

/// Compare two JSON trees, allowing float noise.
pub fn approx_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            // angles are normalized, so 359.999... and 0 are the same
            let d = (x.as_f64().unwrap() - y.as_f64().unwrap()).abs();
            d < 1e-6 || (d - 360.0).abs() < 1e-6
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| approx_eq(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| approx_eq(v, other)))
        }
        _ => a == b,
    }
}

pub fn assert_approx(a: &Placeable, b: &Placeable) {
    let (x, y) = (
        serde_json::to_value(a).unwrap(),
        serde_json::to_value(b).unwrap(),
    );
    assert!(approx_eq(&x, &y), "{x} != {y}");
}
