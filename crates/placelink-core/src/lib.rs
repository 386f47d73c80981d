//! Placelink Core Library
//!
//! Transforms clusters of 2-D scene placeables and cascades edits through
//! links between them.

pub mod clock;
pub mod config;
pub mod geometry;
pub mod links;
pub mod placeables;
pub mod preview;
pub mod propagation;
pub mod spawn;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use geometry::{PreviewHandle, TransformDelta, TransformError, Transformer, transform};
pub use links::{
    Link, LinkGraph, LinkId, LinkRegistry, LinkType, add_link, are_linked, get_links, has_link,
    remove_link,
};
pub use placeables::{Kind, ObjectKey, Placeable, PlaceableData};
pub use preview::{PreviewController, PreviewInput, PreviewOutcome, PreviewState, PreviewSurface};
pub use propagation::{CascadePlan, Coordinator, IdempotencyWindow};
pub use spawn::{Pivot, SpawnError, position_cluster, spawn_cluster};
pub use store::{DocumentStore, MemoryStore, ObjectUpdate, UpdateContext, WriteGateway};
