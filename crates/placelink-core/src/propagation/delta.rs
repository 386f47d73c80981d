//! Deriving a transform delta from a before/after pair.

use crate::geometry::TransformDelta;
use crate::placeables::{Kind, PlaceableData, Wall, normalize_degrees};
use kurbo::Point;
use serde_json::{Map, Value};

/// Delta that turns one object's old state into its new state, plus the
/// origin it rotates around.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedDelta {
    pub delta: TransformDelta,
    pub origin: Point,
}

/// Whether a diff touches any geometric field of `kind`.
pub fn touches_geometry(kind: Kind, changes: &Map<String, Value>) -> bool {
    let Some(data) = changes.get("data").and_then(Value::as_object) else {
        return false;
    };
    kind.geometric_fields().iter().any(|field| {
        data.contains_key(*field) || data.contains_key(&format!("-={field}"))
    })
}

/// A wall edit that moves exactly one endpoint.
pub fn is_single_endpoint_edit(before: &Wall, after: &Wall) -> bool {
    let start_moved = before.start() != after.start();
    let end_moved = before.end() != after.end();
    start_moved != end_moved
}

/// Rigid delta between two states of the same object.
///
/// Anchored kinds subtract anchors. Walls and regions compare bounding-box
/// top-left corners, since their representation can change shape. A
/// rotation change sets the origin to the old bounding-box center.
/// Returns `None` when the kinds differ or nothing moved.
pub fn derive_delta(before: &PlaceableData, after: &PlaceableData) -> Option<DerivedDelta> {
    if before.kind() != after.kind() {
        return None;
    }
    let old_bounds = before.bounds();
    let offset = match (before.anchor(), after.anchor()) {
        (Some(old), Some(new)) => new - old,
        _ => after.bounds().origin() - old_bounds.origin(),
    };

    let mut delta = TransformDelta::translation(offset.x, offset.y);

    let mut origin = Point::ZERO;
    if let (Some(old), Some(new)) = (before.orientation(), after.orientation()) {
        let rotation = normalize_degrees(new - old);
        if rotation != 0.0 {
            delta.rotation = Some(rotation);
            origin = old_bounds.center();
        }
    }

    let old_z = before.elevation().and_then(|e| e.base());
    let new_z = after.elevation().and_then(|e| e.base());
    if let (Some(old), Some(new)) = (old_z, new_z) {
        if new != old {
            delta.dz = Some(new - old);
        }
    }

    (!delta.is_identity()).then_some(DerivedDelta { delta, origin })
}
