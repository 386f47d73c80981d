//! Placeable object definitions for the scene.

mod drawing;
mod elevation;
mod light;
mod note;
mod region;
mod sound;
mod template;
mod tile;
mod token;
mod wall;

pub use drawing::{Drawing, DrawingShape, DrawingShapeType};
pub use elevation::Elevation;
pub use light::{AmbientLight, LightConfig};
pub use note::Note;
pub use region::{Region, RegionShape};
pub use sound::AmbientSound;
pub use template::MeasuredTemplate;
pub use tile::Tile;
pub use token::{TextureScale, Token};
pub use wall::Wall;

use crate::links::Link;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Identifier of a placeable within its kind.
pub type ObjectId = String;

/// Every kind of placeable the engine knows how to transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Token,
    Tile,
    Drawing,
    Wall,
    AmbientLight,
    AmbientSound,
    Note,
    MeasuredTemplate,
    Region,
}

impl Kind {
    pub const ALL: [Kind; 9] = [
        Kind::Token,
        Kind::Tile,
        Kind::Drawing,
        Kind::Wall,
        Kind::AmbientLight,
        Kind::AmbientSound,
        Kind::Note,
        Kind::MeasuredTemplate,
        Kind::Region,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Kind::Token => "Token",
            Kind::Tile => "Tile",
            Kind::Drawing => "Drawing",
            Kind::Wall => "Wall",
            Kind::AmbientLight => "AmbientLight",
            Kind::AmbientSound => "AmbientSound",
            Kind::Note => "Note",
            Kind::MeasuredTemplate => "MeasuredTemplate",
            Kind::Region => "Region",
        }
    }

    /// Data fields whose modification counts as a geometric edit.
    pub fn geometric_fields(self) -> &'static [&'static str] {
        match self {
            Kind::Token | Kind::Tile | Kind::AmbientLight => &["x", "y", "rotation", "elevation"],
            Kind::Drawing => &["x", "y", "rotation", "elevation", "shape"],
            Kind::Wall => &["c"],
            Kind::AmbientSound | Kind::Note => &["x", "y", "elevation"],
            Kind::MeasuredTemplate => &["x", "y", "direction", "elevation"],
            Kind::Region => &["shapes", "elevation"],
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable address of a placeable: `(kind, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: Kind,
    pub id: ObjectId,
}

impl ObjectKey {
    pub fn new(kind: Kind, id: impl Into<ObjectId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.id)
    }
}

/// Free-form metadata attached to a placeable. Links live here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    /// Anything else other tools stored on the object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Options that influence how a kind reacts to a scale step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaleOptions {
    /// Only positions scale; extents are already grid relative.
    pub grid_relative: bool,
    /// Scene renders in 3-D, so light and sound elevations scale too.
    pub three_d_active: bool,
}

/// Axes to mirror across.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorAxes {
    pub x: bool,
    pub y: bool,
}

impl MirrorAxes {
    pub fn any(self) -> bool {
        self.x || self.y
    }
}

/// Common trait for all placeable kinds.
///
/// The transform library drives these steps in a fixed order
/// (scale, translate, rotate, mirror); each kind only knows how its own
/// fields react to one step.
pub trait PlaceableTrait {
    /// Bounding box in scene coordinates.
    fn bounds(&self) -> Rect;

    /// Anchor position, for kinds positioned by a single point.
    fn anchor(&self) -> Option<Point> {
        None
    }

    /// Orientation in degrees (`rotation` or `direction`), if the kind has one.
    fn orientation(&self) -> Option<f64> {
        None
    }

    /// Elevation, if the kind has one.
    fn elevation(&self) -> Option<Elevation> {
        None
    }

    /// Multiply positions (and extents unless grid relative) by `factor`.
    fn scale(&mut self, factor: f64, options: ScaleOptions);

    /// Add `offset` to the position and `dz` to the elevation.
    fn translate(&mut self, offset: Vec2, dz: Option<f64>);

    /// Rotate around `origin` by `degrees`.
    fn rotate(&mut self, origin: Point, degrees: f64);

    /// Reflect around `origin`.
    fn mirror(&mut self, origin: Point, axes: MirrorAxes);

    /// Whether every numeric field is finite.
    fn is_finite(&self) -> bool;
}

/// Kind-specific data of a placeable (for serialization and dispatch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PlaceableData {
    Token(Token),
    Tile(Tile),
    Drawing(Drawing),
    Wall(Wall),
    AmbientLight(AmbientLight),
    AmbientSound(AmbientSound),
    Note(Note),
    MeasuredTemplate(MeasuredTemplate),
    Region(Region),
}

macro_rules! dispatch {
    ($data:expr, $inner:ident => $body:expr) => {
        match $data {
            PlaceableData::Token($inner) => $body,
            PlaceableData::Tile($inner) => $body,
            PlaceableData::Drawing($inner) => $body,
            PlaceableData::Wall($inner) => $body,
            PlaceableData::AmbientLight($inner) => $body,
            PlaceableData::AmbientSound($inner) => $body,
            PlaceableData::Note($inner) => $body,
            PlaceableData::MeasuredTemplate($inner) => $body,
            PlaceableData::Region($inner) => $body,
        }
    };
}

impl PlaceableData {
    pub fn kind(&self) -> Kind {
        match self {
            PlaceableData::Token(_) => Kind::Token,
            PlaceableData::Tile(_) => Kind::Tile,
            PlaceableData::Drawing(_) => Kind::Drawing,
            PlaceableData::Wall(_) => Kind::Wall,
            PlaceableData::AmbientLight(_) => Kind::AmbientLight,
            PlaceableData::AmbientSound(_) => Kind::AmbientSound,
            PlaceableData::Note(_) => Kind::Note,
            PlaceableData::MeasuredTemplate(_) => Kind::MeasuredTemplate,
            PlaceableData::Region(_) => Kind::Region,
        }
    }

    pub fn bounds(&self) -> Rect {
        dispatch!(self, p => p.bounds())
    }

    pub fn anchor(&self) -> Option<Point> {
        dispatch!(self, p => p.anchor())
    }

    pub fn orientation(&self) -> Option<f64> {
        dispatch!(self, p => p.orientation())
    }

    pub fn elevation(&self) -> Option<Elevation> {
        dispatch!(self, p => p.elevation())
    }

    pub fn scale(&mut self, factor: f64, options: ScaleOptions) {
        dispatch!(self, p => p.scale(factor, options))
    }

    pub fn translate(&mut self, offset: Vec2, dz: Option<f64>) {
        dispatch!(self, p => p.translate(offset, dz))
    }

    pub fn rotate(&mut self, origin: Point, degrees: f64) {
        dispatch!(self, p => p.rotate(origin, degrees))
    }

    pub fn mirror(&mut self, origin: Point, axes: MirrorAxes) {
        dispatch!(self, p => p.mirror(origin, axes))
    }

    pub fn is_finite(&self) -> bool {
        dispatch!(self, p => p.is_finite())
    }
}

/// A positioned scene object: id, kind data and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placeable {
    pub id: ObjectId,
    pub data: PlaceableData,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Placeable {
    /// Create a placeable with a freshly generated id.
    pub fn new(data: PlaceableData) -> Self {
        Self::with_id(Uuid::new_v4().simple().to_string(), data)
    }

    pub fn with_id(id: impl Into<ObjectId>, data: PlaceableData) -> Self {
        Self {
            id: id.into(),
            data,
            metadata: Metadata::default(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.data.kind()
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind(), self.id.clone())
    }

    pub fn bounds(&self) -> Rect {
        self.data.bounds()
    }
}

/// Rotate `point` around `origin` by `degrees` (clockwise on a y-down canvas).
pub fn rotate_point(point: Point, origin: Point, degrees: f64) -> Point {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (dx, dy) = (point.x - origin.x, point.y - origin.y);
    Point::new(
        origin.x + cos * dx - sin * dy,
        origin.y + sin * dx + cos * dy,
    )
}

/// Reflect `point` around `origin` on the requested axes.
pub fn mirror_point(point: Point, origin: Point, axes: MirrorAxes) -> Point {
    Point::new(
        if axes.x { origin.x - (point.x - origin.x) } else { point.x },
        if axes.y { origin.y - (point.y - origin.y) } else { point.y },
    )
}

/// Normalize an angle to `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let d = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if d >= 360.0 { 0.0 } else { d }
}

/// Reflect a rotation angle for a mirrored sprite, `r -> -r` once per axis.
pub(crate) fn mirror_rotation(rotation: f64, axes: MirrorAxes) -> f64 {
    let mut rotation = rotation;
    if axes.x {
        rotation = -rotation;
    }
    if axes.y {
        rotation = -rotation;
    }
    normalize_degrees(rotation)
}

/// Move a rectangle so its center lands on `center`, keeping its size.
pub(crate) fn top_left_for_center(center: Point, width: f64, height: f64) -> Point {
    Point::new(center.x - width / 2.0, center.y - height / 2.0)
}

/// Whether a flat `[x0, y0, x1, y1, ...]` point list describes a usable polygon.
pub(crate) fn is_polygon(points: &[f64]) -> bool {
    points.len() >= 6 && points.len() % 2 == 0
}

/// Bounding box of a flat point list (caller checks shape).
pub(crate) fn points_bounds(points: &[f64]) -> Rect {
    let mut min = Point::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for pair in points.chunks_exact(2) {
        min.x = min.x.min(pair[0]);
        min.y = min.y.min(pair[1]);
        max.x = max.x.max(pair[0]);
        max.y = max.y.max(pair[1]);
    }
    if min.x > max.x {
        return Rect::ZERO;
    }
    Rect::new(min.x, min.y, max.x, max.y)
}

/// Apply `f` to every `(x, y)` pair in a flat point list.
pub(crate) fn map_points(points: &mut [f64], mut f: impl FnMut(Point) -> Point) {
    for pair in points.chunks_exact_mut(2) {
        let p = f(Point::new(pair[0], pair[1]));
        pair[0] = p.x;
        pair[1] = p.y;
    }
}

pub(crate) fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}
