//! Drawing placeable.

use super::{
    Elevation, MirrorAxes, PlaceableTrait, ScaleOptions, all_finite, is_polygon, map_points,
    mirror_point, mirror_rotation, normalize_degrees, rotate_point, top_left_for_center,
};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Shape type tag of a drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawingShapeType {
    #[default]
    Rectangle,
    Ellipse,
    Polygon,
}

/// Shape of a drawing, relative to the drawing's `x, y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingShape {
    #[serde(rename = "type")]
    pub shape_type: DrawingShapeType,
    pub width: f64,
    pub height: f64,
    /// Flat `[x0, y0, x1, y1, ...]` list, only meaningful for polygons.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<f64>,
}

/// A free drawing. Drawings carry a native rotation, so no shape
/// conversion is ever needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub elevation: f64,
    pub shape: DrawingShape,
}

impl Drawing {
    pub fn rectangle(position: Point, width: f64, height: f64) -> Self {
        Self::with_shape(
            position,
            DrawingShape {
                shape_type: DrawingShapeType::Rectangle,
                width,
                height,
                points: Vec::new(),
            },
        )
    }

    /// Polygon from points relative to `position`.
    pub fn polygon(position: Point, points: Vec<f64>) -> Self {
        let bounds = super::points_bounds(&points);
        Self::with_shape(
            position,
            DrawingShape {
                shape_type: DrawingShapeType::Polygon,
                width: bounds.x1.max(0.0),
                height: bounds.y1.max(0.0),
                points,
            },
        )
    }

    pub fn with_shape(position: Point, shape: DrawingShape) -> Self {
        Self {
            x: position.x,
            y: position.y,
            rotation: 0.0,
            elevation: 0.0,
            shape,
        }
    }

    fn is_polygon_shape(&self) -> bool {
        self.shape.shape_type == DrawingShapeType::Polygon
    }
}

impl PlaceableTrait for Drawing {
    fn bounds(&self) -> Rect {
        Rect::new(
            self.x,
            self.y,
            self.x + self.shape.width,
            self.y + self.shape.height,
        )
    }

    fn anchor(&self) -> Option<Point> {
        Some(Point::new(self.x, self.y))
    }

    fn orientation(&self) -> Option<f64> {
        Some(self.rotation)
    }

    fn elevation(&self) -> Option<Elevation> {
        Some(Elevation::Scalar(self.elevation))
    }

    fn scale(&mut self, factor: f64, options: ScaleOptions) {
        self.x *= factor;
        self.y *= factor;
        self.elevation *= factor;
        if options.grid_relative {
            return;
        }
        self.shape.width *= factor;
        self.shape.height *= factor;
        if self.is_polygon_shape() {
            if is_polygon(&self.shape.points) {
                map_points(&mut self.shape.points, |p| Point::new(p.x * factor, p.y * factor));
            } else {
                log::debug!("Skipping malformed drawing polygon during scale");
            }
        }
    }

    fn translate(&mut self, offset: Vec2, dz: Option<f64>) {
        self.x += offset.x;
        self.y += offset.y;
        if let Some(dz) = dz {
            self.elevation += dz;
        }
    }

    fn rotate(&mut self, origin: Point, degrees: f64) {
        let center = rotate_point(self.bounds().center(), origin, degrees);
        let p = top_left_for_center(center, self.shape.width, self.shape.height);
        self.x = p.x;
        self.y = p.y;
        self.rotation = normalize_degrees(self.rotation + degrees);
    }

    fn mirror(&mut self, origin: Point, axes: MirrorAxes) {
        let center = mirror_point(self.bounds().center(), origin, axes);
        let p = top_left_for_center(center, self.shape.width, self.shape.height);
        self.x = p.x;
        self.y = p.y;
        self.rotation = mirror_rotation(self.rotation, axes);
        if self.is_polygon_shape() {
            if is_polygon(&self.shape.points) {
                // Reflect inside the local box so the outline flips in place.
                let local_center = Point::new(self.shape.width / 2.0, self.shape.height / 2.0);
                map_points(&mut self.shape.points, |p| mirror_point(p, local_center, axes));
            } else {
                log::debug!("Skipping malformed drawing polygon during mirror");
            }
        }
    }

    fn is_finite(&self) -> bool {
        all_finite(&[
            self.x,
            self.y,
            self.rotation,
            self.elevation,
            self.shape.width,
            self.shape.height,
        ]) && all_finite(&self.shape.points)
    }
}
