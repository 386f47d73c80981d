//! Region placeable.

use super::{
    Elevation, MirrorAxes, PlaceableTrait, ScaleOptions, all_finite, is_polygon, map_points,
    mirror_point, mirror_rotation, normalize_degrees, points_bounds, rotate_point,
};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// One shape of a region, in absolute scene coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegionShape {
    /// Axis aligned rectangle. Has no rotation of its own.
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// Ellipse centered on `x, y`.
    Ellipse {
        x: f64,
        y: f64,
        radius_x: f64,
        radius_y: f64,
        #[serde(default)]
        rotation: f64,
    },
    Circle {
        x: f64,
        y: f64,
        radius: f64,
    },
    Polygon {
        #[serde(default)]
        points: Vec<f64>,
    },
}

impl RegionShape {
    /// Bounding box, or `None` for a malformed polygon.
    pub fn bounds(&self) -> Option<Rect> {
        match self {
            RegionShape::Rectangle {
                x,
                y,
                width,
                height,
            } => Some(Rect::new(*x, *y, x + width, y + height)),
            RegionShape::Ellipse {
                x,
                y,
                radius_x,
                radius_y,
                ..
            } => Some(Rect::new(x - radius_x, y - radius_y, x + radius_x, y + radius_y)),
            RegionShape::Circle { x, y, radius } => {
                Some(Rect::new(x - radius, y - radius, x + radius, y + radius))
            }
            RegionShape::Polygon { points } => is_polygon(points).then(|| points_bounds(points)),
        }
    }

    /// The four corners of a rectangle as a polygon, clockwise from top-left.
    fn rectangle_to_polygon(x: f64, y: f64, width: f64, height: f64) -> RegionShape {
        RegionShape::Polygon {
            points: vec![
                x,
                y,
                x + width,
                y,
                x + width,
                y + height,
                x,
                y + height,
            ],
        }
    }

    fn scale(&mut self, factor: f64, grid_relative: bool) {
        match self {
            RegionShape::Rectangle {
                x,
                y,
                width,
                height,
            } => {
                *x *= factor;
                *y *= factor;
                if !grid_relative {
                    *width *= factor;
                    *height *= factor;
                }
            }
            RegionShape::Ellipse {
                x,
                y,
                radius_x,
                radius_y,
                ..
            } => {
                *x *= factor;
                *y *= factor;
                if !grid_relative {
                    *radius_x *= factor;
                    *radius_y *= factor;
                }
            }
            RegionShape::Circle { x, y, radius } => {
                *x *= factor;
                *y *= factor;
                if !grid_relative {
                    *radius *= factor;
                }
            }
            RegionShape::Polygon { points } => {
                if is_polygon(points) {
                    map_points(points, |p| Point::new(p.x * factor, p.y * factor));
                } else {
                    log::debug!("Skipping malformed region polygon during scale");
                }
            }
        }
    }

    fn translate(&mut self, offset: Vec2) {
        match self {
            RegionShape::Rectangle { x, y, .. }
            | RegionShape::Ellipse { x, y, .. }
            | RegionShape::Circle { x, y, .. } => {
                *x += offset.x;
                *y += offset.y;
            }
            RegionShape::Polygon { points } => {
                if is_polygon(points) {
                    map_points(points, |p| p + offset);
                } else {
                    log::debug!("Skipping malformed region polygon during translate");
                }
            }
        }
    }

    fn rotate(&mut self, origin: Point, degrees: f64) {
        // Rectangles cannot carry a rotation, so they become polygons first.
        if let RegionShape::Rectangle {
            x,
            y,
            width,
            height,
        } = *self
        {
            *self = Self::rectangle_to_polygon(x, y, width, height);
        }
        match self {
            RegionShape::Rectangle { .. } => {}
            RegionShape::Ellipse { x, y, rotation, .. } => {
                let p = rotate_point(Point::new(*x, *y), origin, degrees);
                *x = p.x;
                *y = p.y;
                *rotation = normalize_degrees(*rotation + degrees);
            }
            RegionShape::Circle { x, y, .. } => {
                let p = rotate_point(Point::new(*x, *y), origin, degrees);
                *x = p.x;
                *y = p.y;
            }
            RegionShape::Polygon { points } => {
                if is_polygon(points) {
                    map_points(points, |p| rotate_point(p, origin, degrees));
                } else {
                    log::debug!("Skipping malformed region polygon during rotate");
                }
            }
        }
    }

    fn mirror(&mut self, origin: Point, axes: MirrorAxes) {
        match self {
            RegionShape::Rectangle {
                x,
                y,
                width,
                height,
            } => {
                let center = Point::new(*x + *width / 2.0, *y + *height / 2.0);
                let c = mirror_point(center, origin, axes);
                *x = c.x - *width / 2.0;
                *y = c.y - *height / 2.0;
            }
            RegionShape::Ellipse { x, y, rotation, .. } => {
                let p = mirror_point(Point::new(*x, *y), origin, axes);
                *x = p.x;
                *y = p.y;
                *rotation = mirror_rotation(*rotation, axes);
            }
            RegionShape::Circle { x, y, .. } => {
                let p = mirror_point(Point::new(*x, *y), origin, axes);
                *x = p.x;
                *y = p.y;
            }
            RegionShape::Polygon { points } => {
                if is_polygon(points) {
                    map_points(points, |p| mirror_point(p, origin, axes));
                } else {
                    log::debug!("Skipping malformed region polygon during mirror");
                }
            }
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            RegionShape::Rectangle {
                x,
                y,
                width,
                height,
            } => all_finite(&[*x, *y, *width, *height]),
            RegionShape::Ellipse {
                x,
                y,
                radius_x,
                radius_y,
                rotation,
            } => all_finite(&[*x, *y, *radius_x, *radius_y, *rotation]),
            RegionShape::Circle { x, y, radius } => all_finite(&[*x, *y, *radius]),
            RegionShape::Polygon { points } => all_finite(points),
        }
    }
}

/// A scene region: a union of shapes spanning an elevation range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default = "unbounded_range")]
    pub elevation: Elevation,
    #[serde(default)]
    pub shapes: Vec<RegionShape>,
}

fn unbounded_range() -> Elevation {
    Elevation::Range {
        bottom: None,
        top: None,
    }
}

impl Region {
    pub fn new(shapes: Vec<RegionShape>) -> Self {
        Self {
            elevation: unbounded_range(),
            shapes,
        }
    }
}

impl PlaceableTrait for Region {
    fn bounds(&self) -> Rect {
        self.shapes
            .iter()
            .filter_map(RegionShape::bounds)
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO)
    }

    fn elevation(&self) -> Option<Elevation> {
        Some(self.elevation)
    }

    fn scale(&mut self, factor: f64, options: ScaleOptions) {
        for shape in &mut self.shapes {
            shape.scale(factor, options.grid_relative);
        }
        self.elevation.scale(factor);
    }

    fn translate(&mut self, offset: Vec2, dz: Option<f64>) {
        for shape in &mut self.shapes {
            shape.translate(offset);
        }
        if let Some(dz) = dz {
            self.elevation.shift(dz);
        }
    }

    fn rotate(&mut self, origin: Point, degrees: f64) {
        for shape in &mut self.shapes {
            shape.rotate(origin, degrees);
        }
    }

    fn mirror(&mut self, origin: Point, axes: MirrorAxes) {
        for shape in &mut self.shapes {
            shape.mirror(origin, axes);
        }
    }

    fn is_finite(&self) -> bool {
        self.elevation.is_finite() && self.shapes.iter().all(RegionShape::is_finite)
    }
}
