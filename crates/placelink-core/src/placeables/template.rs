//! Measured template placeable.

use super::{
    Elevation, MirrorAxes, PlaceableTrait, ScaleOptions, all_finite, mirror_point,
    normalize_degrees, rotate_point,
};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// An area-of-effect template anchored at its origin point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredTemplate {
    pub x: f64,
    pub y: f64,
    /// Direction in degrees.
    #[serde(default)]
    pub direction: f64,
    pub distance: f64,
    #[serde(default)]
    pub elevation: f64,
}

impl MeasuredTemplate {
    pub fn new(position: Point, direction: f64, distance: f64) -> Self {
        Self {
            x: position.x,
            y: position.y,
            direction,
            distance,
            elevation: 0.0,
        }
    }
}

/// Mirror a template direction on the X axis.
pub(crate) fn mirror_direction_x(direction: f64) -> f64 {
    normalize_degrees(180.0 - (direction - 180.0))
}

/// Mirror a template direction on the Y axis.
pub(crate) fn mirror_direction_y(direction: f64) -> f64 {
    if direction > 180.0 {
        normalize_degrees(360.0 - (direction - 180.0))
    } else {
        normalize_degrees(180.0 - direction)
    }
}

impl PlaceableTrait for MeasuredTemplate {
    fn bounds(&self) -> Rect {
        Rect::from_points(Point::new(self.x, self.y), Point::new(self.x, self.y))
    }

    fn anchor(&self) -> Option<Point> {
        Some(Point::new(self.x, self.y))
    }

    fn orientation(&self) -> Option<f64> {
        Some(self.direction)
    }

    fn elevation(&self) -> Option<Elevation> {
        Some(Elevation::Scalar(self.elevation))
    }

    fn scale(&mut self, factor: f64, options: ScaleOptions) {
        self.x *= factor;
        self.y *= factor;
        self.elevation *= factor;
        if !options.grid_relative {
            self.distance *= factor;
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
        let p = rotate_point(Point::new(self.x, self.y), origin, degrees);
        self.x = p.x;
        self.y = p.y;
        self.direction = normalize_degrees(self.direction + degrees);
    }

    fn mirror(&mut self, origin: Point, axes: MirrorAxes) {
        let p = mirror_point(Point::new(self.x, self.y), origin, axes);
        self.x = p.x;
        self.y = p.y;
        if axes.x {
            self.direction = mirror_direction_x(self.direction);
        }
        if axes.y {
            self.direction = mirror_direction_y(self.direction);
        }
    }

    fn is_finite(&self) -> bool {
        all_finite(&[self.x, self.y, self.direction, self.distance, self.elevation])
    }
}
