//! Ambient sound placeable.

use super::{
    Elevation, MirrorAxes, PlaceableTrait, ScaleOptions, all_finite, mirror_point, rotate_point,
};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A positional sound with an audible radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientSound {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    #[serde(default)]
    pub elevation: f64,
}

impl AmbientSound {
    pub fn new(position: Point, radius: f64) -> Self {
        Self {
            x: position.x,
            y: position.y,
            radius,
            elevation: 0.0,
        }
    }

    fn set_position(&mut self, p: Point) {
        self.x = p.x;
        self.y = p.y;
    }
}

impl PlaceableTrait for AmbientSound {
    fn bounds(&self) -> Rect {
        Rect::from_points(Point::new(self.x, self.y), Point::new(self.x, self.y))
    }

    fn anchor(&self) -> Option<Point> {
        Some(Point::new(self.x, self.y))
    }

    fn elevation(&self) -> Option<Elevation> {
        Some(Elevation::Scalar(self.elevation))
    }

    fn scale(&mut self, factor: f64, options: ScaleOptions) {
        self.x *= factor;
        self.y *= factor;
        if !options.grid_relative {
            self.radius *= factor;
        }
        if options.three_d_active {
            self.elevation *= factor;
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
        self.set_position(rotate_point(Point::new(self.x, self.y), origin, degrees));
    }

    fn mirror(&mut self, origin: Point, axes: MirrorAxes) {
        self.set_position(mirror_point(Point::new(self.x, self.y), origin, axes));
    }

    fn is_finite(&self) -> bool {
        all_finite(&[self.x, self.y, self.radius, self.elevation])
    }
}
