//! Journal note placeable.

use super::{
    Elevation, MirrorAxes, PlaceableTrait, ScaleOptions, all_finite, mirror_point, rotate_point,
};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A map pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default = "default_icon_size")]
    pub icon_size: f64,
}

fn default_icon_size() -> f64 {
    40.0
}

impl Note {
    pub fn new(position: Point) -> Self {
        Self {
            x: position.x,
            y: position.y,
            elevation: 0.0,
            icon_size: default_icon_size(),
        }
    }

    fn set_position(&mut self, p: Point) {
        self.x = p.x;
        self.y = p.y;
    }
}

impl PlaceableTrait for Note {
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
        self.elevation *= factor;
        if !options.grid_relative {
            self.icon_size *= factor;
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
        all_finite(&[self.x, self.y, self.elevation, self.icon_size])
    }
}
