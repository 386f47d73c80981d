//! Token placeable.

use super::{
    Elevation, MirrorAxes, PlaceableTrait, ScaleOptions, all_finite, mirror_point,
    mirror_rotation, normalize_degrees, rotate_point, top_left_for_center,
};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Signed texture scale. A negative factor encodes a mirrored texture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureScale {
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for TextureScale {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

impl TextureScale {
    pub(crate) fn flip(&mut self, axes: MirrorAxes) {
        if axes.x {
            self.scale_x = -self.scale_x;
        }
        if axes.y {
            self.scale_y = -self.scale_y;
        }
    }
}

/// A token: a sized actor marker anchored at its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Height above the scene floor, in scene distance units.
    #[serde(default)]
    pub elevation: f64,
    #[serde(default)]
    pub texture: TextureScale,
}

impl Token {
    pub fn new(position: Point, width: f64, height: f64) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width,
            height,
            rotation: 0.0,
            elevation: 0.0,
            texture: TextureScale::default(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl PlaceableTrait for Token {
    fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    fn anchor(&self) -> Option<Point> {
        Some(self.position())
    }

    fn orientation(&self) -> Option<f64> {
        Some(self.rotation)
    }

    fn elevation(&self) -> Option<Elevation> {
        Some(Elevation::Scalar(self.elevation))
    }

    // Token elevation is a game value, not scene geometry, so it never scales.
    fn scale(&mut self, factor: f64, options: ScaleOptions) {
        self.x *= factor;
        self.y *= factor;
        if !options.grid_relative {
            self.width *= factor;
            self.height *= factor;
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
        let p = rotate_point(self.position(), origin, degrees);
        self.x = p.x;
        self.y = p.y;
        self.rotation = normalize_degrees(self.rotation + degrees);
    }

    fn mirror(&mut self, origin: Point, axes: MirrorAxes) {
        let center = mirror_point(self.bounds().center(), origin, axes);
        let p = top_left_for_center(center, self.width, self.height);
        self.x = p.x;
        self.y = p.y;
        self.texture.flip(axes);
        self.rotation = mirror_rotation(self.rotation, axes);
    }

    fn is_finite(&self) -> bool {
        all_finite(&[
            self.x,
            self.y,
            self.width,
            self.height,
            self.rotation,
            self.elevation,
            self.texture.scale_x,
            self.texture.scale_y,
        ])
    }
}
