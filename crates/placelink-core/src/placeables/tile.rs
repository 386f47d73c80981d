//! Tile placeable.

use super::{
    Elevation, MirrorAxes, PlaceableTrait, ScaleOptions, TextureScale, all_finite, mirror_point,
    mirror_rotation, normalize_degrees, rotate_point, top_left_for_center,
};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// An image tile. Rotates around its own center, so a cluster rotation
/// moves the center and keeps the size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default)]
    pub texture: TextureScale,
}

impl Tile {
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

    fn set_center(&mut self, center: Point) {
        let p = top_left_for_center(center, self.width, self.height);
        self.x = p.x;
        self.y = p.y;
    }
}

impl PlaceableTrait for Tile {
    fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
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
        let center = rotate_point(self.bounds().center(), origin, degrees);
        self.set_center(center);
        self.rotation = normalize_degrees(self.rotation + degrees);
    }

    fn mirror(&mut self, origin: Point, axes: MirrorAxes) {
        let center = mirror_point(self.bounds().center(), origin, axes);
        self.set_center(center);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_moves_center() {
        let mut tile = Tile::new(Point::new(0.0, 0.0), 100.0, 50.0);
        tile.rotate(Point::new(0.0, 0.0), 180.0);
        let center = tile.bounds().center();
        assert!((center.x + 50.0).abs() < 1e-9);
        assert!((center.y + 25.0).abs() < 1e-9);
        assert!((tile.width - 100.0).abs() < f64::EPSILON);
        assert!((tile.rotation - 180.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scale_includes_elevation() {
        let mut tile = Tile::new(Point::new(10.0, 10.0), 10.0, 10.0);
        tile.elevation = 4.0;
        tile.scale(2.0, ScaleOptions::default());
        assert!((tile.elevation - 8.0).abs() < f64::EPSILON);
        assert!((tile.width - 20.0).abs() < f64::EPSILON);
    }
}
