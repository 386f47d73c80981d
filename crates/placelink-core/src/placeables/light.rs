//! Ambient light placeable.

use super::{
    Elevation, MirrorAxes, PlaceableTrait, ScaleOptions, all_finite, mirror_point,
    normalize_degrees, rotate_point,
};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Emission radii of a light.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub dim: f64,
    pub bright: f64,
}

/// A radius based light source. Rotation 0 points south.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientLight {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default)]
    pub config: LightConfig,
}

impl AmbientLight {
    pub fn new(position: Point, dim: f64, bright: f64) -> Self {
        Self {
            x: position.x,
            y: position.y,
            rotation: 0.0,
            elevation: 0.0,
            config: LightConfig { dim, bright },
        }
    }
}

impl PlaceableTrait for AmbientLight {
    fn bounds(&self) -> Rect {
        Rect::from_points(Point::new(self.x, self.y), Point::new(self.x, self.y))
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
        if !options.grid_relative {
            self.config.dim *= factor;
            self.config.bright *= factor;
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
        let p = rotate_point(Point::new(self.x, self.y), origin, degrees);
        self.x = p.x;
        self.y = p.y;
        self.rotation = normalize_degrees(self.rotation + degrees);
    }

    fn mirror(&mut self, origin: Point, axes: MirrorAxes) {
        let p = mirror_point(Point::new(self.x, self.y), origin, axes);
        self.x = p.x;
        self.y = p.y;
        if axes.x {
            self.rotation = normalize_degrees(-self.rotation);
        }
        if axes.y {
            self.rotation = normalize_degrees(180.0 - self.rotation);
        }
    }

    fn is_finite(&self) -> bool {
        all_finite(&[
            self.x,
            self.y,
            self.rotation,
            self.elevation,
            self.config.dim,
            self.config.bright,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_scales_only_in_3d() {
        let mut light = AmbientLight::new(Point::new(10.0, 10.0), 30.0, 15.0);
        light.elevation = 10.0;
        light.scale(2.0, ScaleOptions::default());
        assert!((light.elevation - 10.0).abs() < f64::EPSILON);
        assert!((light.config.dim - 60.0).abs() < f64::EPSILON);

        light.scale(
            2.0,
            ScaleOptions {
                grid_relative: false,
                three_d_active: true,
            },
        );
        assert!((light.elevation - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_vertical_mirror_turns_south_to_north() {
        let mut light = AmbientLight::new(Point::new(0.0, 10.0), 1.0, 1.0);
        light.mirror(Point::ZERO, MirrorAxes { x: false, y: true });
        assert!((light.y + 10.0).abs() < f64::EPSILON);
        assert!((light.rotation - 180.0).abs() < f64::EPSILON);
    }
}
