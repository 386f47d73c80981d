//! Wall placeable.

use super::{MirrorAxes, PlaceableTrait, ScaleOptions, all_finite, mirror_point, rotate_point};
use kurbo::{Line, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A linear barrier between two endpoints `c = [x1, y1, x2, y2]`.
///
/// Walls have no rotation field of their own: a rotation only ever moves
/// the two endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub c: [f64; 4],
}

impl Wall {
    pub fn new(c: [f64; 4]) -> Self {
        Self { c }
    }

    pub fn from_points(start: Point, end: Point) -> Self {
        Self::new([start.x, start.y, end.x, end.y])
    }

    pub fn start(&self) -> Point {
        Point::new(self.c[0], self.c[1])
    }

    pub fn end(&self) -> Point {
        Point::new(self.c[2], self.c[3])
    }

    pub fn as_kurbo(&self) -> Line {
        Line::new(self.start(), self.end())
    }

    fn map_endpoints(&mut self, mut f: impl FnMut(Point) -> Point) {
        let start = f(self.start());
        let end = f(self.end());
        self.c = [start.x, start.y, end.x, end.y];
    }
}

impl PlaceableTrait for Wall {
    fn bounds(&self) -> Rect {
        Rect::from_points(self.start(), self.end())
    }

    // Endpoints are positions, so grid relative scaling still moves them.
    fn scale(&mut self, factor: f64, _options: ScaleOptions) {
        for v in &mut self.c {
            *v *= factor;
        }
    }

    fn translate(&mut self, offset: Vec2, _dz: Option<f64>) {
        self.map_endpoints(|p| p + offset);
    }

    fn rotate(&mut self, origin: Point, degrees: f64) {
        self.map_endpoints(|p| rotate_point(p, origin, degrees));
    }

    fn mirror(&mut self, origin: Point, axes: MirrorAxes) {
        self.map_endpoints(|p| mirror_point(p, origin, axes));
    }

    fn is_finite(&self) -> bool {
        all_finite(&self.c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_both_endpoints() {
        let mut wall = Wall::new([0.0, 0.0, 10.0, 0.0]);
        wall.rotate(Point::new(0.0, 0.0), 90.0);
        assert!(wall.c[0].abs() < 1e-9 && wall.c[1].abs() < 1e-9);
        assert!(wall.c[2].abs() < 1e-9);
        assert!((wall.c[3] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_normalized() {
        let wall = Wall::new([10.0, 20.0, 0.0, 5.0]);
        assert_eq!(wall.bounds(), Rect::new(0.0, 5.0, 10.0, 20.0));
    }
}
