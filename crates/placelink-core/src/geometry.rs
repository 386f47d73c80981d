//! Geometry transform library.
//!
//! One entry point rewrites the positional and shape fields of any
//! placeable for a [`TransformDelta`]. Steps always run in the same order:
//! scale, translate, rotate, mirror. Later steps read the output of earlier
//! ones, so the order is part of the contract.

use crate::placeables::{Kind, MirrorAxes, PlaceableData, ScaleOptions, normalize_degrees};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A transform to apply to a placeable around some origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformDelta {
    pub dx: f64,
    pub dy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dz: Option<f64>,
    /// Rotation in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default)]
    pub mirror_x: bool,
    #[serde(default)]
    pub mirror_y: bool,
    /// Scale positions only, leaving extents untouched.
    #[serde(default)]
    pub grid_relative_scale: bool,
}

impl TransformDelta {
    /// Pure translation.
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            dx,
            dy,
            ..Self::default()
        }
    }

    /// Pure rotation.
    pub fn rotation(degrees: f64) -> Self {
        Self {
            rotation: Some(degrees),
            ..Self::default()
        }
    }

    /// Pure scale.
    pub fn scaling(factor: f64) -> Self {
        Self {
            scale: Some(factor),
            ..Self::default()
        }
    }

    pub fn with_dz(mut self, dz: f64) -> Self {
        self.dz = Some(dz);
        self
    }

    pub fn with_mirror(mut self, axes: MirrorAxes) -> Self {
        self.mirror_x = axes.x;
        self.mirror_y = axes.y;
        self
    }

    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.dx, self.dy)
    }

    pub fn mirror_axes(&self) -> MirrorAxes {
        MirrorAxes {
            x: self.mirror_x,
            y: self.mirror_y,
        }
    }

    /// Whether applying this delta would leave every object unchanged.
    pub fn is_identity(&self) -> bool {
        self.dx == 0.0
            && self.dy == 0.0
            && self.dz.is_none_or(|dz| dz == 0.0)
            && self.rotation.is_none_or(|r| normalize_degrees(r) == 0.0)
            && self.scale.is_none_or(|s| s == 1.0)
            && !self.mirror_x
            && !self.mirror_y
    }
}

/// Transform errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("Transform produced non-finite values for {0}")]
    NonFinite(Kind),
    #[error("Invalid scale factor: {0}")]
    InvalidScale(f64),
}

/// A live preview object that mirrors the fields of the data it tracks.
pub trait PreviewHandle {
    fn sync(&mut self, data: &PlaceableData);
}

/// Applies transform deltas to placeable data.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transformer {
    /// Whether the scene renders in 3-D.
    pub three_d_active: bool,
}

impl Transformer {
    pub fn new(three_d_active: bool) -> Self {
        Self { three_d_active }
    }

    /// Rewrite `data` in place.
    ///
    /// On error the data may be partially rewritten; callers that need the
    /// original should transform a clone.
    pub fn apply(
        &self,
        data: &mut PlaceableData,
        origin: Point,
        delta: &TransformDelta,
        preview: Option<&mut dyn PreviewHandle>,
    ) -> Result<(), TransformError> {
        if let Some(factor) = delta.scale {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(TransformError::InvalidScale(factor));
            }
            if factor != 1.0 {
                data.scale(
                    factor,
                    ScaleOptions {
                        grid_relative: delta.grid_relative_scale,
                        three_d_active: self.three_d_active,
                    },
                );
            }
        }

        let offset = delta.offset();
        if offset != Vec2::ZERO || delta.dz.is_some() {
            data.translate(offset, delta.dz);
        }

        if let Some(degrees) = delta.rotation.filter(|r| normalize_degrees(*r) != 0.0) {
            data.rotate(origin, degrees);
        }

        let axes = delta.mirror_axes();
        if axes.any() {
            data.mirror(origin, axes);
        }

        if !data.is_finite() {
            return Err(TransformError::NonFinite(data.kind()));
        }

        if let Some(preview) = preview {
            preview.sync(data);
        }
        Ok(())
    }
}

/// Apply `delta` around `origin` with a default (2-D) transformer.
pub fn transform(
    data: &mut PlaceableData,
    origin: Point,
    delta: &TransformDelta,
    preview: Option<&mut dyn PreviewHandle>,
) -> Result<(), TransformError> {
    Transformer::default().apply(data, origin, delta, preview)
}
