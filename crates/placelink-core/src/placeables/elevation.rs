//! Elevation values (scalar height or a bottom/top range).

use serde::{Deserialize, Serialize};

/// Elevation of a placeable.
///
/// Range bounds are optional; `None` means unbounded in that direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Elevation {
    Scalar(f64),
    Range {
        bottom: Option<f64>,
        top: Option<f64>,
    },
}

impl Default for Elevation {
    fn default() -> Self {
        Elevation::Scalar(0.0)
    }
}

impl Elevation {
    /// Reference height used for diffing: the scalar, or the range bottom.
    pub fn base(&self) -> Option<f64> {
        match self {
            Elevation::Scalar(v) => Some(*v),
            Elevation::Range { bottom, .. } => *bottom,
        }
    }

    /// Add `dz` to the scalar or to both range ends.
    pub fn shift(&mut self, dz: f64) {
        match self {
            Elevation::Scalar(v) => *v += dz,
            Elevation::Range { bottom, top } => {
                if let Some(b) = bottom {
                    *b += dz;
                }
                if let Some(t) = top {
                    *t += dz;
                }
            }
        }
    }

    pub fn scale(&mut self, factor: f64) {
        match self {
            Elevation::Scalar(v) => *v *= factor,
            Elevation::Range { bottom, top } => {
                if let Some(b) = bottom {
                    *b *= factor;
                }
                if let Some(t) = top {
                    *t *= factor;
                }
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            Elevation::Scalar(v) => v.is_finite(),
            Elevation::Range { bottom, top } => {
                bottom.is_none_or(f64::is_finite) && top.is_none_or(f64::is_finite)
            }
        }
    }
}
