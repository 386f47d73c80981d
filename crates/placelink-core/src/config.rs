//! Engine configuration.

use crate::store::ActorId;
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// RGBA8 color as stored in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_color(self) -> Color {
        Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

/// Tunables for propagation, preview and delegation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lifetime of an idempotency window entry.
    pub idempotency_window_ms: u64,
    /// How long a delegated write waits for the privileged peer.
    pub delegate_timeout_ms: u64,
    /// Opacity of preview clones.
    pub preview_alpha: f32,
    pub preview_tint: Rgba8,
    pub rotation_step_degrees: f64,
    /// Rotation per wheel tick while shift is held.
    pub fine_rotation_step_degrees: f64,
    /// Scale factor per wheel tick while ctrl is held.
    pub scale_step: f64,
    /// Keyboard nudge distance. Defaults to one grid cell.
    pub nudge_distance: Option<f64>,
    pub grid_size: f64,
    pub three_d_active: bool,
    pub deletion_history_len: usize,
    pub local_actor: ActorId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idempotency_window_ms: 2_000,
            delegate_timeout_ms: 4_000,
            preview_alpha: 0.5,
            preview_tint: Rgba8::new(0x4d, 0x9d, 0xe0, 0xff),
            rotation_step_degrees: 15.0,
            fine_rotation_step_degrees: 1.0,
            scale_step: 1.1,
            nudge_distance: None,
            grid_size: 100.0,
            three_d_active: false,
            deletion_history_len: 10,
            local_actor: "local".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.preview_alpha) {
            return Err(ConfigError::Invalid {
                field: "preview_alpha",
                reason: format!("{} is outside 0..=1", self.preview_alpha),
            });
        }
        if !self.scale_step.is_finite() || self.scale_step <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "scale_step",
                reason: format!("{} must be positive", self.scale_step),
            });
        }
        if !self.grid_size.is_finite() || self.grid_size <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "grid_size",
                reason: format!("{} must be positive", self.grid_size),
            });
        }
        Ok(())
    }

    pub fn idempotency_window(&self) -> Duration {
        Duration::from_millis(self.idempotency_window_ms)
    }

    pub fn delegate_timeout(&self) -> Duration {
        Duration::from_millis(self.delegate_timeout_ms)
    }

    pub fn nudge_distance(&self) -> f64 {
        self.nudge_distance.unwrap_or(self.grid_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = EngineConfig::from_json(r#"{"grid_size": 50, "local_actor": "gm"}"#).unwrap();
        assert_eq!(config.idempotency_window(), Duration::from_secs(2));
        assert_eq!(config.delegate_timeout(), Duration::from_secs(4));
        assert!((config.nudge_distance() - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.local_actor, "gm");
    }

    #[test]
    fn test_invalid_alpha_rejected() {
        let result = EngineConfig::from_json(r#"{"preview_alpha": 2.0}"#);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "preview_alpha",
                ..
            })
        ));
    }
}
