//! Preview/interaction controller.
//!
//! `Idle -> Previewing -> Committed | Cancelled`. While previewing, input
//! events update an [`Accumulator`] and every preview is re-rendered from
//! its original snapshot, so repeated input never drifts. Nothing is
//! written until the preview resolves; a confirmed preview hands its diffs
//! back to the caller for [`Coordinator::commit_primary`].
//!
//! [`Coordinator::commit_primary`]: crate::propagation::Coordinator::commit_primary

mod input;

pub use input::{KeyEvent, Modifiers, MouseButton, PointerEvent, PreviewCommand, PreviewInput};

use crate::config::EngineConfig;
use crate::geometry::{PreviewHandle, TransformDelta, Transformer};
use crate::placeables::{Kind, MirrorAxes, Placeable, PlaceableData, normalize_degrees};
use crate::spawn::{Pivot, cluster_bounds};
use crate::store::ObjectUpdate;
use kurbo::{Point, Vec2};
use peniko::Color;
use uuid::Uuid;

/// How preview clones are drawn.
#[derive(Debug, Clone, Copy)]
pub struct PreviewStyle {
    pub tint: Color,
    pub alpha: f32,
}

impl PreviewStyle {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            tint: config.preview_tint.to_color(),
            alpha: config.preview_alpha,
        }
    }

    /// Tint with the preview opacity applied.
    pub fn color(&self) -> Color {
        self.tint.with_alpha(self.alpha)
    }
}

impl Default for PreviewStyle {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Rendering surface that owns ephemeral preview visuals.
pub trait PreviewSurface {
    type Handle: PreviewHandle;

    /// Create a preview visual for `original`.
    fn create(&mut self, original: &Placeable, style: &PreviewStyle) -> Self::Handle;

    /// Remove a preview visual.
    fn destroy(&mut self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    Previewing,
    Committed,
    Cancelled,
}

/// Step sizes used to interpret input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewOptions {
    pub pivot: Pivot,
    pub rotation_step: f64,
    pub fine_rotation_step: f64,
    pub scale_step: f64,
    pub nudge_distance: f64,
    pub grid_relative_scale: bool,
}

impl PreviewOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            pivot: Pivot::Center,
            rotation_step: config.rotation_step_degrees,
            fine_rotation_step: config.fine_rotation_step_degrees,
            scale_step: config.scale_step,
            nudge_distance: config.nudge_distance(),
            grid_relative_scale: false,
        }
    }
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Pending, uncommitted transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulator {
    pub rotation: f64,
    pub scale: f64,
    pub pointer: Option<Point>,
    pub nudge: Vec2,
    pub mirror: MirrorAxes,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            rotation: 0.0,
            scale: 1.0,
            pointer: None,
            nudge: Vec2::ZERO,
            mirror: MirrorAxes::default(),
        }
    }
}

impl Accumulator {
    /// Where the pivot should land.
    pub fn target(&self, pivot: Point) -> Point {
        self.pointer.unwrap_or(pivot) + self.nudge
    }

    /// Full delta from the original snapshot, and its origin.
    ///
    /// Scaling multiplies coordinates, so the translation is computed
    /// against the scaled pivot to land it on the target.
    pub fn delta(&self, pivot: Point, grid_relative_scale: bool) -> (TransformDelta, Point) {
        let target = self.target(pivot);
        let scaled_pivot = Point::new(pivot.x * self.scale, pivot.y * self.scale);
        let offset = target - scaled_pivot;
        let delta = TransformDelta {
            dx: offset.x,
            dy: offset.y,
            dz: None,
            rotation: (self.rotation != 0.0).then_some(self.rotation),
            scale: (self.scale != 1.0).then_some(self.scale),
            mirror_x: self.mirror.x,
            mirror_y: self.mirror.y,
            grid_relative_scale,
        };
        (delta, target)
    }
}

/// Resolution of a preview.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewOutcome {
    /// Diffs of every changed object against its original.
    Committed(Vec<(Kind, ObjectUpdate)>),
    Cancelled,
}

struct PreviewEntry<H> {
    original: Placeable,
    current: PlaceableData,
    handle: H,
}

struct Session<H> {
    id: String,
    entries: Vec<PreviewEntry<H>>,
    pivot: Point,
    options: PreviewOptions,
    accumulator: Accumulator,
}

/// Drives one preview session at a time on a [`PreviewSurface`].
pub struct PreviewController<S: PreviewSurface> {
    surface: S,
    style: PreviewStyle,
    transformer: Transformer,
    state: PreviewState,
    session: Option<Session<S::Handle>>,
}

impl<S: PreviewSurface> PreviewController<S> {
    pub fn new(surface: S, style: PreviewStyle, transformer: Transformer) -> Self {
        Self {
            surface,
            style,
            transformer,
            state: PreviewState::Idle,
            session: None,
        }
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    pub fn accumulator(&self) -> Option<&Accumulator> {
        self.session.as_ref().map(|s| &s.accumulator)
    }

    /// Current preview data, in the order the objects were given.
    pub fn previews(&self) -> Vec<&PlaceableData> {
        self.session
            .iter()
            .flat_map(|s| s.entries.iter().map(|e| &e.current))
            .collect()
    }

    /// Start previewing `objects`. An active session is disposed first.
    /// Returns the new session id.
    pub fn begin_preview(&mut self, objects: Vec<Placeable>, options: PreviewOptions) -> String {
        self.dispose();

        let pivot = cluster_bounds(objects.iter().map(|o| &o.data))
            .map(|bounds| options.pivot.resolve(bounds))
            .unwrap_or(Point::ZERO);
        let entries = objects
            .into_iter()
            .map(|original| {
                let handle = self.surface.create(&original, &self.style);
                PreviewEntry {
                    current: original.data.clone(),
                    original,
                    handle,
                }
            })
            .collect();

        let id = Uuid::new_v4().to_string();
        log::debug!("Preview {} started", id);
        self.session = Some(Session {
            id: id.clone(),
            entries,
            pivot,
            options,
            accumulator: Accumulator::default(),
        });
        self.state = PreviewState::Previewing;
        self.render();
        id
    }

    /// Feed one input event. Returns the outcome if the input resolved the
    /// preview.
    pub fn handle(&mut self, input: &PreviewInput) -> Option<PreviewOutcome> {
        if self.state != PreviewState::Previewing {
            return None;
        }
        let command = input.command()?;
        let session = self.session.as_mut()?;
        let options = session.options;
        let acc = &mut session.accumulator;
        match command {
            PreviewCommand::MoveTo(point) => acc.pointer = Some(point),
            PreviewCommand::Rotate { ticks, fine } => {
                let step = if fine {
                    options.fine_rotation_step
                } else {
                    options.rotation_step
                };
                acc.rotation = normalize_degrees(acc.rotation + ticks * step);
            }
            PreviewCommand::Scale { ticks } => acc.scale *= options.scale_step.powf(ticks),
            PreviewCommand::Nudge(steps) => acc.nudge += steps * options.nudge_distance,
            PreviewCommand::ToggleMirrorX => acc.mirror.x = !acc.mirror.x,
            PreviewCommand::ToggleMirrorY => acc.mirror.y = !acc.mirror.y,
            PreviewCommand::Confirm => return self.resolve_preview(true),
            PreviewCommand::Cancel => return self.resolve_preview(false),
        }
        self.render();
        None
    }

    /// Resolve the active preview. Every preview visual is destroyed either
    /// way; only a confirmed preview produces updates.
    pub fn resolve_preview(&mut self, confirm: bool) -> Option<PreviewOutcome> {
        let session = self.session.take()?;
        let mut updates = Vec::new();
        for entry in session.entries {
            if confirm {
                let after = Placeable {
                    data: entry.current,
                    ..entry.original.clone()
                };
                match ObjectUpdate::diff(&entry.original, &after) {
                    Ok(Some(update)) => updates.push((entry.original.kind(), update)),
                    Ok(None) => {}
                    Err(e) => log::warn!("Cannot diff preview of {}: {}", entry.original.key(), e),
                }
            }
            self.surface.destroy(entry.handle);
        }

        if confirm {
            log::debug!("Preview {} committed {} updates", session.id, updates.len());
            self.state = PreviewState::Committed;
            Some(PreviewOutcome::Committed(updates))
        } else {
            log::debug!("Preview {} cancelled", session.id);
            self.state = PreviewState::Cancelled;
            Some(PreviewOutcome::Cancelled)
        }
    }

    /// Tear down the active session without an outcome.
    pub fn dispose(&mut self) {
        if self.session.is_some() {
            self.resolve_preview(false);
        }
    }

    fn render(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let (delta, origin) = session
            .accumulator
            .delta(session.pivot, session.options.grid_relative_scale);
        for entry in &mut session.entries {
            let mut data = entry.original.data.clone();
            match self
                .transformer
                .apply(&mut data, origin, &delta, Some(&mut entry.handle))
            {
                Ok(()) => entry.current = data,
                Err(e) => log::warn!("Preview of {} not updated: {}", entry.original.key(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeables::Token;

    #[derive(Default)]
    struct CountingSurface {
        live: usize,
        created: usize,
    }

    struct Handle;

    impl PreviewHandle for Handle {
        fn sync(&mut self, _data: &PlaceableData) {}
    }

    impl PreviewSurface for CountingSurface {
        type Handle = Handle;

        fn create(&mut self, _original: &Placeable, _style: &PreviewStyle) -> Handle {
            self.live += 1;
            self.created += 1;
            Handle
        }

        fn destroy(&mut self, _handle: Handle) {
            self.live -= 1;
        }
    }

    fn controller() -> PreviewController<CountingSurface> {
        PreviewController::new(
            CountingSurface::default(),
            PreviewStyle::default(),
            Transformer::default(),
        )
    }

    fn token() -> Placeable {
        Placeable::with_id("t", PlaceableData::Token(Token::new(Point::ZERO, 100.0, 100.0)))
    }

    #[test]
    fn test_accumulator_lands_pivot_on_target() {
        let acc = Accumulator {
            scale: 2.0,
            pointer: Some(Point::new(500.0, 500.0)),
            ..Accumulator::default()
        };
        let (delta, origin) = acc.delta(Point::new(50.0, 50.0), false);
        assert_eq!(origin, Point::new(500.0, 500.0));
        assert!((delta.dx - 400.0).abs() < f64::EPSILON);
        assert!((delta.dy - 400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_begin_twice_disposes_previous() {
        let mut controller = controller();
        controller.begin_preview(vec![token()], PreviewOptions::default());
        controller.begin_preview(vec![token()], PreviewOptions::default());
        assert_eq!(controller.surface().created, 2);
        assert_eq!(controller.surface().live, 1);
        assert_eq!(controller.state(), PreviewState::Previewing);
    }

    #[test]
    fn test_input_ignored_when_idle() {
        let mut controller = controller();
        assert_eq!(controller.handle(&PreviewInput::key("Enter")), None);
        assert_eq!(controller.state(), PreviewState::Idle);
    }
}
