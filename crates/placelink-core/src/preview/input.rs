//! Pointer and keyboard input for the preview controller.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Pointer event type for unified mouse/touch handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
    },
    Up {
        position: Point,
        button: MouseButton,
    },
    Move {
        position: Point,
    },
    /// Wheel scroll. Positive `delta.y` scrolls down.
    Scroll {
        position: Point,
        delta: Vec2,
    },
}

/// Keyboard event type. Keys use DOM key names (`"ArrowLeft"`, `"Escape"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyEvent {
    Pressed(String),
    Released(String),
}

/// Input delivered to a preview session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PreviewInput {
    Pointer {
        event: PointerEvent,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Key {
        event: KeyEvent,
        #[serde(default)]
        modifiers: Modifiers,
    },
}

/// What a single input asks the preview to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PreviewCommand {
    /// Follow the pointer.
    MoveTo(Point),
    /// Rotate by wheel ticks, finely when `fine` is set.
    Rotate { ticks: f64, fine: bool },
    /// Scale by wheel ticks.
    Scale { ticks: f64 },
    /// Nudge by whole steps along x and y.
    Nudge(Vec2),
    ToggleMirrorX,
    ToggleMirrorY,
    Confirm,
    Cancel,
}

impl PreviewInput {
    pub fn pointer(event: PointerEvent) -> Self {
        PreviewInput::Pointer {
            event,
            modifiers: Modifiers::default(),
        }
    }

    pub fn key(key: &str) -> Self {
        PreviewInput::Key {
            event: KeyEvent::Pressed(key.to_string()),
            modifiers: Modifiers::default(),
        }
    }

    /// Map the input to a preview command, or `None` if it is ignored.
    pub fn command(&self) -> Option<PreviewCommand> {
        match self {
            PreviewInput::Pointer { event, modifiers } => match event {
                PointerEvent::Move { position } => Some(PreviewCommand::MoveTo(*position)),
                // Primary click confirms on release; secondary cancels on press.
                PointerEvent::Up {
                    button: MouseButton::Left,
                    ..
                } => Some(PreviewCommand::Confirm),
                PointerEvent::Down {
                    button: MouseButton::Right,
                    ..
                } => Some(PreviewCommand::Cancel),
                PointerEvent::Down { .. } | PointerEvent::Up { .. } => None,
                PointerEvent::Scroll { delta, .. } => {
                    if delta.y == 0.0 {
                        return None;
                    }
                    let ticks = delta.y.signum();
                    if modifiers.ctrl {
                        Some(PreviewCommand::Scale { ticks: -ticks })
                    } else {
                        Some(PreviewCommand::Rotate {
                            ticks,
                            fine: modifiers.shift,
                        })
                    }
                }
            },
            PreviewInput::Key { event, .. } => {
                let KeyEvent::Pressed(key) = event else {
                    return None;
                };
                match key.as_str() {
                    "ArrowLeft" => Some(PreviewCommand::Nudge(Vec2::new(-1.0, 0.0))),
                    "ArrowRight" => Some(PreviewCommand::Nudge(Vec2::new(1.0, 0.0))),
                    "ArrowUp" => Some(PreviewCommand::Nudge(Vec2::new(0.0, -1.0))),
                    "ArrowDown" => Some(PreviewCommand::Nudge(Vec2::new(0.0, 1.0))),
                    "h" | "H" => Some(PreviewCommand::ToggleMirrorX),
                    "v" | "V" => Some(PreviewCommand::ToggleMirrorY),
                    "Enter" => Some(PreviewCommand::Confirm),
                    "Escape" => Some(PreviewCommand::Cancel),
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wheel_with_modifiers() {
        let scroll = PointerEvent::Scroll {
            position: Point::ZERO,
            delta: Vec2::new(0.0, 3.0),
        };
        let plain = PreviewInput::pointer(scroll.clone());
        assert_eq!(
            plain.command(),
            Some(PreviewCommand::Rotate {
                ticks: 1.0,
                fine: false
            })
        );

        let scaled = PreviewInput::Pointer {
            event: scroll,
            modifiers: Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
        };
        assert_eq!(scaled.command(), Some(PreviewCommand::Scale { ticks: -1.0 }));
    }

    #[test]
    fn test_buttons() {
        let confirm = PreviewInput::pointer(PointerEvent::Up {
            position: Point::ZERO,
            button: MouseButton::Left,
        });
        assert_eq!(confirm.command(), Some(PreviewCommand::Confirm));
        let cancel = PreviewInput::pointer(PointerEvent::Down {
            position: Point::ZERO,
            button: MouseButton::Right,
        });
        assert_eq!(cancel.command(), Some(PreviewCommand::Cancel));
        assert_eq!(PreviewInput::key("Escape").command(), Some(PreviewCommand::Cancel));
        assert_eq!(PreviewInput::key("q").command(), None);
    }
}
