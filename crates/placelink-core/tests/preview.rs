mod common;

use common::Scene;
use kurbo::{Point, Vec2};
use placelink_core::placeables::{Token, Wall};
use placelink_core::preview::{
    KeyEvent, Modifiers, MouseButton, PointerEvent, PreviewOptions, PreviewStyle,
};
use placelink_core::{
    Kind, LinkType, Placeable, PlaceableData, PreviewController, PreviewHandle, PreviewInput,
    PreviewOutcome, PreviewState, PreviewSurface, Transformer, add_link,
};
use std::sync::{Arc, Mutex};

/// Records every sync a preview visual receives.
#[derive(Default)]
struct RecordingSurface {
    live: usize,
    synced: Arc<Mutex<Vec<PlaceableData>>>,
}

struct RecordingHandle {
    synced: Arc<Mutex<Vec<PlaceableData>>>,
}

impl PreviewHandle for RecordingHandle {
    fn sync(&mut self, data: &PlaceableData) {
        self.synced.lock().unwrap().push(data.clone());
    }
}

impl PreviewSurface for RecordingSurface {
    type Handle = RecordingHandle;

    fn create(&mut self, _original: &Placeable, style: &PreviewStyle) -> RecordingHandle {
        assert!(style.alpha < 1.0);
        self.live += 1;
        RecordingHandle {
            synced: Arc::clone(&self.synced),
        }
    }

    fn destroy(&mut self, _handle: RecordingHandle) {
        self.live -= 1;
    }
}

fn controller() -> PreviewController<RecordingSurface> {
    PreviewController::new(
        RecordingSurface::default(),
        PreviewStyle::default(),
        Transformer::default(),
    )
}

fn token(id: &str, x: f64, y: f64) -> Placeable {
    Placeable::with_id(
        id,
        PlaceableData::Token(Token::new(Point::new(x, y), 100.0, 100.0)),
    )
}

fn token_position(data: &PlaceableData) -> Point {
    match data {
        PlaceableData::Token(token) => token.position(),
        other => panic!("not a token: {other:?}"),
    }
}

fn move_to(x: f64, y: f64) -> PreviewInput {
    PreviewInput::pointer(PointerEvent::Move {
        position: Point::new(x, y),
    })
}

#[test]
fn test_pointer_moves_cluster_pivot() {
    let mut controller = controller();
    controller.begin_preview(
        vec![token("a", 0.0, 0.0), token("b", 100.0, 0.0)],
        PreviewOptions::default(),
    );

    // Cluster center is (100, 50).
    controller.handle(&move_to(300.0, 250.0));

    let previews = controller.previews();
    assert_eq!(token_position(previews[0]), Point::new(200.0, 200.0));
    assert_eq!(token_position(previews[1]), Point::new(300.0, 200.0));
    assert!(!controller.surface().synced.lock().unwrap().is_empty());
}

#[test]
fn test_nudge_uses_grid_distance() {
    let mut controller = controller();
    controller.begin_preview(vec![token("a", 0.0, 0.0)], PreviewOptions::default());

    controller.handle(&PreviewInput::key("ArrowRight"));
    controller.handle(&PreviewInput::key("ArrowDown"));
    controller.handle(&PreviewInput::Key {
        event: KeyEvent::Released("ArrowDown".into()),
        modifiers: Modifiers::default(),
    });

    assert_eq!(
        controller.accumulator().unwrap().nudge,
        Vec2::new(100.0, 100.0)
    );
    assert_eq!(token_position(controller.previews()[0]), Point::new(100.0, 100.0));
}

#[test]
fn test_wheel_rotation_steps() {
    let mut controller = controller();
    controller.begin_preview(vec![token("a", 0.0, 0.0)], PreviewOptions::default());
    let scroll = |shift| PreviewInput::Pointer {
        event: PointerEvent::Scroll {
            position: Point::ZERO,
            delta: Vec2::new(0.0, 1.0),
        },
        modifiers: Modifiers {
            shift,
            ..Modifiers::default()
        },
    };

    controller.handle(&scroll(false));
    controller.handle(&scroll(true));

    assert_eq!(controller.accumulator().unwrap().rotation, 16.0);
}

#[test]
fn test_cancel_destroys_previews() {
    let mut controller = controller();
    controller.begin_preview(
        vec![token("a", 0.0, 0.0), token("b", 100.0, 0.0)],
        PreviewOptions::default(),
    );
    controller.handle(&move_to(500.0, 500.0));

    let outcome = controller.handle(&PreviewInput::pointer(PointerEvent::Down {
        position: Point::new(500.0, 500.0),
        button: MouseButton::Right,
    }));

    assert_eq!(outcome, Some(PreviewOutcome::Cancelled));
    assert_eq!(controller.state(), PreviewState::Cancelled);
    assert_eq!(controller.surface().live, 0);
    assert!(controller.previews().is_empty());
    assert_eq!(controller.handle(&move_to(0.0, 0.0)), None);
}

#[test]
fn test_confirm_without_change_has_no_updates() {
    let mut controller = controller();
    controller.begin_preview(vec![token("a", 0.0, 0.0)], PreviewOptions::default());

    let outcome = controller.handle(&PreviewInput::key("Enter"));

    assert_eq!(outcome, Some(PreviewOutcome::Committed(Vec::new())));
    assert_eq!(controller.surface().live, 0);
}

#[tokio::test]
async fn test_confirmed_preview_commits_and_cascades() {
    let mut moved = token("a", 0.0, 0.0);
    add_link(&mut moved, "L1", LinkType::TwoWay, None);
    let mut door = Placeable::with_id(
        "door",
        PlaceableData::Wall(Wall::new([0.0, 200.0, 100.0, 200.0])),
    );
    add_link(&mut door, "L1", LinkType::TwoWay, None);
    let scene = Scene::new(vec![moved.clone(), door]);

    let mut controller = controller();
    controller.begin_preview(vec![moved], PreviewOptions::default());
    controller.handle(&move_to(150.0, 50.0));
    let outcome = controller.handle(&PreviewInput::pointer(PointerEvent::Up {
        position: Point::new(150.0, 50.0),
        button: MouseButton::Left,
    }));

    let updates = match outcome {
        Some(PreviewOutcome::Committed(updates)) => updates,
        other => panic!("preview not committed: {other:?}"),
    };
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, Kind::Token);

    scene.coordinator.commit_primary(updates);
    scene.coordinator.flush().await;

    assert_eq!(
        token_position(&scene.get(Kind::Token, "a").data),
        Point::new(100.0, 0.0)
    );
    let PlaceableData::Wall(wall) = scene.get(Kind::Wall, "door").data else {
        unreachable!()
    };
    assert_eq!(wall.c, [100.0, 200.0, 200.0, 200.0]);
}

#[tokio::test]
async fn test_cancelled_preview_writes_nothing() {
    let original = token("a", 0.0, 0.0);
    let scene = Scene::new(vec![original.clone()]);

    let mut controller = controller();
    controller.begin_preview(vec![original.clone()], PreviewOptions::default());
    controller.handle(&move_to(900.0, 900.0));
    assert_eq!(
        controller.handle(&PreviewInput::key("Escape")),
        Some(PreviewOutcome::Cancelled)
    );
    scene.coordinator.flush().await;

    assert_eq!(scene.get(Kind::Token, "a"), original);
    assert_eq!(scene.coordinator.queue().pending(), 0);
}
