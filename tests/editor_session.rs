//! End-to-end editing session: bus-driven interaction, transforms and
//! persistence.

use quadwarp::input::{EventBus, Key, KeyEvent, PointerEvent};
use quadwarp::persist::DEFAULT_FILE_NAME;
use quadwarp::session::EditorSession;
use quadwarp::{solve, Corner, Point, Quad, QuadEditor, QuadWarpError, Rect};

fn near(p: Point, x: f64, y: f64) -> bool {
    (p.x - x).abs() < 1e-6 && (p.y - y).abs() < 1e-6
}

#[test]
fn drag_bottom_right_corner() {
    let bus = EventBus::new();
    let mut editor = QuadEditor::new();
    editor.set_source_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
    editor.reset();
    editor.set_anchor_radius(10.0);

    let mut session = EditorSession::new(editor);
    session.setup(&bus);

    bus.dispatch(PointerEvent::Moved(Point::new(98.0, 97.0)));
    assert_eq!(session.editor().highlighted_corner(), Some(Corner::BottomRight));

    bus.dispatch(PointerEvent::Pressed(Point::new(100.0, 100.0)));
    bus.dispatch(PointerEvent::Dragged(Point::new(130.0, 120.0)));
    bus.dispatch(PointerEvent::Released(Point::new(150.0, 150.0)));

    let h = session.editor().transform().unwrap();
    assert!(near(h.apply(Point::new(100.0, 100.0)).unwrap(), 150.0, 150.0));
    // untouched corners stay fixed
    assert!(near(h.apply(Point::new(100.0, 0.0)).unwrap(), 100.0, 0.0));
    assert!(near(h.apply(Point::new(0.0, 100.0)).unwrap(), 0.0, 100.0));
}

#[test]
fn keyboard_nudge_after_drag() {
    let bus = EventBus::new();
    let mut editor = QuadEditor::new();
    editor.set_source_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
    editor.reset();
    editor.set_anchor_radius(10.0);

    let mut session = EditorSession::new(editor);
    session.setup(&bus);

    bus.dispatch(PointerEvent::Pressed(Point::new(2.0, 2.0)));
    bus.dispatch(PointerEvent::Released(Point::new(5.0, 5.0)));
    bus.dispatch(KeyEvent::Pressed(Key::Modifier));
    bus.dispatch(KeyEvent::Pressed(Key::Right));
    bus.dispatch(KeyEvent::Released(Key::Modifier));
    bus.dispatch(KeyEvent::Pressed(Key::Down));

    let p = session.editor().destination().get(Corner::TopLeft);
    assert!(near(p, 15.0, 5.3), "{p:?}");
}

#[test]
fn reset_after_source_rect_is_identity() {
    let mut editor = QuadEditor::new();
    editor.set_source_rect(Rect::new(0.0, 0.0, 200.0, 100.0));
    editor.reset();

    let h = editor.transform().unwrap();
    assert!(h.is_identity(1e-9));
    assert!(near(h.apply(Point::new(100.0, 50.0)).unwrap(), 100.0, 50.0));
}

#[test]
fn coincident_destination_is_reported() {
    let src = Quad::from_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
    let dst = Quad::new([Point::new(10.0, 10.0); 4]);
    assert!(matches!(
        solve(&src, &dst),
        Err(QuadWarpError::DegenerateGeometry(_))
    ));
}

#[test]
fn save_and_reload_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DEFAULT_FILE_NAME);

    let mut editor = QuadEditor::new();
    editor.set_source_rect(Rect::new(0.0, 0.0, 640.0, 480.0));
    editor.set_target_points(&[
        Point::new(31.5, 12.0),
        Point::new(600.25, 40.0),
        Point::new(622.0, 470.75),
        Point::new(8.0, 455.5),
    ]);
    editor.save(&path).unwrap();

    let mut restored = QuadEditor::new();
    restored.load(&path).unwrap();
    assert_eq!(restored.source(), editor.source());
    assert_eq!(restored.destination(), editor.destination());

    let a = editor.transform().unwrap();
    let b = restored.transform().unwrap();
    assert!(a.max_abs_diff(&b) < 1e-12);
}

#[test]
fn editor_far_from_origin_solves() {
    let offset = 5e4;
    let mut editor = QuadEditor::new();
    editor.set_source_rect(Rect::new(offset, offset, 100.0, 100.0));
    editor.set_target_rect(Rect::new(offset + 5.0, offset, 100.0, 120.0));

    let h = editor.transform().unwrap();
    let corner = h.apply(Point::new(offset + 100.0, offset + 100.0)).unwrap();
    assert!(near(corner, offset + 105.0, offset + 120.0), "{corner:?}");

    let inv = editor.inverse_transform().unwrap();
    assert!(near(inv.apply(Point::new(offset + 5.0, offset)).unwrap(), offset, offset));
    assert!(editor.hit_test(Point::new(offset + 50.0, offset + 50.0)));
}
