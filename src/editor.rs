//! Quad editor: corner selection, dragging and keyboard nudging
//!
//! The editor owns a fixed source quad and a user-edited destination quad.
//! Pointer and key handlers mutate the destination; the transform between
//! the two is solved on demand and never cached implicitly.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{EditorConfig, Nudge};
use crate::error::Result;
use crate::geometry::{Corner, Point, Quad, Rect};
use crate::input::{InputEvent, Key, KeyEvent, PointerEvent};
use crate::transform::{self, Homography, LinearBackend};

/// Read-only view of everything a renderer needs
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct EditorState {
    pub source: Quad,
    pub destination: Quad,
    pub selected: Option<Corner>,
    pub highlighted: Option<Corner>,
    pub anchor_radius: f64,
    pub position: Point,
    pub visible: bool,
}

/// Square handle drawn around a destination corner, in host coordinates
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct CornerHandle {
    pub corner: Corner,
    pub rect: Rect,
    pub highlighted: bool,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct QuadEditor {
    source: Quad,
    destination: Quad,
    selected: Option<Corner>,
    highlighted: Option<Corner>,
    visible: bool,
    anchor_radius: f64,
    fast_modifier_held: bool,
    nudge: Nudge,
    position: Point,
    last_valid: Homography,
}

impl Default for QuadEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadEditor {
    /// Hidden editor with source and destination on the unit square
    pub fn new() -> Self {
        Self::from_config(&EditorConfig::default())
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        let source = Quad::from_rect(config.source);
        Self {
            source,
            destination: source,
            selected: None,
            highlighted: None,
            visible: config.visible,
            anchor_radius: config.anchor_size * 0.5,
            fast_modifier_held: false,
            nudge: config.nudge,
            position: config.position,
            last_valid: Homography::identity(),
        }
    }

    // ---------------------------------------------------------------- setters

    pub fn set_source_rect(&mut self, rect: Rect) {
        self.source = Quad::from_rect(rect);
    }

    pub fn set_target_rect(&mut self, rect: Rect) {
        self.destination = Quad::from_rect(rect);
    }

    /// Overwrite destination corners from the first four points; corners
    /// without a matching point keep their position.
    pub fn set_target_points(&mut self, points: &[Point]) {
        for (corner, p) in Corner::ALL.iter().zip(points) {
            self.destination.set(*corner, *p);
        }
    }

    /// Like [`set_target_points`](Self::set_target_points), but missing
    /// corners are moved to the origin.
    pub fn set_corners(&mut self, points: &[Point]) {
        for (i, corner) in Corner::ALL.iter().enumerate() {
            let p = points.get(i).copied().unwrap_or_default();
            self.destination.set(*corner, p);
        }
    }

    pub fn set_corner(&mut self, index: usize, p: Point) -> Result<()> {
        let corner = Corner::from_index(index)?;
        self.set_corner_at(corner, p);
        Ok(())
    }

    pub fn set_corner_at(&mut self, corner: Corner, p: Point) {
        self.destination.set(corner, p);
    }

    /// Direct hit radius for corner handles
    pub fn set_anchor_radius(&mut self, radius: f64) {
        self.anchor_radius = radius.max(0.0);
    }

    /// Handle edge length; the hit radius becomes half of it
    pub fn set_anchor_size(&mut self, size: f64) {
        self.set_anchor_radius(size * 0.5);
    }

    /// Origin of the editor in host coordinates; pointer input is shifted
    /// by `-position` before use.
    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    // ---------------------------------------------------------------- getters

    pub fn source(&self) -> Quad {
        self.source
    }

    pub fn destination(&self) -> Quad {
        self.destination
    }

    pub fn selected_corner(&self) -> Option<Corner> {
        self.selected
    }

    pub fn highlighted_corner(&self) -> Option<Corner> {
        self.highlighted
    }

    pub fn anchor_radius(&self) -> f64 {
        self.anchor_radius
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn is_fast_modifier_held(&self) -> bool {
        self.fast_modifier_held
    }

    pub fn state(&self) -> EditorState {
        EditorState {
            source: self.source,
            destination: self.destination,
            selected: self.selected,
            highlighted: self.highlighted,
            anchor_radius: self.anchor_radius,
            position: self.position,
            visible: self.visible,
        }
    }

    // ------------------------------------------------------------- visibility

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if !visible {
            // Key releases are ignored while hidden
            self.fast_modifier_held = false;
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn show(&mut self) {
        self.set_visible(true);
    }

    pub fn hide(&mut self) {
        self.set_visible(false);
    }

    pub fn toggle_show(&mut self) {
        self.set_visible(!self.visible);
    }

    // ------------------------------------------------------------ interaction

    pub fn handle_event(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::Pointer(PointerEvent::Moved(p)) => self.pointer_moved(p),
            InputEvent::Pointer(PointerEvent::Pressed(p)) => self.pointer_pressed(p),
            InputEvent::Pointer(PointerEvent::Dragged(p)) => self.pointer_dragged(p),
            InputEvent::Pointer(PointerEvent::Released(p)) => self.pointer_released(p),
            InputEvent::Key(KeyEvent::Pressed(key)) => self.key_pressed(key),
            InputEvent::Key(KeyEvent::Released(key)) => self.key_released(key),
        }
    }

    pub fn pointer_moved(&mut self, p: Point) {
        if !self.visible {
            return;
        }
        let p = self.to_local(p);
        self.highlighted = self.corner_near(&p);
    }

    /// Select the corner under the pointer and snap it there
    pub fn pointer_pressed(&mut self, p: Point) {
        if !self.visible {
            return;
        }
        let p = self.to_local(p);
        let hit = self.corner_near(&p);
        if let Some(corner) = hit {
            self.destination.set(corner, p);
        }
        if hit != self.selected {
            debug!(from = ?self.selected, to = ?hit, "corner selection changed");
        }
        self.selected = hit;
    }

    /// The selected corner follows the pointer without a radius limit
    pub fn pointer_dragged(&mut self, p: Point) {
        if !self.visible {
            return;
        }
        if let Some(corner) = self.selected {
            let p = self.to_local(p);
            self.destination.set(corner, p);
        }
    }

    /// Commits the final position; the selection stays for keyboard nudging
    pub fn pointer_released(&mut self, p: Point) {
        self.pointer_dragged(p);
    }

    pub fn key_pressed(&mut self, key: Key) {
        if !self.visible {
            return;
        }
        match key {
            Key::Modifier => self.fast_modifier_held = true,
            Key::NextCorner => {
                let next = self.selected.map_or(Corner::TopLeft, Corner::next);
                debug!(corner = ?next, "selected next corner");
                self.selected = Some(next);
            }
            Key::PreviousCorner => {
                let prev = self.selected.map_or(Corner::BottomLeft, Corner::previous);
                debug!(corner = ?prev, "selected previous corner");
                self.selected = Some(prev);
            }
            Key::Left | Key::Right | Key::Up | Key::Down => {
                let (Some(corner), Some((dx, dy))) = (self.selected, key.direction()) else {
                    return;
                };
                let step = self.nudge.amount(self.fast_modifier_held);
                let p = self.destination.get(corner).offset(dx * step, dy * step);
                self.destination.set(corner, p);
            }
            Key::Other => {}
        }
    }

    pub fn key_released(&mut self, key: Key) {
        if !self.visible {
            return;
        }
        if key == Key::Modifier {
            self.fast_modifier_held = false;
        }
    }

    /// Collapse the destination back onto the source
    pub fn reset(&mut self) {
        self.destination = self.source;
    }

    // -------------------------------------------------------------- transform

    /// Source -> destination homography, solved on every call
    pub fn transform(&self) -> Result<Homography> {
        transform::solve(&self.source, &self.destination)
    }

    /// Destination -> source homography, solved on every call
    pub fn inverse_transform(&self) -> Result<Homography> {
        transform::solve(&self.destination, &self.source)
    }

    pub fn transform_with<B: LinearBackend + ?Sized>(&self, backend: &B) -> Result<Homography> {
        transform::solve_with(backend, &self.source, &self.destination)
    }

    /// Current transform, or the last one that solved when the quad is
    /// degenerate (identity if none has yet).
    pub fn transform_or_last(&mut self) -> Homography {
        match self.transform() {
            Ok(h) => {
                self.last_valid = h;
                h
            }
            Err(e) => {
                warn!("Keeping last valid transform: {}", e);
                self.last_valid
            }
        }
    }

    /// Whether `p` lies inside the source rectangle once mapped back through
    /// the inverse transform, with half the anchor radius as tolerance.
    ///
    /// This is a bounding-box test in source space: for non-rectangular
    /// source quads it accepts points outside the warped outline.
    pub fn hit_test(&self, p: Point) -> bool {
        let inverse = match self.inverse_transform() {
            Ok(h) => h,
            Err(e) => {
                debug!("Hit test on degenerate quad: {}", e);
                return false;
            }
        };
        let local = self.to_local(p);
        let bounds = self.source.bounds().expand(self.anchor_radius * 0.5);
        inverse
            .apply(local)
            .is_some_and(|q| bounds.contains(&q))
    }

    // -------------------------------------------------------------- rendering

    /// Handles for the four destination corners, in index order
    pub fn handles(&self) -> [CornerHandle; 4] {
        let size = self.anchor_radius * 2.0;
        Corner::ALL.map(|corner| {
            let p = self.to_host(self.destination.get(corner));
            CornerHandle {
                corner,
                rect: Rect::new(p.x - self.anchor_radius, p.y - self.anchor_radius, size, size),
                highlighted: self.highlighted == Some(corner),
                selected: self.selected == Some(corner),
            }
        })
    }

    /// Destination outline edges in host coordinates
    pub fn outline(&self) -> [(Point, Point); 4] {
        self.destination
            .edges()
            .map(|(a, b)| (self.to_host(a), self.to_host(b)))
    }

    // ---------------------------------------------------------------- helpers

    /// First corner (in index order) within the anchor radius of `p`
    fn corner_near(&self, p: &Point) -> Option<Corner> {
        self.destination
            .iter()
            .find(|(_, c)| p.distance(c) <= self.anchor_radius)
            .map(|(corner, _)| corner)
    }

    fn to_local(&self, p: Point) -> Point {
        p.offset(-self.position.x, -self.position.y)
    }

    fn to_host(&self, p: Point) -> Point {
        p.offset(self.position.x, self.position.y)
    }
}

impl QuadEditor {
    /// Replace both quads, e.g. from a loaded document
    pub(crate) fn restore(&mut self, source: Quad, destination: Quad) {
        self.source = source;
        self.destination = destination;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuadWarpError;

    fn editor_with_rect(rect: Rect) -> QuadEditor {
        let mut editor = QuadEditor::new();
        editor.set_source_rect(rect);
        editor.reset();
        editor.show();
        editor
    }

    fn assert_point_near(p: Point, x: f64, y: f64) {
        assert!(
            (p.x - x).abs() < 1e-6 && (p.y - y).abs() < 1e-6,
            "expected ({x}, {y}), got {p:?}"
        );
    }

    #[test]
    fn test_defaults() {
        let editor = QuadEditor::new();
        assert_eq!(editor.source(), Quad::default());
        assert_eq!(editor.destination(), Quad::default());
        assert_eq!(editor.selected_corner(), None);
        assert_eq!(editor.highlighted_corner(), None);
        assert!(!editor.is_visible());
        assert_eq!(editor.anchor_radius(), 5.0);
    }

    #[test]
    fn test_hidden_editor_ignores_input() {
        let mut editor = QuadEditor::new();
        editor.set_anchor_radius(10.0);
        editor.pointer_pressed(Point::new(0.0, 0.0));
        editor.key_pressed(Key::NextCorner);
        assert_eq!(editor.selected_corner(), None);
        assert_eq!(editor.destination(), Quad::default());
    }

    #[test]
    fn test_press_hit_tolerance() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        editor.set_anchor_radius(10.0);

        editor.pointer_pressed(Point::new(105.0, 100.0));
        assert_eq!(editor.selected_corner(), Some(Corner::BottomRight));
        // snapped onto the pointer
        assert_eq!(editor.destination().get(Corner::BottomRight), Point::new(105.0, 100.0));

        editor.reset();
        editor.pointer_pressed(Point::new(112.0, 100.0));
        assert_eq!(editor.selected_corner(), None);
        assert_eq!(editor.destination(), editor.source());
    }

    #[test]
    fn test_lowest_index_wins() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 4.0, 4.0));
        editor.set_anchor_radius(10.0);
        editor.pointer_moved(Point::new(2.0, 2.0));
        assert_eq!(editor.highlighted_corner(), Some(Corner::TopLeft));

        editor.pointer_moved(Point::new(50.0, 50.0));
        assert_eq!(editor.highlighted_corner(), None);
    }

    #[test]
    fn test_drag_and_release_keep_selection() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        editor.set_anchor_radius(10.0);

        editor.pointer_pressed(Point::new(100.0, 100.0));
        editor.pointer_dragged(Point::new(300.0, -40.0));
        assert_eq!(editor.destination().get(Corner::BottomRight), Point::new(300.0, -40.0));

        editor.pointer_released(Point::new(150.0, 150.0));
        assert_eq!(editor.selected_corner(), Some(Corner::BottomRight));
        assert_eq!(editor.destination().get(Corner::BottomRight), Point::new(150.0, 150.0));

        let h = editor.transform().unwrap();
        assert_point_near(h.apply(Point::new(100.0, 100.0)).unwrap(), 150.0, 150.0);
    }

    #[test]
    fn test_drag_without_selection_is_noop() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        editor.pointer_dragged(Point::new(10.0, 10.0));
        editor.pointer_released(Point::new(10.0, 10.0));
        assert_eq!(editor.destination(), editor.source());
    }

    #[test]
    fn test_corner_cycling() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        for expected in [
            Corner::TopLeft,
            Corner::TopRight,
            Corner::BottomRight,
            Corner::BottomLeft,
            Corner::TopLeft,
        ] {
            editor.key_pressed(Key::NextCorner);
            assert_eq!(editor.selected_corner(), Some(expected));
        }

        editor.key_pressed(Key::PreviousCorner);
        assert_eq!(editor.selected_corner(), Some(Corner::BottomLeft));
    }

    #[test]
    fn test_previous_from_idle() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        editor.key_pressed(Key::PreviousCorner);
        assert_eq!(editor.selected_corner(), Some(Corner::BottomLeft));
    }

    #[test]
    fn test_nudge_small_and_fast() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));

        // no selection: arrows do nothing
        editor.key_pressed(Key::Right);
        assert_eq!(editor.destination(), editor.source());

        editor.key_pressed(Key::NextCorner);
        editor.key_pressed(Key::Right);
        editor.key_pressed(Key::Down);
        assert_point_near(editor.destination().get(Corner::TopLeft), 0.3, 0.3);

        editor.key_pressed(Key::Modifier);
        assert!(editor.is_fast_modifier_held());
        editor.key_pressed(Key::Left);
        editor.key_pressed(Key::Up);
        assert_point_near(editor.destination().get(Corner::TopLeft), -9.7, -9.7);

        editor.key_released(Key::Modifier);
        assert!(!editor.is_fast_modifier_held());
        editor.key_pressed(Key::Other);
        assert_point_near(editor.destination().get(Corner::TopLeft), -9.7, -9.7);
    }

    #[test]
    fn test_reset_yields_identity() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 200.0, 100.0));
        editor.set_target_points(&[Point::new(20.0, 5.0), Point::new(180.0, 12.0)]);
        assert!(!editor.transform().unwrap().is_identity(1e-9));

        editor.reset();
        let h = editor.transform().unwrap();
        assert!(h.is_identity(1e-9));
        assert_point_near(h.apply(Point::new(100.0, 50.0)).unwrap(), 100.0, 50.0);
    }

    #[test]
    fn test_inverse_round_trip() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        editor.set_target_points(&[
            Point::new(10.0, 5.0),
            Point::new(120.0, -3.0),
            Point::new(140.0, 130.0),
            Point::new(-8.0, 90.0),
        ]);
        let forward = editor.transform().unwrap();
        let inverse = editor.inverse_transform().unwrap();
        assert!(inverse.compose(&forward).is_identity(1e-9));
    }

    #[test]
    fn test_set_target_points_partial() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        editor.set_target_points(&[Point::new(1.0, 1.0)]);
        let dst = editor.destination();
        assert_eq!(dst.get(Corner::TopLeft), Point::new(1.0, 1.0));
        assert_eq!(dst.get(Corner::TopRight), Point::new(10.0, 0.0));

        editor.set_corners(&[Point::new(2.0, 2.0)]);
        assert_eq!(editor.destination().get(Corner::TopRight), Point::default());
    }

    #[test]
    fn test_set_corner_validates_index() {
        let mut editor = QuadEditor::new();
        assert!(editor.set_corner(3, Point::new(4.0, 4.0)).is_ok());
        assert_eq!(editor.destination().get(Corner::BottomLeft), Point::new(4.0, 4.0));
        assert!(matches!(
            editor.set_corner(4, Point::new(0.0, 0.0)),
            Err(QuadWarpError::InvalidCornerIndex(4))
        ));
    }

    #[test]
    fn test_degenerate_keeps_last_transform() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        editor.set_target_points(&[Point::new(5.0, 5.0)]);
        let good = editor.transform_or_last();

        editor.set_target_rect(Rect::new(50.0, 50.0, 0.0, 0.0));
        assert!(matches!(
            editor.transform(),
            Err(QuadWarpError::DegenerateGeometry(_))
        ));
        assert_eq!(editor.transform_or_last(), good);
        // destination is left as set
        assert_eq!(editor.destination(), Quad::new([Point::new(50.0, 50.0); 4]));
    }

    #[test]
    fn test_hit_test_bounds_in_source_space() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        editor.set_anchor_radius(10.0);
        editor.set_target_rect(Rect::new(100.0, 100.0, 200.0, 200.0));

        assert!(editor.hit_test(Point::new(200.0, 200.0)));
        // 4 px outside the warped quad maps to 2 px outside source: within tolerance
        assert!(editor.hit_test(Point::new(96.0, 200.0)));
        assert!(!editor.hit_test(Point::new(80.0, 200.0)));
    }

    #[test]
    fn test_position_offset() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        editor.set_anchor_radius(5.0);
        editor.set_position(Point::new(50.0, 20.0));
        assert_eq!(editor.position(), Point::new(50.0, 20.0));

        editor.pointer_pressed(Point::new(152.0, 22.0));
        assert_eq!(editor.selected_corner(), Some(Corner::TopRight));
        assert_eq!(editor.destination().get(Corner::TopRight), Point::new(102.0, 2.0));

        let handle = editor.handles()[Corner::TopRight.index()];
        assert!(handle.selected);
        assert_eq!(handle.rect, Rect::new(147.0, 17.0, 10.0, 10.0));
    }

    #[test]
    fn test_handle_event_dispatch() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        editor.handle_event(&InputEvent::Key(KeyEvent::Pressed(Key::NextCorner)));
        editor.handle_event(&InputEvent::Pointer(PointerEvent::Moved(Point::new(0.0, 1.0))));
        let state = editor.state();
        assert_eq!(state.selected, Some(Corner::TopLeft));
        assert_eq!(state.highlighted, Some(Corner::TopLeft));
    }

    #[test]
    fn test_outline_in_host_coordinates() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        editor.set_position(Point::new(5.0, 5.0));
        let edges = editor.outline();
        assert_eq!(edges[0], (Point::new(5.0, 5.0), Point::new(15.0, 5.0)));
        assert_eq!(edges[3], (Point::new(5.0, 15.0), Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_hide_clears_modifier() {
        let mut editor = editor_with_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        editor.key_pressed(Key::Modifier);
        editor.toggle_show();
        assert!(!editor.is_visible());
        assert!(!editor.is_fast_modifier_held());
    }
}
