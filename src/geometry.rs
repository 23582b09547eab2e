//! Planar points, rectangles and the four-corner quad

use serde::{Deserialize, Serialize};

use crate::error::{QuadWarpError, Result};

/// A 2D point in editor-local coordinates
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Axis-aligned rectangle, origin at the top-left corner
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// Grow by `margin` on every side
    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

/// Named corner of a quad, in storage order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(QuadWarpError::InvalidCornerIndex(index))
    }

    /// Following corner in clockwise order, wrapping BottomLeft -> TopLeft
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % 4]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + 3) % 4]
    }

    pub fn label(self) -> &'static str {
        match self {
            Corner::TopLeft => "Top Left",
            Corner::TopRight => "Top Right",
            Corner::BottomRight => "Bottom Right",
            Corner::BottomLeft => "Bottom Left",
        }
    }
}

/// Four points ordered top-left, top-right, bottom-right, bottom-left
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Quad {
    corners: [Point; 4],
}

impl Quad {
    pub const fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    /// Corners of `rect` clockwise starting top-left
    pub fn from_rect(rect: Rect) -> Self {
        let Rect {
            x,
            y,
            width,
            height,
        } = rect;
        Self::new([
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    pub fn points(&self) -> [Point; 4] {
        self.corners
    }

    pub fn get(&self, corner: Corner) -> Point {
        self.corners[corner.index()]
    }

    pub fn set(&mut self, corner: Corner, p: Point) {
        self.corners[corner.index()] = p;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Corner, Point)> + '_ {
        Corner::ALL.iter().map(move |&c| (c, self.corners[c.index()]))
    }

    /// Axis-aligned bounding box of the four corners
    pub fn bounds(&self) -> Rect {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &self.corners {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Edges as (from, to) pairs, closing BottomLeft -> TopLeft
    pub fn edges(&self) -> [(Point, Point); 4] {
        let c = &self.corners;
        [(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])]
    }

    /// True when some three corners lie on one line (within a tolerance
    /// scaled to the quad's extent).
    pub fn has_collinear_triple(&self) -> bool {
        let b = self.bounds();
        let scale = b.width.max(b.height);
        if !(scale > 0.0) {
            return true;
        }
        let eps = 1e-12 * scale * scale;
        let c = &self.corners;
        [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)]
            .iter()
            .any(|&(i, j, k)| cross(&c[i], &c[j], &c[k]).abs() <= eps)
    }
}

impl Default for Quad {
    fn default() -> Self {
        Self::from_rect(Rect::default())
    }
}

impl From<[Point; 4]> for Quad {
    fn from(corners: [Point; 4]) -> Self {
        Self::new(corners)
    }
}

/// Z component of (b - a) x (c - a)
fn cross(a: &Point, b: &Point, c: &Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}
