//! Perspective transformation between two quads
//!
//! This module computes the planar homography that maps the four corners
//! of one quad exactly onto the four corners of another. The 9th degree of
//! freedom is fixed with `h[2][2] = 1`, which leaves an 8x8 linear system
//! (two equations per correspondence). That system is solved directly by a
//! pluggable [`LinearBackend`]; every backend yields the same matrix within
//! floating-point tolerance.
//!
//! Both quads are conditioned before the system is built: each is moved so
//! its centroid sits at the origin and scaled to a mean centroid distance of
//! `sqrt(2)`. Without this the `x'*x` terms grow with the square of the
//! coordinates and quads far from the origin look singular.

use nalgebra::{Matrix3, SMatrix, SVector};
use serde::{Deserialize, Serialize};

use crate::error::{QuadWarpError, Result};
use crate::geometry::{Point, Quad};

/// Pivots smaller than this (relative to the largest coefficient of the
/// conditioned system) are treated as a singular system.
const PIVOT_EPSILON: f64 = 1e-12;

/// Homogeneous weights this close to zero map to the line at infinity.
const W_EPSILON: f64 = 1e-12;

/// 3x3 projective transform, row-major: `[x' y' w'] = M * [x y 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    matrix: [[f64; 3]; 3],
}

impl Homography {
    pub const fn identity() -> Self {
        Self {
            matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub const fn from_rows(matrix: [[f64; 3]; 3]) -> Self {
        Self { matrix }
    }

    pub fn rows(&self) -> [[f64; 3]; 3] {
        self.matrix
    }

    /// Map a point through the transform with perspective division.
    ///
    /// Returns `None` for points the transform sends to infinity.
    #[inline]
    pub fn apply(&self, p: Point) -> Option<Point> {
        let m = &self.matrix;
        let w = m[2][0] * p.x + m[2][1] * p.y + m[2][2];
        if w.abs() < W_EPSILON {
            return None;
        }
        Some(Point::new(
            (m[0][0] * p.x + m[0][1] * p.y + m[0][2]) / w,
            (m[1][0] * p.x + m[1][1] * p.y + m[1][2]) / w,
        ))
    }

    /// `self` applied after `first`
    pub fn compose(&self, first: &Homography) -> Homography {
        Self::from_matrix3(self.to_matrix3() * first.to_matrix3())
    }

    /// Matrix inverse, rescaled so `[2][2] = 1` where possible
    pub fn inverse(&self) -> Result<Homography> {
        self.to_matrix3()
            .try_inverse()
            .map(Self::from_matrix3)
            .map(|h| h.normalized())
            .ok_or_else(|| QuadWarpError::DegenerateGeometry("transform is not invertible".into()))
    }

    /// Largest element-wise difference from `other` after normalization
    pub fn max_abs_diff(&self, other: &Homography) -> f64 {
        let (a, b) = (self.normalized(), other.normalized());
        let mut diff: f64 = 0.0;
        for r in 0..3 {
            for c in 0..3 {
                diff = diff.max((a.matrix[r][c] - b.matrix[r][c]).abs());
            }
        }
        diff
    }

    pub fn is_identity(&self, tolerance: f64) -> bool {
        self.max_abs_diff(&Homography::identity()) <= tolerance
    }

    /// Embed into a column-major 4x4 matrix (z passes through unchanged),
    /// the layout GL-style renderers consume.
    pub fn to_mat4(&self) -> [f64; 16] {
        const SLOT: [usize; 3] = [0, 1, 3];
        let mut out = [0.0; 16];
        out[2 * 4 + 2] = 1.0;
        for (r, row) in self.matrix.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                out[SLOT[c] * 4 + SLOT[r]] = *v;
            }
        }
        out
    }

    pub fn to_matrix3(&self) -> Matrix3<f64> {
        let m = &self.matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        )
    }

    pub fn from_matrix3(m: Matrix3<f64>) -> Self {
        Self::from_rows([
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ])
    }

    fn normalized(&self) -> Homography {
        let s = self.matrix[2][2];
        if s.abs() < W_EPSILON {
            return *self;
        }
        let mut m = self.matrix;
        m.iter_mut().flatten().for_each(|v| *v /= s);
        Self::from_rows(m)
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

/// Solves the dense 8x8 system `A h = b` built from four correspondences
pub trait LinearBackend {
    fn name(&self) -> &'static str;

    fn solve8(&self, a: [[f64; 8]; 8], b: [f64; 8]) -> Result<[f64; 8]>;
}

/// Gaussian elimination with partial pivoting
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianElimination;

impl LinearBackend for GaussianElimination {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn solve8(&self, mut a: [[f64; 8]; 8], mut b: [f64; 8]) -> Result<[f64; 8]> {
        let n = 8;
        let scale = a
            .iter()
            .flatten()
            .fold(0.0f64, |acc, v| acc.max(v.abs()))
            .max(f64::MIN_POSITIVE);

        // Forward elimination with partial pivoting
        for col in 0..n {
            let mut max_row = col;
            let mut max_val = a[col][col].abs();
            for row in (col + 1)..n {
                if a[row][col].abs() > max_val {
                    max_val = a[row][col].abs();
                    max_row = row;
                }
            }

            if max_row != col {
                a.swap(col, max_row);
                b.swap(col, max_row);
            }

            let pivot = a[col][col];
            if pivot.abs() < PIVOT_EPSILON * scale {
                return Err(QuadWarpError::DegenerateGeometry(format!(
                    "singular system at column {col} (pivot {pivot:e})"
                )));
            }

            for row in (col + 1)..n {
                let factor = a[row][col] / pivot;
                for j in col..n {
                    a[row][j] -= factor * a[col][j];
                }
                b[row] -= factor * b[col];
            }
        }

        // Back substitution
        let mut x = [0.0f64; 8];
        for i in (0..n).rev() {
            let mut sum = b[i];
            for j in (i + 1)..n {
                sum -= a[i][j] * x[j];
            }
            x[i] = sum / a[i][i];
        }

        if x.iter().any(|v| !v.is_finite()) {
            return Err(QuadWarpError::DegenerateGeometry(
                "elimination produced a non-finite solution".into(),
            ));
        }
        Ok(x)
    }
}

/// LU decomposition from nalgebra
#[derive(Debug, Clone, Copy, Default)]
pub struct NalgebraLu;

impl LinearBackend for NalgebraLu {
    fn name(&self) -> &'static str {
        "nalgebra-lu"
    }

    fn solve8(&self, a: [[f64; 8]; 8], b: [f64; 8]) -> Result<[f64; 8]> {
        let mat = SMatrix::<f64, 8, 8>::from_fn(|r, c| a[r][c]);
        let rhs = SVector::<f64, 8>::from_column_slice(&b);

        let h = mat
            .lu()
            .solve(&rhs)
            .filter(|h| h.iter().all(|v| v.is_finite()))
            .ok_or_else(|| QuadWarpError::DegenerateGeometry("LU solve failed".into()))?;

        let mut x = [0.0; 8];
        x.copy_from_slice(h.as_slice());
        Ok(x)
    }
}

/// Homography mapping each `src` corner onto the matching `dst` corner
pub fn solve(src: &Quad, dst: &Quad) -> Result<Homography> {
    solve_with(&GaussianElimination, src, dst)
}

/// [`solve`] with an explicit linear-algebra backend
pub fn solve_with<B: LinearBackend + ?Sized>(
    backend: &B,
    src: &Quad,
    dst: &Quad,
) -> Result<Homography> {
    if src.has_collinear_triple() {
        return Err(QuadWarpError::DegenerateGeometry(
            "source quad has three collinear corners".into(),
        ));
    }
    if dst.has_collinear_triple() {
        return Err(QuadWarpError::DegenerateGeometry(
            "destination quad has three collinear corners".into(),
        ));
    }

    let (t_src, src_n) = condition(&src.points());
    let (t_dst, dst_n) = condition(&dst.points());

    let (a, b) = build_system(&src_n, &dst_n);
    let h = backend.solve8(a, b)?;
    let h_n = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);

    // H = T_dst^-1 * H_n * T_src
    let homography = Homography::from_matrix3(t_dst.undo() * h_n * t_src.apply()).normalized();
    if homography.matrix.iter().flatten().any(|v| !v.is_finite()) {
        return Err(QuadWarpError::DegenerateGeometry(
            "solved transform is not finite".into(),
        ));
    }

    tracing::trace!(backend = backend.name(), ?homography, "solved homography");
    Ok(homography)
}

/// Translation to the centroid followed by a uniform scale
#[derive(Debug, Clone, Copy)]
struct Conditioning {
    cx: f64,
    cy: f64,
    scale: f64,
}

impl Conditioning {
    fn apply(&self) -> Matrix3<f64> {
        let s = self.scale;
        Matrix3::new(s, 0.0, -s * self.cx, 0.0, s, -s * self.cy, 0.0, 0.0, 1.0)
    }

    fn undo(&self) -> Matrix3<f64> {
        let inv = 1.0 / self.scale;
        Matrix3::new(inv, 0.0, self.cx, 0.0, inv, self.cy, 0.0, 0.0, 1.0)
    }
}

/// Centre the points on their centroid and scale them to a mean distance
/// of `sqrt(2)` from it
fn condition(points: &[Point; 4]) -> (Conditioning, [Point; 4]) {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let mean_dist = points.iter().map(|p| (p.x - cx).hypot(p.y - cy)).sum::<f64>() / 4.0;

    let scale = if mean_dist > 0.0 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Conditioning { cx, cy, scale };
    let conditioned = points.map(|p| Point::new(scale * (p.x - cx), scale * (p.y - cy)));
    (t, conditioned)
}

/// For each correspondence (x, y) -> (x', y'):
///   x*h0 + y*h1 + h2 - x'*x*h6 - x'*y*h7 = x'
///   x*h3 + y*h4 + h5 - y'*x*h6 - y'*y*h7 = y'
fn build_system(src: &[Point; 4], dst: &[Point; 4]) -> ([[f64; 8]; 8], [f64; 8]) {
    let mut a = [[0.0f64; 8]; 8];
    let mut b = [0.0f64; 8];

    for i in 0..4 {
        let Point { x, y } = src[i];
        let Point { x: xp, y: yp } = dst[i];

        a[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -xp * x, -xp * y];
        b[2 * i] = xp;

        a[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -yp * x, -yp * y];
        b[2 * i + 1] = yp;
    }

    (a, b)
}

/// Residual of mapping `src[i]` through `h` against `dst[i]`, worst corner
pub fn max_corner_residual(h: &Homography, src: &Quad, dst: &Quad) -> f64 {
    src.points()
        .iter()
        .zip(dst.points().iter())
        .map(|(s, d)| match h.apply(*s) {
            Some(p) => p.distance(d),
            None => f64::INFINITY,
        })
        .fold(0.0, f64::max)
}
