//! QuadWarp - perspective quad warp editor core
//!
//! Computes the homography mapping a fixed source quad onto a user-edited
//! destination quad, and provides the interactive corner-editing state
//! machine that keeps the destination in sync with pointer and key input.

pub mod config;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod input;
pub mod persist;
pub mod session;
pub mod transform;

pub use editor::{CornerHandle, EditorState, QuadEditor};
pub use error::{QuadWarpError, Result};
pub use geometry::{Corner, Point, Quad, Rect};
pub use transform::{solve, solve_with, GaussianElimination, Homography, LinearBackend, NalgebraLu};
