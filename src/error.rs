//! Error types for the quad warp core

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuadWarpError {
    /// The point correspondences do not define a projective map
    /// (collinear or coincident corners).
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("invalid corner index {0}, expected 0..=3")]
    InvalidCornerIndex(usize),

    /// Missing or malformed persisted document, or a failed write.
    #[error("persisted state unavailable at {path:?}: {reason}")]
    PersistenceUnavailable { path: PathBuf, reason: String },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    XmlParse(#[from] roxmltree::Error),
}

pub type Result<T> = std::result::Result<T, QuadWarpError>;
