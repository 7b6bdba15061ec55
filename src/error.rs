//! Error taxonomy for fallible construction-time APIs.
//!
//! Per spec, nothing in the per-step simulation loop returns `Result` —
//! arithmetic safety (NaN, divide-by-zero) is prevented by clamps inline.
//! `EngineError` is only surfaced from body/geometry construction and
//! polygon decomposition, the boundary where caller-supplied data can
//! genuinely be malformed.

use miette::Diagnostic;
use thiserror::Error;

/// Errors produced while constructing bodies or decomposing polygons.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// Input vertices don't describe a usable polygon (too few points,
    /// zero area, or a non-finite coordinate).
    #[error("invalid polygon geometry: {reason}")]
    #[diagnostic(code(rigid2d::invalid_geometry))]
    InvalidGeometry {
        /// Human-readable cause, e.g. "fewer than 3 vertices".
        reason: String,
    },

    /// `quick_decomp`/`decomp` was asked to split a polygon whose edges
    /// self-intersect.
    #[error("polygon is not simple (edges self-intersect)")]
    #[diagnostic(code(rigid2d::non_simple_polygon))]
    NonSimplePolygon,

    /// The decomposition recursion depth exceeded `maxlevel` (100).
    /// The caller still receives a best-effort partial result; this
    /// variant is only surfaced through the warning sink, never
    /// returned from `decomp`/`quick_decomp` themselves.
    #[error("polygon decomposition recursion limit exceeded")]
    #[diagnostic(code(rigid2d::recursion_limit))]
    RecursionLimitExceeded,
}

/// Convenience alias used at construction-time boundaries.
pub type Result<T> = std::result::Result<T, EngineError>;
