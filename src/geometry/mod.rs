//! Vector math, polygon operations, and concave decomposition.
//!
//! This module has no notion of a body or a simulation step; it is
//! pure geometry, reused by `body::factory` (at shape-construction
//! time) and `narrowphase` (at collision-detection time).

pub mod axes;
pub mod bounds;
pub mod decomp;
pub mod vector;
pub mod vertices;

pub use axes::Axes;
pub use bounds::Bounds;
pub use vector::{Vector, VectorExt};
