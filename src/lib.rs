//! Deterministic, fixed-timestep 2D rigid-body physics core.
//!
//! The crate is organized by concern (geometry → body → broad/
//! narrowphase → pair cache → resolver/constraints → sleeping), with
//! each stage a free function or small struct operating on plain
//! `slotmap` arenas rather than a monolithic engine object with method
//! dispatch.
//!
//! [`engine::Engine`] is the entry point: it owns every arena and runs
//! the full step pipeline described in the module docs of `engine`.

pub mod body;
pub mod broadphase;
pub mod composite;
pub mod config;
pub mod constraint;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod id;
pub mod narrowphase;
pub mod pair;
pub mod resolver;
pub mod sleeping;

pub use body::Body;
pub use composite::Composite;
pub use config::{BodyConfig, ConstraintConfig, EngineConfig};
pub use constraint::Constraint;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use events::{Channel, Event, EventBus};
pub use geometry::Vector;
pub use id::{BodyId, CompositeId, ConstraintId, PairKey};
