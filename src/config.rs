//! Typed configuration records.
//!
//! Every constructor takes one of these records rather than a
//! duck-typed options bag, so unknown fields are a compile error
//! instead of a silently-ignored property. Each derives
//! [`serde::Deserialize`] with `#[serde(default)]` per field so a host
//! can load tuning values from a config file without the crate itself
//! depending on a file format.

use serde::Deserialize;

use crate::geometry::Vector;

/// Top-level engine tuning, mirrors `Matter.Engine.create`'s options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Iterations for the resolver's positional (penetration) solve.
    pub position_iterations: u32,
    /// Iterations for the resolver's velocity (impulse) solve.
    pub velocity_iterations: u32,
    /// Iterations for the constraint solver.
    pub constraint_iterations: u32,
    /// Whether bodies can fall asleep when they stop moving.
    pub enable_sleeping: bool,
    /// Constant acceleration applied to every non-static, non-sleeping body.
    pub gravity: Vector,
    /// Scale applied to `gravity` before it's added as a force.
    pub gravity_scale: f64,
    /// Global multiplier on the effective step delta.
    pub time_scale: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            position_iterations: 6,
            velocity_iterations: 4,
            constraint_iterations: 2,
            enable_sleeping: false,
            gravity: Vector::new(0.0, 1.0),
            gravity_scale: 0.001,
            time_scale: 1.0,
        }
    }
}

/// Per-body material and behavioral tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Mass per unit area; used to derive mass when `mass` isn't set explicitly.
    pub density: f64,
    /// Coefficient of restitution in `[0, 1]`.
    pub restitution: f64,
    /// Coulomb friction coefficient for sliding contact.
    pub friction: f64,
    /// Static friction coefficient (used while relative tangential velocity is near zero).
    pub friction_static: f64,
    /// Linear damping applied every step, independent of collisions.
    pub friction_air: f64,
    /// Whether the body ignores forces and never moves.
    pub is_static: bool,
    /// Whether the body reports collisions without responding to them.
    pub is_sensor: bool,
    /// Motion magnitude below which the sleeping counter advances.
    pub sleep_threshold: u32,
    /// Per-body multiplier on the integrator's effective delta.
    pub time_scale: f64,
    /// Collision filter: exactly one bit set, identifying this body's category.
    pub collision_category: u32,
    /// Collision filter: bitmask of categories this body is willing to collide with.
    pub collision_mask: u32,
    /// Collision filter group; bodies sharing a nonzero group always/never collide
    /// regardless of category/mask, depending on the group's sign.
    pub collision_group: i32,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            density: 0.001,
            restitution: 0.0,
            friction: 0.1,
            friction_static: 0.5,
            friction_air: 0.01,
            is_static: false,
            is_sensor: false,
            sleep_threshold: 60,
            time_scale: 1.0,
            collision_category: 0x0001,
            collision_mask: 0xFFFF_FFFF,
            collision_group: 0,
        }
    }
}

/// Distance/spring/pin constraint tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Resolution speed in `[0, 1]`; `1` is rigid, lower values behave like a spring.
    pub stiffness: f64,
    /// Velocity-proportional damping along the constraint's axis.
    pub damping: f64,
    /// Resolution speed for the angular component, in `[0, 1]`.
    pub angular_stiffness: f64,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            stiffness: 0.7,
            damping: 0.0,
            angular_stiffness: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults_match_normative_constants() {
        let config = EngineConfig::default();

        assert_eq!(config.position_iterations, 6);
        assert_eq!(config.velocity_iterations, 4);
        assert_eq!(config.constraint_iterations, 2);
        assert!(!config.enable_sleeping);
        assert_eq!(config.gravity_scale, 0.001);
    }
}
