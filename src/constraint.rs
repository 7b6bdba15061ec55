//! Distance/spring/pin constraints and their iterative Gauss-Seidel
//! solver.
//!
//! Either endpoint may be a fixed world point rather than a body, and
//! each constraint keeps a warm-started per-body impulse accumulator
//! across solve passes.

use slotmap::SlotMap;

use crate::body::Body;
use crate::config::ConstraintConfig;
use crate::events::{Event, EventBus};
use crate::geometry::{Vector, VectorExt};
use crate::id::{BodyId, ConstraintId};

/// Warm-start decay applied to `constraint_impulse` after each step's
/// `postSolveAll`. Normative constant.
pub const WARMING: f64 = 0.4;
/// Damping applied to the torque share of a solved constraint.
/// Normative constant, currently always `1` (a no-op multiplier kept
/// as a named hook in the torque formula).
pub const TORQUE_DAMPEN: f64 = 1.0;
/// Minimum constraint length; anything shorter is clamped, avoiding a
/// division singularity. Normative constant.
pub const MIN_LENGTH: f64 = 1e-6;

/// Advisory rendering hint; has no effect on solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderHint {
    Pin,
    Spring,
    Line,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub label: String,
    pub body_a: Option<BodyId>,
    pub body_b: Option<BodyId>,
    /// Anchor relative to `body_a`'s position, or a world point if
    /// `body_a` is `None`.
    pub point_a: Vector,
    /// Anchor relative to `body_b`'s position, or a world point if
    /// `body_b` is `None`.
    pub point_b: Vector,
    pub length: f64,
    pub stiffness: f64,
    pub damping: f64,
    pub angular_stiffness: f64,
    /// Body angle at the last `solve`, used to carry the anchor
    /// through the body's rotation since then.
    pub angle_a: f64,
    pub angle_b: f64,
    pub render: RenderHint,
}

impl Constraint {
    /// `length` defaults to the current distance between the anchors
    /// when not given explicitly, locking in whatever distance the
    /// constraint was created at.
    pub fn create(
        bodies: &SlotMap<BodyId, Body>,
        body_a: Option<BodyId>,
        body_b: Option<BodyId>,
        point_a: Vector,
        point_b: Vector,
        length: Option<f64>,
        config: ConstraintConfig,
    ) -> Self {
        let world_a = body_a.and_then(|id| bodies.get(id)).map_or(point_a, |b| b.position + point_a);
        let world_b = body_b.and_then(|id| bodies.get(id)).map_or(point_b, |b| b.position + point_b);

        let length = length
            .unwrap_or_else(|| (world_a - world_b).magnitude())
            .max(MIN_LENGTH);

        let render = if length == 0.0 {
            RenderHint::Pin
        } else if config.stiffness < 0.9 {
            RenderHint::Spring
        } else {
            RenderHint::Line
        };

        let angle_a = body_a.and_then(|id| bodies.get(id)).map_or(0.0, |b| b.angle);
        let angle_b = body_b.and_then(|id| bodies.get(id)).map_or(0.0, |b| b.angle);

        Self {
            label: "Constraint".to_string(),
            body_a,
            body_b,
            point_a,
            point_b,
            length,
            stiffness: config.stiffness,
            damping: config.damping,
            angular_stiffness: config.angular_stiffness,
            angle_a,
            angle_b,
            render,
        }
    }

    /// `true` when at least one endpoint cannot move under this
    /// constraint (a world anchor or a static body); these solve in
    /// the first pass of [`solve_all`] for stability.
    fn is_fixed(&self, bodies: &SlotMap<BodyId, Body>) -> bool {
        let a_fixed = self
            .body_a
            .map_or(true, |id| bodies.get(id).map_or(true, |b| b.is_static));
        let b_fixed = self
            .body_b
            .map_or(true, |id| bodies.get(id).map_or(true, |b| b.is_static));
        a_fixed || b_fixed
    }

    /// Gauss-Seidel distance projection for a single constraint.
    /// A no-op if both endpoints are world points (nothing to move).
    fn solve(&mut self, bodies: &mut SlotMap<BodyId, Body>, time_scale: f64) {
        if self.body_a.is_none() && self.body_b.is_none() {
            return;
        }

        // Keep the anchors current with each body's rotation since the
        // last solve.
        if let Some(id) = self.body_a {
            if let Some(body) = bodies.get(id) {
                if !body.is_static {
                    let delta_angle = body.angle - self.angle_a;
                    self.point_a = rotate_point(self.point_a, delta_angle);
                    self.angle_a = body.angle;
                }
            }
        }
        if let Some(id) = self.body_b {
            if let Some(body) = bodies.get(id) {
                if !body.is_static {
                    let delta_angle = body.angle - self.angle_b;
                    self.point_b = rotate_point(self.point_b, delta_angle);
                    self.angle_b = body.angle;
                }
            }
        }

        let point_a_world = self
            .body_a
            .and_then(|id| bodies.get(id))
            .map_or(self.point_a, |b| b.position + self.point_a);
        let point_b_world = self
            .body_b
            .and_then(|id| bodies.get(id))
            .map_or(self.point_b, |b| b.position + self.point_b);

        let delta = point_a_world - point_b_world;
        let current_length = delta.magnitude().max(MIN_LENGTH);

        let difference = (current_length - self.length) / current_length;
        let effective_stiffness = if self.stiffness < 1.0 {
            self.stiffness * time_scale
        } else {
            self.stiffness
        };
        let force = delta * (difference * effective_stiffness);

        let inverse_mass_a = self.body_a.and_then(|id| bodies.get(id)).map_or(0.0, |b| b.inverse_mass);
        let inverse_mass_b = self.body_b.and_then(|id| bodies.get(id)).map_or(0.0, |b| b.inverse_mass);
        let mass_total = inverse_mass_a + inverse_mass_b;
        if mass_total == 0.0 {
            return;
        }

        let inverse_inertia_a = self.body_a.and_then(|id| bodies.get(id)).map_or(0.0, |b| b.inverse_inertia);
        let inverse_inertia_b = self.body_b.and_then(|id| bodies.get(id)).map_or(0.0, |b| b.inverse_inertia);
        let resistance_total = mass_total + inverse_inertia_a + inverse_inertia_b;

        let (normal, normal_velocity) = if self.damping > 0.0 {
            let normal = delta / current_length;
            let velocity_a = self
                .body_a
                .and_then(|id| bodies.get(id))
                .map_or(Vector::zero(), |b| b.position - b.position_prev);
            let velocity_b = self
                .body_b
                .and_then(|id| bodies.get(id))
                .map_or(Vector::zero(), |b| b.position - b.position_prev);
            let relative_velocity = velocity_b - velocity_a;
            (normal, normal.dot(relative_velocity))
        } else {
            (Vector::zero(), 0.0)
        };

        if let Some(id) = self.body_a {
            if let Some(body) = bodies.get_mut(id) {
                if !body.is_static {
                    let share = inverse_mass_a / mass_total;

                    body.constraint_impulse.position -= force * share;
                    body.position -= force * share;

                    if self.damping > 0.0 {
                        body.position_prev -= normal * (self.damping * normal_velocity * share);
                    }

                    let torque = (self.point_a.cross(force) / resistance_total)
                        * TORQUE_DAMPEN
                        * body.inverse_inertia
                        * (1.0 - self.angular_stiffness);
                    body.constraint_impulse.angle -= torque;
                    body.angle -= torque;
                }
            }
        }

        if let Some(id) = self.body_b {
            if let Some(body) = bodies.get_mut(id) {
                if !body.is_static {
                    let share = inverse_mass_b / mass_total;

                    body.constraint_impulse.position += force * share;
                    body.position += force * share;

                    if self.damping > 0.0 {
                        body.position_prev += normal * (self.damping * normal_velocity * share);
                    }

                    let torque = (self.point_b.cross(force) / resistance_total)
                        * TORQUE_DAMPEN
                        * body.inverse_inertia
                        * (1.0 - self.angular_stiffness);
                    body.constraint_impulse.angle += torque;
                    body.angle += torque;
                }
            }
        }
    }
}

fn rotate_point(point: Vector, angle: f64) -> Vector {
    if angle == 0.0 {
        return point;
    }
    let (sin, cos) = angle.sin_cos();
    Vector::new(point.x * cos - point.y * sin, point.x * sin + point.y * cos)
}

/// Apply each body's warm-started `constraint_impulse` as a raw
/// position/angle offset before solving. Static bodies and bodies
/// with no accumulated impulse are skipped.
pub fn pre_solve_all(bodies: &mut SlotMap<BodyId, Body>, body_ids: &[BodyId]) {
    for &id in body_ids {
        if let Some(body) = bodies.get_mut(id) {
            if body.is_static {
                continue;
            }
            let impulse = body.constraint_impulse;
            if impulse.position != Vector::zero() {
                body.position += impulse.position;
            }
            if impulse.angle != 0.0 {
                body.angle += impulse.angle;
            }
        }
    }
}

/// Solve every constraint in `constraint_ids`, `iterations` times,
/// with constraints touching a fixed endpoint (a world anchor or a
/// static body) solved before free-free constraints each pass.
pub fn solve_all(
    bodies: &mut SlotMap<BodyId, Body>,
    constraints: &mut SlotMap<ConstraintId, Constraint>,
    constraint_ids: &[ConstraintId],
    time_scale: f64,
    iterations: u32,
) {
    let mut fixed = Vec::new();
    let mut free = Vec::new();
    for &id in constraint_ids {
        if let Some(constraint) = constraints.get(id) {
            if constraint.is_fixed(bodies) {
                fixed.push(id);
            } else {
                free.push(id);
            }
        }
    }

    for _ in 0..iterations {
        for &id in &fixed {
            if let Some(constraint) = constraints.get_mut(id) {
                constraint.solve(bodies, time_scale);
            }
        }
        for &id in &free {
            if let Some(constraint) = constraints.get_mut(id) {
                constraint.solve(bodies, time_scale);
            }
        }
    }
}

/// Commit each body's accumulated `constraint_impulse` into its real
/// pose (translating/rotating its vertices/bounds), wake it if the
/// impulse moved it, and decay the impulse by [`WARMING`] for next
/// step's warm start.
pub fn post_solve_all(bodies: &mut SlotMap<BodyId, Body>, body_ids: &[BodyId], events: &mut EventBus, timestamp: f64) {
    for &id in body_ids {
        let Some(body) = bodies.get_mut(id) else { continue };
        let impulse = body.constraint_impulse;

        let moved = impulse.position != Vector::zero() || impulse.angle != 0.0;

        if impulse.position != Vector::zero() {
            let target = body.position + impulse.position;
            body.set_position(target, false);
        }
        if impulse.angle != 0.0 {
            let target = body.angle + impulse.angle;
            body.set_angle(target, false);
        }

        if moved {
            let was_sleeping = body.is_sleeping;
            body.set_sleeping(false);
            if was_sleeping {
                events.emit(Event::SleepEnd { timestamp, body: id });
            }
        }

        body.constraint_impulse.position *= WARMING;
        body.constraint_impulse.angle *= WARMING;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BodyConfig;
    use crate::geometry::Vector;

    fn make_body(bodies: &mut SlotMap<BodyId, Body>, position: Vector, is_static: bool) -> BodyId {
        let config = BodyConfig {
            density: 1.0,
            is_static,
            ..BodyConfig::default()
        };
        let vertices = vec![
            Vector::new(-5.0, -5.0),
            Vector::new(5.0, -5.0),
            Vector::new(5.0, 5.0),
            Vector::new(-5.0, 5.0),
        ];
        let body = Body::create(bodies.len() as u64 + 1, position, 0.0, vertices, config).unwrap();
        bodies.insert(body)
    }

    #[test]
    fn solve_pulls_two_free_bodies_toward_rest_length() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let a = make_body(&mut bodies, Vector::new(0.0, 0.0), false);
        let b = make_body(&mut bodies, Vector::new(200.0, 0.0), false);

        let mut constraints: SlotMap<ConstraintId, Constraint> = SlotMap::default();
        let constraint = Constraint::create(
            &bodies,
            Some(a),
            Some(b),
            Vector::zero(),
            Vector::zero(),
            Some(100.0),
            ConstraintConfig {
                stiffness: 1.0,
                ..ConstraintConfig::default()
            },
        );
        let constraint_id = constraints.insert(constraint);

        let initial_distance = (bodies[b].position - bodies[a].position).magnitude();
        solve_all(&mut bodies, &mut constraints, &[constraint_id], 1.0, 10);
        let final_distance = (bodies[b].position - bodies[a].position).magnitude();

        assert!((final_distance - 100.0).abs() < (initial_distance - 100.0).abs());
    }

    #[test]
    fn solve_is_a_no_op_with_no_bodies() {
        let bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let mut constraints: SlotMap<ConstraintId, Constraint> = SlotMap::default();
        let constraint = Constraint::create(
            &bodies,
            None,
            None,
            Vector::new(0.0, 0.0),
            Vector::new(10.0, 0.0),
            None,
            ConstraintConfig::default(),
        );
        let id = constraints.insert(constraint);

        let mut bodies = bodies;
        solve_all(&mut bodies, &mut constraints, &[id], 1.0, 2);
        // No panic, nothing to assert beyond "doesn't crash".
    }

    #[test]
    fn length_is_clamped_to_min_length() {
        let bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let constraint = Constraint::create(
            &bodies,
            None,
            None,
            Vector::zero(),
            Vector::zero(),
            None,
            ConstraintConfig::default(),
        );
        assert_eq!(constraint.length, MIN_LENGTH);
    }
}
