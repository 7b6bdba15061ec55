//! Position (penetration) and velocity (impulse + friction) solvers.
//!
//! Grounded on `constraint.rs`'s iterated Gauss-Seidel shape (pre-solve
//! warm-start, N solve passes, post-solve decay), generalized from a
//! single-constraint projection to the per-contact manifold resolution
//! of §4.11. Runs after the pair cache, once per step for position and
//! once for velocity.

use slotmap::SlotMap;

use crate::body::Body;
use crate::geometry::VectorExt;
use crate::id::BodyId;
use crate::pair::Pair;

/// Matter.js `Resolver._positionDampen`.
const POSITION_DAMPEN: f64 = 0.9;
/// Matter.js `Resolver._positionWarming`.
const POSITION_WARMING: f64 = 0.8;
/// Matter.js `Resolver._frictionNormalMultiplier`.
const FRICTION_NORMAL_MULTIPLIER: f64 = 5.0;
/// Matter.js `Resolver._restingThresh`.
const RESTING_THRESH: f64 = 4.0;
/// Matter.js `Resolver._restingThreshTangent`.
const RESTING_THRESH_TANGENT: f64 = 6.0;

/// §4.11 `preSolvePosition`: tally active-contact counts onto both
/// parent bodies so `solvePosition` can divide the impulse share.
pub fn pre_solve_position(bodies: &mut SlotMap<BodyId, Body>, pairs: &[&Pair]) {
    for body in bodies.values_mut() {
        body.total_contacts = 0;
    }
    for pair in pairs {
        if !pair.is_active {
            continue;
        }
        let count = pair.active_contacts.len() as u32;
        if let Some(body) = bodies.get_mut(pair.body_a) {
            body.total_contacts += count;
        }
        if let Some(body) = bodies.get_mut(pair.body_b) {
            body.total_contacts += count;
        }
    }
}

/// §4.11 `solvePosition`, run `iterations` times.
pub fn solve_position(bodies: &mut SlotMap<BodyId, Body>, pairs: &mut [&mut Pair], time_scale: f64, iterations: u32) {
    puffin::profile_function!();
    for _ in 0..iterations {
        for pair in pairs.iter_mut() {
            if !pair.is_active || pair.is_sensor {
                continue;
            }
            let Some(a) = bodies.get(pair.body_a) else { continue };
            let Some(b) = bodies.get(pair.body_b) else { continue };

            let normal = pair.collision.normal;
            let position_b = b.position + b.position_impulse - pair.collision.penetration;
            let position_a = a.position + a.position_impulse;
            pair.separation = normal.dot(position_b - position_a);
        }

        for pair in pairs.iter_mut() {
            if !pair.is_active || pair.is_sensor {
                continue;
            }
            let (a_static, b_static, a_contacts, b_contacts) = {
                let Some(a) = bodies.get(pair.body_a) else { continue };
                let Some(b) = bodies.get(pair.body_b) else { continue };
                (a.is_static, b.is_static, a.total_contacts.max(1), b.total_contacts.max(1))
            };

            let mut impulse = (pair.separation - pair.slop) * time_scale;
            if a_static || b_static {
                impulse *= 2.0;
            }
            if impulse < 0.0 {
                continue;
            }

            let normal = pair.collision.normal;

            if let Some(a) = bodies.get_mut(pair.body_a) {
                if !a.is_static {
                    a.position_impulse -= normal * (impulse * POSITION_DAMPEN / a_contacts as f64);
                }
            }
            if let Some(b) = bodies.get_mut(pair.body_b) {
                if !b.is_static {
                    b.position_impulse += normal * (impulse * POSITION_DAMPEN / b_contacts as f64);
                }
            }
        }
    }
}

/// §4.11 `postSolvePosition`: commit each body's accumulated
/// `position_impulse` into its actual pose, then decay or clear it.
pub fn post_solve_position(bodies: &mut SlotMap<BodyId, Body>, body_ids: &[BodyId]) {
    for &id in body_ids {
        let Some(body) = bodies.get_mut(id) else { continue };
        if body.is_static {
            continue;
        }

        let impulse = body.position_impulse;
        if impulse.x == 0.0 && impulse.y == 0.0 {
            continue;
        }

        body.translate_for_resolver(impulse);
        body.position_prev += impulse;

        if impulse.dot(body.velocity) < 0.0 {
            body.position_impulse = crate::geometry::Vector::zero();
        } else {
            body.position_impulse *= POSITION_WARMING;
        }
    }
}

/// §4.11 `preSolveVelocity`: apply each contact's cached impulse as a
/// `position_prev`/`angle_prev` perturbation, warm-starting the
/// velocity solve the same way `constraint::pre_solve_all` warm-starts
/// constraint impulses.
pub fn pre_solve_velocity(bodies: &mut SlotMap<BodyId, Body>, pairs: &[&Pair]) {
    for pair in pairs {
        if !pair.is_active || pair.is_sensor {
            continue;
        }
        let normal = pair.collision.normal;
        let tangent = pair.collision.tangent;

        for contact in &pair.collision.supports {
            let Some(persisted) = pair.contacts.get(&contact.vertex_id) else { continue };
            if persisted.normal_impulse == 0.0 && persisted.tangent_impulse == 0.0 {
                continue;
            }
            let impulse = normal * persisted.normal_impulse + tangent * persisted.tangent_impulse;

            apply_velocity_delta(bodies, pair.body_a, contact.point, -impulse);
            apply_velocity_delta(bodies, pair.body_b, contact.point, impulse);
        }
    }
}

/// §4.11 `solveVelocity`, run `iterations` times.
pub fn solve_velocity(bodies: &mut SlotMap<BodyId, Body>, pairs: &mut [&mut Pair], time_scale: f64, iterations: u32) {
    puffin::profile_function!();
    for _ in 0..iterations {
        for pair in pairs.iter_mut() {
            if !pair.is_active || pair.is_sensor {
                continue;
            }

            let normal = pair.collision.normal;
            let tangent = pair.collision.tangent;
            let contact_count = pair.active_contacts.len().max(1) as f64;

            for contact in pair.collision.supports.iter() {
                let Some(a) = bodies.get(pair.body_a) else { continue };
                let Some(b) = bodies.get(pair.body_b) else { continue };

                let velocity_a = a.position - a.position_prev;
                let angular_velocity_a = a.angle - a.angle_prev;
                let velocity_b = b.position - b.position_prev;
                let angular_velocity_b = b.angle - b.angle_prev;

                let offset_a = contact.point - a.position;
                let offset_b = contact.point - b.position;

                let relative_velocity = (velocity_b + offset_b.perp() * angular_velocity_b)
                    - (velocity_a + offset_a.perp() * angular_velocity_a);

                let v_n = normal.dot(relative_velocity);
                let v_t = tangent.dot(relative_velocity);

                let normal_cross_a = offset_a.cross(normal);
                let normal_cross_b = offset_b.cross(normal);
                let share = (1.0 / contact_count)
                    * (a.inverse_mass
                        + b.inverse_mass
                        + a.inverse_inertia * normal_cross_a * normal_cross_a
                        + b.inverse_inertia * normal_cross_b * normal_cross_b);
                if share <= 0.0 {
                    continue;
                }

                let nf = (pair.separation + v_n).clamp(0.0, 1.0) * FRICTION_NORMAL_MULTIPLIER;
                let max_friction = if v_t.abs() > pair.friction * pair.friction_static * nf * time_scale * time_scale {
                    pair.friction * v_t.signum() * time_scale * time_scale
                } else {
                    v_t
                };

                let persisted = pair.contacts.entry(contact.vertex_id).or_default();

                let (normal_impulse, tangent_impulse);
                if v_n < 0.0 && v_n * v_n > RESTING_THRESH * time_scale * time_scale {
                    normal_impulse = -persisted.normal_impulse;
                    persisted.normal_impulse = 0.0;
                } else {
                    let jn = (1.0 + pair.restitution) * v_n / share;
                    let previous = persisted.normal_impulse;
                    let new_total = (previous + jn).min(0.0);
                    normal_impulse = new_total - previous;
                    persisted.normal_impulse = new_total;
                }

                if v_t * v_t > RESTING_THRESH_TANGENT * time_scale * time_scale {
                    tangent_impulse = -persisted.tangent_impulse;
                    persisted.tangent_impulse = 0.0;
                } else {
                    let jt = max_friction.clamp(-v_t.abs(), v_t.abs()) / share;
                    let previous = persisted.tangent_impulse;
                    let bound = pair.friction * pair.friction_static * nf;
                    let new_total = (previous + jt).clamp(-bound, bound);
                    tangent_impulse = new_total - previous;
                    persisted.tangent_impulse = new_total;
                }

                let delta = normal * normal_impulse + tangent * tangent_impulse;
                apply_velocity_delta(bodies, pair.body_a, contact.point, -delta);
                apply_velocity_delta(bodies, pair.body_b, contact.point, delta);
            }
        }
    }
}

fn apply_velocity_delta(bodies: &mut SlotMap<BodyId, Body>, id: BodyId, point: crate::geometry::Vector, delta: crate::geometry::Vector) {
    let Some(body) = bodies.get_mut(id) else { return };
    if body.is_static {
        return;
    }
    let offset = point - body.position;
    body.position_prev -= delta * body.inverse_mass;
    body.angle_prev -= offset.cross(delta) * body.inverse_inertia;
}
