//! Rigid body: a convex polygon (or compound of several) with mass
//! properties, integrated via Time-Corrected Verlet.
//!
//! Pose, velocity, and mass-setter invariants
//! (`set_mass`/`set_density`/`set_inertia`) live on [`Body`] itself;
//! compound aggregation ([`set_parts`]) lives alongside it as a free
//! function since it needs simultaneous access to every sibling part
//! in the arena.

pub mod factory;

use slotmap::SlotMap;

use crate::config::BodyConfig;
use crate::error::{EngineError, Result};
use crate::geometry::{vertices, Axes, Bounds, Vector, VectorExt};
use crate::id::BodyId;

/// Scales polygon second-moment-of-area up to a body's inertia.
pub const INERTIA_SCALE: f64 = 4.0;

/// A body's accumulated constraint correction, applied as a raw
/// position/angle offset at `postSolveAll` and warm-started (scaled
/// by [`crate::constraint::WARMING`]) into the next step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConstraintImpulse {
    /// Linear component.
    pub position: Vector,
    /// Angular component, radians.
    pub angle: f64,
}

/// A body's last-known broadphase grid footprint, in cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start_col: i32,
    pub end_col: i32,
    pub start_row: i32,
    pub end_row: i32,
}

/// Dynamic-body properties stashed by [`Body::set_static`] so they can
/// be restored when a body is made dynamic again.
#[derive(Debug, Clone)]
struct OriginalMass {
    restitution: f64,
    friction: f64,
    mass: f64,
    inertia: f64,
    density: f64,
    inverse_mass: f64,
    inverse_inertia: f64,
}

#[derive(Debug, Clone)]
pub struct Body {
    /// Monotonic id assigned by the owning engine at creation; used to
    /// canonicalize pair ordering (`bodyA.id < bodyB.id`).
    pub id: u64,
    pub label: String,

    pub position: Vector,
    pub angle: f64,
    pub position_prev: Vector,
    pub angle_prev: f64,

    pub velocity: Vector,
    pub angular_velocity: f64,
    pub speed: f64,
    pub angular_speed: f64,
    /// Biased EMA of `speed^2 + angular_speed^2`, maintained by `sleeping`.
    pub motion: f64,

    pub force: Vector,
    pub torque: f64,

    pub density: f64,
    pub mass: f64,
    pub inverse_mass: f64,
    pub inertia: f64,
    pub inverse_inertia: f64,
    pub restitution: f64,
    pub friction: f64,
    pub friction_static: f64,
    pub friction_air: f64,

    /// World-space, clockwise-wound.
    pub vertices: Vec<Vector>,
    pub axes: Axes,
    pub bounds: Bounds,
    /// Set only for bodies created via [`factory::circle`]; narrowphase
    /// still treats the body as its polygon approximation.
    pub circle_radius: Option<f64>,

    /// Other parts of this compound, not including self. `None` parent
    /// means this body is itself the compound root.
    pub sub_parts: Vec<BodyId>,
    pub parent: Option<BodyId>,

    pub collision_category: u32,
    pub collision_mask: u32,
    pub collision_group: i32,

    pub is_static: bool,
    pub is_sensor: bool,
    pub is_sleeping: bool,
    pub sleep_threshold: u32,
    pub sleep_counter: u32,
    pub total_contacts: u32,

    pub position_impulse: Vector,
    pub constraint_impulse: ConstraintImpulse,

    pub region: Option<Region>,

    /// Per-body multiplier on the integrator's effective delta.
    pub time_scale: f64,

    original: Option<OriginalMass>,
}

impl Body {
    /// Build a body from a raw polygon (world-space vertex positions
    /// relative to its own area, not yet centered or placed).
    ///
    /// The vertex ring is centered on its own centroid, mass/inertia
    /// are derived from that centered ring, then the ring is rotated
    /// by `angle` and translated to `position`.
    pub fn create(
        id: u64,
        position: Vector,
        angle: f64,
        mut local_vertices: Vec<Vector>,
        config: BodyConfig,
    ) -> Result<Self> {
        if local_vertices.len() < 3 {
            return Err(EngineError::InvalidGeometry {
                reason: "fewer than 3 vertices".to_string(),
            });
        }
        if local_vertices
            .iter()
            .any(|v| !v.x.is_finite() || !v.y.is_finite())
        {
            return Err(EngineError::InvalidGeometry {
                reason: "non-finite vertex coordinate".to_string(),
            });
        }

        let area = vertices::area(&local_vertices, false);
        if area.abs() < f64::EPSILON {
            return Err(EngineError::InvalidGeometry {
                reason: "zero-area polygon".to_string(),
            });
        }

        let centre = vertices::centre(&local_vertices);
        vertices::translate(&mut local_vertices, -centre);

        let mut axes = Axes::from_vertices(&local_vertices);

        let mass = config.density * area;
        let inertia = INERTIA_SCALE * vertices::inertia(&local_vertices, mass);

        if angle != 0.0 {
            vertices::rotate(&mut local_vertices, angle, Vector::zero());
            axes.rotate(angle);
        }
        vertices::translate(&mut local_vertices, position);

        let mut bounds = Bounds::empty();
        bounds.update(&local_vertices, None);

        let mut body = Self {
            id,
            label: "Body".to_string(),
            position,
            angle,
            position_prev: position,
            angle_prev: angle,
            velocity: Vector::zero(),
            angular_velocity: 0.0,
            speed: 0.0,
            angular_speed: 0.0,
            motion: 0.0,
            force: Vector::zero(),
            torque: 0.0,
            density: config.density,
            mass,
            inverse_mass: 1.0 / mass,
            inertia,
            inverse_inertia: 1.0 / inertia,
            restitution: config.restitution,
            friction: config.friction,
            friction_static: config.friction_static,
            friction_air: config.friction_air,
            vertices: local_vertices,
            axes,
            bounds,
            circle_radius: None,
            sub_parts: Vec::new(),
            parent: None,
            collision_category: config.collision_category,
            collision_mask: config.collision_mask,
            collision_group: config.collision_group,
            is_static: false,
            is_sensor: config.is_sensor,
            is_sleeping: false,
            sleep_threshold: config.sleep_threshold,
            sleep_counter: 0,
            total_contacts: 0,
            position_impulse: Vector::zero(),
            constraint_impulse: ConstraintImpulse::default(),
            region: None,
            time_scale: config.time_scale,
            original: None,
        };

        if config.is_static {
            body.set_static(true);
        }

        Ok(body)
    }

    /// `true` once every polygon has been replaced by a single point
    /// mass and no vertex information remains; never true in practice
    /// since `create` rejects sub-3-vertex input, kept only because
    /// callers sometimes check it before indexing `vertices[0]`.
    pub fn has_vertices(&self) -> bool {
        !self.vertices.is_empty()
    }

    /// `inertia / (mass / 6)`, held invariant across mass changes by
    /// [`set_mass`](Self::set_mass) / [`set_density`](Self::set_density).
    fn inertia_ratio(&self) -> f64 {
        self.inertia / (self.mass / 6.0)
    }

    /// Set mass directly, rescaling inertia to preserve its ratio to
    /// `mass / 6`.
    pub fn set_mass(&mut self, mass: f64) {
        let ratio = self.inertia_ratio();
        self.inertia = ratio * (mass / 6.0);
        self.inverse_inertia = 1.0 / self.inertia;

        self.mass = mass;
        self.inverse_mass = 1.0 / mass;
        self.density = self.mass / self.area();
    }

    /// Set density, deriving mass from the body's current area.
    pub fn set_density(&mut self, density: f64) {
        self.set_mass(density * self.area());
        self.density = density;
    }

    /// Set inertia directly, independent of mass.
    pub fn set_inertia(&mut self, inertia: f64) {
        self.inertia = inertia;
        self.inverse_inertia = 1.0 / self.inertia;
    }

    /// Polygon area of this body's own vertex ring (not including
    /// compound siblings).
    pub fn area(&self) -> f64 {
        vertices::area(&self.vertices, false)
    }

    /// Replace this body's vertex ring, recentering it on its own
    /// centroid and recomputing area/mass/inertia/axes/bounds, then
    /// re-placing it at the body's current `position`.
    pub fn set_vertices(&mut self, mut new_vertices: Vec<Vector>) {
        self.axes = Axes::from_vertices(&new_vertices);
        let area = vertices::area(&new_vertices, false);
        self.set_mass(self.density * area);

        let centre = vertices::centre(&new_vertices);
        vertices::translate(&mut new_vertices, -centre);

        self.set_inertia(INERTIA_SCALE * vertices::inertia(&new_vertices, self.mass));

        vertices::translate(&mut new_vertices, self.position);
        self.bounds.update(&new_vertices, Some(self.velocity));
        self.vertices = new_vertices;
    }

    /// Freeze (`true`) or unfreeze (`false`) this body.
    ///
    /// Freezing stashes the dynamic mass properties into `_original`
    /// and sets the values that make integration a no-op (infinite
    /// mass/inertia, zero inverse counterparts); it also zeroes
    /// velocities and resets `restitution`/`friction` to fixed static
    /// defaults. Unfreezing restores the stash.
    pub fn set_static(&mut self, is_static: bool) {
        if is_static == self.is_static {
            return;
        }

        if is_static {
            self.original = Some(OriginalMass {
                restitution: self.restitution,
                friction: self.friction,
                mass: self.mass,
                inertia: self.inertia,
                density: self.density,
                inverse_mass: self.inverse_mass,
                inverse_inertia: self.inverse_inertia,
            });

            self.restitution = 0.0;
            self.friction = 1.0;
            self.mass = f64::INFINITY;
            self.inertia = f64::INFINITY;
            self.density = f64::INFINITY;
            self.inverse_mass = 0.0;
            self.inverse_inertia = 0.0;

            self.velocity = Vector::zero();
            self.angular_velocity = 0.0;
            self.position_prev = self.position;
            self.angle_prev = self.angle;
        } else if let Some(original) = self.original.take() {
            self.restitution = original.restitution;
            self.friction = original.friction;
            self.mass = original.mass;
            self.inertia = original.inertia;
            self.density = original.density;
            self.inverse_mass = original.inverse_mass;
            self.inverse_inertia = original.inverse_inertia;
        }

        self.is_static = is_static;
    }

    /// Reposition this body, optionally deriving `velocity` from the
    /// jump instead of preserving it.
    pub fn set_position(&mut self, position: Vector, update_velocity: bool) {
        let delta = position - self.position;

        if update_velocity {
            self.position_prev = self.position;
            self.velocity = delta;
            self.speed = self.velocity.magnitude();
        } else {
            self.position_prev += delta;
        }

        self.position = position;
        self.translate_own_geometry(delta);
    }

    /// Reorient this body, optionally deriving `angular_velocity` from
    /// the jump instead of preserving it.
    pub fn set_angle(&mut self, angle: f64, update_velocity: bool) {
        let delta = angle - self.angle;

        if update_velocity {
            self.angle_prev = self.angle;
            self.angular_velocity = delta;
            self.angular_speed = self.angular_velocity.abs();
        } else {
            self.angle_prev += delta;
        }

        self.angle = angle;
        self.rotate_own_geometry(delta, self.position);
    }

    pub fn set_velocity(&mut self, velocity: Vector) {
        self.position_prev = self.position - velocity;
        self.velocity = velocity;
        self.speed = velocity.magnitude();
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: f64) {
        self.angle_prev = self.angle - angular_velocity;
        self.angular_velocity = angular_velocity;
        self.angular_speed = angular_velocity.abs();
    }

    /// Move this body's centroid without touching `position_prev`
    /// (hence without implying a velocity), used when recentring a
    /// compound's root onto its aggregate centroid. Translates
    /// `vertices`/`bounds` by the same delta so they stay placed at the
    /// new `position`.
    pub fn set_centre(&mut self, centre: Vector, relative: bool) {
        let delta = if relative { centre } else { centre - self.position };

        self.position += delta;
        self.position_prev += delta;
        self.translate_own_geometry(delta);
    }

    /// Toggle sleeping, independent of the sleeping controller's
    /// thresholds; zeroes velocities and resets the motion EMA.
    pub fn set_sleeping(&mut self, is_sleeping: bool) {
        self.is_sleeping = is_sleeping;
        if is_sleeping {
            self.sleep_counter = self.sleep_threshold;
            self.position_prev = self.position;
            self.angle_prev = self.angle;
            self.velocity = Vector::zero();
            self.angular_velocity = 0.0;
            self.motion = 0.0;
        } else {
            self.sleep_counter = 0;
        }
    }

    /// Add a linear force and the torque it induces at `position`
    /// (world-space point of application).
    pub fn apply_force(&mut self, position: Vector, force: Vector) {
        self.force += force;
        let offset = position - self.position;
        self.torque += offset.cross(force);
    }

    /// Time-Corrected Verlet integration of this body's own pose.
    /// Static and sleeping bodies are untouched.
    ///
    /// Does not propagate to compound sub-parts: that needs mutable
    /// access to sibling bodies in the arena and lives in
    /// `crate::engine` instead.
    pub fn update(&mut self, delta: f64, time_scale: f64, correction: f64) {
        if self.is_static || self.is_sleeping {
            return;
        }

        let dt = delta * time_scale * self.time_scale;
        let dts = dt * dt;
        let damp = 1.0 - self.friction_air * time_scale * self.time_scale;

        let velocity_prev = self.position - self.position_prev;
        self.velocity = velocity_prev * damp * correction + (self.force * self.inverse_mass) * dts;

        self.position_prev = self.position;
        self.position += self.velocity;

        let angular_velocity_prev = self.angle - self.angle_prev;
        self.angular_velocity =
            angular_velocity_prev * damp * correction + (self.torque * self.inverse_inertia) * dts;

        self.angle_prev = self.angle;
        self.angle += self.angular_velocity;

        self.speed = self.velocity.magnitude();
        self.angular_speed = self.angular_velocity.abs();

        self.translate_own_geometry(self.velocity);
        if self.angular_velocity != 0.0 {
            vertices::rotate(&mut self.vertices, self.angular_velocity, self.position);
            self.axes.rotate(self.angular_velocity);
        }
        self.bounds.update(&self.vertices, Some(self.velocity));
    }

    /// Translate position, vertices and bounds by `delta` without
    /// touching `position_prev`, so the caller can advance it by a
    /// different amount (or not at all). Used by the resolver to
    /// commit `position_impulse` while leaving velocity derivation
    /// (`position - position_prev`) to the caller's own bookkeeping.
    pub fn translate_for_resolver(&mut self, delta: Vector) {
        self.position += delta;
        self.translate_own_geometry(delta);
    }

    /// Translate this body's own vertices and bounds by `delta`
    /// (`position` has already been updated by the caller).
    fn translate_own_geometry(&mut self, delta: Vector) {
        vertices::translate(&mut self.vertices, delta);
        self.bounds.translate(delta);
    }

    /// Rotate this body's own vertices/axes/bounds by `delta` radians
    /// about `pivot`.
    fn rotate_own_geometry(&mut self, delta: f64, pivot: Vector) {
        if delta == 0.0 {
            return;
        }
        vertices::rotate(&mut self.vertices, delta, pivot);
        self.axes.rotate(delta);
        self.bounds.update(&self.vertices, Some(self.velocity));
    }

    /// Carry a compound root's per-step translation/rotation onto one
    /// of its `sub_parts`: translate by `translation`, then rotate the
    /// part's position and geometry about `pivot` (the root's new
    /// position) by `rotation` radians. Called once per sub-part from
    /// [`update_all`] right after the root integrates, since a part
    /// has no force/torque of its own to integrate from.
    fn apply_compound_delta(&mut self, translation: Vector, rotation: f64, pivot: Vector) {
        self.position += translation;
        self.translate_own_geometry(translation);

        if rotation != 0.0 {
            let offset = self.position - pivot;
            let (sin, cos) = rotation.sin_cos();
            self.position = pivot + Vector::new(offset.x * cos - offset.y * sin, offset.x * sin + offset.y * cos);
            self.rotate_own_geometry(rotation, pivot);
        }

        self.position_prev += translation;
        self.angle_prev += rotation;
        self.angle += rotation;
        self.velocity = translation;
        self.angular_velocity = rotation;
        self.speed = translation.magnitude();
        self.angular_speed = rotation.abs();
    }
}

/// Set `root`'s compound parts (replacing any it already had).
///
/// When `auto_hull` is set, `root`'s own vertices become the convex
/// hull of the union of every part's vertices. Aggregates mass, area
/// and inertia across every part with finite mass via the
/// parallel-axis theorem, and recentres `root`'s position on the
/// resulting mass-weighted centroid.
///
/// Lives outside `Body` because it needs simultaneous access to every
/// sibling part in the arena.
pub fn set_parts(
    arena: &mut SlotMap<BodyId, Body>,
    root_id: BodyId,
    parts: Vec<BodyId>,
    auto_hull: bool,
) {
    let non_root_parts: Vec<BodyId> = parts.into_iter().filter(|&id| id != root_id).collect();

    if auto_hull {
        let mut union_vertices: Vec<Vector> = Vec::new();
        if let Some(root) = arena.get(root_id) {
            union_vertices.extend(root.vertices.iter().copied());
        }
        for &part_id in &non_root_parts {
            if let Some(part) = arena.get(part_id) {
                union_vertices.extend(part.vertices.iter().copied());
            }
        }

        let hull_vertices = vertices::hull(&union_vertices);
        if let Some(root) = arena.get_mut(root_id) {
            root.set_vertices(hull_vertices);
        }
    }

    let mut total_mass = 0.0;
    let mut weighted_centre = Vector::zero();
    let mut total_inertia = 0.0;

    for &part_id in std::iter::once(&root_id).chain(non_root_parts.iter()) {
        if let Some(part) = arena.get(part_id) {
            if part.mass.is_finite() {
                total_mass += part.mass;
                weighted_centre += part.position * part.mass;
                total_inertia += part.inertia;
            }
        }
    }

    if total_mass > 0.0 {
        let centroid = weighted_centre / total_mass;
        if let Some(root) = arena.get_mut(root_id) {
            root.sub_parts = non_root_parts.clone();
            root.mass = total_mass;
            root.inverse_mass = 1.0 / total_mass;
            root.inertia = total_inertia;
            root.inverse_inertia = 1.0 / total_inertia;
            root.set_centre(centroid, false);
        }
    } else if let Some(root) = arena.get_mut(root_id) {
        root.sub_parts = non_root_parts.clone();
    }

    for &part_id in &non_root_parts {
        if let Some(part) = arena.get_mut(part_id) {
            part.parent = Some(root_id);
        }
    }
}

/// Integrate every root body in `root_ids` (simple bodies and compound
/// roots alike — never a sub-part directly, those have no force/torque
/// of their own) and carry the resulting translation/rotation onto
/// each root's `sub_parts`.
///
/// This lives here rather than on [`Body::update`] because propagating
/// to sibling arena entries needs simultaneous mutable access the
/// arena's borrow checker can't grant to a `&mut self` method.
pub fn update_all(arena: &mut SlotMap<BodyId, Body>, root_ids: &[BodyId], delta: f64, time_scale: f64, correction: f64) {
    for &root_id in root_ids {
        let sub_parts = match arena.get(root_id) {
            Some(root) => root.sub_parts.clone(),
            None => continue,
        };

        let Some(root) = arena.get_mut(root_id) else { continue };
        let was_static_or_sleeping = root.is_static || root.is_sleeping;
        root.update(delta, time_scale, correction);
        if was_static_or_sleeping || sub_parts.is_empty() {
            continue;
        }

        let (translation, rotation, pivot) = {
            let root = &arena[root_id];
            (root.velocity, root.angular_velocity, root.position)
        };

        for &part_id in &sub_parts {
            if let Some(part) = arena.get_mut(part_id) {
                part.apply_compound_delta(translation, rotation, pivot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_vertices(half: f64) -> Vec<Vector> {
        vec![
            Vector::new(-half, -half),
            Vector::new(half, -half),
            Vector::new(half, half),
            Vector::new(-half, half),
        ]
    }

    #[test]
    fn create_centers_vertices_and_derives_mass_from_density() {
        let config = BodyConfig {
            density: 1.0,
            ..BodyConfig::default()
        };
        let body = Body::create(1, Vector::new(50.0, 50.0), 0.0, box_vertices(5.0), config).unwrap();

        assert!((body.mass - 100.0).abs() < 1e-9);
        assert!((body.inverse_mass - 0.01).abs() < 1e-9);
        assert!((body.position.x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn set_static_zeroes_inverse_mass_and_restores_on_unfreeze() {
        let config = BodyConfig {
            density: 1.0,
            ..BodyConfig::default()
        };
        let mut body = Body::create(1, Vector::zero(), 0.0, box_vertices(5.0), config).unwrap();
        let original_mass = body.mass;

        body.set_static(true);
        assert_eq!(body.inverse_mass, 0.0);
        assert_eq!(body.friction, 1.0);

        body.set_static(false);
        assert!((body.mass - original_mass).abs() < 1e-9);
    }

    #[test]
    fn set_mass_preserves_inertia_to_mass_ratio() {
        let config = BodyConfig {
            density: 1.0,
            ..BodyConfig::default()
        };
        let mut body = Body::create(1, Vector::zero(), 0.0, box_vertices(5.0), config).unwrap();
        let ratio_before = body.inertia_ratio();

        body.set_mass(50.0);

        assert!((body.inertia_ratio() - ratio_before).abs() < 1e-6);
    }

    #[test]
    fn update_leaves_static_bodies_untouched() {
        let config = BodyConfig {
            density: 1.0,
            is_static: true,
            ..BodyConfig::default()
        };
        let mut body = Body::create(1, Vector::new(10.0, 10.0), 0.0, box_vertices(5.0), config).unwrap();
        body.force = Vector::new(0.0, 1000.0);

        body.update(16.0, 1.0, 1.0);

        assert_eq!(body.position, Vector::new(10.0, 10.0));
    }

    #[test]
    fn update_under_gravity_like_force_moves_body_downward() {
        let config = BodyConfig {
            density: 1.0,
            friction_air: 0.0,
            ..BodyConfig::default()
        };
        let mut body = Body::create(1, Vector::new(0.0, 0.0), 0.0, box_vertices(5.0), config).unwrap();
        body.force = Vector::new(0.0, body.mass * 0.001);

        for _ in 0..10 {
            body.update(16.666, 1.0, 1.0);
        }

        assert!(body.position.y > 0.0);
    }

    #[test]
    fn apply_force_off_centre_induces_torque() {
        let config = BodyConfig {
            density: 1.0,
            ..BodyConfig::default()
        };
        let mut body = Body::create(1, Vector::new(0.0, 0.0), 0.0, box_vertices(5.0), config).unwrap();
        body.apply_force(Vector::new(5.0, 0.0), Vector::new(0.0, 1.0));

        assert!(body.torque.abs() > 0.0);
    }
}
