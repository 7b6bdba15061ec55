//! Separating Axis Theorem narrowphase.
//!
//! Tests convex polygons (and each convex part of a compound body)
//! pairwise for overlap on every candidate edge-normal axis, reusing
//! the last step's separating axis while a pair's combined motion is
//! low, and builds a support-point contact manifold for the resolver.

use std::collections::HashMap;

use arrayvec::ArrayVec;
use slotmap::SlotMap;

use crate::body::Body;
use crate::geometry::{vertices, Vector, VectorExt};
use crate::id::BodyId;

/// Below this combined linear+angular speed (squared), a pair's
/// cached separating axis is trusted without a full re-scan.
const MOTION_COHERENCE_THRESHOLD: f64 = 3.0;

/// One resolved contact point on the collision manifold.
///
/// `vertex_id` identifies the supporting vertex within its owning
/// body's ring, stable from step to step as long as the body's
/// vertex count doesn't change; the pair cache uses it to carry
/// `normal_impulse`/`tangent_impulse` across steps for warm-starting.
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    pub point: Vector<f64>,
    pub vertex_id: usize,
}

/// A detected (or rejected) collision between two convex parts.
#[derive(Debug, Clone)]
pub struct Collision {
    /// The colliding part on the "A" side (a compound's sub-part, or
    /// the body itself if it has none).
    pub body_a: BodyId,
    /// The colliding part on the "B" side.
    pub body_b: BodyId,
    /// The root body that owns `body_a` (equals `body_a` if simple).
    pub parent_a: BodyId,
    /// The root body that owns `body_b` (equals `body_b` if simple).
    pub parent_b: BodyId,
    pub collided: bool,
    pub depth: f64,
    /// Unit vector pointing from A's side toward B's side.
    pub normal: Vector<f64>,
    pub tangent: Vector<f64>,
    /// `normal * depth`.
    pub penetration: Vector<f64>,
    /// Which part contributed the separating axis.
    pub axis_body: BodyId,
    pub axis_number: usize,
    pub supports: ArrayVec<Contact, 2>,
}

/// Persistent per-part-pair state the detector keeps between steps:
/// the last separating axis used, for coherence reuse. Keyed by the
/// exact `(a, b)` part-id tuple as encountered during iteration
/// (stable run to run since both the pair order from the broadphase
/// and each body's `sub_parts` order are stable).
#[derive(Default)]
pub struct Detector {
    coherence: HashMap<(BodyId, BodyId), (BodyId, usize)>,
}

impl Detector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run narrowphase over every broadphase pair, expanding compound
    /// bodies into their convex parts and testing each part-pair.
    /// Pairs rejected by the collision filter, or where both bodies
    /// are static/sleeping, are skipped entirely (not even an
    /// uncollided [`Collision`] is emitted for them).
    pub fn collisions(
        &mut self,
        bodies: &SlotMap<BodyId, Body>,
        broad_pairs: &[(BodyId, BodyId)],
    ) -> Vec<Collision> {
        puffin::profile_function!();
        let mut out = Vec::new();

        for &(root_a, root_b) in broad_pairs {
            let (Some(a), Some(b)) = (bodies.get(root_a), bodies.get(root_b)) else {
                continue;
            };

            if a.is_static && b.is_static {
                continue;
            }
            if a.is_sleeping && b.is_sleeping {
                continue;
            }
            if !filters_allow(a, b) {
                continue;
            }
            if !a.bounds.overlaps(&b.bounds) {
                continue;
            }

            let parts_a = collidable_parts(root_a, a);
            let parts_b = collidable_parts(root_b, b);

            for &part_a in &parts_a {
                for &part_b in &parts_b {
                    if let Some(collision) =
                        self.sat_collide(part_a, part_b, root_a, root_b, bodies)
                    {
                        out.push(collision);
                    }
                }
            }
        }

        out
    }

    fn sat_collide(
        &mut self,
        a_id: BodyId,
        b_id: BodyId,
        parent_a: BodyId,
        parent_b: BodyId,
        bodies: &SlotMap<BodyId, Body>,
    ) -> Option<Collision> {
        let a = bodies.get(a_id)?;
        let b = bodies.get(b_id)?;

        if !a.bounds.overlaps(&b.bounds) {
            self.coherence.remove(&(a_id, b_id));
            return None;
        }

        let combined_motion =
            a.speed * a.speed + a.angular_speed * a.angular_speed + b.speed * b.speed + b.angular_speed * b.angular_speed;

        if combined_motion < MOTION_COHERENCE_THRESHOLD {
            if let Some(&(axis_body_id, axis_index)) = self.coherence.get(&(a_id, b_id)) {
                let axes = if axis_body_id == a_id { &a.axes.normals } else { &b.axes.normals };
                if let Some(&axis) = axes.get(axis_index) {
                    let (min_a, max_a) = project_to_axis(&a.vertices, axis);
                    let (min_b, max_b) = project_to_axis(&b.vertices, axis);
                    let overlap = max_a.min(max_b) - min_a.max(min_b);
                    if overlap > 0.0 {
                        return Some(build_collision(
                            a_id, b_id, parent_a, parent_b, a, b, overlap, axis, axis_body_id, axis_index,
                        ));
                    }
                }
            }
        }

        let ab = overlap_axes(&a.vertices, &b.vertices, &a.axes.normals);
        let ba = overlap_axes(&b.vertices, &a.vertices, &b.axes.normals);

        let (overlap_ab, index_ab) = ab?;
        let (overlap_ba, index_ba) = ba?;

        let (min_overlap, axis, axis_body_id, axis_index) = if overlap_ab <= overlap_ba {
            (overlap_ab, a.axes.normals[index_ab], a_id, index_ab)
        } else {
            (overlap_ba, b.axes.normals[index_ba], b_id, index_ba)
        };

        self.coherence.insert((a_id, b_id), (axis_body_id, axis_index));

        Some(build_collision(
            a_id, b_id, parent_a, parent_b, a, b, min_overlap, axis, axis_body_id, axis_index,
        ))
    }
}

/// The set of parts to run narrowphase tests against: a compound's
/// own synthetic hull never participates directly, only its
/// `sub_parts`; a simple body tests as itself.
fn collidable_parts(id: BodyId, body: &Body) -> Vec<BodyId> {
    if body.sub_parts.is_empty() {
        vec![id]
    } else {
        body.sub_parts.clone()
    }
}

fn filters_allow(a: &Body, b: &Body) -> bool {
    if a.collision_group != 0 && a.collision_group == b.collision_group {
        return a.collision_group > 0;
    }
    (a.collision_category & b.collision_mask) != 0 && (b.collision_category & a.collision_mask) != 0
}

fn project_to_axis(verts: &[Vector<f64>], axis: Vector<f64>) -> (f64, f64) {
    let mut min = axis.dot(verts[0]);
    let mut max = min;
    for &v in &verts[1..] {
        let p = axis.dot(v);
        if p < min {
            min = p;
        }
        if p > max {
            max = p;
        }
    }
    (min, max)
}

/// Minimum overlap (and its axis index) across `axes`, or `None` the
/// moment any axis separates the two polygons.
fn overlap_axes(verts_a: &[Vector<f64>], verts_b: &[Vector<f64>], axes: &[Vector<f64>]) -> Option<(f64, usize)> {
    let mut min_overlap = f64::INFINITY;
    let mut min_index = 0;

    for (i, &axis) in axes.iter().enumerate() {
        let (min_a, max_a) = project_to_axis(verts_a, axis);
        let (min_b, max_b) = project_to_axis(verts_b, axis);
        let overlap = max_a.min(max_b) - min_a.max(min_b);
        if overlap <= 0.0 {
            return None;
        }
        if overlap < min_overlap {
            min_overlap = overlap;
            min_index = i;
        }
    }

    Some((min_overlap, min_index))
}

#[allow(clippy::too_many_arguments)]
fn build_collision(
    a_id: BodyId,
    b_id: BodyId,
    parent_a: BodyId,
    parent_b: BodyId,
    a: &Body,
    b: &Body,
    depth: f64,
    axis: Vector<f64>,
    axis_body_id: BodyId,
    axis_number: usize,
) -> Collision {
    let normal = if axis.dot(b.position - a.position) < 0.0 { -axis } else { axis };
    let tangent = normal.perp();

    let supports = find_manifold(a, b, normal);

    Collision {
        body_a: a_id,
        body_b: b_id,
        parent_a,
        parent_b,
        collided: true,
        depth,
        normal,
        tangent,
        penetration: normal * depth,
        axis_body: axis_body_id,
        axis_number,
        supports,
    }
}

/// Hill-climb for up to two contact points: prefer vertices of B
/// that plunge into A; if fewer than two survive, fall back to
/// vertices of A that plunge into B (flipped normal); if still none,
/// report the single nearest vertex found along the way.
fn find_manifold(a: &Body, b: &Body, normal: Vector<f64>) -> ArrayVec<Contact, 2> {
    let mut supports: ArrayVec<Contact, 2> = ArrayVec::new();
    let mut fallback = None;

    if let Some((best_id, best, neighbours)) = deepest_vertex_and_neighbours(&b.vertices, normal) {
        fallback = fallback.or(Some((best_id, best)));
        for (id, candidate) in std::iter::once((best_id, best)).chain(neighbours) {
            if supports.is_full() {
                break;
            }
            if vertices::contains(&a.vertices, candidate) && !supports.iter().any(|c| c.point == candidate) {
                let _ = supports.try_push(Contact { point: candidate, vertex_id: id });
            }
        }
    }

    if supports.len() < 2 {
        if let Some((best_id, best, neighbours)) = deepest_vertex_and_neighbours(&a.vertices, -normal) {
            fallback = fallback.or(Some((best_id, best)));
            for (id, candidate) in std::iter::once((best_id, best)).chain(neighbours) {
                if supports.is_full() {
                    break;
                }
                if vertices::contains(&b.vertices, candidate) && !supports.iter().any(|c| c.point == candidate) {
                    let _ = supports.try_push(Contact { point: candidate, vertex_id: id });
                }
            }
        }
    }

    if supports.is_empty() {
        if let Some((id, point)) = fallback {
            let _ = supports.try_push(Contact { point, vertex_id: id });
        }
    }

    supports
}

/// The vertex of `verts` with the smallest projection onto `normal`
/// (i.e. deepest against it), plus its two ring neighbours, each
/// tagged with its index in `verts`.
fn deepest_vertex_and_neighbours(
    verts: &[Vector<f64>],
    normal: Vector<f64>,
) -> Option<(usize, Vector<f64>, [(usize, Vector<f64>); 2])> {
    if verts.is_empty() {
        return None;
    }

    let mut best_index = 0;
    let mut best_dot = f64::INFINITY;
    for (i, &v) in verts.iter().enumerate() {
        let d = normal.dot(v);
        if d < best_dot {
            best_dot = d;
            best_index = i;
        }
    }

    let n = verts.len();
    let prev_index = (best_index + n - 1) % n;
    let next_index = (best_index + 1) % n;
    Some((
        best_index,
        verts[best_index],
        [(prev_index, verts[prev_index]), (next_index, verts[next_index])],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BodyConfig;

    fn square(id: u64, x: f64, y: f64) -> Body {
        let verts = vec![
            Vector::new(-5.0, -5.0),
            Vector::new(5.0, -5.0),
            Vector::new(5.0, 5.0),
            Vector::new(-5.0, 5.0),
        ];
        Body::create(id, Vector::new(x, y), 0.0, verts, BodyConfig { density: 1.0, ..BodyConfig::default() }).unwrap()
    }

    #[test]
    fn overlapping_squares_collide_with_a_horizontal_normal() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let a = bodies.insert(square(1, 0.0, 0.0));
        let b = bodies.insert(square(2, 8.0, 0.0));

        let mut detector = Detector::new();
        let collisions = detector.collisions(&bodies, &[(a, b)]);

        assert_eq!(collisions.len(), 1);
        let collision = &collisions[0];
        assert!(collision.collided);
        assert!(collision.depth > 0.0);
        assert!(collision.normal.x.abs() > collision.normal.y.abs());
    }

    #[test]
    fn separated_squares_produce_no_collision() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let a = bodies.insert(square(1, 0.0, 0.0));
        let b = bodies.insert(square(2, 500.0, 0.0));

        let mut detector = Detector::new();
        let collisions = detector.collisions(&bodies, &[(a, b)]);

        assert!(collisions.is_empty());
    }

    #[test]
    fn collision_groups_override_category_masks() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let mut a = square(1, 0.0, 0.0);
        a.collision_group = -1;
        let mut b = square(2, 8.0, 0.0);
        b.collision_group = -1;
        let a = bodies.insert(a);
        let b = bodies.insert(b);

        let mut detector = Detector::new();
        let collisions = detector.collisions(&bodies, &[(a, b)]);

        assert!(collisions.is_empty());
    }

    #[test]
    fn static_pairs_are_skipped_entirely() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let static_config = BodyConfig { density: 1.0, is_static: true, ..BodyConfig::default() };
        let a = Body::create(
            1,
            Vector::new(0.0, 0.0),
            0.0,
            vec![Vector::new(-5.0, -5.0), Vector::new(5.0, -5.0), Vector::new(5.0, 5.0), Vector::new(-5.0, 5.0)],
            static_config.clone(),
        )
        .unwrap();
        let b = Body::create(
            2,
            Vector::new(8.0, 0.0),
            0.0,
            vec![Vector::new(-5.0, -5.0), Vector::new(5.0, -5.0), Vector::new(5.0, 5.0), Vector::new(-5.0, 5.0)],
            static_config,
        )
        .unwrap();
        let a = bodies.insert(a);
        let b = bodies.insert(b);

        let mut detector = Detector::new();
        let collisions = detector.collisions(&bodies, &[(a, b)]);

        assert!(collisions.is_empty());
    }
}
