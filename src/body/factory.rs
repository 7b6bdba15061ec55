//! Shape factories producing ready-to-insert [`Body`] values.
//!
//! Every factory here builds local vertex data and defers to
//! [`Body::create`] for the mass/inertia/axes bookkeeping, rather than
//! repeating that formula per shape.

use crate::config::BodyConfig;
use crate::error::{EngineError, Result};
use crate::geometry::{decomp, vertices, Vector};

use super::Body;

/// A rectangle centered on `(x, y)`.
pub fn rectangle(id: u64, x: f64, y: f64, width: f64, height: f64, config: BodyConfig) -> Result<Body> {
    let half_width = width / 2.0;
    let half_height = height / 2.0;

    let local_vertices = vec![
        Vector::new(-half_width, -half_height),
        Vector::new(half_width, -half_height),
        Vector::new(half_width, half_height),
        Vector::new(-half_width, half_height),
    ];

    let mut body = Body::create(id, Vector::new(x, y), 0.0, local_vertices, config)?;
    body.label = "Rectangle Body".to_string();
    Ok(body)
}

/// A regular `sides`-gon of circumradius `radius`, centered on `(x, y)`.
///
/// `sides` below `3` is clamped up to a triangle.
pub fn polygon(id: u64, x: f64, y: f64, sides: u32, radius: f64, config: BodyConfig) -> Result<Body> {
    let sides = sides.max(3);
    let theta = std::f64::consts::TAU / sides as f64;
    let offset = theta * 0.5;

    let local_vertices: Vec<Vector> = (0..sides)
        .map(|i| {
            let angle = offset + i as f64 * theta;
            Vector::new(angle.cos() * radius, angle.sin() * radius)
        })
        .collect();

    let mut body = Body::create(id, Vector::new(x, y), 0.0, local_vertices, config)?;
    body.label = "Polygon Body".to_string();
    Ok(body)
}

/// A circle of the given `radius`, approximated by a regular polygon
/// with a side count scaled to the radius (more sides for bigger
/// circles), capped at `max_sides`.
pub fn circle(id: u64, x: f64, y: f64, radius: f64, config: BodyConfig, max_sides: u32) -> Result<Body> {
    let mut sides = radius.clamp(10.0, max_sides as f64).ceil() as u32;
    if sides % 2 == 1 {
        sides += 1;
    }

    let mut body = polygon(id, x, y, sides, radius, config)?;
    body.label = "Circle Body".to_string();
    body.circle_radius = Some(radius);
    Ok(body)
}

/// A trapezoid of the given base `width`/`height`, with `slope` in
/// `[0, 1)` controlling how much the top edge is inset (`0` is a
/// rectangle, approaching `1` degenerates to a triangle).
pub fn trapezoid(
    id: u64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    slope: f64,
    config: BodyConfig,
) -> Result<Body> {
    let slope = slope * 0.5;
    let roof = (1.0 - slope * 2.0) * width;

    let x1 = width * slope;
    let x2 = x1 + roof;
    let x3 = x2 + x1;

    let local_vertices = if slope < 0.5 {
        vec![
            Vector::new(0.0, 0.0),
            Vector::new(x1, -height),
            Vector::new(x2, -height),
            Vector::new(x3, 0.0),
        ]
    } else {
        vec![
            Vector::new(0.0, 0.0),
            Vector::new(x2, -height),
            Vector::new(x3, 0.0),
        ]
    };

    let mut body = Body::create(id, Vector::new(x, y), 0.0, local_vertices, config)?;
    body.label = "Trapezoid Body".to_string();
    Ok(body)
}

/// Build a (possibly compound) body from one or more raw vertex sets.
///
/// Each set is cleaned (collinear/duplicate removal), checked for
/// simplicity, and decomposed into convex parts with
/// [`decomp::quick_decomp`] when it isn't already convex. Parts below
/// `minimum_area` are dropped. If decomposition (across every input
/// set) yields more than one convex part, the result is a compound:
/// element `0` of the returned `Vec` is a synthetic root whose own
/// vertices are the convex hull of every part (mirroring
/// `auto_hull=true`), with aggregated mass/inertia; elements `1..`
/// are the individual parts, each still carrying its own independent
/// `id` (the caller is expected to wire `parent`/`sub_parts` once
/// every part has a stable arena handle — see `Engine::add_compound`).
///
/// `flag_internal` is accepted for interface parity with other
/// constructors but is a no-op here: narrowphase tests parts against
/// each other individually, so suppressing internal shared edges from
/// axes/contacts — only relevant when colliding the merged outline as
/// a whole — has no effect on this architecture.
pub fn from_vertices(
    id_alloc: &mut impl FnMut() -> u64,
    x: f64,
    y: f64,
    vertex_sets: Vec<Vec<Vector>>,
    config: BodyConfig,
    _flag_internal: bool,
    remove_collinear: f64,
    minimum_area: f64,
) -> Result<Vec<Body>> {
    let _ = remove_collinear; // threshold folded into decomp::clean's fixed epsilon.

    let mut convex_parts: Vec<Vec<Vector>> = Vec::new();

    for set in vertex_sets {
        let cleaned = decomp::clean(&set);
        if cleaned.len() < 3 {
            continue;
        }

        let parts = if decomp::is_simple(&cleaned) {
            match vertices::is_convex(&cleaned) {
                Some(true) => vec![cleaned],
                _ => decomp::quick_decomp(&cleaned),
            }
        } else {
            return Err(EngineError::NonSimplePolygon);
        };

        for part in parts {
            if vertices::area(&part, false) >= minimum_area {
                convex_parts.push(part);
            }
        }
    }

    if convex_parts.is_empty() {
        return Err(EngineError::InvalidGeometry {
            reason: "no convex part met the minimum area".to_string(),
        });
    }

    let mut part_bodies: Vec<Body> = Vec::with_capacity(convex_parts.len());
    for part_vertices in &convex_parts {
        let centre = vertices::centre(part_vertices);
        let part_id = id_alloc();
        let body = Body::create(part_id, centre, 0.0, part_vertices.clone(), config.clone())?;
        part_bodies.push(body);
    }

    if part_bodies.len() == 1 {
        let mut only = part_bodies.remove(0);
        only.set_position(Vector::new(x, y), false);
        return Ok(vec![only]);
    }

    let union_vertices: Vec<Vector> = convex_parts.into_iter().flatten().collect();
    let hull_vertices = vertices::hull(&union_vertices);
    let hull_centre = vertices::centre(&hull_vertices);

    let root_id = id_alloc();
    let mut root = Body::create(root_id, hull_centre, 0.0, hull_vertices, config)?;
    root.label = "Compound Body".to_string();

    let total_mass: f64 = part_bodies.iter().map(|part| part.mass).sum();
    let weighted_centre: Vector = part_bodies
        .iter()
        .fold(Vector::zero(), |acc, part| acc + part.position * part.mass);
    let total_inertia: f64 = part_bodies.iter().map(|part| part.inertia).sum();

    if total_mass > 0.0 {
        let centroid = weighted_centre / total_mass;
        root.mass = total_mass;
        root.inverse_mass = 1.0 / total_mass;
        root.inertia = total_inertia;
        root.inverse_inertia = 1.0 / total_inertia;
        root.set_centre(centroid, false);
    }

    let target = Vector::new(x, y);
    let delta = target - root.position;
    root.set_position(target, false);
    for part in &mut part_bodies {
        part.set_position(part.position + delta, false);
    }

    let mut assembled = Vec::with_capacity(part_bodies.len() + 1);
    assembled.push(root);
    assembled.extend(part_bodies);
    Ok(assembled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_has_four_vertices_and_expected_area() {
        let body = rectangle(1, 0.0, 0.0, 20.0, 10.0, BodyConfig::default()).unwrap();
        assert_eq!(body.vertices.len(), 4);
        assert!((body.area() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn circle_approximation_has_even_sides_and_records_radius() {
        let body = circle(1, 0.0, 0.0, 15.0, BodyConfig::default(), 25).unwrap();
        assert_eq!(body.vertices.len() % 2, 0);
        assert_eq!(body.circle_radius, Some(15.0));
    }

    #[test]
    fn polygon_with_few_sides_is_clamped_to_a_triangle() {
        let body = polygon(1, 0.0, 0.0, 1, 10.0, BodyConfig::default()).unwrap();
        assert_eq!(body.vertices.len(), 3);
    }

    #[test]
    fn from_vertices_on_a_concave_set_produces_a_compound_with_convex_parts() {
        let concave = vec![
            Vector::new(-1.0, 1.0),
            Vector::new(-1.0, 0.0),
            Vector::new(1.0, 0.0),
            Vector::new(1.0, 1.0),
            Vector::new(0.5, 0.5),
        ];

        let mut next_id = 1u64;
        let mut id_alloc = move || {
            let id = next_id;
            next_id += 1;
            id
        };

        let bodies = from_vertices(
            &mut id_alloc,
            0.0,
            0.0,
            vec![concave],
            BodyConfig::default(),
            false,
            0.01,
            0.0,
        )
        .unwrap();

        assert!(bodies.len() >= 2);
        for part in bodies.iter().skip(1) {
            assert_eq!(vertices::is_convex(&part.vertices), Some(true));
        }
    }

    #[test]
    fn from_vertices_on_a_convex_set_produces_a_single_body() {
        let square = vec![
            Vector::new(0.0, 0.0),
            Vector::new(10.0, 0.0),
            Vector::new(10.0, 10.0),
            Vector::new(0.0, 10.0),
        ];

        let mut next_id = 1u64;
        let mut id_alloc = move || {
            let id = next_id;
            next_id += 1;
            id
        };

        let bodies = from_vertices(
            &mut id_alloc,
            5.0,
            5.0,
            vec![square],
            BodyConfig::default(),
            false,
            0.01,
            0.0,
        )
        .unwrap();

        assert_eq!(bodies.len(), 1);
    }
}
