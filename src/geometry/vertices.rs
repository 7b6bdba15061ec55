//! Polygon-level vertex operations: area, centroid, inertia, affine
//! transforms, point containment, sorting, convexity, convex hull and
//! chamfering.
//!
//! All vertex lists here are plain `Vec<Vector<f64>>`; callers that
//! need a [`crate::body::Body`]'s indexed/flagged vertex ring build
//! one from these.

use crate::error::{EngineError, Result};

use super::vector::{Vector, VectorExt};

/// Signed shoelace area, or its absolute value halved when `signed`
/// is `false`.
pub fn area(vertices: &[Vector<f64>], signed: bool) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        sum += a.cross(b);
    }
    let signed_area = sum / 2.0;

    if signed {
        signed_area
    } else {
        signed_area.abs()
    }
}

/// Area-weighted centroid, computed from the shoelace cross terms
/// rather than the arithmetic mean of the vertices (which is only
/// correct for regular polygons).
pub fn centre(vertices: &[Vector<f64>]) -> Vector<f64> {
    let n = vertices.len();
    if n == 0 {
        return Vector::zero();
    }

    let signed_area = area(vertices, true);
    if signed_area.abs() < f64::EPSILON {
        // Degenerate (zero-area) polygon: fall back to the arithmetic mean.
        let sum = vertices.iter().fold(Vector::zero(), |acc, &v| acc + v);
        return sum / n as f64;
    }

    let mut centroid = Vector::zero();
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let cross = a.cross(b);
        centroid += (a + b) * cross;
    }

    centroid / (6.0 * signed_area)
}

/// Polygon second moment of area about the origin (Bourke formula).
/// Vertices must already be relative to the body's own centroid.
pub fn inertia(vertices: &[Vector<f64>], mass: f64) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }

    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let cross = (b.cross(a)).abs();

        numerator += cross * (a.dot(a) + a.dot(b) + b.dot(b));
        denominator += cross;
    }

    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }

    (mass / 6.0) * (numerator / denominator)
}

/// Translate every vertex by `delta`, in place.
pub fn translate(vertices: &mut [Vector<f64>], delta: Vector<f64>) {
    for vertex in vertices.iter_mut() {
        *vertex += delta;
    }
}

/// Rotate every vertex by `angle` radians about `point`, in place.
pub fn rotate(vertices: &mut [Vector<f64>], angle: f64, point: Vector<f64>) {
    if angle == 0.0 {
        return;
    }

    let (sin, cos) = angle.sin_cos();
    for vertex in vertices.iter_mut() {
        let relative = *vertex - point;
        *vertex = Vector::new(
            point.x + relative.x * cos - relative.y * sin,
            point.y + relative.x * sin + relative.y * cos,
        );
    }
}

/// Scale every vertex relative to `point`, in place.
pub fn scale(vertices: &mut [Vector<f64>], scale_x: f64, scale_y: f64, point: Vector<f64>) {
    for vertex in vertices.iter_mut() {
        let relative = *vertex - point;
        vertex.x = point.x + relative.x * scale_x;
        vertex.y = point.y + relative.y * scale_y;
    }
}

/// Half-plane test against every edge of a clockwise-wound polygon.
/// `true` iff `point` is on the inside of every edge.
pub fn contains(vertices: &[Vector<f64>], point: Vector<f64>) -> bool {
    let n = vertices.len();
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];

        // Clockwise winding: inside is to the right of each directed edge.
        if (point.x - a.x) * (b.y - a.y) - (point.y - a.y) * (b.x - a.x) > 0.0 {
            return false;
        }
    }
    true
}

/// Sort vertices clockwise around their arithmetic mean.
pub fn clockwise_sort(vertices: &mut [Vector<f64>]) {
    let n = vertices.len();
    if n == 0 {
        return;
    }
    let mean = vertices.iter().fold(Vector::zero(), |acc, &v| acc + v) / n as f64;

    vertices.sort_by(|a, b| {
        let angle_a = (a.y - mean.y).atan2(a.x - mean.x);
        let angle_b = (b.y - mean.y).atan2(b.x - mean.x);
        angle_b.partial_cmp(&angle_a).unwrap()
    });
}

/// Whether a polygon is convex.
///
/// `None` for fewer than 3 vertices, or when every cross product is
/// (near) zero (fully degenerate/collinear). `Some(true)` when every
/// consecutive-triple cross product shares a sign, `Some(false)` on a
/// sign flip.
pub fn is_convex(vertices: &[Vector<f64>]) -> Option<bool> {
    let n = vertices.len();
    if n < 3 {
        return None;
    }

    let mut sign: Option<bool> = None;
    let mut all_zero = true;

    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let c = vertices[(i + 2) % n];

        let cross = (b - a).cross(c - b);
        if cross.abs() < f64::EPSILON {
            continue;
        }
        all_zero = false;

        let positive = cross > 0.0;
        match sign {
            None => sign = Some(positive),
            Some(expected) if expected != positive => return Some(false),
            _ => {}
        }
    }

    if all_zero {
        None
    } else {
        Some(true)
    }
}

/// Convex hull via Andrew's monotone chain, returned clockwise.
pub fn hull(vertices: &[Vector<f64>]) -> Vec<Vector<f64>> {
    let mut points = vertices.to_vec();
    points.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap().then(a.y.partial_cmp(&b.y).unwrap()));
    points.dedup_by(|a, b| (a.x - b.x).abs() < f64::EPSILON && (a.y - b.y).abs() < f64::EPSILON);

    if points.len() < 3 {
        return points;
    }

    let cross = |o: Vector<f64>, a: Vector<f64>, b: Vector<f64>| (a - o).cross(b - o);

    // Build the lower hull, then the upper hull; monotone chain
    // produces a counter-clockwise hull, so we reverse for clockwise.
    let mut lower: Vec<Vector<f64>> = Vec::new();
    for &p in &points {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Vector<f64>> = Vec::new();
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower.reverse();
    lower
}

/// Quality schedule for [`chamfer`]'s auto-quality mode.
fn auto_quality(radius: f64, qmin: u32, qmax: u32) -> u32 {
    let raw = radius.powf(0.32) * 1.75;
    let clamped = raw.clamp(qmin as f64, qmax as f64);
    let rounded = clamped.round() as u32;
    // Even-rounded so the arc has a matched number of segments on each side.
    if rounded % 2 == 1 {
        rounded + 1
    } else {
        rounded
    }
}

/// Replace each vertex with a rounded arc of the given radius.
///
/// `radii` is either a single radius applied to every vertex, or one
/// radius per vertex. `quality` is the number of segments per arc;
/// `-1` selects [`auto_quality`].
pub fn chamfer(
    vertices: &[Vector<f64>],
    radii: &[f64],
    quality: i32,
    qmin: u32,
    qmax: u32,
) -> Vec<Vector<f64>> {
    let n = vertices.len();
    if n < 3 {
        return vertices.to_vec();
    }

    let mut output = Vec::new();

    for i in 0..n {
        let prev = vertices[(i + n - 1) % n];
        let current = vertices[i];
        let next = vertices[(i + 1) % n];

        let radius = if radii.len() == 1 {
            radii[0]
        } else {
            radii.get(i).copied().unwrap_or(0.0)
        };

        if radius <= 0.0 {
            output.push(current);
            continue;
        }

        let to_prev = (prev - current).normalized_or_zero();
        let to_next = (next - current).normalized_or_zero();

        let start = current + to_prev * radius;
        let end = current + to_next * radius;

        let segments = if quality < 0 {
            auto_quality(radius, qmin, qmax)
        } else {
            quality as u32
        };

        let start_angle = (start - current).y.atan2((start - current).x);
        let mut end_angle = (end - current).y.atan2((end - current).x);

        // Walk the shorter way around the corner.
        let mut delta = end_angle - start_angle;
        while delta <= -std::f64::consts::PI {
            delta += std::f64::consts::TAU;
        }
        while delta > std::f64::consts::PI {
            delta -= std::f64::consts::TAU;
        }
        end_angle = start_angle + delta;

        for s in 0..=segments {
            let t = s as f64 / segments as f64;
            let angle = start_angle + (end_angle - start_angle) * t;
            output.push(current + Vector::new(angle.cos(), angle.sin()) * radius);
        }
    }

    output
}

/// Parse whitespace/comma-separated `x y` pairs, with an optional
/// leading `L` path-command marker (ignored).
pub fn from_path(path: &str) -> Result<Vec<Vector<f64>>> {
    let cleaned = path.trim().trim_start_matches(['L', 'l']);
    let numbers: Vec<f64> = cleaned
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<f64>().map_err(|_| EngineError::InvalidGeometry {
                reason: format!("could not parse coordinate '{token}'"),
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    if numbers.len() % 2 != 0 {
        return Err(EngineError::InvalidGeometry {
            reason: "odd number of coordinates in path".to_string(),
        });
    }

    Ok(numbers.chunks(2).map(|xy| Vector::new(xy[0], xy[1])).collect())
}

/// Serialize vertices back into the `from_path` format, for round-trip
/// testing.
pub fn to_path(vertices: &[Vector<f64>]) -> String {
    vertices
        .iter()
        .map(|v| format!("{} {}", v.x, v.y))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vector<f64>> {
        vec![
            Vector::new(0.0, 0.0),
            Vector::new(10.0, 0.0),
            Vector::new(10.0, 10.0),
            Vector::new(0.0, 10.0),
        ]
    }

    #[test]
    fn area_of_unit_square_is_one_hundred() {
        assert_eq!(area(&square(), false), 100.0);
    }

    #[test]
    fn signed_area_sign_reflects_winding() {
        let clockwise = area(&square(), true);
        let mut ccw = square();
        ccw.reverse();
        let counter_clockwise = area(&ccw, true);

        assert!(clockwise * counter_clockwise < 0.0);
    }

    #[test]
    fn centre_of_square_is_its_middle() {
        let c = centre(&square());
        assert!((c.x - 5.0).abs() < 1e-9);
        assert!((c.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn contains_distinguishes_inside_from_outside() {
        assert!(contains(&square(), Vector::new(5.0, 5.0)));
        assert!(!contains(&square(), Vector::new(50.0, 50.0)));
    }

    #[test]
    fn is_convex_is_stable_under_rotation_and_translation() {
        let mut verts = square();
        assert_eq!(is_convex(&verts), Some(true));

        rotate(&mut verts, 0.7, centre(&verts));
        translate(&mut verts, Vector::new(100.0, -50.0));
        assert_eq!(is_convex(&verts), Some(true));
    }

    #[test]
    fn is_convex_detects_a_reflex_vertex() {
        let concave = vec![
            Vector::new(-1.0, 1.0),
            Vector::new(-1.0, 0.0),
            Vector::new(1.0, 0.0),
            Vector::new(1.0, 1.0),
            Vector::new(0.5, 0.5),
        ];
        assert_eq!(is_convex(&concave), Some(false));
    }

    #[test]
    fn hull_of_square_plus_interior_point_is_the_square() {
        let mut points = square();
        points.push(Vector::new(5.0, 5.0));

        let hull_points = hull(&points);
        assert_eq!(hull_points.len(), 4);
    }

    #[test]
    fn from_path_round_trips_through_to_path() {
        let original = "0 0, 10 0, 10 10, 0 10";
        let parsed = from_path(original).unwrap();
        let serialized = to_path(&parsed);
        let reparsed = from_path(&serialized).unwrap();

        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn from_path_accepts_leading_path_marker() {
        let parsed = from_path("L 0 0 1 1").unwrap();
        assert_eq!(parsed, vec![Vector::new(0.0, 0.0), Vector::new(1.0, 1.0)]);
    }

    #[test]
    fn chamfer_preserves_rough_area() {
        let original_area = area(&square(), false);
        let chamfered = chamfer(&square(), &[1.0], -1, 2, 14);
        let chamfered_area = area(&chamfered, false);

        // Rounding corners only ever removes area, and only a little for a small radius.
        assert!(chamfered_area <= original_area);
        assert!(chamfered_area > original_area * 0.9);
    }
}
