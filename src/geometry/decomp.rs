//! Concave polygon decomposition into convex parts.
//!
//! Two strategies are offered:
//!
//! - [`quick_decomp`]: Bayazit's recursive split-at-reflex-vertex
//!   algorithm. Fast, used by default.
//! - [`decomp`]: exhaustive search over every reflex-vertex diagonal
//!   pair, picking the one that minimizes the resulting part count.
//!   Much slower; offered for callers that want the better partition
//!   and can afford the `O(n^4)` search.
//!
//! Both fall back to the vertex ring's [`super::vertices::hull`] when
//! the input isn't a simple polygon, per the caller contract in
//! `crate::body::factory`.

use super::vector::{Vector, VectorExt};
use super::vertices;

/// Recursion depth cap, guarding against runaway recursion on
/// degenerate input.
const MAX_LEVEL: u32 = 100;

/// Decompose `polygon` (clockwise, simple) into convex parts using
/// Bayazit's algorithm.
pub fn quick_decomp(polygon: &[Vector<f64>]) -> Vec<Vec<Vector<f64>>> {
    quick_decomp_level(polygon, 0)
}

fn quick_decomp_level(polygon: &[Vector<f64>], level: u32) -> Vec<Vec<Vector<f64>>> {
    if level >= MAX_LEVEL {
        log::warn!("quick_decomp hit the recursion cap ({MAX_LEVEL}), returning a partial split");
        return vec![polygon.to_vec()];
    }
    if polygon.len() < 4 {
        return vec![polygon.to_vec()];
    }

    if let Some(true) = vertices::is_convex(polygon) {
        return vec![polygon.to_vec()];
    }

    let n = polygon.len();
    for i in 0..n {
        if !is_reflex(polygon, i) {
            continue;
        }

        let vertex = polygon[i];
        let mut best_split: Option<(usize, f64)> = None;

        for j in 0..n {
            if j == i {
                continue;
            }
            if !diagonal_is_valid(polygon, i, j) {
                continue;
            }

            let candidate = polygon[j];
            let distance_sq = (candidate - vertex).magnitude_squared();
            if best_split.map_or(true, |(_, best_dist)| distance_sq < best_dist) {
                best_split = Some((j, distance_sq));
            }
        }

        if let Some((j, _)) = best_split {
            let (left, right) = split_at(polygon, i, j);
            let mut parts = quick_decomp_level(&left, level + 1);
            parts.extend(quick_decomp_level(&right, level + 1));
            return parts;
        }
    }

    // No valid diagonal found from any reflex vertex: give up and
    // return the convex hull rather than an invalid part.
    vec![vertices::hull(polygon)]
}

/// Exhaustive decomposition: for every reflex vertex, try every
/// candidate diagonal and keep whichever split yields the fewest
/// total convex parts.
pub fn decomp(polygon: &[Vector<f64>]) -> Vec<Vec<Vector<f64>>> {
    if polygon.len() < 4 {
        return vec![polygon.to_vec()];
    }
    if let Some(true) = vertices::is_convex(polygon) {
        return vec![polygon.to_vec()];
    }

    let n = polygon.len();
    let mut best: Option<Vec<Vec<Vector<f64>>>> = None;

    for i in 0..n {
        if !is_reflex(polygon, i) {
            continue;
        }
        for j in 0..n {
            if j == i || !diagonal_is_valid(polygon, i, j) {
                continue;
            }

            let (left, right) = split_at(polygon, i, j);
            let mut parts = decomp(&left);
            parts.extend(decomp(&right));

            if best.as_ref().map_or(true, |b| parts.len() < b.len()) {
                best = Some(parts);
            }
        }
    }

    best.unwrap_or_else(|| vec![vertices::hull(polygon)])
}

/// Whether the interior angle at `index` is reflex (> 180 degrees) for
/// a clockwise-wound polygon.
fn is_reflex(polygon: &[Vector<f64>], index: usize) -> bool {
    let n = polygon.len();
    let prev = polygon[(index + n - 1) % n];
    let current = polygon[index];
    let next = polygon[(index + 1) % n];

    (current - prev).cross(next - current) > 0.0
}

/// Whether the diagonal from vertex `i` to vertex `j` lies entirely
/// inside the polygon and crosses no edge.
fn diagonal_is_valid(polygon: &[Vector<f64>], i: usize, j: usize) -> bool {
    let n = polygon.len();
    if i == j || (i + 1) % n == j || (j + 1) % n == i {
        return false;
    }

    let a = polygon[i];
    let b = polygon[j];

    for edge in 0..n {
        let edge_start = polygon[edge];
        let edge_end = polygon[(edge + 1) % n];

        if edge == i || edge == j || (edge + 1) % n == i || (edge + 1) % n == j {
            continue;
        }

        if segments_intersect(a, b, edge_start, edge_end) {
            return false;
        }
    }

    let midpoint = (a + b) / 2.0;
    vertices::contains(polygon, midpoint)
}

fn segments_intersect(p1: Vector<f64>, p2: Vector<f64>, p3: Vector<f64>, p4: Vector<f64>) -> bool {
    let d1 = (p4 - p3).cross(p1 - p3);
    let d2 = (p4 - p3).cross(p2 - p3);
    let d3 = (p2 - p1).cross(p3 - p1);
    let d4 = (p2 - p1).cross(p4 - p1);

    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Split a polygon along the diagonal between indices `i` and `j` into
/// its two halves, each still clockwise-wound and starting at the cut.
fn split_at(polygon: &[Vector<f64>], i: usize, j: usize) -> (Vec<Vector<f64>>, Vec<Vector<f64>>) {
    let n = polygon.len();
    let (low, high) = if i < j { (i, j) } else { (j, i) };

    let mut left = Vec::new();
    let mut k = low;
    while k != high {
        left.push(polygon[k]);
        k = (k + 1) % n;
    }
    left.push(polygon[high]);

    let mut right = Vec::new();
    let mut k = high;
    while k != low {
        right.push(polygon[k]);
        k = (k + 1) % n;
    }
    right.push(polygon[low]);

    (left, right)
}

/// Whether `polygon` has no self-intersecting, non-adjacent edges.
pub fn is_simple(polygon: &[Vector<f64>]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    for i in 0..n {
        let a1 = polygon[i];
        let a2 = polygon[(i + 1) % n];

        for j in (i + 1)..n {
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            let b1 = polygon[j];
            let b2 = polygon[(j + 1) % n];

            if segments_intersect(a1, a2, b1, b2) {
                return false;
            }
        }
    }

    true
}

/// Drop consecutive (near-)duplicate vertices and collinear points,
/// which otherwise make the reflex/diagonal tests above unstable.
pub fn clean(polygon: &[Vector<f64>]) -> Vec<Vector<f64>> {
    let n = polygon.len();
    if n < 3 {
        return polygon.to_vec();
    }

    let mut deduped: Vec<Vector<f64>> = Vec::with_capacity(n);
    for &vertex in polygon {
        if deduped
            .last()
            .map_or(true, |&last| (last - vertex).magnitude_squared() > 1e-12)
        {
            deduped.push(vertex);
        }
    }
    if deduped.len() > 1 && (deduped[0] - *deduped.last().unwrap()).magnitude_squared() <= 1e-12 {
        deduped.pop();
    }

    let m = deduped.len();
    if m < 3 {
        return deduped;
    }

    let mut result = Vec::with_capacity(m);
    for i in 0..m {
        let prev = deduped[(i + m - 1) % m];
        let current = deduped[i];
        let next = deduped[(i + 1) % m];

        let cross = (current - prev).cross(next - current);
        if cross.abs() > 1e-9 {
            result.push(current);
        }
    }

    if result.len() < 3 {
        deduped
    } else {
        result
    }
}
