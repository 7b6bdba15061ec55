//! Deduplicated edge-normal axis sets, used by SAT as the candidate
//! separating axes for a convex polygon.

use vek::Vec2;

use super::vector::{Vector, VectorExt};

/// Quantization used to coalesce numerically-parallel edges (e.g. the
/// two long edges of a rectangle) onto a single axis.
const GRADIENT_DECIMALS: i32 = 3;

/// One unit normal per unique edge of a polygon, keyed by the
/// quantized gradient of the normal so that axes shared by parallel
/// edges (opposite sides of a convex polygon) collapse to one entry.
#[derive(Debug, Clone, Default)]
pub struct Axes {
    /// The deduplicated unit normals, in edge order of first occurrence.
    pub normals: Vec<Vector<f64>>,
}

impl Axes {
    /// Compute the axis set of a clockwise-wound vertex ring.
    pub fn from_vertices(vertices: &[Vector<f64>]) -> Self {
        let mut seen = Vec::new();
        let mut normals = Vec::new();

        let n = vertices.len();
        for i in 0..n {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            let edge = b - a;
            let normal = edge.perp().normalized_or_zero();
            if normal == Vec2::zero() {
                continue;
            }

            let gradient = quantized_gradient(normal);
            if seen.contains(&gradient) {
                continue;
            }
            seen.push(gradient);
            normals.push(normal);
        }

        Self { normals }
    }

    /// Rotate every axis by `angle` radians.
    pub fn rotate(&mut self, angle: f64) {
        let (sin, cos) = angle.sin_cos();
        for normal in &mut self.normals {
            let rotated = Vector::new(
                normal.x * cos - normal.y * sin,
                normal.x * sin + normal.y * cos,
            );
            *normal = rotated;
        }
    }
}

/// Gradient of a normal, quantized to [`GRADIENT_DECIMALS`] places.
/// `y == 0` (a horizontal normal, i.e. a vertical edge) is mapped to a
/// sentinel since `x / 0` isn't a usable dedup key.
fn quantized_gradient(normal: Vector<f64>) -> i64 {
    const SENTINEL: f64 = f64::MAX;
    let gradient = if normal.y == 0.0 {
        SENTINEL
    } else {
        normal.x / normal.y
    };

    let scale = 10f64.powi(GRADIENT_DECIMALS);
    (gradient * scale).round() as i64
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
    fn rectangle_has_two_unique_axes() {
        let axes = Axes::from_vertices(&square());

        // Opposite edges share a gradient and collapse to one axis each.
        assert_eq!(axes.normals.len(), 2);
    }

    #[test]
    fn rotating_axes_preserves_unit_length() {
        let mut axes = Axes::from_vertices(&square());
        axes.rotate(0.5);

        for normal in axes.normals {
            assert!((normal.magnitude() - 1.0).abs() < 1e-9);
        }
    }
}
