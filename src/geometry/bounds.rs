//! Axis-aligned bounding boxes.

use super::vector::Vector;

/// An axis-aligned bounding box. `min <= max` componentwise once
/// [`Bounds::update`] has run at least once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Lower-left corner.
    pub min: Vector<f64>,
    /// Upper-right corner.
    pub max: Vector<f64>,
}

impl Bounds {
    /// An empty bounds that any `update` will immediately replace;
    /// `min` is `+inf` and `max` is `-inf` so the first vertex folded
    /// in always wins both extents.
    pub fn empty() -> Self {
        Self {
            min: Vector::new(f64::INFINITY, f64::INFINITY),
            max: Vector::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Recompute from a vertex ring, optionally expanded by a velocity
    /// hint to produce a swept AABB (only the outbound side is
    /// expanded, predicting where the body is heading this step).
    pub fn update(&mut self, vertices: &[Vector<f64>], velocity: Option<Vector<f64>>) {
        *self = Self::empty();

        for &vertex in vertices {
            self.min.x = self.min.x.min(vertex.x);
            self.min.y = self.min.y.min(vertex.y);
            self.max.x = self.max.x.max(vertex.x);
            self.max.y = self.max.y.max(vertex.y);
        }

        if let Some(velocity) = velocity {
            if velocity.x > 0.0 {
                self.max.x += velocity.x;
            } else {
                self.min.x += velocity.x;
            }

            if velocity.y > 0.0 {
                self.max.y += velocity.y;
            } else {
                self.min.y += velocity.y;
            }
        }
    }

    /// Whether this bounds overlaps another on both axes.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Whether `point` lies within this bounds, inclusive.
    pub fn contains(&self, point: Vector<f64>) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Translate both corners by `delta`.
    pub fn translate(&mut self, delta: Vector<f64>) {
        self.min += delta;
        self.max += delta;
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}
