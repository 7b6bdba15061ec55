//! Uniform spatial-hash broadphase.
//!
//! Bodies are bucketed into a `HashMap`-backed grid keyed by cell
//! coordinate; candidate pairs are tracked with incremental per-cell
//! refcounting rather than a full rescan every step.

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::body::{Body, Region};
use crate::id::BodyId;

/// Cell width/height in world units. Normative constant.
pub const BUCKET_WIDTH: f64 = 40.0;
/// Cell width/height in world units. Normative constant.
pub const BUCKET_HEIGHT: f64 = 40.0;

type Cell = (i32, i32);

#[derive(Debug, Clone, Copy)]
struct PairRef {
    refcount: u32,
    a: BodyId,
    b: BodyId,
}

/// Canonical ordering key for a pair of bodies, by their numeric id
/// (not their arena handle), matching the `A{minId}B{maxId}` scheme.
type PairKey = (u64, u64);

#[derive(Debug, Default)]
pub struct Grid {
    buckets: HashMap<Cell, Vec<BodyId>>,
    pairs: HashMap<PairKey, PairRef>,
    pairs_list: Vec<(BodyId, BodyId)>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs of bodies currently sharing at least one bucket.
    /// Regenerated only when [`Self::update`] actually changed a
    /// region, not on every call.
    pub fn pairs_list(&self) -> &[(BodyId, BodyId)] {
        &self.pairs_list
    }

    /// Empty the grid entirely; called when `world.is_modified`.
    pub fn flush(&mut self) {
        self.buckets.clear();
        self.pairs.clear();
        self.pairs_list.clear();
    }

    /// Recompute each body's region and update bucket membership for
    /// any body whose region changed (or every body, if `force`).
    pub fn update(&mut self, bodies: &mut SlotMap<BodyId, Body>, body_ids: &[BodyId], force: bool) {
        puffin::profile_function!();
        let mut changed = false;

        for &id in body_ids {
            let (is_sleeping, old_region, new_region) = match bodies.get(id) {
                Some(body) if !body.is_sleeping => {
                    (false, body.region, region_for(&body.bounds))
                }
                _ => continue,
            };
            let _ = is_sleeping;

            if !force && old_region == Some(new_region) {
                continue;
            }
            changed = true;
            self.move_region(bodies, id, old_region, new_region);

            if let Some(body) = bodies.get_mut(id) {
                body.region = Some(new_region);
            }
        }

        if changed {
            self.rebuild_pairs_list();
        }
    }

    fn move_region(
        &mut self,
        bodies: &SlotMap<BodyId, Body>,
        id: BodyId,
        old_region: Option<Region>,
        new_region: Region,
    ) {
        let old_cells: Vec<Cell> = old_region.map(cells_of).unwrap_or_default();
        let new_cells: Vec<Cell> = cells_of(new_region);

        for &cell in &new_cells {
            if !old_cells.contains(&cell) {
                self.insert(bodies, id, cell);
            }
        }
        for &cell in &old_cells {
            if !new_cells.contains(&cell) {
                self.remove(bodies, id, cell);
            }
        }
    }

    fn insert(&mut self, bodies: &SlotMap<BodyId, Body>, id: BodyId, cell: Cell) {
        let is_static = bodies.get(id).map_or(true, |b| b.is_static);
        let numeric_id = bodies.get(id).map_or(0, |b| b.id);

        let bucket = self.buckets.entry(cell).or_default();
        for &other in bucket.iter() {
            if other == id {
                continue;
            }
            let other_static = bodies.get(other).map_or(true, |b| b.is_static);
            if is_static && other_static {
                continue;
            }
            let other_numeric = bodies.get(other).map_or(0, |b| b.id);
            let key = ordered_key(numeric_id, other_numeric);
            let entry = self.pairs.entry(key).or_insert(PairRef { refcount: 0, a: id, b: other });
            entry.refcount += 1;
        }
        bucket.push(id);
    }

    fn remove(&mut self, bodies: &SlotMap<BodyId, Body>, id: BodyId, cell: Cell) {
        let is_static = bodies.get(id).map_or(true, |b| b.is_static);
        let numeric_id = bodies.get(id).map_or(0, |b| b.id);

        let Some(bucket) = self.buckets.get_mut(&cell) else { return };
        bucket.retain(|&occupant| occupant != id);
        let remaining = bucket.clone();

        for other in remaining {
            let other_static = bodies.get(other).map_or(true, |b| b.is_static);
            if is_static && other_static {
                continue;
            }
            let other_numeric = bodies.get(other).map_or(0, |b| b.id);
            let key = ordered_key(numeric_id, other_numeric);
            if let Some(entry) = self.pairs.get_mut(&key) {
                entry.refcount = entry.refcount.saturating_sub(1);
                if entry.refcount == 0 {
                    self.pairs.remove(&key);
                }
            }
        }
    }

    fn rebuild_pairs_list(&mut self) {
        self.pairs_list = self.pairs.values().map(|p| (p.a, p.b)).collect();
    }
}

fn ordered_key(a: u64, b: u64) -> PairKey {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn region_for(bounds: &crate::geometry::Bounds) -> Region {
    Region {
        start_col: (bounds.min.x / BUCKET_WIDTH).floor() as i32,
        end_col: (bounds.max.x / BUCKET_WIDTH).floor() as i32,
        start_row: (bounds.min.y / BUCKET_HEIGHT).floor() as i32,
        end_row: (bounds.max.y / BUCKET_HEIGHT).floor() as i32,
    }
}

fn cells_of(region: Region) -> Vec<Cell> {
    let mut cells = Vec::new();
    for row in region.start_row..=region.end_row {
        for col in region.start_col..=region.end_col {
            cells.push((col, row));
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BodyConfig;
    use crate::geometry::Vector;

    fn box_at(bodies: &mut SlotMap<BodyId, Body>, numeric_id: u64, x: f64, y: f64) -> BodyId {
        let verts = vec![
            Vector::new(-5.0, -5.0),
            Vector::new(5.0, -5.0),
            Vector::new(5.0, 5.0),
            Vector::new(-5.0, 5.0),
        ];
        let config = BodyConfig {
            density: 1.0,
            ..BodyConfig::default()
        };
        let body = Body::create(numeric_id, Vector::new(x, y), 0.0, verts, config).unwrap();
        bodies.insert(body)
    }

    #[test]
    fn overlapping_bodies_in_the_same_bucket_form_a_pair() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let a = box_at(&mut bodies, 1, 10.0, 10.0);
        let b = box_at(&mut bodies, 2, 15.0, 10.0);

        let mut grid = Grid::new();
        grid.update(&mut bodies, &[a, b], false);

        assert_eq!(grid.pairs_list().len(), 1);
    }

    #[test]
    fn distant_bodies_form_no_pair() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let a = box_at(&mut bodies, 1, 10.0, 10.0);
        let b = box_at(&mut bodies, 2, 5000.0, 5000.0);

        let mut grid = Grid::new();
        grid.update(&mut bodies, &[a, b], false);

        assert!(grid.pairs_list().is_empty());
    }

    #[test]
    fn two_static_bodies_never_form_a_pair() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let static_config = BodyConfig {
            density: 1.0,
            is_static: true,
            ..BodyConfig::default()
        };
        let verts = vec![
            Vector::new(-5.0, -5.0),
            Vector::new(5.0, -5.0),
            Vector::new(5.0, 5.0),
            Vector::new(-5.0, 5.0),
        ];
        let a = bodies.insert(Body::create(1, Vector::new(0.0, 0.0), 0.0, verts.clone(), static_config.clone()).unwrap());
        let b = bodies.insert(Body::create(2, Vector::new(5.0, 0.0), 0.0, verts, static_config).unwrap());

        let mut grid = Grid::new();
        grid.update(&mut bodies, &[a, b], false);

        assert!(grid.pairs_list().is_empty());
    }

    #[test]
    fn moving_a_body_away_drops_the_pair() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let a = box_at(&mut bodies, 1, 10.0, 10.0);
        let b = box_at(&mut bodies, 2, 15.0, 10.0);

        let mut grid = Grid::new();
        grid.update(&mut bodies, &[a, b], false);
        assert_eq!(grid.pairs_list().len(), 1);

        bodies[b].set_position(Vector::new(5000.0, 5000.0), false);
        grid.update(&mut bodies, &[a, b], false);

        assert!(grid.pairs_list().is_empty());
    }
}
