//! The step driver: owns every arena and runs the fixed-timestep
//! pipeline (gravity → integrate → constraints → broadphase →
//! narrowphase → pair cache → resolver → sleeping) end to end.

use slotmap::SlotMap;

use crate::body::{self, Body};
use crate::broadphase::Grid;
use crate::composite::{self, Composite};
use crate::config::{BodyConfig, ConstraintConfig, EngineConfig};
use crate::constraint::{self, Constraint};
use crate::error::Result;
use crate::events::{Event, EventBus};
use crate::geometry::Vector;
use crate::id::{BodyId, CompositeId, ConstraintId};
use crate::narrowphase::Detector;
use crate::pair::PairSet;
use crate::{resolver, sleeping};

/// Default fixed timestep in milliseconds, assuming a 60Hz host loop.
pub const DEFAULT_DELTA: f64 = 1000.0 / 60.0 * 2.0;
/// Default Verlet correction factor (no correction).
pub const DEFAULT_CORRECTION: f64 = 1.0;

/// Owns the whole simulated world: every body/constraint/composite
/// arena, the broadphase grid, the narrowphase detector, the pair
/// cache, and the event bus. A step either runs to completion
/// synchronously or not at all.
pub struct Engine {
    pub bodies: SlotMap<BodyId, Body>,
    pub constraints: SlotMap<ConstraintId, Constraint>,
    pub composites: SlotMap<CompositeId, Composite>,
    pub world: CompositeId,
    pub events: EventBus,
    pub config: EngineConfig,

    grid: Grid,
    detector: Detector,
    pairs: PairSet,

    timestamp: f64,
    next_body_id: u64,
}

impl std::fmt::Debug for Engine {
    /// Listener closures in `EventBus` aren't `Debug`, so this reports
    /// everything else: arena sizes and simulation time, enough to
    /// tell one engine snapshot from another in a log line.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("bodies", &self.bodies.len())
            .field("constraints", &self.constraints.len())
            .field("composites", &self.composites.len())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let mut composites = SlotMap::default();
        let world = composites.insert(Composite::new("world"));

        Self {
            bodies: SlotMap::default(),
            constraints: SlotMap::default(),
            composites,
            world,
            events: EventBus::new(),
            config,
            grid: Grid::new(),
            detector: Detector::new(),
            pairs: PairSet::new(),
            timestamp: 0.0,
            next_body_id: 1,
        }
    }

    /// Allocate the next monotonic body id, scoped to this engine
    /// instance (never a process-wide counter).
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_body_id;
        self.next_body_id += 1;
        id
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Read-only view over every body currently in the world, for a
    /// host to render or serialize between steps without reaching into
    /// the arena directly.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &Body)> {
        self.bodies.iter()
    }

    /// Read-only view over every constraint currently in the world.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints.iter()
    }

    /// Insert a pre-built body into the world, attaching it to the
    /// top-level composite.
    pub fn add_body(&mut self, body: Body) -> BodyId {
        let id = self.bodies.insert(body);
        composite::add_body(&mut self.composites, &mut self.events, self.timestamp, self.world, id);
        id
    }

    /// Insert every body of an (optionally compound) set built by
    /// [`crate::body::factory::from_vertices`] or similar multi-body
    /// factories. The factory already aggregates the root's mass,
    /// inertia, and hull from its parts, so this only wires the
    /// `sub_parts`/`parent` links — calling [`body::set_parts`] here
    /// would re-aggregate an already-aggregated root and double-count
    /// its mass.
    pub fn add_compound(&mut self, mut parts: Vec<Body>) -> BodyId {
        if parts.len() == 1 {
            return self.add_body(parts.remove(0));
        }

        let root_body = parts.remove(0);
        let root_id = self.bodies.insert(root_body);
        let part_ids: Vec<BodyId> = parts.into_iter().map(|part| self.bodies.insert(part)).collect();

        for &part_id in &part_ids {
            if let Some(part) = self.bodies.get_mut(part_id) {
                part.parent = Some(root_id);
            }
        }
        if let Some(root) = self.bodies.get_mut(root_id) {
            root.sub_parts = part_ids;
        }

        composite::add_body(&mut self.composites, &mut self.events, self.timestamp, self.world, root_id);
        root_id
    }

    pub fn remove_body(&mut self, id: BodyId) {
        composite::remove_body(&mut self.composites, &mut self.events, self.timestamp, self.world, id);
        if let Some(body) = self.bodies.get(id) {
            for &part_id in &body.sub_parts.clone() {
                self.bodies.remove(part_id);
            }
        }
        self.bodies.remove(id);
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintId {
        let id = self.constraints.insert(constraint);
        composite::add_constraint(&mut self.composites, &mut self.events, self.timestamp, self.world, id);
        id
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) {
        composite::remove_constraint(&mut self.composites, &mut self.events, self.timestamp, self.world, id);
        self.constraints.remove(id);
    }

    /// Convenience wrapper: build and insert a rectangle body.
    pub fn add_rectangle(&mut self, x: f64, y: f64, width: f64, height: f64, config: BodyConfig) -> Result<BodyId> {
        let id = self.next_id();
        let body = body::factory::rectangle(id, x, y, width, height, config)?;
        Ok(self.add_body(body))
    }

    /// Convenience wrapper: build and insert a circle body.
    pub fn add_circle(&mut self, x: f64, y: f64, radius: f64, config: BodyConfig, max_sides: u32) -> Result<BodyId> {
        let id = self.next_id();
        let body = body::factory::circle(id, x, y, radius, config, max_sides)?;
        Ok(self.add_body(body))
    }

    /// Convenience wrapper: build and insert a (possibly compound) body
    /// from raw vertex rings.
    pub fn add_from_vertices(
        &mut self,
        x: f64,
        y: f64,
        vertex_sets: Vec<Vec<Vector>>,
        config: BodyConfig,
        flag_internal: bool,
        remove_collinear: f64,
        minimum_area: f64,
    ) -> Result<BodyId> {
        let mut next_id = self.next_body_id;
        let parts = body::factory::from_vertices(
            &mut || {
                let id = next_id;
                next_id += 1;
                id
            },
            x,
            y,
            vertex_sets,
            config,
            flag_internal,
            remove_collinear,
            minimum_area,
        )?;
        self.next_body_id = next_id;
        Ok(self.add_compound(parts))
    }

    /// Convenience wrapper: build and insert a distance constraint.
    pub fn add_distance_constraint(
        &mut self,
        body_a: Option<BodyId>,
        body_b: Option<BodyId>,
        point_a: Vector,
        point_b: Vector,
        length: Option<f64>,
        config: ConstraintConfig,
    ) -> ConstraintId {
        let constraint = Constraint::create(&self.bodies, body_a, body_b, point_a, point_b, length, config);
        self.add_constraint(constraint)
    }

    /// Run one fixed-timestep simulation tick.
    pub fn step(&mut self, delta: f64, correction: f64) {
        log::trace!("stepping engine: delta={delta}, correction={correction}");
        let time_scale = self.config.time_scale;

        // 1. Timestamp advance, beforeUpdate.
        self.timestamp += delta * time_scale;
        self.events.emit(Event::BeforeUpdate { timestamp: self.timestamp });

        // 2. Flatten world.
        let all_bodies = composite::all_bodies(&self.composites, self.world);
        let all_constraints = composite::all_constraints(&self.composites, self.world);

        // 3. Sleeping.update.
        if self.config.enable_sleeping {
            sleeping::update(&mut self.bodies, &all_bodies, time_scale, &mut self.events, self.timestamp);
        }

        // 4. Gravity.
        for &id in &all_bodies {
            if let Some(body) = self.bodies.get_mut(id) {
                if body.is_static || body.is_sleeping {
                    continue;
                }
                body.force += self.config.gravity * body.mass * self.config.gravity_scale;
            }
        }

        // 5. Integrate.
        body::update_all(&mut self.bodies, &all_bodies, delta, time_scale, correction);

        // 6. Constraints, first pass.
        constraint::pre_solve_all(&mut self.bodies, &all_bodies);
        constraint::solve_all(
            &mut self.bodies,
            &mut self.constraints,
            &all_constraints,
            time_scale,
            self.config.constraint_iterations,
        );
        constraint::post_solve_all(&mut self.bodies, &all_bodies, &mut self.events, self.timestamp);

        // 7. Broadphase.
        let world_modified = self.composites.get(self.world).is_some_and(|c| c.is_modified);
        if world_modified {
            self.grid.flush();
            if let Some(world) = self.composites.get_mut(self.world) {
                world.is_modified = false;
            }
        }
        self.grid.update(&mut self.bodies, &all_bodies, world_modified);

        // 8. Narrowphase.
        let broad_pairs: Vec<(BodyId, BodyId)> = self.grid.pairs_list().to_vec();
        let collisions = self.detector.collisions(&self.bodies, &broad_pairs);

        // 9. Pair update + old-pair GC.
        let transitions = self.pairs.update(collisions, &self.bodies, self.timestamp);

        // 10. Sleeping.afterCollisions.
        if self.config.enable_sleeping {
            let active_pairs: Vec<&crate::pair::Pair> = self.pairs.iter().filter(|p| p.is_active).collect();
            sleeping::after_collisions(&mut self.bodies, &active_pairs, time_scale, &mut self.events, self.timestamp);
        }

        // 11. collisionStart.
        if !transitions.started.is_empty() {
            log::debug!("{} pair(s) started colliding", transitions.started.len());
            self.events.emit(Event::CollisionStart {
                timestamp: self.timestamp,
                pairs: transitions.started,
            });
        }

        // 12. Resolver position.
        {
            let active_refs: Vec<&crate::pair::Pair> = self.pairs.iter().filter(|p| p.is_active).collect();
            resolver::pre_solve_position(&mut self.bodies, &active_refs);
        }
        {
            let mut active_mut: Vec<&mut crate::pair::Pair> = self.pairs.iter_mut().filter(|p| p.is_active).collect();
            resolver::solve_position(&mut self.bodies, &mut active_mut, time_scale, self.config.position_iterations);
        }
        resolver::post_solve_position(&mut self.bodies, &all_bodies);

        // 13. Constraints, second pass.
        constraint::pre_solve_all(&mut self.bodies, &all_bodies);
        constraint::solve_all(
            &mut self.bodies,
            &mut self.constraints,
            &all_constraints,
            time_scale,
            self.config.constraint_iterations,
        );
        constraint::post_solve_all(&mut self.bodies, &all_bodies, &mut self.events, self.timestamp);

        // 14. Resolver velocity.
        {
            let active_refs: Vec<&crate::pair::Pair> = self.pairs.iter().filter(|p| p.is_active).collect();
            resolver::pre_solve_velocity(&mut self.bodies, &active_refs);
        }
        {
            let mut active_mut: Vec<&mut crate::pair::Pair> = self.pairs.iter_mut().filter(|p| p.is_active).collect();
            resolver::solve_velocity(&mut self.bodies, &mut active_mut, time_scale, self.config.velocity_iterations);
        }

        // 15. collisionActive / collisionEnd.
        if !transitions.active.is_empty() {
            self.events.emit(Event::CollisionActive {
                timestamp: self.timestamp,
                pairs: transitions.active,
            });
        }
        if !transitions.ended.is_empty() {
            self.events.emit(Event::CollisionEnd {
                timestamp: self.timestamp,
                pairs: transitions.ended,
            });
        }

        // 16. Clear force/torque.
        for &id in &all_bodies {
            if let Some(body) = self.bodies.get_mut(id) {
                body.force = Vector::zero();
                body.torque = 0.0;
            }
        }

        // 17. afterUpdate.
        self.events.emit(Event::AfterUpdate { timestamp: self.timestamp });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BodyConfig;

    #[test]
    fn a_falling_box_gains_downward_velocity_after_one_step() {
        let mut engine = Engine::new(EngineConfig::default());
        let id = engine
            .add_rectangle(0.0, 0.0, 20.0, 20.0, BodyConfig { density: 1.0, ..BodyConfig::default() })
            .unwrap();

        engine.step(DEFAULT_DELTA, DEFAULT_CORRECTION);

        assert!(engine.bodies[id].velocity.y > 0.0);
    }

    #[test]
    fn a_box_resting_on_a_static_floor_does_not_fall_through() {
        let mut engine = Engine::new(EngineConfig::default());
        let _floor = engine
            .add_rectangle(0.0, 100.0, 400.0, 20.0, BodyConfig { density: 1.0, is_static: true, ..BodyConfig::default() })
            .unwrap();
        let box_id = engine
            .add_rectangle(0.0, 85.0, 20.0, 20.0, BodyConfig { density: 1.0, ..BodyConfig::default() })
            .unwrap();

        for _ in 0..30 {
            engine.step(DEFAULT_DELTA, DEFAULT_CORRECTION);
        }

        assert!(engine.bodies[box_id].position.y < 100.0);
    }

    #[test]
    fn removing_a_body_detaches_it_from_the_world() {
        let mut engine = Engine::new(EngineConfig::default());
        let id = engine
            .add_rectangle(0.0, 0.0, 10.0, 10.0, BodyConfig { density: 1.0, ..BodyConfig::default() })
            .unwrap();

        engine.remove_body(id);

        assert!(engine.bodies.get(id).is_none());
        assert!(!composite::all_bodies(&engine.composites, engine.world).contains(&id));
    }
}
