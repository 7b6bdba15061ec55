//! Pair cache: turns this step's raw narrowphase `Collision`s into
//! persistent `Pair`s with start/active/end lifecycle events and
//! warm-started contact impulses.
//!
//! Keyed by a `HashMap<PairKey, Pair>` where `PairKey` is the
//! numeric-id tuple from [`crate::id`].

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::body::Body;
use crate::id::{BodyId, PairKey};
use crate::narrowphase::Collision;

/// Pair-id sets for the three lifecycle transitions this step, for the
/// caller (the engine) to emit `collisionStart`/`collisionActive`/
/// `collisionEnd` at the exact points in §4.13's ordering, rather than
/// the pair cache dispatching events itself mid-update.
#[derive(Debug, Default)]
pub struct PairTransitions {
    pub started: Vec<PairKey>,
    pub active: Vec<PairKey>,
    pub ended: Vec<PairKey>,
}

/// Pairs idle (neither body active in a collision) longer than this,
/// in milliseconds, are garbage collected. Normative constant.
pub const PAIR_MAX_IDLE_LIFE: f64 = 1000.0;

/// Fixed slop the resolver treats as "close enough" penetration to
/// leave uncorrected. The source keeps this as a `Resolver` constant,
/// not a per-body property, despite `Pair.slop` reading as though
/// it were computed per pair; this cache just stores that constant
/// per pair for uniformity with the rest of the combined-coefficient
/// fields.
pub const SLOP: f64 = 0.05;

/// A warm-startable contact impulse, keyed by the incident vertex's
/// index within its body (see [`crate::narrowphase::Contact::vertex_id`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistedContact {
    pub normal_impulse: f64,
    pub tangent_impulse: f64,
}

/// One tracked collision pair between two convex parts.
#[derive(Debug, Clone)]
pub struct Pair {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub collision: Collision,
    pub contacts: HashMap<usize, PersistedContact>,
    /// Vertex ids of this step's manifold, in `collision.supports` order.
    pub active_contacts: Vec<usize>,
    pub separation: f64,
    pub is_active: bool,
    pub confirmed_active: bool,
    pub is_sensor: bool,
    pub time_created: f64,
    pub time_updated: f64,
    pub inverse_mass: f64,
    pub friction: f64,
    pub friction_static: f64,
    pub restitution: f64,
    pub slop: f64,
}

impl Pair {
    fn from_collision(collision: Collision, bodies: &SlotMap<BodyId, Body>, timestamp: f64) -> Self {
        let a = &bodies[collision.body_a];
        let b = &bodies[collision.body_b];

        let mut pair = Self {
            body_a: collision.body_a,
            body_b: collision.body_b,
            collision,
            contacts: HashMap::new(),
            active_contacts: Vec::new(),
            separation: 0.0,
            is_active: true,
            confirmed_active: true,
            is_sensor: a.is_sensor || b.is_sensor,
            time_created: timestamp,
            time_updated: timestamp,
            inverse_mass: a.inverse_mass + b.inverse_mass,
            friction: a.friction.min(b.friction),
            friction_static: a.friction_static.max(b.friction_static),
            restitution: a.restitution.max(b.restitution),
            slop: SLOP,
        };
        pair.refresh_contacts();
        pair
    }

    fn update_from_collision(&mut self, collision: Collision, bodies: &SlotMap<BodyId, Body>, timestamp: f64) {
        let a = &bodies[collision.body_a];
        let b = &bodies[collision.body_b];

        self.collision = collision;
        self.inverse_mass = a.inverse_mass + b.inverse_mass;
        self.friction = a.friction.min(b.friction);
        self.friction_static = a.friction_static.max(b.friction_static);
        self.restitution = a.restitution.max(b.restitution);
        self.time_updated = timestamp;
        self.refresh_contacts();
    }

    /// Rebuild `active_contacts` from this step's manifold, carrying
    /// forward any persisted impulse for a vertex id that survives
    /// and dropping impulses for vertex ids no longer in contact.
    fn refresh_contacts(&mut self) {
        let live: Vec<usize> = self.collision.supports.iter().map(|c| c.vertex_id).collect();
        self.contacts.retain(|id, _| live.contains(id));
        for &id in &live {
            self.contacts.entry(id).or_default();
        }
        self.active_contacts = live;
    }
}

/// Owns the whole pair cache across steps.
#[derive(Debug, Default)]
pub struct PairSet {
    pairs: HashMap<PairKey, Pair>,
}

impl PairSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: PairKey) -> Option<&Pair> {
        self.pairs.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pair> {
        self.pairs.values_mut()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// §4.10: fold this step's collisions into the cache, firing
    /// `collisionStart`/`collisionActive`/`collisionEnd` as pairs
    /// transition, then drop stale ones via `remove_old`.
    pub fn update(
        &mut self,
        collisions: Vec<Collision>,
        bodies: &SlotMap<BodyId, Body>,
        timestamp: f64,
    ) -> PairTransitions {
        for pair in self.pairs.values_mut() {
            pair.confirmed_active = false;
        }

        let mut started = Vec::new();
        let mut active = Vec::new();

        for collision in collisions {
            if !collision.collided {
                continue;
            }
            let key = pair_key(bodies, collision.body_a, collision.body_b);

            match self.pairs.get_mut(&key) {
                None => {
                    self.pairs.insert(key, Pair::from_collision(collision, bodies, timestamp));
                    started.push(key);
                }
                Some(pair) if !pair.is_active => {
                    pair.is_active = true;
                    pair.confirmed_active = true;
                    pair.update_from_collision(collision, bodies, timestamp);
                    started.push(key);
                }
                Some(pair) => {
                    pair.confirmed_active = true;
                    pair.update_from_collision(collision, bodies, timestamp);
                    active.push(key);
                }
            }
        }

        let mut ended = Vec::new();
        for (&key, pair) in self.pairs.iter_mut() {
            if !pair.confirmed_active && pair.is_active {
                pair.is_active = false;
                ended.push(key);
            }
        }

        self.remove_old(timestamp, bodies);

        PairTransitions { started, active, ended }
    }

    /// Drop pairs whose `time_updated` is older than
    /// [`PAIR_MAX_IDLE_LIFE`], unless one of the two bodies is
    /// sleeping, in which case refresh `time_updated` instead so a
    /// long nap doesn't silently evict the pair.
    pub fn remove_old(&mut self, timestamp: f64, bodies: &SlotMap<BodyId, Body>) {
        let mut refresh = Vec::new();
        self.pairs.retain(|&key, pair| {
            if timestamp - pair.time_updated < PAIR_MAX_IDLE_LIFE {
                return true;
            }
            let a_sleeping = bodies.get(pair.body_a).is_some_and(|b| b.is_sleeping);
            let b_sleeping = bodies.get(pair.body_b).is_some_and(|b| b.is_sleeping);
            if a_sleeping || b_sleeping {
                refresh.push(key);
                true
            } else {
                false
            }
        });
        for key in refresh {
            if let Some(pair) = self.pairs.get_mut(&key) {
                pair.time_updated = timestamp;
            }
        }
    }
}

fn pair_key(bodies: &SlotMap<BodyId, Body>, a: BodyId, b: BodyId) -> PairKey {
    let ida = bodies.get(a).map_or(0, |body| body.id);
    let idb = bodies.get(b).map_or(0, |body| body.id);
    if ida <= idb {
        (ida, idb)
    } else {
        (idb, ida)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BodyConfig;
    use crate::geometry::Vector;
    use crate::narrowphase::Detector;

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
    fn a_new_collision_is_reported_as_started_once() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let a = bodies.insert(square(1, 0.0, 0.0));
        let b = bodies.insert(square(2, 8.0, 0.0));

        let mut detector = Detector::new();
        let collisions = detector.collisions(&bodies, &[(a, b)]);

        let mut pair_set = PairSet::new();
        let transitions = pair_set.update(collisions, &bodies, 0.0);

        assert_eq!(transitions.started.len(), 1);
        assert!(transitions.active.is_empty());
        assert_eq!(pair_set.len(), 1);
    }

    #[test]
    fn a_pair_that_stops_colliding_is_reported_as_ended() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let a = bodies.insert(square(1, 0.0, 0.0));
        let b = bodies.insert(square(2, 8.0, 0.0));

        let mut detector = Detector::new();
        let mut pair_set = PairSet::new();

        let first = detector.collisions(&bodies, &[(a, b)]);
        pair_set.update(first, &bodies, 0.0);

        let transitions = pair_set.update(Vec::new(), &bodies, 16.0);

        assert_eq!(transitions.ended.len(), 1);
        assert!(!pair_set.iter().next().unwrap().is_active);
    }

    #[test]
    fn old_inactive_pairs_are_garbage_collected() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let a = bodies.insert(square(1, 0.0, 0.0));
        let b = bodies.insert(square(2, 8.0, 0.0));

        let mut detector = Detector::new();
        let mut pair_set = PairSet::new();

        let first = detector.collisions(&bodies, &[(a, b)]);
        pair_set.update(first, &bodies, 0.0);
        pair_set.update(Vec::new(), &bodies, 16.0);
        assert_eq!(pair_set.len(), 1);

        pair_set.update(Vec::new(), &bodies, 16.0 + PAIR_MAX_IDLE_LIFE + 1.0);
        assert!(pair_set.is_empty());
    }
}
