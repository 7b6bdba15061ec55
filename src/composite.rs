//! Hierarchical container for bodies, constraints, and nested
//! composites.
//!
//! A `Composite` holds three separate id lists, one per kind, so
//! `add_body`/`add_constraint`/`add_composite` each operate on their
//! own list rather than a single heterogeneous collection.

use crate::events::{Channel, Event, EventBus};
use crate::id::{BodyId, CompositeId, ConstraintId};

/// A node in the world tree. The engine's top-level world is itself a
/// `Composite` with `parent == None`.
#[derive(Debug, Clone, Default)]
pub struct Composite {
    pub label: String,
    pub bodies: Vec<BodyId>,
    pub constraints: Vec<ConstraintId>,
    pub composites: Vec<CompositeId>,
    pub parent: Option<CompositeId>,
    /// Set on any structural change to this node; consumed (and
    /// cleared) by the broadphase, which uses it to decide whether to
    /// flush and rebuild the grid from scratch.
    pub is_modified: bool,
}

impl Composite {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn add_body(&mut self, body: BodyId) {
        self.bodies.push(body);
        self.is_modified = true;
    }

    pub fn remove_body(&mut self, body: BodyId) {
        self.bodies.retain(|&id| id != body);
        self.is_modified = true;
    }

    pub fn add_constraint(&mut self, constraint: ConstraintId) {
        self.constraints.push(constraint);
        self.is_modified = true;
    }

    pub fn remove_constraint(&mut self, constraint: ConstraintId) {
        self.constraints.retain(|&id| id != constraint);
        self.is_modified = true;
    }

    pub fn add_composite(&mut self, composite: CompositeId) {
        self.composites.push(composite);
        self.is_modified = true;
    }

    pub fn remove_composite(&mut self, composite: CompositeId) {
        self.composites.retain(|&id| id != composite);
        self.is_modified = true;
    }

    /// Empty this composite's direct children. When `keep_static` is
    /// set, bodies are filtered by the caller first (this method has
    /// no access to body state, so the engine passes in the already
    /// -filtered retained set via `retained_bodies`).
    pub fn clear(&mut self, retained_bodies: Vec<BodyId>) {
        self.bodies = retained_bodies;
        self.constraints.clear();
        self.composites.clear();
        self.is_modified = true;
    }
}

/// Walk `root` and every composite transitively reachable from it
/// (via `composites`), collecting all bodies. Mirrors
/// `Composite.allBodies`.
pub fn all_bodies(
    composites: &slotmap::SlotMap<CompositeId, Composite>,
    root: CompositeId,
) -> Vec<BodyId> {
    let mut result = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(composite) = composites.get(id) {
            result.extend(composite.bodies.iter().copied());
            stack.extend(composite.composites.iter().copied());
        }
    }
    result
}

/// Mirrors `Composite.allConstraints`.
pub fn all_constraints(
    composites: &slotmap::SlotMap<CompositeId, Composite>,
    root: CompositeId,
) -> Vec<ConstraintId> {
    let mut result = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(composite) = composites.get(id) {
            result.extend(composite.constraints.iter().copied());
            stack.extend(composite.composites.iter().copied());
        }
    }
    result
}

/// Mirrors `Composite.allComposites`, including `root` itself.
pub fn all_composites(
    composites: &slotmap::SlotMap<CompositeId, Composite>,
    root: CompositeId,
) -> Vec<CompositeId> {
    let mut result = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        result.push(id);
        if let Some(composite) = composites.get(id) {
            stack.extend(composite.composites.iter().copied());
        }
    }
    result
}

/// Propagate `is_modified = true` from `start` up through every
/// ancestor (`parent` chain) on structural change.
pub fn mark_modified_upward(
    composites: &mut slotmap::SlotMap<CompositeId, Composite>,
    start: CompositeId,
) {
    let mut current = Some(start);
    while let Some(id) = current {
        let parent = if let Some(composite) = composites.get_mut(id) {
            composite.is_modified = true;
            composite.parent
        } else {
            None
        };
        current = parent;
    }
}

/// Add a body to `target`, bubbling `is_modified` upward and emitting
/// `beforeAdd`/`afterAdd` on `target`.
pub fn add_body(
    composites: &mut slotmap::SlotMap<CompositeId, Composite>,
    events: &mut EventBus,
    timestamp: f64,
    target: CompositeId,
    body: BodyId,
) {
    events.emit(Event::BeforeAdd {
        timestamp,
        composite: target,
    });
    if let Some(composite) = composites.get_mut(target) {
        composite.add_body(body);
    }
    mark_modified_upward(composites, target);
    events.emit(Event::AfterAdd {
        timestamp,
        composite: target,
    });
}

/// Remove a body from `target`, bubbling `is_modified` upward and
/// emitting `beforeRemove`/`afterRemove` on `target`.
pub fn remove_body(
    composites: &mut slotmap::SlotMap<CompositeId, Composite>,
    events: &mut EventBus,
    timestamp: f64,
    target: CompositeId,
    body: BodyId,
) {
    events.emit(Event::BeforeRemove {
        timestamp,
        composite: target,
    });
    if let Some(composite) = composites.get_mut(target) {
        composite.remove_body(body);
    }
    mark_modified_upward(composites, target);
    events.emit(Event::AfterRemove {
        timestamp,
        composite: target,
    });
}

/// Add a constraint to `target`, bubbling `is_modified` upward and
/// emitting `beforeAdd`/`afterAdd` on `target`.
pub fn add_constraint(
    composites: &mut slotmap::SlotMap<CompositeId, Composite>,
    events: &mut EventBus,
    timestamp: f64,
    target: CompositeId,
    constraint: ConstraintId,
) {
    events.emit(Event::BeforeAdd {
        timestamp,
        composite: target,
    });
    if let Some(composite) = composites.get_mut(target) {
        composite.add_constraint(constraint);
    }
    mark_modified_upward(composites, target);
    events.emit(Event::AfterAdd {
        timestamp,
        composite: target,
    });
}

/// Remove a constraint from `target`, bubbling `is_modified` upward
/// and emitting `beforeRemove`/`afterRemove` on `target`.
pub fn remove_constraint(
    composites: &mut slotmap::SlotMap<CompositeId, Composite>,
    events: &mut EventBus,
    timestamp: f64,
    target: CompositeId,
    constraint: ConstraintId,
) {
    events.emit(Event::BeforeRemove {
        timestamp,
        composite: target,
    });
    if let Some(composite) = composites.get_mut(target) {
        composite.remove_constraint(constraint);
    }
    mark_modified_upward(composites, target);
    events.emit(Event::AfterRemove {
        timestamp,
        composite: target,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn all_bodies_flattens_nested_composites() {
        let mut composites: SlotMap<CompositeId, Composite> = SlotMap::default();
        let mut bodies: SlotMap<BodyId, ()> = SlotMap::default();

        let child_body = bodies.insert(());
        let mut child = Composite::new("child");
        child.add_body(child_body);
        let child_id = composites.insert(child);

        let root_body = bodies.insert(());
        let mut root = Composite::new("root");
        root.add_body(root_body);
        root.add_composite(child_id);
        let root_id = composites.insert(root);

        let mut flattened = all_bodies(&composites, root_id);
        flattened.sort();
        let mut expected = vec![root_body, child_body];
        expected.sort();

        assert_eq!(flattened, expected);
    }

    #[test]
    fn mark_modified_upward_bubbles_through_every_ancestor() {
        let mut composites: SlotMap<CompositeId, Composite> = SlotMap::default();

        let mut grandparent = Composite::new("grandparent");
        grandparent.is_modified = false;
        let grandparent_id = composites.insert(grandparent);

        let mut parent = Composite::new("parent");
        parent.parent = Some(grandparent_id);
        parent.is_modified = false;
        let parent_id = composites.insert(parent);

        let mut child = Composite::new("child");
        child.parent = Some(parent_id);
        child.is_modified = false;
        let child_id = composites.insert(child);

        mark_modified_upward(&mut composites, child_id);

        assert!(composites[child_id].is_modified);
        assert!(composites[parent_id].is_modified);
        assert!(composites[grandparent_id].is_modified);
    }

    #[test]
    fn add_body_emits_before_and_after_events_in_order() {
        use std::sync::{Arc, Mutex};

        let mut composites: SlotMap<CompositeId, Composite> = SlotMap::default();
        let mut bodies: SlotMap<BodyId, ()> = SlotMap::default();
        let root_id = composites.insert(Composite::new("root"));
        let body_id = bodies.insert(());

        let mut events = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_before = Arc::clone(&log);
        events.on(Channel::BeforeAdd, move |_| log_before.lock().unwrap().push("before"));
        let log_after = Arc::clone(&log);
        events.on(Channel::AfterAdd, move |_| log_after.lock().unwrap().push("after"));

        add_body(&mut composites, &mut events, 0.0, root_id, body_id);

        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
        assert_eq!(composites[root_id].bodies, vec![body_id]);
    }
}
