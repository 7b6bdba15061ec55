//! End-to-end simulation scenarios (S1-S6), exercised through the
//! public `Engine` API the way a host application would drive it.

use std::sync::{Arc, Mutex};

use rigid2d::events::Channel;
use rigid2d::geometry::decomp;
use rigid2d::geometry::vertices;
use rigid2d::{BodyConfig, ConstraintConfig, Engine, EngineConfig, Vector};

const DELTA: f64 = 16.666;

fn dynamic_box() -> BodyConfig {
    BodyConfig { density: 0.001, ..BodyConfig::default() }
}

fn static_box() -> BodyConfig {
    BodyConfig { density: 0.001, is_static: true, ..BodyConfig::default() }
}

#[test]
fn s1_single_box_falls_under_gravity() {
    let mut engine = Engine::new(EngineConfig::default());
    let id = engine.add_rectangle(100.0, 50.0, 20.0, 20.0, dynamic_box()).unwrap();

    for _ in 0..30 {
        engine.step(DELTA, 1.0);
    }

    assert!(engine.bodies[id].position.y > 50.0);
    assert!(engine.bodies[id].velocity.y > 0.0);
}

#[test]
fn s2_box_rests_on_static_floor() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.add_rectangle(200.0, 235.0, 400.0, 30.0, static_box()).unwrap();
    let box_id = engine.add_rectangle(200.0, 50.0, 20.0, 20.0, dynamic_box()).unwrap();

    let active_pairs = Arc::new(Mutex::new(0usize));
    let active_pairs_write = Arc::clone(&active_pairs);
    engine.events.on(Channel::CollisionActive, move |event| {
        if let rigid2d::Event::CollisionActive { pairs, .. } = event {
            *active_pairs_write.lock().unwrap() = pairs.len();
        }
    });

    for _ in 0..300 {
        engine.step(DELTA, 1.0);
    }

    let body = &engine.bodies[box_id];
    assert!(body.velocity.y.abs() < 0.5);
    assert!((body.position.y - (235.0 - 15.0 - 10.0)).abs() < 5.0);
    assert!(*active_pairs.lock().unwrap() >= 1);
}

#[test]
fn s3_three_stacked_boxes_settle() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.add_rectangle(200.0, 235.0, 400.0, 30.0, static_box()).unwrap();
    let bottom = engine.add_rectangle(200.0, 200.0, 20.0, 20.0, dynamic_box()).unwrap();
    let middle = engine.add_rectangle(200.0, 180.0, 20.0, 20.0, dynamic_box()).unwrap();
    let top = engine.add_rectangle(200.0, 160.0, 20.0, 20.0, dynamic_box()).unwrap();

    for _ in 0..600 {
        engine.step(DELTA, 1.0);
    }

    for id in [bottom, middle, top] {
        let velocity = engine.bodies[id].velocity;
        assert!((velocity.x * velocity.x + velocity.y * velocity.y).sqrt() < 1.0);
    }
}

#[test]
fn s4_distance_constraint_keeps_bodies_near_rest_length() {
    let mut engine = Engine::new(EngineConfig::default());
    let anchor = engine.add_rectangle(200.0, 50.0, 10.0, 10.0, static_box()).unwrap();
    let bob = engine.add_circle(200.0, 150.0, 10.0, dynamic_box(), 25).unwrap();

    engine.add_distance_constraint(
        Some(anchor),
        Some(bob),
        Vector::zero(),
        Vector::zero(),
        Some(100.0),
        ConstraintConfig { stiffness: 1.0, ..ConstraintConfig::default() },
    );

    let bob_position = engine.bodies[bob].position;
    engine.bodies[bob].apply_force(bob_position, Vector::new(5.0, 0.0));

    for _ in 0..120 {
        engine.step(DELTA, 1.0);
    }

    let distance = (engine.bodies[bob].position - engine.bodies[anchor].position).magnitude();
    assert!((99.0..=101.0).contains(&distance), "distance was {distance}");
}

#[test]
fn s5_body_sleeps_then_wakes_when_something_lands_on_it() {
    let mut config = EngineConfig::default();
    config.enable_sleeping = true;
    let mut engine = Engine::new(config);

    engine.add_rectangle(200.0, 235.0, 400.0, 30.0, static_box()).unwrap();
    let box_id = engine.add_rectangle(200.0, 50.0, 20.0, 20.0, dynamic_box()).unwrap();

    let sleep_starts = Arc::new(Mutex::new(0u32));
    let starts_write = Arc::clone(&sleep_starts);
    engine.events.on(Channel::SleepStart, move |_| *starts_write.lock().unwrap() += 1);

    let sleep_ends = Arc::new(Mutex::new(0u32));
    let ends_write = Arc::clone(&sleep_ends);
    engine.events.on(Channel::SleepEnd, move |_| *ends_write.lock().unwrap() += 1);

    for _ in 0..300 {
        engine.step(DELTA, 1.0);
    }
    assert!(*sleep_starts.lock().unwrap() >= 1);
    assert!(engine.bodies[box_id].is_sleeping);

    let dropped = engine.add_rectangle(205.0, 0.0, 20.0, 20.0, dynamic_box()).unwrap();
    let _ = dropped;
    for _ in 0..60 {
        engine.step(DELTA, 1.0);
    }

    assert!(*sleep_ends.lock().unwrap() >= 1);
}

#[test]
fn s6_concave_polygon_decomposes_into_two_equal_area_convex_pieces() {
    let concave = vec![
        Vector::new(-1.0, 1.0),
        Vector::new(-1.0, 0.0),
        Vector::new(1.0, 0.0),
        Vector::new(1.0, 1.0),
        Vector::new(0.5, 0.5),
    ];

    let input_area = vertices::area(&concave, false);
    let parts = decomp::quick_decomp(&concave);

    assert_eq!(parts.len(), 2);
    let combined: f64 = parts.iter().map(|part| vertices::area(part, false)).sum();
    assert!((combined - input_area).abs() < 1e-6);
}
