//! Sleeping controller: lets bodies whose motion has settled stop
//! participating in integration/resolution until something wakes them.
//!
//! Grounded on `constraint::post_solve_all`'s wake-on-impulse pattern
//! (toggle a flag, emit the matching event), generalized to the
//! motion-EMA threshold scheme of §4.12.

use slotmap::SlotMap;

use crate::body::Body;
use crate::events::{Event, EventBus};
use crate::id::BodyId;
use crate::pair::Pair;

/// Matter.js `Sleeping._motionSleepThreshold`.
const MOTION_SLEEP_THRESHOLD: f64 = 0.08;
/// Matter.js `Sleeping._motionWakeThreshold`.
const MOTION_WAKE_THRESHOLD: f64 = 0.18;
/// Matter.js `Sleeping._minBias`.
const MIN_BIAS: f64 = 0.9;

/// §4.12, run once per step after integration and before the solvers,
/// only when `engine.enable_sleeping`.
pub fn update(bodies: &mut SlotMap<BodyId, Body>, body_ids: &[BodyId], time_scale: f64, events: &mut EventBus, timestamp: f64) {
    let threshold = MOTION_SLEEP_THRESHOLD * time_scale.powi(3);

    for &id in body_ids {
        let Some(body) = bodies.get_mut(id) else { continue };
        if body.is_static {
            continue;
        }

        if body.force.x != 0.0 || body.force.y != 0.0 {
            if body.is_sleeping {
                body.set_sleeping(false);
                events.emit(Event::SleepEnd { timestamp, body: id });
            }
            continue;
        }

        let motion = body.speed * body.speed + body.angular_speed * body.angular_speed;
        body.motion = MIN_BIAS * body.motion.min(motion) + (1.0 - MIN_BIAS) * body.motion.max(motion);

        if body.sleep_threshold > 0 && body.motion < threshold {
            body.sleep_counter += 1;
            if body.sleep_counter >= body.sleep_threshold {
                body.set_sleeping(true);
                log::debug!("body {} fell asleep", body.id);
                events.emit(Event::SleepStart { timestamp, body: id });
            }
        } else {
            body.sleep_counter = body.sleep_counter.saturating_sub(1);
        }
    }
}

/// §4.12 `afterCollisions`: for every active pair where exactly one
/// body sleeps, wake it if the other body's motion exceeds the wake
/// threshold.
pub fn after_collisions(bodies: &mut SlotMap<BodyId, Body>, pairs: &[&Pair], time_scale: f64, events: &mut EventBus, timestamp: f64) {
    let threshold = MOTION_WAKE_THRESHOLD * time_scale.powi(3);

    for pair in pairs {
        if !pair.is_active {
            continue;
        }
        let Some(a) = bodies.get(pair.body_a) else { continue };
        let Some(b) = bodies.get(pair.body_b) else { continue };

        let (sleeping_id, other_motion) = match (a.is_sleeping, b.is_sleeping) {
            (true, false) => (pair.body_a, b.motion),
            (false, true) => (pair.body_b, a.motion),
            _ => continue,
        };

        if other_motion > threshold {
            if let Some(body) = bodies.get_mut(sleeping_id) {
                body.set_sleeping(false);
            }
            events.emit(Event::SleepEnd { timestamp, body: sleeping_id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BodyConfig;
    use crate::geometry::Vector;

    fn resting_body(id: u64, sleep_threshold: u32) -> Body {
        let verts = vec![
            Vector::new(-5.0, -5.0),
            Vector::new(5.0, -5.0),
            Vector::new(5.0, 5.0),
            Vector::new(-5.0, 5.0),
        ];
        let mut body = Body::create(
            id,
            Vector::new(0.0, 0.0),
            0.0,
            verts,
            BodyConfig { density: 1.0, sleep_threshold, ..BodyConfig::default() },
        )
        .unwrap();
        body.speed = 0.0;
        body.angular_speed = 0.0;
        body.motion = 0.0;
        body
    }

    #[test]
    fn a_still_body_falls_asleep_after_enough_steps() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let id = bodies.insert(resting_body(1, 3));
        let mut events = EventBus::new();

        for step in 0..3 {
            update(&mut bodies, &[id], 1.0, &mut events, step as f64);
        }

        assert!(bodies[id].is_sleeping);
    }

    #[test]
    fn a_nonzero_force_wakes_a_sleeping_body() {
        let mut bodies: SlotMap<BodyId, Body> = SlotMap::default();
        let id = bodies.insert(resting_body(1, 1));
        let mut events = EventBus::new();

        update(&mut bodies, &[id], 1.0, &mut events, 0.0);
        assert!(bodies[id].is_sleeping);

        bodies[id].force = Vector::new(1.0, 0.0);
        update(&mut bodies, &[id], 1.0, &mut events, 1.0);

        assert!(!bodies[id].is_sleeping);
    }
}
