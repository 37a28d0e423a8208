#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Steering behaviours returning desired velocities on the ground plane.
//!
//! Every helper works on the horizontal components of its inputs and returns
//! a velocity with a zero vertical component; the world keeps each actor at
//! its resting height. Degenerate inputs (coincident points, zero speeds)
//! yield a zero velocity instead of NaNs.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;

/// Minimum distance treated as a meaningful direction.
const MIN_DISTANCE: f32 = 1e-4;

/// Outcome of the boundary guard.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryCheck {
    /// Velocity that keeps the actor off blocked ground.
    pub velocity: Vec3,
    /// Whether the desired velocity had to be altered.
    pub blocked: bool,
}

fn flat(vector: Vec3) -> Vec3 {
    Vec3::new(vector.x, vector.y, 0.0)
}

fn direction(from: Vec3, to: Vec3) -> Option<(Vec3, f32)> {
    let offset = flat(to - from);
    let distance = offset.length();
    if distance < MIN_DISTANCE || !distance.is_finite() {
        return None;
    }
    Some((offset / distance, distance))
}

/// Moves toward `target` at full `speed`.
#[must_use]
pub fn seek(position: Vec3, target: Vec3, speed: f32) -> Vec3 {
    if speed <= 0.0 {
        return Vec3::ZERO;
    }
    direction(position, target).map_or(Vec3::ZERO, |(heading, _)| heading * speed)
}

/// Moves toward `target`, slowing linearly inside `slow_radius`.
#[must_use]
pub fn arrive(position: Vec3, target: Vec3, max_speed: f32, slow_radius: f32) -> Vec3 {
    if max_speed <= 0.0 {
        return Vec3::ZERO;
    }
    let Some((heading, distance)) = direction(position, target) else {
        return Vec3::ZERO;
    };
    let speed = if slow_radius > 0.0 {
        max_speed * (distance / slow_radius).clamp(0.0, 1.0)
    } else {
        max_speed
    };
    heading * speed
}

/// Moves directly away from `threat` at full `speed`.
#[must_use]
pub fn flee(position: Vec3, threat: Vec3, speed: f32) -> Vec3 {
    if speed <= 0.0 {
        return Vec3::ZERO;
    }
    direction(threat, position).map_or(Vec3::ZERO, |(heading, _)| heading * speed)
}

/// Jitters `heading` by at most `jitter` radians and walks along the result.
///
/// Returns the velocity and the new heading to store for the next call.
pub fn wander<R: Rng>(heading: f32, jitter: f32, speed: f32, rng: &mut R) -> (Vec3, f32) {
    let jitter = jitter.abs();
    let offset = if jitter > 0.0 {
        rng.gen_range(-jitter..=jitter)
    } else {
        0.0
    };
    let heading = (heading + offset).rem_euclid(TAU);
    let velocity = Vec3::new(heading.cos(), heading.sin(), 0.0) * speed.max(0.0);
    (velocity, heading)
}

/// Circles `center` at `radius`, steering back onto the ring when off it.
#[must_use]
pub fn orbit(position: Vec3, center: Vec3, radius: f32, speed: f32, clockwise: bool) -> Vec3 {
    if speed <= 0.0 {
        return Vec3::ZERO;
    }
    let Some((outward, distance)) = direction(center, position) else {
        return seek(position, center + Vec3::new(radius, 0.0, 0.0), speed);
    };
    let tangent = if clockwise {
        Vec3::new(outward.y, -outward.x, 0.0)
    } else {
        Vec3::new(-outward.y, outward.x, 0.0)
    };
    let correction = (radius - distance).clamp(-speed, speed);
    (tangent * speed + outward * correction).clamp_length_max(speed)
}

/// Pushes away from neighbours with a linear falloff, zero outside `radius`.
///
/// Neighbours sharing the exact position are ignored.
#[must_use]
pub fn separation<I>(position: Vec3, neighbors: I, radius: f32, strength: f32) -> Vec3
where
    I: IntoIterator<Item = Vec3>,
{
    if radius <= 0.0 || strength <= 0.0 {
        return Vec3::ZERO;
    }
    neighbors
        .into_iter()
        .filter_map(|neighbor| direction(neighbor, position))
        .filter(|(_, distance)| *distance < radius)
        .fold(Vec3::ZERO, |push, (away, distance)| {
            push + away * (1.0 - distance / radius) * strength
        })
}

/// Keeps an actor from stepping onto blocked ground such as water.
///
/// The point `lookahead` units along the velocity is tested. When it is
/// blocked the guard tries to slide along each axis before stopping.
#[must_use]
pub fn stop_at_boundary<F>(position: Vec3, velocity: Vec3, lookahead: f32, is_blocked: F) -> BoundaryCheck
where
    F: Fn(Vec3) -> bool,
{
    let velocity = flat(velocity);
    let heading = velocity.normalize_or_zero();
    if heading == Vec3::ZERO || !is_blocked(position + heading * lookahead) {
        return BoundaryCheck {
            velocity,
            blocked: false,
        };
    }

    let slides = [
        Vec3::new(velocity.x, 0.0, 0.0),
        Vec3::new(0.0, velocity.y, 0.0),
    ];
    let slide = slides
        .into_iter()
        .filter(|slide| slide.length_squared() > MIN_DISTANCE)
        .find(|slide| !is_blocked(position + slide.normalize_or_zero() * lookahead));
    BoundaryCheck {
        velocity: slide.unwrap_or(Vec3::ZERO),
        blocked: true,
    }
}

/// Moves `current` toward `desired` by at most `max_acceleration * dt`.
#[must_use]
pub fn clamp_acceleration(current: Vec3, desired: Vec3, max_acceleration: f32, dt: f32) -> Vec3 {
    let budget = (max_acceleration * dt).max(0.0);
    current + (desired - current).clamp_length_max(budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn seek_heads_toward_target_at_full_speed() {
        let velocity = seek(Vec3::ZERO, Vec3::new(10.0, 0.0, 50.0), 5.0);
        assert!(approx(velocity, Vec3::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn arrive_slows_inside_radius() {
        let far = arrive(Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0), 10.0, 20.0);
        let near = arrive(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), 10.0, 20.0);
        assert!(approx(far, Vec3::new(10.0, 0.0, 0.0)));
        assert!(approx(near, Vec3::new(2.5, 0.0, 0.0)));
    }

    #[test]
    fn flee_points_away_from_threat() {
        let velocity = flee(Vec3::new(1.0, 1.0, 0.0), Vec3::ZERO, 2.0);
        assert!(velocity.x > 0.0 && velocity.y > 0.0);
        assert!((velocity.length() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn degenerate_inputs_yield_zero() {
        let point = Vec3::new(3.0, 4.0, 0.0);
        assert_eq!(seek(point, point, 5.0), Vec3::ZERO);
        assert_eq!(arrive(point, point, 5.0, 1.0), Vec3::ZERO);
        assert_eq!(flee(point, point, 5.0), Vec3::ZERO);
        assert_eq!(seek(Vec3::ZERO, point, 0.0), Vec3::ZERO);
        assert_eq!(separation(point, [point], 10.0, 1.0), Vec3::ZERO);
    }

    #[test]
    fn separation_falls_off_linearly_and_vanishes_outside_radius() {
        let close = separation(Vec3::ZERO, [Vec3::new(2.5, 0.0, 0.0)], 10.0, 4.0);
        assert!(approx(close, Vec3::new(-3.0, 0.0, 0.0)));
        let outside = separation(Vec3::ZERO, [Vec3::new(12.0, 0.0, 0.0)], 10.0, 4.0);
        assert_eq!(outside, Vec3::ZERO);
    }

    #[test]
    fn orbit_moves_tangentially_on_the_ring() {
        let velocity = orbit(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO, 10.0, 3.0, false);
        assert!(approx(velocity, Vec3::new(0.0, 3.0, 0.0)));
        let clockwise = orbit(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO, 10.0, 3.0, true);
        assert!(approx(clockwise, Vec3::new(0.0, -3.0, 0.0)));
        let outside = orbit(Vec3::new(30.0, 0.0, 0.0), Vec3::ZERO, 10.0, 3.0, false);
        assert!(outside.x < 0.0);
        assert!(outside.length() <= 3.0 + 1e-4);
    }

    #[test]
    fn wander_is_deterministic_for_a_seed() {
        let mut first = ChaCha8Rng::seed_from_u64(3);
        let mut second = ChaCha8Rng::seed_from_u64(3);
        let a = wander(0.5, 0.3, 10.0, &mut first);
        let b = wander(0.5, 0.3, 10.0, &mut second);
        assert_eq!(a, b);
        assert!((a.0.length() - 10.0).abs() < 1e-3);
        assert!((a.1 - 0.5).abs() <= 0.3 + 1e-6);
    }

    #[test]
    fn boundary_guard_slides_or_stops() {
        let water = |point: Vec3| point.x > 10.0;
        let free = stop_at_boundary(Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0), 20.0, water);
        assert_eq!(free.velocity, Vec3::new(0.0, 5.0, 0.0));
        assert!(!free.blocked);

        let slide = stop_at_boundary(Vec3::ZERO, Vec3::new(5.0, 5.0, 0.0), 20.0, water);
        assert!(slide.blocked);
        assert_eq!(slide.velocity, Vec3::new(0.0, 5.0, 0.0));

        let stop = stop_at_boundary(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), 20.0, water);
        assert!(stop.blocked);
        assert_eq!(stop.velocity, Vec3::ZERO);
    }

    #[test]
    fn acceleration_is_capped_per_tick() {
        let next = clamp_acceleration(Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0), 50.0, 0.5);
        assert!(approx(next, Vec3::new(25.0, 0.0, 0.0)));
        let reached = clamp_acceleration(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 50.0, 0.5);
        assert!(approx(reached, Vec3::new(10.0, 0.0, 0.0)));
    }
}
