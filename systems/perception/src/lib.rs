#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Visibility and memory model shared by every archetype.
//!
//! An actor becomes aware of the target the moment it sees it and stays
//! aware while the target remains visible. Once sight is lost the last
//! confirmed position is remembered until the forget timer expires. A target
//! that cannot be perceived at all forces every actor back to unaware.

use std::time::Duration;

use glam::Vec3;
use grimhold_core::{
    ActorSnapshot, Awareness, BandTuning, PerceptionRecord, SightTuning, TargetSnapshot,
};
use grimhold_world::Level;
use tracing::trace;

/// Factor applied to the detection radius while the target is already tracked.
const TRACKING_MARGIN: f32 = 1.2;

/// Hysteresis band: entered below `enter`, left only above `exit`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceBand {
    enter: f32,
    exit: f32,
}

impl DistanceBand {
    /// Creates a band, widening `exit` to `enter` when given inverted bounds.
    #[must_use]
    pub fn new(enter: f32, exit: f32) -> Self {
        Self {
            enter,
            exit: exit.max(enter),
        }
    }

    /// Reports whether `distance` lies inside the band given the previous answer.
    #[must_use]
    pub fn contains(&self, distance: f32, was_inside: bool) -> bool {
        if was_inside {
            distance <= self.exit
        } else {
            distance <= self.enter
        }
    }
}

impl From<BandTuning> for DistanceBand {
    fn from(tuning: BandTuning) -> Self {
        Self::new(tuning.enter, tuning.exit)
    }
}

/// Straight-line distance on the ground plane.
#[must_use]
pub fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x - b.x, a.y - b.y, 0.0).length()
}

/// Evaluates whether the actor currently sees the target.
///
/// The target must be perceivable, inside the detection band (widened while
/// the actor already sees it) and visible through the line-of-sight fan.
#[must_use]
pub fn can_see_target(
    level: &Level,
    sight: &SightTuning,
    actor: &ActorSnapshot,
    target: &TargetSnapshot,
    detection_radius: f32,
) -> bool {
    if !target.perceivable {
        return false;
    }
    let band = DistanceBand::new(detection_radius, detection_radius * TRACKING_MARGIN);
    let distance = flat_distance(actor.position, target.position);
    if !band.contains(distance, actor.perception.can_see_now) {
        return false;
    }
    level.has_line_of_sight(actor.position, target.position, sight.spread, sight)
}

/// Produces the next perception record from the latest visibility result.
///
/// `record.since_seen` is expected to have been advanced by the tick already.
#[must_use]
pub fn update_record(
    record: PerceptionRecord,
    visible: bool,
    target: &TargetSnapshot,
    forget_time: Duration,
) -> PerceptionRecord {
    if !target.perceivable {
        return PerceptionRecord::default();
    }
    if visible {
        return PerceptionRecord {
            awareness: Awareness::Aware,
            can_see_now: true,
            last_known: Some(target.position),
            since_seen: Duration::ZERO,
        };
    }
    if record.awareness == Awareness::Aware && record.since_seen >= forget_time {
        trace!(since_seen = ?record.since_seen, "target forgotten");
        return PerceptionRecord {
            since_seen: record.since_seen,
            ..PerceptionRecord::default()
        };
    }
    PerceptionRecord {
        can_see_now: false,
        ..record
    }
}

/// Runs a full perception update for one actor.
#[must_use]
pub fn observe(
    level: &Level,
    sight: &SightTuning,
    actor: &ActorSnapshot,
    target: &TargetSnapshot,
    detection_radius: f32,
    forget_time: Duration,
) -> PerceptionRecord {
    let visible = can_see_target(level, sight, actor, target, detection_radius);
    update_record(actor.perception, visible, target, forget_time)
}
