//! Involuntary states: freeze, stagger and the harpoon pull.

use glam::Vec3;
use grimhold_core::{
    seconds, ActorSnapshot, ActorState, ActorView, ArchetypeProfile, Command, Locomotion, Motion,
    Restrainer, Status, TransitionCause,
};
use grimhold_system_perception::flat_distance;
use grimhold_system_steering::seek;
use grimhold_world::query::Frame;
use tracing::debug;

/// Remaining pull distance under which the harpoon counts as reeled in.
const PULL_SLACK: f32 = 0.5;

pub(crate) fn update(
    frame: &Frame<'_>,
    actors: &ActorView,
    actor: &ActorSnapshot,
    profile: &ArchetypeProfile,
    out: &mut Vec<Command>,
) {
    let stagger = Command::ApplyStatus {
        actor: actor.id,
        status: Status::Stagger {
            duration: seconds(profile.stagger_secs),
        },
    };
    match actor.state {
        ActorState::Harpooned => {
            if let Some(velocity) = pull(frame, actors, actor, profile.locomotion) {
                out.push(Command::MoveActor {
                    actor: actor.id,
                    velocity,
                    motion: Motion::Scripted,
                });
            } else {
                out.push(stagger);
            }
        }
        ActorState::Freeze => {
            if actor.timers.status.is_zero() {
                out.push(stagger);
            }
        }
        ActorState::Stagger => {
            if actor.timers.status.is_zero() {
                let next = if actor.perception.is_remembered() {
                    ActorState::Chase
                } else {
                    ActorState::Idle
                };
                out.push(Command::Transition {
                    actor: actor.id,
                    state: next,
                    cause: TransitionCause::Behavior,
                });
            }
        }
        _ => {}
    }
}

/// Velocity dragging the actor toward its restrainer, or `None` once the
/// pull is over because the restrainer is close, gone or dead, or the next
/// step would drag the actor onto ground it cannot stand on.
///
/// The step never carries the actor past the stop distance.
fn pull(
    frame: &Frame<'_>,
    actors: &ActorView,
    actor: &ActorSnapshot,
    locomotion: Locomotion,
) -> Option<Vec3> {
    let restraint = actor.restraint?;
    let anchor = match restraint.restrainer {
        Restrainer::Player => Some(frame.target.position),
        Restrainer::Actor(id) => actors
            .get(id)
            .filter(|restrainer| !restrainer.state.is_terminal())
            .map(|restrainer| restrainer.position),
    };
    let Some(anchor) = anchor else {
        debug!(actor = ?actor.id, "restrainer gone, releasing");
        return None;
    };
    let remaining = flat_distance(actor.position, anchor) - restraint.stop_distance;
    if remaining <= PULL_SLACK {
        return None;
    }

    let dt = frame.dt.as_secs_f32();
    let speed = if dt > 0.0 {
        restraint.pull_speed.min(remaining / dt)
    } else {
        restraint.pull_speed
    };
    let flat_anchor = Vec3::new(anchor.x, anchor.y, actor.position.z);
    let velocity = seek(actor.position, flat_anchor, speed);
    if !frame
        .level
        .is_position_passable(actor.position + velocity * dt, locomotion)
    {
        debug!(actor = ?actor.id, "pull blocked by geometry, releasing");
        return None;
    }
    Some(velocity)
}
