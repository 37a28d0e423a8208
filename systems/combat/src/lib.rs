#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Combat resolution for attacking actors.
//!
//! Melee swings deal damage while the state timer sits inside the hit window;
//! the world lands each swing at most once. Ranged attacks fire when the
//! cooldown has elapsed and the animation crosses the trigger frame. Before
//! anything resolves, attacking actors sharing a tile are arbitrated so that
//! only the lowest id keeps its attack.

use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use glam::Vec3;
use grimhold_core::{
    facing_direction, seconds, ActorId, ActorSnapshot, ActorState, ActorView, Archetype,
    ArchetypeProfile, AreaEffect, AttackProfile, Command, DamageSource, Event, FireRequest,
    TransitionCause,
};
use grimhold_system_perception::flat_distance;
use grimhold_world::{query::Frame, Level};
use tracing::{debug, trace};

/// Pure system that resolves attacks and tile arbitration.
#[derive(Debug, Default)]
pub struct Combat;

impl Combat {
    /// Consumes world events and immutable views to emit combat commands.
    pub fn handle(
        &self,
        events: &[Event],
        frame: &Frame<'_>,
        actors: &ActorView,
        out: &mut Vec<Command>,
    ) {
        if !events
            .iter()
            .any(|event| matches!(event, Event::TimeAdvanced { .. }))
        {
            return;
        }

        let yielding = arbitrate(frame.level, actors, out);
        for actor in actors.iter() {
            if actor.state.is_terminal()
                || actor.health.is_depleted()
                || yielding.contains(&actor.id)
            {
                continue;
            }
            let profile = frame.tuning.profile(actor.archetype);
            match actor.state {
                ActorState::MeleeAttack => swing(frame, actor, profile, out),
                ActorState::Attack => {
                    fire(frame, actor, profile, out);
                    lay_brood(frame.level, actor, profile, out);
                }
                _ => {}
            }
        }
    }
}

/// Sends every attacking actor but the lowest id on a shared tile to reposition.
///
/// Returns the actors that yielded.
pub fn arbitrate(level: &Level, actors: &ActorView, out: &mut Vec<Command>) -> BTreeSet<ActorId> {
    let mut claims = BTreeMap::new();
    let mut yielding = BTreeSet::new();
    let attackers = actors
        .iter()
        .filter(|actor| actor.state.is_attack_committed() && !actor.health.is_depleted());

    for actor in attackers {
        let Some(tile) = level.world_to_tile(actor.position) else {
            continue;
        };
        match claims.entry(tile) {
            Entry::Vacant(entry) => {
                let _ = entry.insert(actor.id);
            }
            Entry::Occupied(entry) => {
                debug!(actor = ?actor.id, holder = ?entry.get(), ?tile, "attack tile contested");
                let _ = yielding.insert(actor.id);
                out.push(Command::Transition {
                    actor: actor.id,
                    state: ActorState::Reposition,
                    cause: TransitionCause::Arbitration,
                });
            }
        }
    }
    yielding
}

fn swing(frame: &Frame<'_>, actor: &ActorSnapshot, profile: &ArchetypeProfile, out: &mut Vec<Command>) {
    let AttackProfile::Melee {
        damage,
        reach,
        window_start_secs,
        window_end_secs,
        slam_radius,
        slam_min_damage,
        ..
    } = profile.attack
    else {
        return;
    };
    let elapsed = actor.timers.state;
    if elapsed < seconds(window_start_secs) || elapsed > seconds(window_end_secs) {
        return;
    }
    if !frame.target.perceivable {
        return;
    }

    match slam_radius {
        Some(radius) => {
            let origin = actor.position + facing_direction(actor.facing) * (reach * 0.5);
            out.push(Command::AreaDamage {
                effect: AreaEffect {
                    origin,
                    radius,
                    max_damage: damage,
                    min_damage: slam_min_damage,
                },
                source: DamageSource::Actor {
                    attacker: actor.id,
                    attack: actor.attack,
                },
                hits_player: true,
                hits_actors: false,
            });
        }
        None => {
            if flat_distance(actor.position, frame.target.position) <= reach {
                out.push(Command::MeleeHit {
                    attacker: actor.id,
                    attack: actor.attack,
                    damage,
                });
            }
        }
    }
}

fn fire(frame: &Frame<'_>, actor: &ActorSnapshot, profile: &ArchetypeProfile, out: &mut Vec<Command>) {
    let AttackProfile::Ranged {
        projectile,
        trigger_frame,
        muzzle_height,
        ..
    } = profile.attack
    else {
        return;
    };
    if !actor.timers.attack_cooldown.is_zero() || !actor.frame.crossed(trigger_frame) {
        return;
    }
    if !frame.target.perceivable || !actor.perception.can_see_now {
        trace!(actor = ?actor.id, "trigger frame reached without a visible target");
        return;
    }

    let origin = actor.position + Vec3::Z * muzzle_height;
    let mut direction = (frame.target.position - origin).normalize_or_zero();
    if direction == Vec3::ZERO {
        direction = facing_direction(actor.facing);
    }
    out.push(Command::FireProjectile(FireRequest {
        owner: actor.id,
        origin,
        direction,
        target: frame.target.position,
        projectile,
        owner_is_enemy: true,
    }));
    out.push(Command::StartAttackCooldown {
        actor: actor.id,
        cooldown: profile.attack.cooldown(),
    });
}

/// Lays a hatchling on a walkable neighbouring tile once the interval elapsed.
fn lay_brood(level: &Level, actor: &ActorSnapshot, profile: &ArchetypeProfile, out: &mut Vec<Command>) {
    let Some(brood) = profile.brood else {
        return;
    };
    if actor.broods >= brood.max || actor.timers.brood < seconds(brood.interval_secs) {
        return;
    }
    let Some(tile) = level.world_to_tile(actor.position) else {
        return;
    };
    let Some(nest) = level.neighbors(tile).find(|tile| level.is_walkable(*tile)) else {
        trace!(actor = ?actor.id, "no room to lay a hatchling");
        return;
    };
    out.push(Command::SpawnActor {
        archetype: Archetype::GroundMelee,
        position: level.tile_center(nest),
        facing: actor.facing,
        parent: Some(actor.id),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use grimhold_core::{
        ActorTimers, AnimationFrame, AttackId, Health, PerceptionRecord, TileCoord,
    };

    fn attacker(slot: u32, tile: TileCoord, state: ActorState) -> ActorSnapshot {
        let level = Level::open(5, 5, 100.0);
        let position = level.tile_center(tile);
        ActorSnapshot {
            id: ActorId::new(slot, 0),
            archetype: Archetype::GroundMelee,
            position,
            velocity: Vec3::ZERO,
            facing: 0.0,
            home: position,
            state,
            health: Health::full(100.0),
            perception: PerceptionRecord::default(),
            path: None,
            timers: ActorTimers::default(),
            attack: AttackId::default(),
            frame: AnimationFrame::default(),
            restraint: None,
            broods: 0,
        }
    }

    #[test]
    fn contested_tile_keeps_exactly_one_attacker() {
        let level = Level::open(5, 5, 100.0);
        let view = ActorView::from_snapshots(vec![
            attacker(4, TileCoord::new(2, 2), ActorState::Attack),
            attacker(1, TileCoord::new(2, 2), ActorState::MeleeAttack),
            attacker(2, TileCoord::new(3, 3), ActorState::Attack),
            attacker(3, TileCoord::new(3, 3), ActorState::Chase),
        ]);
        let mut out = Vec::new();
        let yielding = arbitrate(&level, &view, &mut out);

        assert_eq!(yielding, BTreeSet::from([ActorId::new(4, 0)]));
        assert_eq!(
            out,
            vec![Command::Transition {
                actor: ActorId::new(4, 0),
                state: ActorState::Reposition,
                cause: TransitionCause::Arbitration,
            }]
        );
    }
}
