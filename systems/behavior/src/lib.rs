#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! State machines driving every living actor.
//!
//! One driver serves all archetypes; the differences between a brawler, an
//! archer, a flyer, a boss, a caster and a web layer come from their profile
//! in the tuning table. Each tick the driver refreshes the actor's perception,
//! evaluates the transition rules of the current state and emits the
//! locomotion of that state. Involuntary states only ever leave through a
//! status or through death.

mod locomotion;
mod restraint;

use glam::Vec3;
use grimhold_core::{
    seconds, ActorSnapshot, ActorState, ActorView, ArchetypeProfile, AttackProfile, ChaseExit,
    Command, Event, Locomotion, Path, PerceptionRecord, TileCoord, TransitionCause, Tuning,
};
use grimhold_system_coordination::free_tiles_near;
use grimhold_system_pathfinding::{Pathfinder, RetreatQuery};
use grimhold_system_perception::{flat_distance, observe, DistanceBand};
use grimhold_system_steering::{flee, orbit, seek, wander};
use grimhold_world::query::Frame;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Largest heading change of a wandering flyer per tick, in radians.
const WANDER_JITTER: f32 = 0.35;

/// Pure system that evaluates the state machine of every actor.
#[derive(Debug)]
pub struct Behavior {
    pathfinder: Pathfinder,
    rng: ChaCha8Rng,
}

impl Behavior {
    /// Creates the system, seeding its random stream from the tuning.
    #[must_use]
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            pathfinder: Pathfinder::new(tuning.pathing.max_expansions),
            rng: ChaCha8Rng::seed_from_u64(tuning.rng_seed),
        }
    }

    /// Consumes world events and immutable views to emit behaviour commands.
    ///
    /// Nothing is decided unless the events contain a time step.
    pub fn handle(
        &mut self,
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

        for actor in actors.iter() {
            self.decide(frame, actors, actor, out);
        }
    }

    fn decide(
        &mut self,
        frame: &Frame<'_>,
        actors: &ActorView,
        actor: &ActorSnapshot,
        out: &mut Vec<Command>,
    ) {
        if actor.state.is_terminal() {
            return;
        }
        // Covers frozen actors too: damage never kills them directly.
        if actor.health.is_depleted() {
            out.push(Command::Transition {
                actor: actor.id,
                state: ActorState::Death,
                cause: TransitionCause::Killed,
            });
            return;
        }

        let profile = frame.tuning.profile(actor.archetype);
        if actor.state.is_involuntary() {
            restraint::update(frame, actors, actor, profile, out);
            return;
        }

        let record = observe(
            frame.level,
            &frame.tuning.sight,
            actor,
            &frame.target,
            profile.detection_radius,
            profile.forget_time(),
        );
        if record != actor.perception {
            out.push(Command::RecordPerception {
                actor: actor.id,
                record,
            });
        }

        let mut ctx = Ctx {
            frame,
            actors,
            actor,
            profile,
            record,
            out,
        };
        match actor.state {
            ActorState::Idle => self.idle(&mut ctx),
            ActorState::Patrol => self.patrol(&mut ctx),
            ActorState::Chase => self.chase(&mut ctx),
            ActorState::Attack => attack(&mut ctx),
            ActorState::MeleeAttack => melee_attack(&mut ctx),
            ActorState::Reposition => self.reposition(&mut ctx),
            ActorState::RunAway => self.run_away(&mut ctx),
            ActorState::Harpooned
            | ActorState::Freeze
            | ActorState::Stagger
            | ActorState::Death => {}
        }
    }

    fn idle(&mut self, ctx: &mut Ctx<'_, '_>) {
        if ctx.noticed() {
            ctx.transition(ActorState::Chase, TransitionCause::Detection);
            return;
        }
        locomotion::halt(ctx);
        if ctx.actor.timers.state < ctx.profile.idle_duration() {
            return;
        }
        match ctx.profile.locomotion {
            Locomotion::Steering => ctx.transition(ActorState::Patrol, TransitionCause::Behavior),
            Locomotion::Grid => self.start_patrol(ctx),
        }
    }

    fn start_patrol(&mut self, ctx: &mut Ctx<'_, '_>) {
        let frame = ctx.frame;
        let level = frame.level;
        let pathing = &frame.tuning.pathing;
        let (Some(home), Some(start)) = (level.world_to_tile(ctx.actor.home), ctx.tile()) else {
            return;
        };

        let goal = self.pathfinder.random_reachable_tile(
            level,
            home,
            pathing.patrol_radius_tiles,
            pathing.patrol_attempts,
            Locomotion::Grid,
            &mut self.rng,
        );
        let tiles = goal.and_then(|goal| {
            self.pathfinder
                .find_path(level, start, goal, Locomotion::Grid)
                .ok()
                .map(|tiles| (goal, tiles))
        });
        let Some((goal, tiles)) = tiles else {
            trace!(actor = ?ctx.actor.id, "no patrol point found");
            // Re-entering idle restarts the wait before the next attempt.
            ctx.transition(ActorState::Idle, TransitionCause::Behavior);
            return;
        };

        ctx.transition(ActorState::Patrol, TransitionCause::Behavior);
        let path = locomotion::plan(ctx, &tiles, goal);
        ctx.out.push(Command::AssignPath {
            actor: ctx.actor.id,
            path,
            cooldown: pathing.repath_cooldown(),
        });
    }

    fn patrol(&mut self, ctx: &mut Ctx<'_, '_>) {
        if ctx.noticed() {
            ctx.transition(ActorState::Chase, TransitionCause::Detection);
            return;
        }
        let actor = ctx.actor;
        let profile = ctx.profile;
        match profile.locomotion {
            Locomotion::Grid => match &actor.path {
                Some(path) if !path.is_exhausted() => {
                    locomotion::follow(ctx, path.clone(), profile.walk_speed);
                }
                _ => ctx.transition(ActorState::Idle, TransitionCause::Behavior),
            },
            Locomotion::Steering => {
                if actor.timers.state >= profile.idle_duration() {
                    ctx.transition(ActorState::Idle, TransitionCause::Behavior);
                    return;
                }
                let range = ctx.frame.tuning.pathing.patrol_radius_tiles as f32
                    * ctx.frame.level.tile_size();
                let speed = profile.walk_speed;
                let desired = if flat_distance(actor.position, actor.home) > range {
                    seek(actor.position, actor.home, speed)
                } else {
                    wander(actor.facing, WANDER_JITTER, speed, &mut self.rng).0
                };
                locomotion::drive(ctx, desired);
            }
        }
    }

    fn chase(&mut self, ctx: &mut Ctx<'_, '_>) {
        let actor = ctx.actor;
        let profile = ctx.profile;
        let Some(goal) = ctx.record.pursuit_point(ctx.frame.target.position) else {
            ctx.transition(ActorState::Idle, TransitionCause::Behavior);
            return;
        };
        let timed_out = profile
            .chase_timeout_secs
            .is_some_and(|limit| actor.timers.state >= seconds(limit));
        if timed_out || ctx.leashed() {
            let exit = match profile.chase_exit {
                ChaseExit::Idle => ActorState::Idle,
                ChaseExit::RunAway => ActorState::RunAway,
            };
            ctx.transition(exit, TransitionCause::Behavior);
            return;
        }

        if ctx.record.can_see_now {
            let distance = ctx.target_distance();
            if ctx.panicking(distance) {
                ctx.transition(ActorState::RunAway, TransitionCause::Behavior);
                return;
            }
            if DistanceBand::from(profile.attack_band).contains(distance, false) {
                if !profile.attack.is_melee() {
                    ctx.transition(ActorState::Attack, TransitionCause::Behavior);
                } else if actor.timers.attack_cooldown.is_zero() {
                    ctx.transition(ActorState::MeleeAttack, TransitionCause::Behavior);
                    ctx.out.push(Command::StartAttackCooldown {
                        actor: actor.id,
                        cooldown: profile.attack.cooldown(),
                    });
                } else {
                    locomotion::halt(ctx);
                    ctx.face_target();
                }
                return;
            }
        }

        let arrival = ctx.frame.tuning.pathing.waypoint_arrival_radius;
        if !ctx.record.can_see_now && flat_distance(actor.position, goal) <= arrival {
            // Wait at the last known position until the memory fades.
            locomotion::halt(ctx);
            return;
        }
        locomotion::travel(&mut self.pathfinder, ctx, goal, profile.chase_speed);
    }

    fn reposition(&mut self, ctx: &mut Ctx<'_, '_>) {
        let actor = ctx.actor;
        let profile = ctx.profile;
        if actor.timers.state >= seconds(profile.reposition_timeout_secs) {
            ctx.transition(ActorState::Chase, TransitionCause::Behavior);
            return;
        }
        match &actor.path {
            Some(path) if path.is_exhausted() => {
                ctx.transition(ActorState::Chase, TransitionCause::Behavior);
            }
            Some(path) => locomotion::follow(ctx, path.clone(), profile.walk_speed),
            None if actor.timers.repath_cooldown.is_zero() => self.plan_reposition(ctx),
            None => locomotion::halt(ctx),
        }
    }

    fn plan_reposition(&mut self, ctx: &mut Ctx<'_, '_>) {
        let actor = ctx.actor;
        let profile = ctx.profile;
        let frame = ctx.frame;
        let level = frame.level;
        let pathing = &frame.tuning.pathing;
        let locomotion = profile.locomotion;
        // Brawlers look for room next to the target, shooters next to themselves.
        let anchor = if profile.attack.is_melee() {
            level.world_to_tile(frame.target.position)
        } else {
            ctx.tile()
        };
        let (Some(start), Some(anchor)) = (ctx.tile(), anchor) else {
            ctx.transition(ActorState::Chase, TransitionCause::Behavior);
            return;
        };

        let mut candidates = free_tiles_near(
            level,
            ctx.actors,
            anchor,
            pathing.reposition_radius_tiles,
            actor.id,
            locomotion,
        );
        candidates.retain(|tile| *tile != start);
        candidates.sort_by(|a, b| {
            a.distance(start)
                .total_cmp(&b.distance(start))
                .then_with(|| a.cmp(b))
        });

        for goal in candidates {
            let Ok(tiles) = self.pathfinder.find_path(level, start, goal, locomotion) else {
                continue;
            };
            let path = locomotion::plan(ctx, &tiles, goal);
            ctx.out.push(Command::AssignPath {
                actor: actor.id,
                path: path.clone(),
                cooldown: pathing.repath_cooldown(),
            });
            locomotion::follow(ctx, path, profile.walk_speed);
            return;
        }

        trace!(actor = ?actor.id, "no free tile to reposition to");
        ctx.transition(ActorState::Chase, TransitionCause::Behavior);
    }

    fn run_away(&mut self, ctx: &mut Ctx<'_, '_>) {
        let actor = ctx.actor;
        let profile = ctx.profile;
        let Some(threat) = ctx.record.pursuit_point(ctx.frame.target.position) else {
            ctx.transition(ActorState::Idle, TransitionCause::Behavior);
            return;
        };
        let distance = flat_distance(actor.position, threat);
        if actor.timers.state >= seconds(profile.run_away_secs) || distance >= profile.retreat_distance
        {
            let next = if ctx.record.is_remembered() && !ctx.leashed() {
                ActorState::Chase
            } else {
                ActorState::Idle
            };
            ctx.transition(next, TransitionCause::Behavior);
            return;
        }

        match profile.locomotion {
            Locomotion::Steering => {
                locomotion::drive(ctx, flee(actor.position, threat, profile.chase_speed));
            }
            Locomotion::Grid => self.retreat(ctx, threat),
        }
    }

    fn retreat(&mut self, ctx: &mut Ctx<'_, '_>, threat: Vec3) {
        let actor = ctx.actor;
        let profile = ctx.profile;
        match &actor.path {
            Some(path) if !path.is_exhausted() => {
                locomotion::follow(ctx, path.clone(), profile.chase_speed);
                return;
            }
            None if actor.timers.repath_cooldown.is_zero() => {
                if let Some(path) = self.plan_retreat(ctx, threat) {
                    locomotion::follow(ctx, path, profile.chase_speed);
                    return;
                }
            }
            _ => {}
        }
        locomotion::drive(ctx, flee(actor.position, threat, profile.chase_speed));
    }

    fn plan_retreat(&mut self, ctx: &mut Ctx<'_, '_>, threat: Vec3) -> Option<Path> {
        let frame = ctx.frame;
        let pathing = &frame.tuning.pathing;
        let cooldown = pathing.repath_cooldown();
        let start = ctx.tile()?;
        let query = RetreatQuery {
            start,
            threat,
            distance: ctx.profile.retreat_distance,
            tolerance: ctx.profile.retreat_tolerance,
            max_attempts: pathing.retreat_attempts,
            max_path_len: pathing.retreat_max_path,
        };
        match self
            .pathfinder
            .find_retreat_path(frame.level, &query, Locomotion::Grid)
        {
            Ok(tiles) => {
                let goal = tiles.last().copied().unwrap_or(start);
                let path = locomotion::plan(ctx, &tiles, goal);
                ctx.out.push(Command::AssignPath {
                    actor: ctx.actor.id,
                    path: path.clone(),
                    cooldown,
                });
                Some(path)
            }
            Err(error) => {
                trace!(actor = ?ctx.actor.id, %error, "retreat search failed, fleeing");
                ctx.out.push(Command::DeferRepath {
                    actor: ctx.actor.id,
                    cooldown,
                });
                None
            }
        }
    }
}

fn attack(ctx: &mut Ctx<'_, '_>) {
    let actor = ctx.actor;
    let profile = ctx.profile;
    if !ctx.record.can_see_now {
        ctx.transition(ActorState::Chase, TransitionCause::Behavior);
        return;
    }
    let distance = ctx.target_distance();
    if ctx.panicking(distance) {
        ctx.transition(ActorState::RunAway, TransitionCause::Behavior);
        return;
    }
    if !DistanceBand::from(profile.attack_band).contains(distance, true) {
        ctx.transition(ActorState::Chase, TransitionCause::Behavior);
        return;
    }

    match profile.orbit_radius {
        Some(radius) => {
            let clockwise = actor.id.slot() % 2 == 1;
            let desired = orbit(
                actor.position,
                ctx.frame.target.position,
                radius,
                profile.walk_speed,
                clockwise,
            );
            locomotion::drive(ctx, desired);
        }
        None => locomotion::halt(ctx),
    }
    ctx.face_target();
}

fn melee_attack(ctx: &mut Ctx<'_, '_>) {
    let AttackProfile::Melee { swing_secs, .. } = ctx.profile.attack else {
        ctx.transition(ActorState::Chase, TransitionCause::Behavior);
        return;
    };
    if ctx.actor.timers.state >= seconds(swing_secs) {
        ctx.transition(ActorState::Chase, TransitionCause::Behavior);
        return;
    }
    locomotion::halt(ctx);
    ctx.face_target();
}

/// Per-actor evaluation context shared by the state handlers.
struct Ctx<'a, 'w> {
    frame: &'a Frame<'w>,
    actors: &'a ActorView,
    actor: &'a ActorSnapshot,
    profile: &'a ArchetypeProfile,
    record: PerceptionRecord,
    out: &'a mut Vec<Command>,
}

impl Ctx<'_, '_> {
    fn transition(&mut self, state: ActorState, cause: TransitionCause) {
        self.out.push(Command::Transition {
            actor: self.actor.id,
            state,
            cause,
        });
    }

    fn face_target(&mut self) {
        self.out.push(Command::FaceToward {
            actor: self.actor.id,
            point: self.frame.target.position,
        });
    }

    fn tile(&self) -> Option<TileCoord> {
        self.frame.level.world_to_tile(self.actor.position)
    }

    fn target_distance(&self) -> f32 {
        flat_distance(self.actor.position, self.frame.target.position)
    }

    /// Target visible and the reaction delay since entering the state elapsed.
    fn noticed(&self) -> bool {
        self.record.can_see_now && self.actor.timers.state >= self.profile.reaction_delay()
    }

    fn leashed(&self) -> bool {
        self.profile
            .leash_distance
            .is_some_and(|leash| flat_distance(self.actor.position, self.actor.home) > leash)
    }

    fn panicking(&self, distance: f32) -> bool {
        self.profile
            .panic_distance
            .is_some_and(|panic| distance < panic)
    }
}
