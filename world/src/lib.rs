#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the Grimhold enemy AI.
//!
//! The world owns the actor slot map, the occupancy grid and the player's
//! damage bookkeeping. It is only ever mutated through [`apply`], which turns
//! a [`Command`] into zero or more [`Event`] values. Requests that would break
//! a state invariant are ignored and logged rather than propagated.

mod spatial;

use std::{collections::BTreeMap, time::Duration};

use glam::Vec3;
use grimhold_core::{
    facing_angle, ActorId, ActorState, ActorTimers, AnimationFrame, Archetype, AreaEffect,
    AttackId, AudioCue, Awareness, Command, DamageSource, EnvironmentContext, Event, FireRequest,
    Health, Motion, Path, PerceptionRecord, Restraint, Status, TransitionCause, Tuning,
};
use slotmap::SlotMap;
use tracing::{debug, trace, warn};

pub use spatial::{Level, LevelError, SpawnMarker};

#[derive(Clone, Debug)]
struct Actor {
    archetype: Archetype,
    position: Vec3,
    velocity: Vec3,
    facing: f32,
    home: Vec3,
    state: ActorState,
    health: Health,
    perception: PerceptionRecord,
    path: Option<Path>,
    timers: ActorTimers,
    attack: AttackId,
    frame: AnimationFrame,
    restraint: Option<Restraint>,
    broods: u32,
    last_player_attack: Option<AttackId>,
}

impl Actor {
    fn spawn(archetype: Archetype, position: Vec3, facing: f32, max_health: f32) -> Self {
        Self {
            archetype,
            position,
            velocity: Vec3::ZERO,
            facing,
            home: position,
            state: ActorState::Idle,
            health: Health::full(max_health),
            perception: PerceptionRecord::default(),
            path: None,
            timers: ActorTimers::default(),
            attack: AttackId::default(),
            frame: AnimationFrame::default(),
            restraint: None,
            broods: 0,
            last_player_attack: None,
        }
    }

    fn enter(&mut self, state: ActorState) {
        self.state = state;
        self.timers.state = Duration::ZERO;
        self.frame = AnimationFrame::default();
        self.path = None;
        if !state.allows_locomotion() {
            self.velocity = Vec3::ZERO;
        }
    }
}

#[derive(Debug)]
struct Player {
    position: Vec3,
    perceivable: bool,
    landed_swings: BTreeMap<ActorId, AttackId>,
}

impl Player {
    /// Records the swing, returning `false` when it already landed.
    fn register_swing(&mut self, attacker: ActorId, attack: AttackId) -> bool {
        if self.landed_swings.get(&attacker) == Some(&attack) {
            return false;
        }
        let _ = self.landed_swings.insert(attacker, attack);
        true
    }
}

/// Represents the authoritative Grimhold world state.
#[derive(Debug)]
pub struct World {
    level: Level,
    environment: EnvironmentContext,
    tuning: Tuning,
    actors: SlotMap<ActorId, Actor>,
    player: Player,
    tick_index: u64,
    last_dt: Duration,
}

impl World {
    /// Creates a world over the provided level with no live actors.
    #[must_use]
    pub fn new(level: Level, environment: EnvironmentContext, tuning: Tuning) -> Self {
        Self {
            level,
            environment,
            tuning,
            actors: SlotMap::with_key(),
            player: Player {
                position: Vec3::ZERO,
                perceivable: true,
                landed_swings: BTreeMap::new(),
            },
            tick_index: 0,
            last_dt: Duration::ZERO,
        }
    }

    fn transition(
        &mut self,
        id: ActorId,
        to: ActorState,
        cause: TransitionCause,
        out_events: &mut Vec<Event>,
    ) -> bool {
        let Some(actor) = self.actors.get_mut(id) else {
            trace!(actor = ?id, state = ?to, "transition for unknown actor ignored");
            return false;
        };
        let from = actor.state;

        if from.is_terminal() {
            warn!(actor = ?id, state = ?to, "transition out of death ignored");
            return false;
        }
        if to.is_involuntary() && cause != TransitionCause::Status {
            warn!(actor = ?id, state = ?to, ?cause, "involuntary state requested without a status");
            return false;
        }
        if from.is_involuntary()
            && !matches!(
                cause,
                TransitionCause::Behavior | TransitionCause::Status | TransitionCause::Killed
            )
        {
            debug!(actor = ?id, from = ?from, state = ?to, ?cause, "transition ignored while restrained");
            return false;
        }

        actor.enter(to);
        if from == ActorState::Harpooned && to != ActorState::Harpooned {
            actor.restraint = None;
        }
        if to == ActorState::MeleeAttack {
            actor.attack = actor.attack.next();
        }
        if to.is_terminal() {
            actor.restraint = None;
            actor.timers.death = Duration::ZERO;
        }
        let position = actor.position;

        debug!(actor = ?id, from = ?from, to = ?to, ?cause, "actor changed state");
        out_events.push(Event::ActorStateChanged {
            actor: id,
            from,
            to,
            cause,
        });

        if to.is_terminal() {
            out_events.push(Event::ActorDied { actor: id });
            out_events.push(Event::AudioCue {
                cue: AudioCue::Death,
                position,
            });
        } else if cause == TransitionCause::Detection {
            out_events.push(Event::AudioCue {
                cue: AudioCue::Detection,
                position,
            });
        } else if to == ActorState::MeleeAttack {
            out_events.push(Event::AudioCue {
                cue: AudioCue::Attack,
                position,
            });
        }
        true
    }

    fn spawn_actor(
        &mut self,
        archetype: Archetype,
        position: Vec3,
        facing: f32,
        parent: Option<ActorId>,
        out_events: &mut Vec<Event>,
    ) {
        let profile = self.tuning.profile(archetype);
        if !self
            .level
            .is_position_passable(position, profile.locomotion)
        {
            warn!(?archetype, ?position, "spawn on impassable tile ignored");
            return;
        }

        let mut position = position;
        position.z = self.environment.resting_height(profile.locomotion);
        let actor = Actor::spawn(archetype, position, facing, profile.max_health);
        let id = self.actors.insert(actor);

        if let Some(parent) = parent.and_then(|parent| self.actors.get_mut(parent)) {
            parent.broods = parent.broods.saturating_add(1);
            parent.timers.brood = Duration::ZERO;
        }

        debug!(actor = ?id, ?archetype, "actor spawned");
        out_events.push(Event::ActorSpawned {
            actor: id,
            archetype,
            position,
        });
    }

    fn tick(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.tick_index = self.tick_index.saturating_add(1);
        self.last_dt = dt;
        out_events.push(Event::TimeAdvanced { dt });

        let tuning = &self.tuning;
        for (_, actor) in self.actors.iter_mut() {
            let profile = tuning.profile(actor.archetype);
            let dead = actor.state.is_terminal();
            actor.timers.advance(dt, dead);
            actor.frame.previous = actor.frame.current;
            actor.frame.current = AnimationFrame::at(actor.timers.state, &profile.animation);
            if dead {
                continue;
            }
            let memory = &mut actor.perception;
            memory.since_seen = memory.since_seen.saturating_add(dt);
            // Restrained actors skip perception, so their memory fades here.
            if actor.state.is_involuntary()
                && memory.is_remembered()
                && memory.since_seen >= profile.forget_time()
            {
                trace!(state = ?actor.state, "target forgotten while restrained");
                *memory = PerceptionRecord {
                    since_seen: memory.since_seen,
                    ..PerceptionRecord::default()
                };
            }
        }
    }

    fn cleanup(&mut self, out_events: &mut Vec<Event>) {
        let grace = self.tuning.death_grace();
        let expired: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|(_, actor)| actor.state.is_terminal() && actor.timers.death >= grace)
            .map(|(id, _)| id)
            .collect();

        for id in expired {
            if self.actors.remove(id).is_some() {
                let _ = self.player.landed_swings.remove(&id);
                debug!(actor = ?id, "corpse removed");
                out_events.push(Event::ActorRemoved { actor: id });
            }
        }
    }

    fn move_actor(&mut self, id: ActorId, velocity: Vec3, motion: Motion) {
        let Some(actor) = self.actors.get_mut(id) else {
            return;
        };
        if actor.state.is_terminal() {
            warn!(actor = ?id, "movement of a dead actor ignored");
            return;
        }
        if motion == Motion::Locomotion && !actor.state.allows_locomotion() {
            warn!(actor = ?id, state = ?actor.state, "locomotion while restrained ignored");
            return;
        }

        let locomotion = self.tuning.profile(actor.archetype).locomotion;
        let mut next = actor.position + velocity * self.last_dt.as_secs_f32();
        next.z = self.environment.resting_height(locomotion);

        if !self.level.is_position_passable(next, locomotion) {
            trace!(actor = ?id, "movement blocked by geometry");
            actor.velocity = Vec3::ZERO;
            return;
        }

        actor.position = next;
        actor.velocity = velocity;
        if motion == Motion::Locomotion {
            actor.facing = facing_angle(velocity, actor.facing);
        }
    }

    fn melee_hit(
        &mut self,
        attacker: ActorId,
        attack: AttackId,
        damage: f32,
        out_events: &mut Vec<Event>,
    ) {
        let Some(actor) = self.actors.get(attacker) else {
            return;
        };
        if actor.state != ActorState::MeleeAttack || actor.attack != attack {
            trace!(actor = ?attacker, "stale melee hit ignored");
            return;
        }
        if !self.player.perceivable {
            return;
        }
        if !self.player.register_swing(attacker, attack) {
            trace!(actor = ?attacker, attack = attack.get(), "swing already landed");
            return;
        }
        out_events.push(Event::PlayerDamaged {
            amount: damage,
            source: DamageSource::Actor { attacker, attack },
        });
    }

    fn damage_actor(
        &mut self,
        id: ActorId,
        amount: f32,
        source: DamageSource,
        out_events: &mut Vec<Event>,
    ) {
        let Some(actor) = self.actors.get_mut(id) else {
            return;
        };
        if actor.state.is_terminal() {
            return;
        }
        if let DamageSource::Player { attack } = source {
            if actor.last_player_attack == Some(attack) {
                trace!(actor = ?id, attack = attack.get(), "player swing already handled");
                return;
            }
            actor.last_player_attack = Some(attack);
        }

        let applied = actor.health.apply_damage(amount);
        let remaining = actor.health.current();
        let position = actor.position;
        let lethal = actor.health.is_depleted() && actor.state != ActorState::Freeze;

        out_events.push(Event::ActorDamaged {
            actor: id,
            amount: applied,
            remaining,
        });
        out_events.push(Event::AudioCue {
            cue: AudioCue::Hurt,
            position,
        });

        if lethal {
            let _ = self.transition(id, ActorState::Death, TransitionCause::Killed, out_events);
        }
    }

    fn area_damage(
        &mut self,
        effect: AreaEffect,
        source: DamageSource,
        hits_player: bool,
        hits_actors: bool,
        out_events: &mut Vec<Event>,
    ) {
        let attacker = match source {
            DamageSource::Actor { attacker, .. } => Some(attacker),
            DamageSource::Player { .. } | DamageSource::Environment => None,
        };

        if hits_player && self.player.perceivable {
            let distance = flat_distance(effect.origin, self.player.position);
            if let Some(amount) = effect.damage_at(distance) {
                let landed = match source {
                    DamageSource::Actor { attacker, attack } => {
                        self.player.register_swing(attacker, attack)
                    }
                    DamageSource::Player { .. } | DamageSource::Environment => true,
                };
                if landed {
                    out_events.push(Event::PlayerDamaged { amount, source });
                }
            }
        }

        if !hits_actors {
            return;
        }
        let hits: Vec<(ActorId, f32)> = self
            .actors
            .iter()
            .filter(|(id, actor)| Some(*id) != attacker && !actor.state.is_terminal())
            .filter_map(|(id, actor)| {
                effect
                    .damage_at(flat_distance(effect.origin, actor.position))
                    .map(|amount| (id, amount))
            })
            .collect();
        for (id, amount) in hits {
            self.damage_actor(id, amount, source, out_events);
        }
    }

    fn fire_projectile(&mut self, request: FireRequest, out_events: &mut Vec<Event>) {
        let Some(owner) = self.actors.get(request.owner) else {
            return;
        };
        if !owner.state.allows_locomotion() {
            warn!(actor = ?request.owner, state = ?owner.state, "projectile from incapacitated actor ignored");
            return;
        }
        trace!(actor = ?request.owner, projectile = ?request.projectile, "projectile requested");
        out_events.push(Event::ProjectileRequested(request));
        out_events.push(Event::AudioCue {
            cue: AudioCue::Attack,
            position: request.origin,
        });
    }

    fn apply_status(&mut self, id: ActorId, status: Status, out_events: &mut Vec<Event>) {
        let Some(actor) = self.actors.get(id) else {
            return;
        };
        if actor.state.is_terminal() {
            warn!(actor = ?id, ?status, "status on a dead actor ignored");
            return;
        }
        if matches!(status, Status::Harpoon(_))
            && !self.tuning.profile(actor.archetype).restrainable
        {
            debug!(actor = ?id, "actor shrugged off a restraint");
            return;
        }
        if !self.transition(id, status.state(), TransitionCause::Status, out_events) {
            return;
        }
        let Some(actor) = self.actors.get_mut(id) else {
            return;
        };
        match status {
            Status::Freeze { duration } | Status::Stagger { duration } => {
                actor.timers.status = duration;
            }
            Status::Harpoon(restraint) => {
                actor.restraint = Some(restraint);
            }
        }
    }

    fn freeze_burst(
        &mut self,
        origin: Vec3,
        radius: f32,
        duration: Duration,
        out_events: &mut Vec<Event>,
    ) {
        let targets: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|(_, actor)| {
                !actor.state.is_terminal() && flat_distance(origin, actor.position) <= radius
            })
            .map(|(id, _)| id)
            .collect();
        for id in targets {
            self.apply_status(id, Status::Freeze { duration }, out_events);
        }
    }

    fn alert(&mut self, id: ActorId, last_known: Vec3, out_events: &mut Vec<Event>) {
        let Some(actor) = self.actors.get_mut(id) else {
            return;
        };
        if !matches!(actor.state, ActorState::Idle | ActorState::Patrol) {
            trace!(actor = ?id, state = ?actor.state, "alert ignored by busy actor");
            return;
        }
        actor.perception = PerceptionRecord {
            awareness: Awareness::Aware,
            can_see_now: false,
            last_known: Some(last_known),
            since_seen: Duration::ZERO,
        };
        let _ = self.transition(id, ActorState::Chase, TransitionCause::Alerted, out_events);
    }
}

fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x - b.x, a.y - b.y, 0.0).length()
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::SetSurface { tile, surface } => {
            if world.level.set_surface(tile, surface) {
                out_events.push(Event::SurfaceChanged { tile, surface });
            } else {
                warn!(?tile, "surface change outside the grid ignored");
            }
        }
        Command::SetTarget {
            position,
            perceivable,
        } => {
            world.player.position = position;
            world.player.perceivable = perceivable;
        }
        Command::SpawnActor {
            archetype,
            position,
            facing,
            parent,
        } => world.spawn_actor(archetype, position, facing, parent, out_events),
        Command::Tick { dt } => world.tick(dt, out_events),
        Command::EndTick => world.cleanup(out_events),
        Command::RecordPerception { actor, record } => {
            if let Some(actor) = world.actors.get_mut(actor) {
                if actor.state.allows_locomotion() {
                    actor.perception = record;
                }
            }
        }
        Command::Transition {
            actor,
            state,
            cause,
        } => {
            let _ = world.transition(actor, state, cause, out_events);
        }
        Command::MoveActor {
            actor,
            velocity,
            motion,
        } => world.move_actor(actor, velocity, motion),
        Command::FaceToward { actor, point } => {
            if let Some(actor) = world.actors.get_mut(actor) {
                if actor.state.allows_locomotion() {
                    actor.facing = facing_angle(point - actor.position, actor.facing);
                }
            }
        }
        Command::AssignPath {
            actor,
            path,
            cooldown,
        } => {
            if let Some(actor) = world.actors.get_mut(actor) {
                if actor.state.consumes_path() {
                    actor.path = Some(path);
                } else {
                    warn!(state = ?actor.state, "path assigned outside a travelling state ignored");
                }
                actor.timers.repath_cooldown = cooldown;
            }
        }
        Command::AdvanceWaypoint { actor } => {
            if let Some(path) = world
                .actors
                .get_mut(actor)
                .and_then(|actor| actor.path.as_mut())
            {
                path.advance();
            }
        }
        Command::DeferRepath { actor, cooldown } => {
            if let Some(actor) = world.actors.get_mut(actor) {
                actor.path = None;
                actor.timers.repath_cooldown = cooldown;
            }
        }
        Command::StartAttackCooldown { actor, cooldown } => {
            if let Some(actor) = world.actors.get_mut(actor) {
                actor.timers.attack_cooldown = cooldown;
            }
        }
        Command::MeleeHit {
            attacker,
            attack,
            damage,
        } => world.melee_hit(attacker, attack, damage, out_events),
        Command::DamageActor {
            actor,
            amount,
            source,
        } => world.damage_actor(actor, amount, source, out_events),
        Command::AreaDamage {
            effect,
            source,
            hits_player,
            hits_actors,
        } => world.area_damage(effect, source, hits_player, hits_actors, out_events),
        Command::FireProjectile(request) => world.fire_projectile(request, out_events),
        Command::ApplyStatus { actor, status } => world.apply_status(actor, status, out_events),
        Command::FreezeBurst {
            origin,
            radius,
            duration,
        } => world.freeze_burst(origin, radius, duration, out_events),
        Command::Alert { actor, last_known } => world.alert(actor, last_known, out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use grimhold_core::{
        ActorId, ActorSnapshot, ActorView, AttackId, EnvironmentContext, TargetSnapshot, Tuning,
    };

    use super::{Actor, Level, World};

    /// Read-only inputs shared by the AI systems during one tick.
    #[derive(Clone, Copy, Debug)]
    pub struct Frame<'w> {
        /// Occupancy grid.
        pub level: &'w Level,
        /// Tuning table.
        pub tuning: &'w Tuning,
        /// Environment context.
        pub environment: EnvironmentContext,
        /// Player as perceived by the AI.
        pub target: TargetSnapshot,
        /// Duration of the tick being evaluated.
        pub dt: Duration,
    }

    /// Bundles the read-only inputs of the current tick.
    #[must_use]
    pub fn frame(world: &World) -> Frame<'_> {
        Frame {
            level: &world.level,
            tuning: &world.tuning,
            environment: world.environment,
            target: target(world),
            dt: world.last_dt,
        }
    }

    /// Provides read-only access to the occupancy grid.
    #[must_use]
    pub fn level(world: &World) -> &Level {
        &world.level
    }

    /// Environment context the world was created with.
    #[must_use]
    pub fn environment(world: &World) -> EnvironmentContext {
        world.environment
    }

    /// Tuning table the world was created with.
    #[must_use]
    pub fn tuning(world: &World) -> &Tuning {
        &world.tuning
    }

    /// Snapshot of the player as the AI perceives it.
    #[must_use]
    pub fn target(world: &World) -> TargetSnapshot {
        TargetSnapshot {
            position: world.player.position,
            perceivable: world.player.perceivable,
        }
    }

    /// Number of ticks applied so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Duration of the most recent tick.
    #[must_use]
    pub fn last_dt(world: &World) -> Duration {
        world.last_dt
    }

    /// Number of actors in the live set, corpses included.
    #[must_use]
    pub fn actor_count(world: &World) -> usize {
        world.actors.len()
    }

    /// Captures a read-only view of every live actor.
    #[must_use]
    pub fn actor_view(world: &World) -> ActorView {
        let snapshots = world
            .actors
            .iter()
            .map(|(id, actor)| snapshot(id, actor))
            .collect();
        ActorView::from_snapshots(snapshots)
    }

    /// Captures a single actor, or `None` when the id is stale.
    #[must_use]
    pub fn actor(world: &World, id: ActorId) -> Option<ActorSnapshot> {
        world.actors.get(id).map(|actor| snapshot(id, actor))
    }

    /// Most recent swing of `attacker` that damaged the player.
    #[must_use]
    pub fn landed_swing(world: &World, attacker: ActorId) -> Option<AttackId> {
        world.player.landed_swings.get(&attacker).copied()
    }

    fn snapshot(id: ActorId, actor: &Actor) -> ActorSnapshot {
        ActorSnapshot {
            id,
            archetype: actor.archetype,
            position: actor.position,
            velocity: actor.velocity,
            facing: actor.facing,
            home: actor.home,
            state: actor.state,
            health: actor.health,
            perception: actor.perception,
            path: actor.path.clone(),
            timers: actor.timers,
            attack: actor.attack,
            frame: actor.frame,
            restraint: actor.restraint,
            broods: actor.broods,
        }
    }
}
