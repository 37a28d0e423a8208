#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Grimhold enemy AI.
//!
//! This crate defines the message surface that connects the authoritative
//! world with the pure AI systems. Systems read immutable [`ActorView`]
//! snapshots captured at the start of a tick and respond exclusively with
//! [`Command`] batches. The world applies those commands in order and
//! broadcasts [`Event`] values that external collaborators (projectiles,
//! audio, the player's health) consume. Because every system reads the same
//! pre-update snapshot, no actor ever observes another actor's post-update
//! state within a tick.

mod tuning;

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, Key, KeyData};

pub use tuning::{
    seconds, AnimationTuning, ArchetypeProfile, AttackProfile, BandTuning, BroodTuning,
    ChaseExit, CoordinationTuning, Locomotion, PathingTuning, SightTuning, Tuning, TuningError,
};

new_key_type! {
    /// Stable identity of an actor stored in the world's slot map.
    ///
    /// Identifiers are never dereferenced directly; every cross-actor link
    /// stores the id and resolves it through a lookup on use. A slot that was
    /// reused for a new actor carries a newer generation, so stale ids resolve
    /// to nothing. The derived ordering (slot, then generation) is the total
    /// order used for tie-breaks.
    pub struct ActorId;
}

impl ActorId {
    /// Creates an actor identifier from its slot and generation.
    ///
    /// The generation counts how often the slot was reused, starting at zero.
    #[must_use]
    pub fn new(slot: u32, generation: u32) -> Self {
        let version = ((u64::from(generation) << 1) | 1) & 0xffff_ffff;
        KeyData::from_ffi((version << 32) | u64::from(slot)).into()
    }

    /// Slot the actor lives in.
    #[must_use]
    pub fn slot(&self) -> u32 {
        (self.data().as_ffi() & 0xffff_ffff) as u32
    }

    /// Number of times the slot was reused before this actor claimed it.
    #[must_use]
    pub fn generation(&self) -> u32 {
        ((self.data().as_ffi() >> 33) & 0x7fff_ffff) as u32
    }
}

/// Location of a single grid tile expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    column: u32,
    row: u32,
}

impl TileCoord {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the tile.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the tile.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two tiles.
    #[must_use]
    pub fn manhattan_distance(self, other: TileCoord) -> u32 {
        self.column.abs_diff(other.column) + self.row.abs_diff(other.row)
    }

    /// Straight-line distance between two tiles measured in whole tiles.
    #[must_use]
    pub fn distance(self, other: TileCoord) -> f32 {
        let dx = self.column.abs_diff(other.column) as f32;
        let dy = self.row.abs_diff(other.row) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// Reports whether the two tiles share an edge.
    #[must_use]
    pub fn is_adjacent(self, other: TileCoord) -> bool {
        self.manhattan_distance(other) == 1
    }
}

/// Category of actor sharing a state vocabulary but differing in tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Walking brawler that closes in for melee swings.
    GroundMelee,
    /// Walking archer that shoots from range and backs off when crowded.
    GroundRanged,
    /// Airborne actor that steers freely and circles while shooting.
    Flying,
    /// Slow heavyweight whose swings slam an area around the impact point.
    HeavyBoss,
    /// Spellcaster that keeps its distance and lobs fireballs.
    Caster,
    /// Spider that spits webs and lays hatchlings while engaged.
    WebLayer,
}

impl Archetype {
    /// Every archetype in declaration order.
    pub const ALL: [Archetype; 6] = [
        Self::GroundMelee,
        Self::GroundRanged,
        Self::Flying,
        Self::HeavyBoss,
        Self::Caster,
        Self::WebLayer,
    ];
}

/// Shared state vocabulary of the actor state machines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorState {
    /// Standing around waiting to notice the target or start a patrol.
    Idle,
    /// Walking to a randomly chosen reachable point near home.
    Patrol,
    /// Pursuing the target, either live or from memory.
    Chase,
    /// Holding position and firing ranged attacks.
    Attack,
    /// Committed to a melee swing.
    MeleeAttack,
    /// Moving off a contested attack tile.
    Reposition,
    /// Retreating from the target.
    RunAway,
    /// Restrained and pulled toward the restrainer.
    Harpooned,
    /// Frozen solid for the duration of a freeze effect.
    Freeze,
    /// Recovering after a restraint ended.
    Stagger,
    /// Dead; terminal.
    Death,
}

impl ActorState {
    /// States that can only be entered through forced status application.
    #[must_use]
    pub const fn is_involuntary(self) -> bool {
        matches!(self, Self::Harpooned | Self::Freeze | Self::Stagger)
    }

    /// States whose tile must not be shared with another attacking actor.
    #[must_use]
    pub const fn is_attack_committed(self) -> bool {
        matches!(self, Self::Attack | Self::MeleeAttack)
    }

    /// Reports whether the state permits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Death)
    }

    /// States that follow a waypoint path when walking on the grid.
    #[must_use]
    pub const fn consumes_path(self) -> bool {
        matches!(
            self,
            Self::Patrol | Self::Chase | Self::Reposition | Self::RunAway
        )
    }

    /// Reports whether voluntary locomotion is permitted in the state.
    #[must_use]
    pub const fn allows_locomotion(self) -> bool {
        !self.is_involuntary() && !self.is_terminal()
    }
}

/// Reason recorded alongside a state transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionCause {
    /// Ordinary guard evaluation by the state machine.
    Behavior,
    /// The actor noticed the target on its own.
    Detection,
    /// A nearby actor raised the alarm.
    Alerted,
    /// Lost the attack-tile arbitration.
    Arbitration,
    /// Forced by a status effect (freeze, stagger, harpoon).
    Status,
    /// Health reached zero.
    Killed,
}

/// Surface kind stored in each occupancy grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Surface {
    /// Open ground.
    Floor,
    /// Full-height wall.
    Wall,
    /// Open water; ground actors must not enter, flyers pass over.
    Water,
    /// Low obstacle such as a barrel; blocks walking, rays above it pass.
    Cover,
    /// Door toggled by the external door system.
    Door {
        /// Whether the door is currently open.
        open: bool,
    },
}

impl Surface {
    /// Reports whether ground actors may stand on the surface.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(self, Self::Floor | Self::Door { open: true })
    }

    /// Reports whether airborne actors may pass over the surface.
    #[must_use]
    pub const fn is_flyable(self) -> bool {
        matches!(self, Self::Floor | Self::Water | Self::Door { open: true })
    }

    /// Reports whether a sight ray at `ray_height` is stopped by the surface.
    #[must_use]
    pub fn blocks_sight(self, ray_height: f32, cover_height: f32) -> bool {
        match self {
            Self::Floor | Self::Water | Self::Door { open: true } => false,
            Self::Wall | Self::Door { open: false } => true,
            Self::Cover => ray_height < cover_height,
        }
    }
}

/// Whether the level is an enclosed dungeon or the open overworld.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvironmentKind {
    /// Enclosed level; ground actors stay pinned to the floor height.
    Dungeon,
    /// Open world; ground actors must additionally respect water edges.
    OpenWorld,
}

/// Explicit environment context passed into every update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvironmentContext {
    /// Kind of level currently simulated.
    pub kind: EnvironmentKind,
    /// Height of the walkable floor in world units.
    pub ground_height: f32,
    /// Height above the floor at which airborne actors cruise.
    pub hover_height: f32,
}

impl EnvironmentContext {
    /// Creates a dungeon context with the floor at zero height.
    #[must_use]
    pub const fn dungeon() -> Self {
        Self {
            kind: EnvironmentKind::Dungeon,
            ground_height: 0.0,
            hover_height: 120.0,
        }
    }

    /// Creates an open-world context with the floor at zero height.
    #[must_use]
    pub const fn open_world() -> Self {
        Self {
            kind: EnvironmentKind::OpenWorld,
            ground_height: 0.0,
            hover_height: 180.0,
        }
    }

    /// Height an actor of the provided locomotion should settle at.
    #[must_use]
    pub fn resting_height(&self, locomotion: Locomotion) -> f32 {
        match locomotion {
            Locomotion::Grid => self.ground_height,
            Locomotion::Steering => self.ground_height + self.hover_height,
        }
    }

    /// Reports whether ground actors must stop at water edges.
    #[must_use]
    pub const fn guards_water(&self) -> bool {
        matches!(self.kind, EnvironmentKind::OpenWorld)
    }
}

impl Default for EnvironmentContext {
    fn default() -> Self {
        Self::dungeon()
    }
}

/// Current and maximum health of an actor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Health {
    current: f32,
    max: f32,
}

impl Health {
    /// Creates a full health pool with the provided maximum.
    #[must_use]
    pub fn full(max: f32) -> Self {
        let max = max.max(0.0);
        Self { current: max, max }
    }

    /// Remaining hit points.
    #[must_use]
    pub const fn current(&self) -> f32 {
        self.current
    }

    /// Maximum hit points.
    #[must_use]
    pub const fn max(&self) -> f32 {
        self.max
    }

    /// Reports whether health reached zero.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }

    /// Remaining health as a fraction of the maximum.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    /// Subtracts damage, clamping at zero, and returns the amount removed.
    pub fn apply_damage(&mut self, amount: f32) -> f32 {
        let amount = amount.max(0.0);
        let applied = amount.min(self.current.max(0.0));
        self.current = (self.current - amount).max(0.0);
        applied
    }
}

/// Monotonically increasing swing or shot counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttackId(u32);

impl AttackId {
    /// Creates an attack identifier with the provided value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Identifier following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Entity holding the other end of a harpoon line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Restrainer {
    /// The player's harpoon.
    Player,
    /// Another actor, resolved through the arena each tick.
    Actor(ActorId),
}

/// Parameters of an active harpoon restraint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Restraint {
    /// Who is reeling the actor in.
    pub restrainer: Restrainer,
    /// Fixed pull speed in world units per second.
    pub pull_speed: f32,
    /// Distance to the restrainer at which the pull stops.
    pub stop_distance: f32,
}

/// Status effects that force an actor into an involuntary state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Status {
    /// Freezes the actor for the provided duration.
    Freeze {
        /// Time the freeze lasts.
        duration: Duration,
    },
    /// Staggers the actor for the provided duration.
    Stagger {
        /// Time the stagger lasts.
        duration: Duration,
    },
    /// Harpoons the actor, pulling it toward the restrainer.
    Harpoon(Restraint),
}

impl Status {
    /// State the status forces the actor into.
    #[must_use]
    pub const fn state(&self) -> ActorState {
        match self {
            Self::Freeze { .. } => ActorState::Freeze,
            Self::Stagger { .. } => ActorState::Stagger,
            Self::Harpoon(_) => ActorState::Harpooned,
        }
    }
}

/// Awareness level of the perception state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Awareness {
    /// The actor does not know where the target is.
    #[default]
    Unaware,
    /// The actor sees or remembers the target.
    Aware,
}

/// Per-actor visibility and memory state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerceptionRecord {
    /// Current awareness level.
    pub awareness: Awareness,
    /// Whether the target was visible on the latest evaluation.
    pub can_see_now: bool,
    /// Last confirmed target position; only written while visible.
    pub last_known: Option<Vec3>,
    /// Time elapsed since the target was last seen.
    pub since_seen: Duration,
}

impl PerceptionRecord {
    /// Reports whether the actor still remembers the target.
    #[must_use]
    pub fn is_remembered(&self) -> bool {
        self.awareness == Awareness::Aware
    }

    /// Point the actor should pursue given the live target position.
    ///
    /// Visible targets are tracked live; remembered targets fall back to the
    /// last confirmed position.
    #[must_use]
    pub fn pursuit_point(&self, live_target: Vec3) -> Option<Vec3> {
        match (self.awareness, self.can_see_now) {
            (Awareness::Unaware, _) => None,
            (Awareness::Aware, true) => Some(live_target),
            (Awareness::Aware, false) => self.last_known,
        }
    }
}

/// Ordered world-space waypoints with a cursor, owned by a single actor.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    waypoints: Vec<Vec3>,
    cursor: usize,
    goal: TileCoord,
}

impl Path {
    /// Creates a path toward `goal` following the provided waypoints.
    #[must_use]
    pub fn new(waypoints: Vec<Vec3>, goal: TileCoord) -> Self {
        Self {
            waypoints,
            cursor: 0,
            goal,
        }
    }

    /// Waypoint the actor is currently heading toward.
    #[must_use]
    pub fn current(&self) -> Option<Vec3> {
        self.waypoints.get(self.cursor).copied()
    }

    /// Moves the cursor to the next waypoint.
    pub fn advance(&mut self) {
        if self.cursor < self.waypoints.len() {
            self.cursor += 1;
        }
    }

    /// Reports whether every waypoint has been reached.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }

    /// Tile the path was planned toward.
    #[must_use]
    pub const fn goal(&self) -> TileCoord {
        self.goal
    }

    /// Index of the waypoint currently pursued.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// All waypoints of the path.
    #[must_use]
    pub fn waypoints(&self) -> &[Vec3] {
        &self.waypoints
    }
}

/// Named per-actor timers, all advanced together once per tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActorTimers {
    /// Time spent in the current state.
    pub state: Duration,
    /// Time remaining before the next attack may begin.
    pub attack_cooldown: Duration,
    /// Time remaining before the next repath is permitted.
    pub repath_cooldown: Duration,
    /// Time remaining on the active freeze or stagger.
    pub status: Duration,
    /// Time spent dead; drives external death animation and cleanup.
    pub death: Duration,
    /// Time since the last hatchling was laid.
    pub brood: Duration,
}

impl ActorTimers {
    /// Advances every timer by `dt`.
    ///
    /// Countdown timers saturate at zero. The death timer only accumulates
    /// while `dead` is set.
    pub fn advance(&mut self, dt: Duration, dead: bool) {
        self.state = self.state.saturating_add(dt);
        self.attack_cooldown = self.attack_cooldown.saturating_sub(dt);
        self.repath_cooldown = self.repath_cooldown.saturating_sub(dt);
        self.status = self.status.saturating_sub(dt);
        self.brood = self.brood.saturating_add(dt);
        if dead {
            self.death = self.death.saturating_add(dt);
        }
    }
}

/// Animation-frame proxy derived from the state timer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AnimationFrame {
    /// Frame shown after the latest tick.
    pub current: u32,
    /// Frame shown before the latest tick.
    pub previous: u32,
}

impl AnimationFrame {
    /// Computes the frame index for the elapsed state time.
    #[must_use]
    pub fn at(elapsed: Duration, tuning: &AnimationTuning) -> u32 {
        if tuning.frames_per_cycle == 0 || tuning.frame_secs <= 0.0 {
            return 0;
        }
        let frame = (elapsed.as_secs_f32() / tuning.frame_secs) as u32;
        frame % tuning.frames_per_cycle
    }

    /// Reports whether `frame` was reached during the latest tick.
    ///
    /// Frames skipped over by a long tick still count as crossed so that a
    /// trigger frame is never missed.
    #[must_use]
    pub fn crossed(&self, frame: u32) -> bool {
        if self.current == self.previous {
            return false;
        }
        if self.current > self.previous {
            frame > self.previous && frame <= self.current
        } else {
            frame > self.previous || frame <= self.current
        }
    }
}

/// Kinds of projectile the external projectile system knows how to simulate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    /// Arrow shot by ground archers.
    Arrow,
    /// Fire bolt spat by flyers.
    Firebolt,
    /// Fireball lobbed by casters.
    Fireball,
    /// Sticky web spat by web layers.
    Web,
}

/// Request handed to the projectile system.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FireRequest {
    /// Actor that fired.
    pub owner: ActorId,
    /// Spawn point of the projectile.
    pub origin: Vec3,
    /// Unit direction of travel.
    pub direction: Vec3,
    /// Point the shot was aimed at.
    pub target: Vec3,
    /// Projectile archetype.
    pub projectile: ProjectileKind,
    /// Whether the projectile belongs to the enemy side.
    pub owner_is_enemy: bool,
}

/// Originator of damage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DamageSource {
    /// Swing or slam from an actor.
    Actor {
        /// Attacking actor.
        attacker: ActorId,
        /// Swing the damage belongs to.
        attack: AttackId,
    },
    /// Attack performed by the player.
    Player {
        /// Swing the damage belongs to.
        attack: AttackId,
    },
    /// Hazards such as explosions from props.
    Environment,
}

/// Area effect with linear damage falloff.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaEffect {
    /// Centre of the effect.
    pub origin: Vec3,
    /// Radius beyond which nothing is hit.
    pub radius: f32,
    /// Damage dealt at the centre.
    pub max_damage: f32,
    /// Damage dealt at the edge of the radius.
    pub min_damage: f32,
}

impl AreaEffect {
    /// Damage dealt at `distance` from the centre, or `None` outside the radius.
    #[must_use]
    pub fn damage_at(&self, distance: f32) -> Option<f32> {
        if self.radius <= 0.0 || distance > self.radius || !distance.is_finite() {
            return None;
        }
        let t = (distance / self.radius).clamp(0.0, 1.0);
        Some(self.max_damage + (self.min_damage - self.max_damage) * t)
    }
}

/// Fire-and-forget audio cues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AudioCue {
    /// An actor noticed the target.
    Detection,
    /// An actor started an attack.
    Attack,
    /// An actor took damage.
    Hurt,
    /// An actor died.
    Death,
}

/// Whether a movement command is voluntary locomotion or scripted motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Motion {
    /// Ordinary locomotion; rejected while the actor is restrained or dead.
    Locomotion,
    /// Motion owned by an involuntary state, such as a harpoon pull.
    Scripted,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Changes the surface of a tile; used by the door and prop systems.
    SetSurface {
        /// Tile to modify.
        tile: TileCoord,
        /// New surface.
        surface: Surface,
    },
    /// Updates the player's position and perceivability.
    SetTarget {
        /// Player position in world space.
        position: Vec3,
        /// `false` while the player cannot be perceived (spectator, god mode).
        perceivable: bool,
    },
    /// Adds a new actor to the live set.
    SpawnActor {
        /// Archetype of the new actor.
        archetype: Archetype,
        /// Spawn position.
        position: Vec3,
        /// Initial facing angle in radians.
        facing: f32,
        /// Actor that laid this one, if any.
        parent: Option<ActorId>,
    },
    /// Advances every timer by the provided delta.
    Tick {
        /// Simulated time elapsed since the previous tick.
        dt: Duration,
    },
    /// Runs the end-of-tick cleanup pass.
    EndTick,
    /// Stores a freshly evaluated perception record.
    RecordPerception {
        /// Actor whose record changed.
        actor: ActorId,
        /// New record.
        record: PerceptionRecord,
    },
    /// Requests a state transition.
    Transition {
        /// Actor to transition.
        actor: ActorId,
        /// Requested state.
        state: ActorState,
        /// Why the transition happened.
        cause: TransitionCause,
    },
    /// Sets the actor's velocity for the current tick and integrates position.
    MoveActor {
        /// Actor to move.
        actor: ActorId,
        /// Velocity in world units per second.
        velocity: Vec3,
        /// Voluntary or scripted motion.
        motion: Motion,
    },
    /// Turns the actor to face a point without moving.
    FaceToward {
        /// Actor to rotate.
        actor: ActorId,
        /// Point to face.
        point: Vec3,
    },
    /// Replaces the actor's path and starts the repath cooldown.
    AssignPath {
        /// Actor receiving the path.
        actor: ActorId,
        /// New path.
        path: Path,
        /// Time before another repath is permitted.
        cooldown: Duration,
    },
    /// Moves the actor's path cursor to the next waypoint.
    AdvanceWaypoint {
        /// Actor whose cursor advances.
        actor: ActorId,
    },
    /// Starts the repath cooldown without assigning a path.
    DeferRepath {
        /// Actor whose pathing failed.
        actor: ActorId,
        /// Time before another repath is permitted.
        cooldown: Duration,
    },
    /// Starts the attack cooldown.
    StartAttackCooldown {
        /// Actor that attacked.
        actor: ActorId,
        /// Cooldown length.
        cooldown: Duration,
    },
    /// Applies melee damage to the player, at most once per swing.
    MeleeHit {
        /// Swinging actor.
        attacker: ActorId,
        /// Swing the hit belongs to.
        attack: AttackId,
        /// Damage dealt.
        damage: f32,
    },
    /// Applies damage to an actor.
    DamageActor {
        /// Actor hit.
        actor: ActorId,
        /// Damage dealt.
        amount: f32,
        /// Originator of the damage.
        source: DamageSource,
    },
    /// Applies an area effect to actors and optionally the player.
    AreaDamage {
        /// Effect geometry and falloff.
        effect: AreaEffect,
        /// Originator of the damage.
        source: DamageSource,
        /// Whether the effect can hurt the player.
        hits_player: bool,
        /// Whether the effect can hurt actors.
        hits_actors: bool,
    },
    /// Forwards a projectile request to the projectile system.
    FireProjectile(FireRequest),
    /// Forces a status effect onto an actor.
    ApplyStatus {
        /// Affected actor.
        actor: ActorId,
        /// Status to apply.
        status: Status,
    },
    /// Freezes every live actor within a radius.
    FreezeBurst {
        /// Centre of the burst.
        origin: Vec3,
        /// Radius of the burst.
        radius: f32,
        /// Freeze duration.
        duration: Duration,
    },
    /// Raises the alarm for a passive actor.
    Alert {
        /// Actor to alert.
        actor: ActorId,
        /// Where the target was reported.
        last_known: Vec3,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The simulation clock advanced.
    TimeAdvanced {
        /// Duration of the tick.
        dt: Duration,
    },
    /// A tile surface changed.
    SurfaceChanged {
        /// Modified tile.
        tile: TileCoord,
        /// New surface.
        surface: Surface,
    },
    /// A new actor joined the live set.
    ActorSpawned {
        /// Identifier assigned to the actor.
        actor: ActorId,
        /// Archetype of the actor.
        archetype: Archetype,
        /// Spawn position.
        position: Vec3,
    },
    /// An actor changed state.
    ActorStateChanged {
        /// Actor that transitioned.
        actor: ActorId,
        /// Previous state.
        from: ActorState,
        /// New state.
        to: ActorState,
        /// Why the transition happened.
        cause: TransitionCause,
    },
    /// An actor lost health.
    ActorDamaged {
        /// Actor hit.
        actor: ActorId,
        /// Damage removed from the pool.
        amount: f32,
        /// Health left afterwards.
        remaining: f32,
    },
    /// An actor died.
    ActorDied {
        /// Actor that died.
        actor: ActorId,
    },
    /// A corpse left the live set after its grace period.
    ActorRemoved {
        /// Removed actor.
        actor: ActorId,
    },
    /// The player took damage.
    PlayerDamaged {
        /// Damage dealt.
        amount: f32,
        /// Originator of the damage.
        source: DamageSource,
    },
    /// The projectile system should spawn a projectile.
    ProjectileRequested(FireRequest),
    /// The audio system should play a cue.
    AudioCue {
        /// Cue to play.
        cue: AudioCue,
        /// World position of the sound.
        position: Vec3,
    },
}

/// Immutable representation of a single actor's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct ActorSnapshot {
    /// Stable identity of the actor.
    pub id: ActorId,
    /// Archetype of the actor.
    pub archetype: Archetype,
    /// World position.
    pub position: Vec3,
    /// Velocity applied during the previous tick.
    pub velocity: Vec3,
    /// Facing angle in radians around the vertical axis.
    pub facing: f32,
    /// Spawn position, used as the leash anchor and patrol centre.
    pub home: Vec3,
    /// Current state.
    pub state: ActorState,
    /// Health pool.
    pub health: Health,
    /// Perception record.
    pub perception: PerceptionRecord,
    /// Current path, if any.
    pub path: Option<Path>,
    /// Named timers.
    pub timers: ActorTimers,
    /// Identifier of the most recent swing.
    pub attack: AttackId,
    /// Animation-frame proxy.
    pub frame: AnimationFrame,
    /// Active harpoon restraint, if any.
    pub restraint: Option<Restraint>,
    /// Number of hatchlings laid so far.
    pub broods: u32,
}

/// Read-only snapshot describing every live actor.
#[derive(Clone, Debug, Default)]
pub struct ActorView {
    snapshots: Vec<ActorSnapshot>,
}

impl ActorView {
    /// Creates a new actor view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<ActorSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &ActorSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up a snapshot by identifier.
    #[must_use]
    pub fn get(&self, id: ActorId) -> Option<&ActorSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .and_then(|index| self.snapshots.get(index))
    }

    /// Number of captured actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<ActorSnapshot> {
        self.snapshots
    }
}

/// Read-only snapshot of the player as seen by the AI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetSnapshot {
    /// Player position.
    pub position: Vec3,
    /// Whether the player can currently be perceived at all.
    pub perceivable: bool,
}

impl Default for TargetSnapshot {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            perceivable: true,
        }
    }
}

/// Converts a facing angle into a unit direction on the ground plane.
#[must_use]
pub fn facing_direction(facing: f32) -> Vec3 {
    Vec3::new(facing.cos(), facing.sin(), 0.0)
}

/// Converts a ground-plane direction into a facing angle.
///
/// Zero-length directions keep the provided fallback angle.
#[must_use]
pub fn facing_angle(direction: Vec3, fallback: f32) -> f32 {
    let flat = Vec3::new(direction.x, direction.y, 0.0);
    if flat.length_squared() <= f32::EPSILON {
        fallback
    } else {
        flat.y.atan2(flat.x)
    }
}
