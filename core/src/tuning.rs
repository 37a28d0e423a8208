use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Archetype, ProjectileKind};

const DEFAULT_RNG_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Errors raised while loading or validating a tuning document.
#[derive(Debug, Error)]
pub enum TuningError {
    /// The document is not valid TOML or does not match the schema.
    #[error("failed to parse tuning document: {0}")]
    Parse(#[from] toml::de::Error),
    /// The document parsed but contains values the simulation cannot use.
    #[error("invalid tuning value for `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: String,
        /// Human readable explanation.
        reason: &'static str,
    },
}

/// Converts seconds expressed as a float into a duration, clamping invalid input to zero.
#[must_use]
pub fn seconds(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs.max(0.0)).unwrap_or(Duration::ZERO)
}

/// Complete tuning table for the AI core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Line-of-sight fan parameters.
    pub sight: SightTuning,
    /// Pathfinding limits.
    pub pathing: PathingTuning,
    /// Group behaviour radii.
    pub coordination: CoordinationTuning,
    /// Seconds a corpse stays in the live set before cleanup removes it.
    pub death_grace_secs: f32,
    /// Seed for patrol and wander sampling.
    pub rng_seed: u64,
    /// Profile for walking brawlers.
    #[serde(default = "ArchetypeProfile::ground_melee")]
    pub ground_melee: ArchetypeProfile,
    /// Profile for walking archers.
    #[serde(default = "ArchetypeProfile::ground_ranged")]
    pub ground_ranged: ArchetypeProfile,
    /// Profile for airborne shooters.
    #[serde(default = "ArchetypeProfile::flying")]
    pub flying: ArchetypeProfile,
    /// Profile for heavyweight bosses.
    #[serde(default = "ArchetypeProfile::heavy_boss")]
    pub heavy_boss: ArchetypeProfile,
    /// Profile for fireball casters.
    #[serde(default = "ArchetypeProfile::caster")]
    pub caster: ArchetypeProfile,
    /// Profile for web-spitting spiders.
    #[serde(default = "ArchetypeProfile::web_layer")]
    pub web_layer: ArchetypeProfile,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            sight: SightTuning::default(),
            pathing: PathingTuning::default(),
            coordination: CoordinationTuning::default(),
            death_grace_secs: 4.0,
            rng_seed: DEFAULT_RNG_SEED,
            ground_melee: ArchetypeProfile::ground_melee(),
            ground_ranged: ArchetypeProfile::ground_ranged(),
            flying: ArchetypeProfile::flying(),
            heavy_boss: ArchetypeProfile::heavy_boss(),
            caster: ArchetypeProfile::caster(),
            web_layer: ArchetypeProfile::web_layer(),
        }
    }
}

impl Tuning {
    /// Parses and validates a TOML tuning document.
    ///
    /// Sections and fields missing from the document keep their defaults.
    pub fn from_toml_str(document: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = toml::from_str(document)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Profile describing the provided archetype.
    #[must_use]
    pub fn profile(&self, archetype: Archetype) -> &ArchetypeProfile {
        match archetype {
            Archetype::GroundMelee => &self.ground_melee,
            Archetype::GroundRanged => &self.ground_ranged,
            Archetype::Flying => &self.flying,
            Archetype::HeavyBoss => &self.heavy_boss,
            Archetype::Caster => &self.caster,
            Archetype::WebLayer => &self.web_layer,
        }
    }

    /// Grace period before corpses are removed.
    #[must_use]
    pub fn death_grace(&self) -> Duration {
        seconds(self.death_grace_secs)
    }

    /// Checks the table for values the simulation cannot use.
    pub fn validate(&self) -> Result<(), TuningError> {
        if self.sight.rays == 0 {
            return Err(invalid("sight.rays", "at least one ray is required"));
        }
        if !(self.sight.required_fraction > 0.0 && self.sight.required_fraction <= 1.0) {
            return Err(invalid(
                "sight.required_fraction",
                "must lie within (0, 1]",
            ));
        }
        if self.sight.sample_spacing <= 0.0 {
            return Err(invalid("sight.sample_spacing", "must be positive"));
        }
        if self.sight.max_samples_per_ray == 0 {
            return Err(invalid("sight.max_samples_per_ray", "must be positive"));
        }
        if self.pathing.max_expansions == 0 {
            return Err(invalid("pathing.max_expansions", "must be positive"));
        }
        if self.death_grace_secs < 0.0 {
            return Err(invalid("death_grace_secs", "must not be negative"));
        }

        for archetype in Archetype::ALL {
            self.profile(archetype).validate(archetype_key(archetype))?;
        }
        Ok(())
    }
}

fn archetype_key(archetype: Archetype) -> &'static str {
    match archetype {
        Archetype::GroundMelee => "ground_melee",
        Archetype::GroundRanged => "ground_ranged",
        Archetype::Flying => "flying",
        Archetype::HeavyBoss => "heavy_boss",
        Archetype::Caster => "caster",
        Archetype::WebLayer => "web_layer",
    }
}

fn invalid(field: impl Into<String>, reason: &'static str) -> TuningError {
    TuningError::Invalid {
        field: field.into(),
        reason,
    }
}

/// Parameters of the line-of-sight ray fan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SightTuning {
    /// Number of parallel rays cast per query.
    pub rays: u32,
    /// Total perpendicular spread of the fan in world units.
    pub spread: f32,
    /// Eye height added to both endpoints.
    pub vertical_offset: f32,
    /// Fraction of rays that must be unobstructed for sight to succeed.
    pub required_fraction: f32,
    /// Distance between consecutive samples along a ray.
    pub sample_spacing: f32,
    /// Upper bound on samples taken along a single ray.
    pub max_samples_per_ray: u32,
    /// Height of cover props; rays below it are blocked.
    pub cover_height: f32,
}

impl Default for SightTuning {
    fn default() -> Self {
        Self {
            rays: 5,
            spread: 30.0,
            vertical_offset: 60.0,
            required_fraction: 0.6,
            sample_spacing: 25.0,
            max_samples_per_ray: 256,
            cover_height: 80.0,
        }
    }
}

/// Limits applied to path searches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathingTuning {
    /// Maximum tiles expanded by a single breadth-first search.
    pub max_expansions: u32,
    /// Seconds between repaths of the same actor.
    pub repath_cooldown_secs: f32,
    /// Distance at which a waypoint counts as reached.
    pub waypoint_arrival_radius: f32,
    /// Radius in tiles around home sampled for patrol points.
    pub patrol_radius_tiles: u32,
    /// Samples drawn before a patrol point search gives up.
    pub patrol_attempts: u32,
    /// Widening steps taken by a retreat search before it gives up.
    pub retreat_attempts: u32,
    /// Longest retreat path accepted, in tiles.
    pub retreat_max_path: u32,
    /// Ring radius in tiles searched for a free repositioning tile.
    pub reposition_radius_tiles: u32,
}

impl Default for PathingTuning {
    fn default() -> Self {
        Self {
            max_expansions: 4096,
            repath_cooldown_secs: 0.5,
            waypoint_arrival_radius: 12.0,
            patrol_radius_tiles: 6,
            patrol_attempts: 12,
            retreat_attempts: 4,
            retreat_max_path: 24,
            reposition_radius_tiles: 2,
        }
    }
}

impl PathingTuning {
    /// Cooldown applied after every repath attempt.
    #[must_use]
    pub fn repath_cooldown(&self) -> Duration {
        seconds(self.repath_cooldown_secs)
    }
}

/// Radii used by the coordination layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationTuning {
    /// Passive actors within this radius of a detecting actor are alerted.
    pub alert_radius: f32,
    /// Radius within which neighbours push each other apart.
    pub separation_radius: f32,
    /// Peak separation speed contributed by a touching neighbour.
    pub separation_strength: f32,
}

impl Default for CoordinationTuning {
    fn default() -> Self {
        Self {
            alert_radius: 800.0,
            separation_radius: 80.0,
            separation_strength: 160.0,
        }
    }
}

/// How an archetype moves through the level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locomotion {
    /// Follows smoothed waypoint paths over walkable tiles.
    Grid,
    /// Steers continuously over flyable tiles.
    Steering,
}

/// State entered when a chase is abandoned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaseExit {
    /// Return to idling.
    Idle,
    /// Retreat from the target.
    RunAway,
}

/// Hysteresis band: enter below `enter`, leave above `exit`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandTuning {
    /// Distance below which the band is entered.
    pub enter: f32,
    /// Distance above which the band is left.
    pub exit: f32,
}

/// Animation clock used to derive the frame proxy from the state timer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationTuning {
    /// Seconds each frame is shown.
    pub frame_secs: f32,
    /// Frames per animation cycle.
    pub frames_per_cycle: u32,
}

/// Hatchling spawning performed while attacking.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BroodTuning {
    /// Seconds between hatchlings.
    pub interval_secs: f32,
    /// Hatchlings laid over the actor's lifetime.
    pub max: u32,
}

/// Offensive capability of an archetype.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttackProfile {
    /// Close-range swing with a timed hit window.
    Melee {
        /// Damage dealt to the player by a connecting swing.
        damage: f32,
        /// Distance within which the swing connects.
        reach: f32,
        /// Seconds into the swing at which the hit window opens.
        window_start_secs: f32,
        /// Seconds into the swing at which the hit window closes.
        window_end_secs: f32,
        /// Total length of the swing.
        swing_secs: f32,
        /// Seconds between swings.
        cooldown_secs: f32,
        /// Radius of the area slam replacing the single-target hit.
        #[serde(default)]
        slam_radius: Option<f32>,
        /// Damage dealt at the edge of the slam.
        #[serde(default)]
        slam_min_damage: f32,
    },
    /// Projectile attack fired on an animation trigger frame.
    Ranged {
        /// Projectile fired.
        projectile: ProjectileKind,
        /// Animation frame on which the projectile leaves.
        trigger_frame: u32,
        /// Seconds between shots.
        cooldown_secs: f32,
        /// Height above the actor at which projectiles spawn.
        muzzle_height: f32,
    },
}

impl AttackProfile {
    /// Reports whether the attack is a melee swing.
    #[must_use]
    pub const fn is_melee(&self) -> bool {
        matches!(self, Self::Melee { .. })
    }

    /// Cooldown between consecutive attacks.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        match self {
            Self::Melee { cooldown_secs, .. } | Self::Ranged { cooldown_secs, .. } => {
                seconds(*cooldown_secs)
            }
        }
    }
}

/// Per-archetype behaviour table row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeProfile {
    /// Starting and maximum health.
    pub max_health: f32,
    /// Locomotion model.
    pub locomotion: Locomotion,
    /// Speed while patrolling or repositioning.
    pub walk_speed: f32,
    /// Speed while chasing or running away.
    pub chase_speed: f32,
    /// Largest velocity change per second for steering actors.
    pub max_acceleration: f32,
    /// Distance at which arrive steering starts slowing down.
    pub slow_radius: f32,
    /// Radius within which a visible target is detected.
    pub detection_radius: f32,
    /// Seconds an idle actor must have spent before reacting to the target.
    pub reaction_delay_secs: f32,
    /// Seconds an unseen target is remembered.
    pub forget_time_secs: f32,
    /// Seconds spent idling before a patrol starts.
    pub idle_duration_secs: f32,
    /// Distance from home beyond which a chase is abandoned.
    #[serde(default)]
    pub leash_distance: Option<f32>,
    /// Seconds after which a chase is abandoned.
    #[serde(default)]
    pub chase_timeout_secs: Option<f32>,
    /// State entered when a chase is abandoned.
    pub chase_exit: ChaseExit,
    /// Offensive capability.
    pub attack: AttackProfile,
    /// Distance band in which the actor commits to attacking.
    pub attack_band: BandTuning,
    /// Target distance below which the actor retreats.
    #[serde(default)]
    pub panic_distance: Option<f32>,
    /// Distance from the threat a retreat aims for.
    pub retreat_distance: f32,
    /// Initial tolerance around the retreat distance.
    pub retreat_tolerance: f32,
    /// Longest a retreat lasts.
    pub run_away_secs: f32,
    /// Longest a reposition lasts.
    pub reposition_timeout_secs: f32,
    /// Stagger length after a restraint ends.
    pub stagger_secs: f32,
    /// Whether the actor can be harpooned.
    pub restrainable: bool,
    /// Circling radius while attacking, for steering actors.
    #[serde(default)]
    pub orbit_radius: Option<f32>,
    /// Animation clock.
    pub animation: AnimationTuning,
    /// Hatchling spawning.
    #[serde(default)]
    pub brood: Option<BroodTuning>,
}

impl ArchetypeProfile {
    /// Default brawler profile.
    #[must_use]
    pub fn ground_melee() -> Self {
        Self {
            max_health: 100.0,
            locomotion: Locomotion::Grid,
            walk_speed: 150.0,
            chase_speed: 300.0,
            max_acceleration: 2000.0,
            slow_radius: 60.0,
            detection_radius: 3000.0,
            reaction_delay_secs: 0.3,
            forget_time_secs: 5.0,
            idle_duration_secs: 3.0,
            leash_distance: Some(2500.0),
            chase_timeout_secs: Some(20.0),
            chase_exit: ChaseExit::Idle,
            attack: AttackProfile::Melee {
                damage: 15.0,
                reach: 140.0,
                window_start_secs: 0.35,
                window_end_secs: 0.55,
                swing_secs: 0.9,
                cooldown_secs: 1.2,
                slam_radius: None,
                slam_min_damage: 0.0,
            },
            attack_band: BandTuning {
                enter: 120.0,
                exit: 160.0,
            },
            panic_distance: None,
            retreat_distance: 600.0,
            retreat_tolerance: 150.0,
            run_away_secs: 3.0,
            reposition_timeout_secs: 2.0,
            stagger_secs: 1.0,
            restrainable: true,
            orbit_radius: None,
            animation: AnimationTuning {
                frame_secs: 0.1,
                frames_per_cycle: 10,
            },
            brood: None,
        }
    }

    /// Default archer profile.
    #[must_use]
    pub fn ground_ranged() -> Self {
        Self {
            max_health: 70.0,
            walk_speed: 140.0,
            chase_speed: 260.0,
            leash_distance: Some(3000.0),
            attack: AttackProfile::Ranged {
                projectile: ProjectileKind::Arrow,
                trigger_frame: 6,
                cooldown_secs: 1.5,
                muzzle_height: 60.0,
            },
            attack_band: BandTuning {
                enter: 900.0,
                exit: 1100.0,
            },
            panic_distance: Some(250.0),
            retreat_distance: 700.0,
            retreat_tolerance: 200.0,
            ..Self::ground_melee()
        }
    }

    /// Default flyer profile.
    #[must_use]
    pub fn flying() -> Self {
        Self {
            max_health: 60.0,
            locomotion: Locomotion::Steering,
            walk_speed: 200.0,
            chase_speed: 380.0,
            max_acceleration: 900.0,
            slow_radius: 150.0,
            detection_radius: 3500.0,
            leash_distance: None,
            chase_timeout_secs: None,
            attack: AttackProfile::Ranged {
                projectile: ProjectileKind::Firebolt,
                trigger_frame: 4,
                cooldown_secs: 2.0,
                muzzle_height: 0.0,
            },
            attack_band: BandTuning {
                enter: 800.0,
                exit: 1000.0,
            },
            orbit_radius: Some(600.0),
            ..Self::ground_melee()
        }
    }

    /// Default boss profile.
    #[must_use]
    pub fn heavy_boss() -> Self {
        Self {
            max_health: 600.0,
            walk_speed: 90.0,
            chase_speed: 160.0,
            detection_radius: 4000.0,
            leash_distance: None,
            chase_timeout_secs: None,
            attack: AttackProfile::Melee {
                damage: 40.0,
                reach: 220.0,
                window_start_secs: 0.9,
                window_end_secs: 1.2,
                swing_secs: 1.8,
                cooldown_secs: 2.5,
                slam_radius: Some(260.0),
                slam_min_damage: 10.0,
            },
            attack_band: BandTuning {
                enter: 200.0,
                exit: 260.0,
            },
            stagger_secs: 0.5,
            restrainable: false,
            ..Self::ground_melee()
        }
    }

    /// Default caster profile.
    #[must_use]
    pub fn caster() -> Self {
        Self {
            max_health: 50.0,
            walk_speed: 120.0,
            chase_speed: 220.0,
            leash_distance: Some(3000.0),
            chase_timeout_secs: Some(25.0),
            chase_exit: ChaseExit::RunAway,
            attack: AttackProfile::Ranged {
                projectile: ProjectileKind::Fireball,
                trigger_frame: 8,
                cooldown_secs: 2.5,
                muzzle_height: 80.0,
            },
            attack_band: BandTuning {
                enter: 1000.0,
                exit: 1200.0,
            },
            panic_distance: Some(400.0),
            retreat_distance: 900.0,
            retreat_tolerance: 200.0,
            ..Self::ground_melee()
        }
    }

    /// Default spider profile.
    #[must_use]
    pub fn web_layer() -> Self {
        Self {
            max_health: 120.0,
            walk_speed: 130.0,
            chase_speed: 240.0,
            attack: AttackProfile::Ranged {
                projectile: ProjectileKind::Web,
                trigger_frame: 5,
                cooldown_secs: 2.0,
                muzzle_height: 30.0,
            },
            attack_band: BandTuning {
                enter: 700.0,
                exit: 900.0,
            },
            brood: Some(BroodTuning {
                interval_secs: 6.0,
                max: 3,
            }),
            ..Self::ground_melee()
        }
    }

    /// Reaction delay as a duration.
    #[must_use]
    pub fn reaction_delay(&self) -> Duration {
        seconds(self.reaction_delay_secs)
    }

    /// Forget time as a duration.
    #[must_use]
    pub fn forget_time(&self) -> Duration {
        seconds(self.forget_time_secs)
    }

    /// Idle duration before patrolling.
    #[must_use]
    pub fn idle_duration(&self) -> Duration {
        seconds(self.idle_duration_secs)
    }

    fn validate(&self, key: &str) -> Result<(), TuningError> {
        if self.max_health <= 0.0 {
            return Err(invalid(format!("{key}.max_health"), "must be positive"));
        }
        if self.walk_speed < 0.0 || self.chase_speed < 0.0 {
            return Err(invalid(format!("{key}.chase_speed"), "speeds must not be negative"));
        }
        if self.attack_band.enter > self.attack_band.exit {
            return Err(invalid(
                format!("{key}.attack_band"),
                "enter distance must not exceed exit distance",
            ));
        }
        if self.animation.frames_per_cycle == 0 || self.animation.frame_secs <= 0.0 {
            return Err(invalid(format!("{key}.animation"), "clock must be positive"));
        }
        if let AttackProfile::Melee {
            window_start_secs,
            window_end_secs,
            swing_secs,
            ..
        } = self.attack
        {
            if window_start_secs > window_end_secs || window_end_secs > swing_secs {
                return Err(invalid(
                    format!("{key}.attack"),
                    "hit window must lie within the swing",
                ));
            }
        }
        if let AttackProfile::Ranged { trigger_frame, .. } = self.attack {
            if trigger_frame >= self.animation.frames_per_cycle {
                return Err(invalid(
                    format!("{key}.attack.trigger_frame"),
                    "must be smaller than frames_per_cycle",
                ));
            }
        }
        Ok(())
    }
}
