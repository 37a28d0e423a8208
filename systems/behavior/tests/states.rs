use std::time::Duration;

use glam::Vec3;
use grimhold_core::{
    ActorId, ActorSnapshot, ActorState, Archetype, Command, DamageSource, EnvironmentContext,
    Event, Path, Restrainer, Restraint, Status, Surface, TileCoord, TransitionCause, Tuning,
};
use grimhold_system_behavior::Behavior;
use grimhold_world::{self as world, query, Level, World};

const DT: Duration = Duration::from_millis(100);

struct Harness {
    world: World,
    behavior: Behavior,
    log: Vec<Event>,
}

impl Harness {
    fn new(columns: u32, rows: u32) -> Self {
        Self::with(columns, rows, EnvironmentContext::dungeon(), Tuning::default())
    }

    fn with(columns: u32, rows: u32, environment: EnvironmentContext, tuning: Tuning) -> Self {
        Self {
            behavior: Behavior::new(&tuning),
            world: World::new(Level::open(columns, rows, 100.0), environment, tuning),
            log: Vec::new(),
        }
    }

    fn spawn(&mut self, archetype: Archetype, tile: TileCoord) -> ActorId {
        let position = query::level(&self.world).tile_center(tile);
        let mut events = Vec::new();
        world::apply(
            &mut self.world,
            Command::SpawnActor {
                archetype,
                position,
                facing: 0.0,
                parent: None,
            },
            &mut events,
        );
        events
            .iter()
            .find_map(|event| match event {
                Event::ActorSpawned { actor, .. } => Some(*actor),
                _ => None,
            })
            .expect("actor spawned")
    }

    fn command(&mut self, command: Command) {
        world::apply(&mut self.world, command, &mut self.log);
    }

    fn surface(&mut self, tile: TileCoord, surface: Surface) {
        self.command(Command::SetSurface { tile, surface });
    }

    fn target(&mut self, position: Vec3, perceivable: bool) {
        self.command(Command::SetTarget {
            position,
            perceivable,
        });
    }

    fn step_by(&mut self, dt: Duration) {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::Tick { dt }, &mut events);
        let frame = query::frame(&self.world);
        let view = query::actor_view(&self.world);
        let mut commands = Vec::new();
        self.behavior.handle(&events, &frame, &view, &mut commands);
        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }
        world::apply(&mut self.world, Command::EndTick, &mut events);
        self.log.extend(events);
    }

    fn step(&mut self) {
        self.step_by(DT);
    }

    fn step_until(&mut self, id: ActorId, state: ActorState, max_steps: usize) -> usize {
        for step in 1..=max_steps {
            self.step();
            if self.actor(id).state == state {
                return step;
            }
        }
        panic!(
            "{state:?} not reached within {max_steps} steps, actor is {:?}",
            self.actor(id).state
        );
    }

    fn actor(&self, id: ActorId) -> ActorSnapshot {
        query::actor(&self.world, id).expect("actor exists")
    }

    fn entered(&self, id: ActorId, state: ActorState) -> Option<TransitionCause> {
        self.log.iter().find_map(|event| match event {
            Event::ActorStateChanged {
                actor, to, cause, ..
            } if *actor == id && *to == state => Some(*cause),
            _ => None,
        })
    }
}

fn flat(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x - b.x, a.y - b.y, 0.0).length()
}

#[test]
fn idle_actor_detects_visible_target_after_reaction_delay() {
    let mut harness = Harness::new(10, 10);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(5, 5));
    harness.target(Vec3::new(700.0, 550.0, 0.0), true);

    harness.step();
    harness.step();
    assert_eq!(harness.actor(id).state, ActorState::Idle);

    let steps = 2 + harness.step_until(id, ActorState::Chase, 5);
    let reaction = Tuning::default().ground_melee.reaction_delay();
    assert!(DT * steps as u32 >= reaction);
    assert_eq!(
        harness.entered(id, ActorState::Chase),
        Some(TransitionCause::Detection)
    );
}

#[test]
fn chasing_brawler_closes_in_and_swings() {
    let mut harness = Harness::new(12, 10);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(5, 5));
    let start = harness.actor(id).position;
    harness.target(Vec3::new(850.0, 550.0, 0.0), true);

    let _ = harness.step_until(id, ActorState::MeleeAttack, 30);

    let actor = harness.actor(id);
    assert!(actor.position.x > start.x + 100.0);
    assert!(flat(actor.position, Vec3::new(850.0, 550.0, 0.0)) <= 160.0);
    assert!(actor.timers.attack_cooldown > Duration::ZERO);
}

#[test]
fn lost_target_sends_chaser_home() {
    let mut harness = Harness::new(10, 10);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(5, 5));
    harness.command(Command::Alert {
        actor: id,
        last_known: Vec3::new(850.0, 850.0, 0.0),
    });
    assert_eq!(harness.actor(id).state, ActorState::Chase);

    harness.target(Vec3::new(850.0, 850.0, 0.0), false);
    harness.step();
    assert_eq!(harness.actor(id).state, ActorState::Idle);
}

#[test]
fn idle_walker_starts_a_patrol() {
    let mut harness = Harness::new(15, 15);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(7, 7));
    harness.target(Vec3::ZERO, false);
    let home = harness.actor(id).home;

    for _ in 0..10 {
        harness.step_by(Duration::from_millis(500));
        if harness.actor(id).state == ActorState::Patrol {
            break;
        }
    }
    let patrolling = harness.actor(id);
    assert_eq!(patrolling.state, ActorState::Patrol);
    assert!(patrolling.path.is_some());

    harness.step_by(Duration::from_millis(500));
    harness.step_by(Duration::from_millis(500));
    assert_ne!(harness.actor(id).position, home);
}

#[test]
fn frozen_actor_holds_still_then_staggers_and_recovers() {
    let mut harness = Harness::new(10, 10);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(5, 5));
    harness.target(Vec3::ZERO, false);
    let origin = harness.actor(id).position;
    harness.command(Command::FreezeBurst {
        origin,
        radius: 50.0,
        duration: Duration::from_secs(1),
    });

    for _ in 0..5 {
        harness.step();
        let actor = harness.actor(id);
        assert_eq!(actor.state, ActorState::Freeze);
        assert_eq!(actor.position, origin);
    }

    let _ = harness.step_until(id, ActorState::Stagger, 10);
    let _ = harness.step_until(id, ActorState::Idle, 15);
}

#[test]
fn frozen_actor_dies_once_its_health_is_gone() {
    let mut harness = Harness::new(10, 10);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(5, 5));
    harness.command(Command::ApplyStatus {
        actor: id,
        status: Status::Freeze {
            duration: Duration::from_secs(5),
        },
    });
    harness.command(Command::DamageActor {
        actor: id,
        amount: 500.0,
        source: DamageSource::Environment,
    });
    assert_eq!(harness.actor(id).state, ActorState::Freeze);

    harness.step();
    assert_eq!(harness.actor(id).state, ActorState::Death);
    assert!(harness.log.contains(&Event::ActorDied { actor: id }));
}

#[test]
fn harpoon_drags_actor_to_the_player_then_staggers() {
    let mut harness = Harness::new(10, 10);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(1, 5));
    harness.target(Vec3::new(850.0, 550.0, 0.0), true);
    harness.command(Command::ApplyStatus {
        actor: id,
        status: Status::Harpoon(Restraint {
            restrainer: Restrainer::Player,
            pull_speed: 500.0,
            stop_distance: 150.0,
        }),
    });

    let mut last_x = harness.actor(id).position.x;
    for _ in 0..20 {
        harness.step();
        let actor = harness.actor(id);
        if actor.state != ActorState::Harpooned {
            break;
        }
        assert!(actor.position.x > last_x);
        last_x = actor.position.x;
    }

    let actor = harness.actor(id);
    assert_eq!(actor.state, ActorState::Stagger);
    assert!(actor.restraint.is_none());
    assert!(flat(actor.position, Vec3::new(850.0, 550.0, 0.0)) <= 200.0);
}

#[test]
fn missing_restrainer_releases_into_stagger() {
    let mut harness = Harness::new(10, 10);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(1, 5));
    harness.command(Command::ApplyStatus {
        actor: id,
        status: Status::Harpoon(Restraint {
            restrainer: Restrainer::Actor(ActorId::new(42, 0)),
            pull_speed: 500.0,
            stop_distance: 150.0,
        }),
    });
    harness.step();
    assert_eq!(harness.actor(id).state, ActorState::Stagger);
}

#[test]
fn crowded_archer_runs_away() {
    let mut harness = Harness::new(20, 10);
    let id = harness.spawn(Archetype::GroundRanged, TileCoord::new(5, 5));
    let player = Vec3::new(350.0, 550.0, 0.0);
    harness.target(player, true);

    let _ = harness.step_until(id, ActorState::RunAway, 10);
    assert_eq!(
        harness.entered(id, ActorState::Chase),
        Some(TransitionCause::Detection)
    );

    for _ in 0..10 {
        harness.step();
    }
    assert!(flat(harness.actor(id).position, player) > 400.0);
}

#[test]
fn flyer_circles_at_hover_height_while_shooting() {
    let mut harness = Harness::new(30, 30);
    let id = harness.spawn(Archetype::Flying, TileCoord::new(9, 15));
    let player = Vec3::new(1550.0, 1550.0, 0.0);
    harness.target(player, true);

    let _ = harness.step_until(id, ActorState::Attack, 10);
    let start = harness.actor(id).position;
    for _ in 0..20 {
        harness.step();
        let actor = harness.actor(id);
        assert_eq!(actor.state, ActorState::Attack);
        assert_eq!(actor.position.z, EnvironmentContext::dungeon().hover_height);
        assert!(flat(actor.position, player) <= 1000.0);
    }
    assert_ne!(harness.actor(id).position, start);
}

#[test]
fn chaser_lands_on_close_waypoints_instead_of_overshooting() {
    let mut harness = Harness::new(16, 10);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(5, 5));
    let player = Vec3::new(1450.0, 550.0, 0.0);
    harness.target(player, true);
    harness.command(Command::Transition {
        actor: id,
        state: ActorState::Chase,
        cause: TransitionCause::Behavior,
    });
    harness.command(Command::AssignPath {
        actor: id,
        path: Path::new(
            vec![Vec3::new(563.0, 550.0, 0.0), player],
            TileCoord::new(14, 5),
        ),
        cooldown: Duration::from_secs(1),
    });

    for _ in 0..40 {
        harness.step();
    }

    let actor = harness.actor(id);
    assert!(actor.position.x > 700.0, "stuck at {:?}", actor.position);
    assert!(flat(actor.position, player) <= 160.0);
}

#[test]
fn chase_gives_up_after_its_timeout() {
    let mut tuning = Tuning::default();
    tuning.ground_melee.chase_timeout_secs = Some(1.0);
    let mut harness = Harness::with(30, 10, EnvironmentContext::dungeon(), tuning);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(2, 5));
    harness.target(Vec3::new(2850.0, 550.0, 0.0), true);

    let _ = harness.step_until(id, ActorState::Chase, 10);
    let steps = harness.step_until(id, ActorState::Idle, 15);

    assert!(DT * steps as u32 >= Duration::from_secs(1));
    assert!(harness.actor(id).position.x > 250.0);
}

#[test]
fn chase_gives_up_past_the_leash() {
    let mut tuning = Tuning::default();
    tuning.ground_melee.leash_distance = Some(300.0);
    tuning.ground_melee.chase_timeout_secs = None;
    let mut harness = Harness::with(30, 10, EnvironmentContext::dungeon(), tuning);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(2, 5));
    let home = harness.actor(id).home;
    harness.target(Vec3::new(2850.0, 550.0, 0.0), true);

    let _ = harness.step_until(id, ActorState::Chase, 10);
    let _ = harness.step_until(id, ActorState::Idle, 20);

    let strayed = flat(harness.actor(id).position, home);
    assert!(strayed > 300.0 && strayed < 400.0, "strayed {strayed}");
}

#[test]
fn caster_breaks_off_a_long_chase_by_running_away() {
    let mut tuning = Tuning::default();
    tuning.caster.chase_timeout_secs = Some(1.0);
    let mut harness = Harness::with(30, 10, EnvironmentContext::dungeon(), tuning);
    let id = harness.spawn(Archetype::Caster, TileCoord::new(2, 5));
    harness.target(Vec3::new(2850.0, 550.0, 0.0), true);

    let _ = harness.step_until(id, ActorState::Chase, 10);
    let _ = harness.step_until(id, ActorState::RunAway, 15);
    assert_eq!(
        harness.entered(id, ActorState::RunAway),
        Some(TransitionCause::Behavior)
    );
}

#[test]
fn retreat_ends_once_a_safe_distance_is_reached() {
    let mut tuning = Tuning::default();
    tuning.ground_ranged.retreat_distance = 450.0;
    tuning.ground_ranged.retreat_tolerance = 100.0;
    tuning.ground_ranged.run_away_secs = 30.0;
    let mut harness = Harness::with(20, 10, EnvironmentContext::dungeon(), tuning);
    let id = harness.spawn(Archetype::GroundRanged, TileCoord::new(5, 5));
    let player = Vec3::new(350.0, 550.0, 0.0);
    harness.target(player, true);

    let _ = harness.step_until(id, ActorState::RunAway, 10);
    let _ = harness.step_until(id, ActorState::Chase, 40);

    let actor = harness.actor(id);
    assert!(flat(actor.position, player) >= 450.0);
    assert!(actor.timers.state < Duration::from_secs(30));
}

/// Fills one column with water, leaving no way around it.
fn moat(harness: &mut Harness, column: u32, rows: u32) {
    for row in 0..rows {
        harness.surface(TileCoord::new(column, row), Surface::Water);
    }
}

#[test]
fn open_world_walker_heads_for_unreachable_target_but_stays_on_land() {
    let mut harness = Harness::with(12, 5, EnvironmentContext::open_world(), Tuning::default());
    moat(&mut harness, 6, 5);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(2, 2));
    harness.target(Vec3::new(1050.0, 250.0, 0.0), true);

    for _ in 0..40 {
        harness.step();
        let actor = harness.actor(id);
        let tile = query::level(&harness.world)
            .world_to_tile(actor.position)
            .expect("actor inside the level");
        assert!(query::level(&harness.world).is_walkable(tile), "on {tile:?}");
    }

    let actor = harness.actor(id);
    assert_eq!(actor.state, ActorState::Chase);
    assert!(actor.position.x > 450.0 && actor.position.x < 600.0);
}

#[test]
fn dungeon_walker_waits_when_the_target_is_unreachable() {
    let mut harness = Harness::new(12, 5);
    moat(&mut harness, 6, 5);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(2, 2));
    let start = harness.actor(id).position;
    harness.target(Vec3::new(1050.0, 250.0, 0.0), true);

    for _ in 0..20 {
        harness.step();
    }

    let actor = harness.actor(id);
    assert_eq!(actor.state, ActorState::Chase);
    assert_eq!(actor.position, start);
}

#[test]
fn harpoon_releases_before_dragging_actor_into_a_wall() {
    let mut harness = Harness::new(10, 5);
    harness.surface(TileCoord::new(4, 2), Surface::Wall);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(1, 2));
    harness.target(Vec3::new(550.0, 250.0, 0.0), false);
    harness.command(Command::ApplyStatus {
        actor: id,
        status: Status::Harpoon(Restraint {
            restrainer: Restrainer::Player,
            pull_speed: 500.0,
            stop_distance: 120.0,
        }),
    });

    let _ = harness.step_until(id, ActorState::Stagger, 20);
    let level = query::level(&harness.world);
    let tile = level
        .world_to_tile(harness.actor(id).position)
        .expect("actor inside the level");
    assert!(level.is_walkable(tile), "embedded in {tile:?}");
    assert!(harness.actor(id).position.x < 400.0);
}

#[test]
fn fast_harpoon_stops_at_the_stop_distance() {
    let mut harness = Harness::new(12, 5);
    let id = harness.spawn(Archetype::GroundMelee, TileCoord::new(1, 2));
    let player = Vec3::new(1050.0, 250.0, 0.0);
    harness.target(player, false);
    harness.command(Command::ApplyStatus {
        actor: id,
        status: Status::Harpoon(Restraint {
            restrainer: Restrainer::Player,
            pull_speed: 5000.0,
            stop_distance: 150.0,
        }),
    });

    let _ = harness.step_until(id, ActorState::Stagger, 10);
    let gap = flat(harness.actor(id).position, player);
    assert!((gap - 150.0).abs() < 1.0, "gap {gap}");
}
