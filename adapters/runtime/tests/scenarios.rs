use std::time::Duration;

use glam::Vec3;
use grimhold_core::{
    ActorId, ActorState, Command, DamageSource, EnvironmentContext, Event, TransitionCause, Tuning,
};
use grimhold_runtime::Simulation;
use grimhold_world::{query, Level};

const DT: Duration = Duration::from_millis(100);

struct Harness {
    simulation: Simulation,
    log: Vec<Event>,
}

impl Harness {
    fn new(layout: &[&str], tuning: Tuning) -> Self {
        let level = Level::parse(layout, 100.0).expect("layout parses");
        let mut log = Vec::new();
        let simulation = Simulation::new(level, EnvironmentContext::dungeon(), tuning, &mut log);
        Self { simulation, log }
    }

    fn apply(&mut self, command: Command) {
        self.simulation.apply(command, &mut self.log);
    }

    fn step(&mut self) {
        self.simulation.step(DT, &mut self.log);
    }

    fn state(&self, id: ActorId) -> Option<ActorState> {
        query::actor(self.simulation.world(), id).map(|actor| actor.state)
    }

    fn spawned(&self) -> Vec<ActorId> {
        self.log
            .iter()
            .filter_map(|event| match event {
                Event::ActorSpawned { actor, .. } => Some(*actor),
                _ => None,
            })
            .collect()
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

#[test]
fn idle_brawler_spots_nearby_target_and_gives_chase() {
    let tuning = Tuning::default();
    assert_eq!(tuning.ground_melee.detection_radius, 3000.0);
    let mut harness = Harness::new(
        &[
            "..........",
            "..........",
            "..........",
            "..........",
            "..........",
            ".....m....",
            "..........",
            "..........",
        ],
        tuning.clone(),
    );
    let brawler = harness.spawned()[0];
    harness.apply(Command::SetTarget {
        position: Vec3::new(700.0, 550.0, 0.0),
        perceivable: true,
    });

    let mut elapsed = Duration::ZERO;
    while harness.state(brawler) == Some(ActorState::Idle) {
        assert!(elapsed < Duration::from_secs(2), "brawler never reacted");
        harness.step();
        elapsed += DT;
    }

    assert!(elapsed >= tuning.ground_melee.reaction_delay());
    assert_eq!(
        harness.entered(brawler, ActorState::Chase),
        Some(TransitionCause::Detection)
    );
}

#[test]
fn killed_actor_stays_dead_until_removed() {
    let mut harness = Harness::new(&["......", "..m...", "......"], Tuning::default());
    let brawler = harness.spawned()[0];
    harness.apply(Command::SetTarget {
        position: Vec3::new(450.0, 150.0, 0.0),
        perceivable: true,
    });
    for _ in 0..5 {
        harness.step();
    }
    assert_ne!(harness.state(brawler), Some(ActorState::Death));

    harness.apply(Command::DamageActor {
        actor: brawler,
        amount: 1000.0,
        source: DamageSource::Environment,
    });
    harness.step();
    assert_eq!(harness.state(brawler), Some(ActorState::Death));

    let mut removed = false;
    for _ in 0..60 {
        harness.apply(Command::DamageActor {
            actor: brawler,
            amount: 10.0,
            source: DamageSource::Environment,
        });
        harness.step();
        match harness.state(brawler) {
            Some(state) => assert_eq!(state, ActorState::Death),
            None => {
                removed = true;
                break;
            }
        }
    }
    assert!(removed, "corpse never removed");
    let deaths = harness
        .log
        .iter()
        .filter(|event| **event == Event::ActorDied { actor: brawler })
        .count();
    assert_eq!(deaths, 1);
}

#[test]
fn spotter_alerts_an_ally_behind_a_wall() {
    let mut harness = Harness::new(
        &[
            ".....#....",
            ".....#....",
            "..m..#.m..",
            ".....#....",
            ".....#....",
        ],
        Tuning::default(),
    );
    let spawned = harness.spawned();
    let (spotter, ally) = (spawned[0], spawned[1]);
    let player = Vec3::new(50.0, 250.0, 0.0);
    harness.apply(Command::SetTarget {
        position: player,
        perceivable: true,
    });

    for _ in 0..10 {
        harness.step();
    }

    assert_eq!(
        harness.entered(spotter, ActorState::Chase),
        Some(TransitionCause::Detection)
    );
    assert_eq!(
        harness.entered(ally, ActorState::Chase),
        Some(TransitionCause::Alerted)
    );
    let memory = query::actor(harness.simulation.world(), ally)
        .expect("ally exists")
        .perception;
    assert_eq!(memory.last_known, Some(player));
}
