#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless runtime that drives the enemy simulation one tick at a time.
//!
//! Every step advances the world clock, lets the behaviour, combat and
//! coordination systems read the same frame, applies their commands in that
//! order and finally closes the tick. Hosts feed player-side input through
//! [`Simulation::apply`] between steps.

mod config;
mod logging;

use std::time::Duration;

use grimhold_core::{Command, EnvironmentContext, Event, Tuning};
use grimhold_system_behavior::Behavior;
use grimhold_system_bootstrap::Bootstrap;
use grimhold_system_combat::Combat;
use grimhold_system_coordination::Coordination;
use grimhold_world::{self as world, query, Level, World};
use tracing::{debug, trace};

pub use config::load_tuning;
pub use logging::init_logging;

/// Owns the world and the systems that act on it.
#[derive(Debug)]
pub struct Simulation {
    world: World,
    behavior: Behavior,
    combat: Combat,
    coordination: Coordination,
    previous: Vec<Event>,
}

impl Simulation {
    /// Builds a simulation and spawns one actor per level marker.
    ///
    /// Spawn events are appended to `out_events`.
    pub fn new(
        level: Level,
        environment: EnvironmentContext,
        tuning: Tuning,
        out_events: &mut Vec<Event>,
    ) -> Self {
        let behavior = Behavior::new(&tuning);
        let mut world = World::new(level, environment, tuning);

        let mut commands = Vec::new();
        Bootstrap.populate(&world, &mut commands);
        for command in commands {
            world::apply(&mut world, command, out_events);
        }
        debug!(actors = query::actor_count(&world), "simulation ready");

        Self {
            world,
            behavior,
            combat: Combat,
            coordination: Coordination,
            previous: Vec::new(),
        }
    }

    /// Read-only access to the simulated world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Applies a host command such as a target update, door toggle or
    /// player attack outside the tick pipeline.
    pub fn apply(&mut self, command: Command, out_events: &mut Vec<Event>) {
        world::apply(&mut self.world, command, out_events);
    }

    /// Advances the simulation by `dt` and appends the tick's events.
    pub fn step(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::Tick { dt }, &mut events);

        let commands = {
            let frame = query::frame(&self.world);
            let actors = query::actor_view(&self.world);
            let mut commands = Vec::new();
            self.behavior
                .handle(&events, &frame, &actors, &mut commands);
            self.combat.handle(&events, &frame, &actors, &mut commands);
            self.coordination
                .handle(&self.previous, &frame, &actors, &mut commands);
            commands
        };
        trace!(
            tick = query::tick_index(&self.world),
            commands = commands.len(),
            "tick commands collected"
        );

        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }
        world::apply(&mut self.world, Command::EndTick, &mut events);

        self.previous.clone_from(&events);
        out_events.extend(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grimhold_core::ActorState;

    #[test]
    fn new_simulation_spawns_every_marker() {
        let level = Level::parse(&["m..", "...", "..r"], 100.0).expect("layout parses");
        let mut events = Vec::new();
        let simulation = Simulation::new(
            level,
            EnvironmentContext::dungeon(),
            Tuning::default(),
            &mut events,
        );

        assert_eq!(query::actor_count(simulation.world()), 2);
        let spawned = events
            .iter()
            .filter(|event| matches!(event, Event::ActorSpawned { .. }))
            .count();
        assert_eq!(spawned, 2);
    }

    #[test]
    fn step_advances_the_clock_and_keeps_idle_actors_idle() {
        let level = Level::parse(&["m...", "....", "...."], 100.0).expect("layout parses");
        let mut events = Vec::new();
        let mut simulation = Simulation::new(
            level,
            EnvironmentContext::dungeon(),
            Tuning::default(),
            &mut events,
        );
        simulation.apply(
            Command::SetTarget {
                position: glam::Vec3::new(5000.0, 5000.0, 0.0),
                perceivable: false,
            },
            &mut events,
        );

        events.clear();
        simulation.step(Duration::from_millis(100), &mut events);

        assert_eq!(query::tick_index(simulation.world()), 1);
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::TimeAdvanced { .. })));
        let actors = query::actor_view(simulation.world());
        assert!(actors
            .iter()
            .all(|actor| actor.state == ActorState::Idle));
    }
}
