#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure bootstrap system that populates a freshly loaded level.

use grimhold_core::Command;
use grimhold_world::{query, World};
use tracing::debug;

/// Emits one spawn command per spawn marker placed in the level.
#[derive(Debug, Default)]
pub struct Bootstrap;

impl Bootstrap {
    /// Queues the spawn commands for every marker in level order.
    pub fn populate(&self, world: &World, out: &mut Vec<Command>) {
        let level = query::level(world);
        let environment = query::environment(world);
        for marker in level.spawns() {
            let mut position = level.tile_center(marker.tile);
            position.z = environment.ground_height;
            out.push(Command::SpawnActor {
                archetype: marker.archetype,
                position,
                facing: marker.facing,
                parent: None,
            });
        }
        debug!(spawns = level.spawns().len(), "level population queued");
    }
}
