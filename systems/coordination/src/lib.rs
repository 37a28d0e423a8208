#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Group coordination between actors.
//!
//! Detection spreads to idle and patrolling allies nearby through alerts.
//! The module also answers the neighbour and tile-occupancy questions used
//! for separation and repositioning. Alerts are only raised by actors that
//! detected the target themselves, so an alert never cascades.

use std::collections::BTreeSet;

use glam::Vec3;
use grimhold_core::{
    ActorId, ActorState, ActorView, Command, Event, Locomotion, TileCoord, TransitionCause,
};
use grimhold_world::{query::Frame, Level};
use tracing::debug;

/// Pure system that turns detections into alerts for nearby allies.
#[derive(Debug, Default)]
pub struct Coordination;

impl Coordination {
    /// Consumes the events of the previous step and emits alert commands.
    pub fn handle(
        &self,
        events: &[Event],
        frame: &Frame<'_>,
        actors: &ActorView,
        out: &mut Vec<Command>,
    ) {
        let radius = frame.tuning.coordination.alert_radius;
        let mut alerted = BTreeSet::new();

        for event in events {
            let Event::ActorStateChanged {
                actor,
                to: ActorState::Chase,
                cause: TransitionCause::Detection,
                ..
            } = event
            else {
                continue;
            };
            let Some(spotter) = actors.get(*actor) else {
                continue;
            };
            let last_known = spotter
                .perception
                .last_known
                .unwrap_or(frame.target.position);

            for ally in actors.iter() {
                if ally.id == spotter.id
                    || !matches!(ally.state, ActorState::Idle | ActorState::Patrol)
                    || flat_distance(ally.position, spotter.position) > radius
                {
                    continue;
                }
                if alerted.insert(ally.id) {
                    debug!(spotter = ?spotter.id, ally = ?ally.id, "alert raised");
                    out.push(Command::Alert {
                        actor: ally.id,
                        last_known,
                    });
                }
            }
        }
    }
}

/// Positions of living actors other than `id` within `radius` of `position`.
#[must_use]
pub fn neighbors(actors: &ActorView, id: ActorId, position: Vec3, radius: f32) -> Vec<Vec3> {
    actors
        .iter()
        .filter(|other| other.id != id && !other.state.is_terminal())
        .map(|other| other.position)
        .filter(|other| flat_distance(*other, position) < radius)
        .collect()
}

/// Passable tiles within `radius` tiles of `center` that no other living actor occupies.
///
/// The centre tile itself is never offered. Tiles come back in row-major order.
#[must_use]
pub fn free_tiles_near(
    level: &Level,
    actors: &ActorView,
    center: TileCoord,
    radius: u32,
    excluding: ActorId,
    locomotion: Locomotion,
) -> Vec<TileCoord> {
    let max_column = level.columns().saturating_sub(1);
    let max_row = level.rows().saturating_sub(1);
    let columns = center.column().saturating_sub(radius)
        ..=center.column().saturating_add(radius).min(max_column);
    let rows =
        center.row().saturating_sub(radius)..=center.row().saturating_add(radius).min(max_row);

    let mut free = Vec::new();
    for row in rows {
        for column in columns.clone() {
            let tile = TileCoord::new(column, row);
            if tile == center || !level.is_passable(tile, locomotion) {
                continue;
            }
            if level.tile_occupier(tile, actors, Some(excluding)).is_none() {
                free.push(tile);
            }
        }
    }
    free
}

fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x - b.x, a.y - b.y, 0.0).length()
}
