#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Breadth-first grid pathfinder used by grid-walking actors.
//!
//! Every search is four-connected and bounded by a maximum number of tile
//! expansions. Failures are reported as [`PathError`] values; callers always
//! have a fallback (stay put, steer directly, or retry after a cooldown).

use std::collections::VecDeque;

use glam::Vec3;
use grimhold_core::{Locomotion, TileCoord};
use grimhold_world::Level;
use rand::Rng;
use thiserror::Error;
use tracing::trace;

const UNVISITED: u32 = u32::MAX;
const NO_PARENT: usize = usize::MAX;

/// Reasons a path search can fail.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// One of the endpoints lies outside the grid.
    #[error("tile {tile:?} lies outside the grid")]
    OutOfBounds {
        /// Offending tile.
        tile: TileCoord,
    },
    /// No path exists within the expansion budget.
    #[error("goal is unreachable")]
    Unreachable,
    /// No tile within the widened retreat band is reachable.
    #[error("no retreat tile found")]
    NoRetreat,
}

/// Parameters of a retreat search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetreatQuery {
    /// Tile the actor stands on.
    pub start: TileCoord,
    /// Position of the threat to retreat from.
    pub threat: Vec3,
    /// Desired distance from the threat.
    pub distance: f32,
    /// Accepted deviation from the desired distance on the first attempt.
    pub tolerance: f32,
    /// Attempts made, each widening the tolerance by its initial value.
    pub max_attempts: u32,
    /// Longest acceptable path in tiles.
    pub max_path_len: u32,
}

/// Breadth-first searcher that keeps its scratch buffers between searches.
#[derive(Clone, Debug)]
pub struct Pathfinder {
    max_expansions: u32,
    width: u32,
    depths: Vec<u32>,
    parents: Vec<usize>,
    queue: VecDeque<TileCoord>,
}

impl Pathfinder {
    /// Creates a pathfinder that expands at most `max_expansions` tiles per search.
    #[must_use]
    pub fn new(max_expansions: u32) -> Self {
        Self {
            max_expansions: max_expansions.max(1),
            width: 0,
            depths: Vec::new(),
            parents: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    /// Finds a shortest four-connected tile path from `start` to `goal`.
    ///
    /// The returned sequence starts with `start` and ends with `goal`. When the
    /// two coincide the path holds the single tile.
    pub fn find_path(
        &mut self,
        level: &Level,
        start: TileCoord,
        goal: TileCoord,
        locomotion: Locomotion,
    ) -> Result<Vec<TileCoord>, PathError> {
        for tile in [start, goal] {
            if level.surface(tile).is_none() {
                return Err(PathError::OutOfBounds { tile });
            }
        }
        if start == goal {
            return Ok(vec![start]);
        }
        if !level.is_passable(goal, locomotion) {
            trace!(?start, ?goal, "path goal is blocked");
            return Err(PathError::Unreachable);
        }
        if !self.explore(level, start, locomotion, UNVISITED, Some(goal)) {
            trace!(?start, ?goal, "path search failed");
            return Err(PathError::Unreachable);
        }
        Ok(self.reconstruct(goal))
    }

    /// Finds a path to a reachable tile at roughly `query.distance` from the threat.
    ///
    /// The first attempt accepts tiles within `query.tolerance` of the desired
    /// distance; each further attempt widens the band by the same amount.
    /// Among acceptable tiles the one closest to the desired distance wins,
    /// then the shorter path, then the lower tile coordinate.
    pub fn find_retreat_path(
        &mut self,
        level: &Level,
        query: &RetreatQuery,
        locomotion: Locomotion,
    ) -> Result<Vec<TileCoord>, PathError> {
        if level.surface(query.start).is_none() {
            return Err(PathError::OutOfBounds { tile: query.start });
        }
        let _ = self.explore(level, query.start, locomotion, query.max_path_len, None);

        for attempt in 1..=query.max_attempts.max(1) {
            let tolerance = query.tolerance * attempt as f32;
            let best = self
                .depths
                .iter()
                .enumerate()
                .filter(|(_, depth)| **depth != UNVISITED && **depth > 0)
                .filter_map(|(index, depth)| {
                    let tile = self.tile_at(index);
                    let center = level.tile_center(tile);
                    let offset = Vec3::new(center.x - query.threat.x, center.y - query.threat.y, 0.0);
                    let miss = (offset.length() - query.distance).abs();
                    (miss <= tolerance).then_some((miss, *depth, tile))
                })
                .min_by(|a, b| {
                    a.0.total_cmp(&b.0)
                        .then(a.1.cmp(&b.1))
                        .then(a.2.cmp(&b.2))
                });
            if let Some((_, _, tile)) = best {
                return Ok(self.reconstruct(tile));
            }
            trace!(attempt, tolerance, "retreat band empty, widening");
        }
        Err(PathError::NoRetreat)
    }

    /// Rejection-samples a reachable passable tile within `radius` tiles of `from`.
    pub fn random_reachable_tile<R: Rng>(
        &mut self,
        level: &Level,
        from: TileCoord,
        radius: u32,
        max_attempts: u32,
        locomotion: Locomotion,
        rng: &mut R,
    ) -> Option<TileCoord> {
        if level.surface(from).is_none() {
            return None;
        }
        let max_column = level.columns() - 1;
        let max_row = level.rows() - 1;
        for _ in 0..max_attempts {
            let column = rng.gen_range(
                from.column().saturating_sub(radius)..=from.column().saturating_add(radius).min(max_column),
            );
            let row = rng.gen_range(
                from.row().saturating_sub(radius)..=from.row().saturating_add(radius).min(max_row),
            );
            let candidate = TileCoord::new(column, row);
            if candidate == from || !level.is_passable(candidate, locomotion) {
                continue;
            }
            if self.find_path(level, from, candidate, locomotion).is_ok() {
                return Some(candidate);
            }
        }
        None
    }

    fn explore(
        &mut self,
        level: &Level,
        start: TileCoord,
        locomotion: Locomotion,
        max_depth: u32,
        goal: Option<TileCoord>,
    ) -> bool {
        let width_usize = usize::try_from(level.columns()).unwrap_or(0);
        let height_usize = usize::try_from(level.rows()).unwrap_or(0);
        let cell_count = width_usize.checked_mul(height_usize).unwrap_or(0);

        self.width = level.columns();
        self.depths.clear();
        self.depths.resize(cell_count, UNVISITED);
        self.parents.clear();
        self.parents.resize(cell_count, NO_PARENT);
        self.queue.clear();

        let Some(start_index) = index(width_usize, start) else {
            return false;
        };
        let Some(depth) = self.depths.get_mut(start_index) else {
            return false;
        };
        *depth = 0;
        self.queue.push_back(start);

        let mut expansions = 0;
        while let Some(tile) = self.queue.pop_front() {
            if Some(tile) == goal {
                return true;
            }
            expansions += 1;
            if expansions > self.max_expansions {
                trace!(expansions, "search budget exhausted");
                return false;
            }

            let Some(current_index) = index(width_usize, tile) else {
                continue;
            };
            let current_depth = self.depths[current_index];
            if current_depth >= max_depth {
                continue;
            }

            for neighbor in level.neighbors(tile) {
                if !level.is_passable(neighbor, locomotion) {
                    continue;
                }
                let Some(neighbor_index) = index(width_usize, neighbor) else {
                    continue;
                };
                if self.depths[neighbor_index] != UNVISITED {
                    continue;
                }
                self.depths[neighbor_index] = current_depth + 1;
                self.parents[neighbor_index] = current_index;
                self.queue.push_back(neighbor);
            }
        }
        false
    }

    fn reconstruct(&self, goal: TileCoord) -> Vec<TileCoord> {
        let width = usize::try_from(self.width).unwrap_or(0);
        let mut tiles = vec![goal];
        let mut cursor = index(width, goal).unwrap_or(NO_PARENT);
        while let Some(&parent) = self.parents.get(cursor) {
            if parent == NO_PARENT {
                break;
            }
            tiles.push(self.tile_at(parent));
            cursor = parent;
        }
        tiles.reverse();
        tiles
    }

    fn tile_at(&self, index: usize) -> TileCoord {
        let width = usize::try_from(self.width).unwrap_or(1).max(1);
        TileCoord::new(
            u32::try_from(index % width).unwrap_or(u32::MAX),
            u32::try_from(index / width).unwrap_or(u32::MAX),
        )
    }
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new(4096)
    }
}

/// Drops waypoints that are not needed to keep straight-line passability.
///
/// The first and last tiles are always kept.
#[must_use]
pub fn smooth_path(level: &Level, tiles: &[TileCoord], locomotion: Locomotion) -> Vec<TileCoord> {
    let Some(&first) = tiles.first() else {
        return Vec::new();
    };
    let mut smoothed = vec![first];
    let mut anchor = 0;
    while anchor + 1 < tiles.len() {
        let from = level.tile_center(tiles[anchor]);
        let mut next = anchor + 1;
        for candidate in (anchor + 2..tiles.len()).rev() {
            if level.segment_passable(from, level.tile_center(tiles[candidate]), locomotion) {
                next = candidate;
                break;
            }
        }
        smoothed.push(tiles[next]);
        anchor = next;
    }
    smoothed
}

/// Converts tiles into world-space waypoints at the provided height.
#[must_use]
pub fn waypoints(level: &Level, tiles: &[TileCoord], height: f32) -> Vec<Vec3> {
    tiles
        .iter()
        .map(|tile| {
            let mut center = level.tile_center(*tile);
            center.z = height;
            center
        })
        .collect()
}

fn index(width: usize, tile: TileCoord) -> Option<usize> {
    let column = usize::try_from(tile.column()).ok()?;
    let row = usize::try_from(tile.row()).ok()?;
    if column >= width {
        return None;
    }
    row.checked_mul(width)?.checked_add(column)
}
