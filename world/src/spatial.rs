//! Occupancy grid and the spatial queries the AI runs against it.

use glam::Vec3;
use grimhold_core::{
    ActorId, ActorView, Archetype, Locomotion, SightTuning, Surface, TileCoord,
};
use thiserror::Error;

/// Errors raised while parsing a textual level layout.
#[derive(Debug, Error, PartialEq)]
pub enum LevelError {
    /// The layout contains no rows or no columns.
    #[error("level layout is empty")]
    Empty,
    /// A row has a different width than the first row.
    #[error("row {row} is {found} tiles wide, expected {expected}")]
    RaggedRow {
        /// Zero-based index of the offending row.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },
    /// A glyph does not name any surface or spawn marker.
    #[error("unknown glyph `{glyph}` at column {column}, row {row}")]
    UnknownGlyph {
        /// Offending character.
        glyph: char,
        /// Column of the glyph.
        column: usize,
        /// Row of the glyph.
        row: usize,
    },
    /// Tile size must be a positive number.
    #[error("tile size must be positive, got {0}")]
    InvalidTileSize(f32),
}

/// Marker placed in the level layout at which a single actor spawns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnMarker {
    /// Archetype spawned at the marker.
    pub archetype: Archetype,
    /// Tile the actor appears on.
    pub tile: TileCoord,
    /// Initial facing angle in radians.
    pub facing: f32,
}

/// Dense occupancy grid describing the static geometry of a level.
#[derive(Clone, Debug)]
pub struct Level {
    columns: u32,
    rows: u32,
    tile_size: f32,
    cells: Vec<Surface>,
    spawns: Vec<SpawnMarker>,
}

impl Level {
    /// Creates an open level where every tile is floor.
    #[must_use]
    pub fn open(columns: u32, rows: u32, tile_size: f32) -> Self {
        let count = usize::try_from(columns)
            .ok()
            .and_then(|columns| columns.checked_mul(usize::try_from(rows).ok()?))
            .unwrap_or(0);
        Self {
            columns,
            rows,
            tile_size: tile_size.max(f32::EPSILON),
            cells: vec![Surface::Floor; count],
            spawns: Vec::new(),
        }
    }

    /// Parses a level from rows of glyphs.
    ///
    /// `.` floor, `#` wall, `~` water, `c` cover, `D` closed door, `d` open
    /// door. Spawn markers sit on floor: `m` ground melee, `r` ground ranged,
    /// `f` flying, `B` heavy boss, `w` caster, `s` web layer.
    pub fn parse<S: AsRef<str>>(layout: &[S], tile_size: f32) -> Result<Self, LevelError> {
        if !(tile_size > 0.0) {
            return Err(LevelError::InvalidTileSize(tile_size));
        }
        let Some(first) = layout.first() else {
            return Err(LevelError::Empty);
        };
        let expected = first.as_ref().chars().count();
        if expected == 0 {
            return Err(LevelError::Empty);
        }

        let mut cells = Vec::with_capacity(expected * layout.len());
        let mut spawns = Vec::new();
        for (row, line) in layout.iter().enumerate() {
            let line = line.as_ref();
            let found = line.chars().count();
            if found != expected {
                return Err(LevelError::RaggedRow {
                    row,
                    expected,
                    found,
                });
            }
            for (column, glyph) in line.chars().enumerate() {
                let tile = TileCoord::new(
                    u32::try_from(column).unwrap_or(u32::MAX),
                    u32::try_from(row).unwrap_or(u32::MAX),
                );
                let surface = match glyph {
                    '.' => Surface::Floor,
                    '#' => Surface::Wall,
                    '~' => Surface::Water,
                    'c' => Surface::Cover,
                    'D' => Surface::Door { open: false },
                    'd' => Surface::Door { open: true },
                    other => {
                        let Some(archetype) = spawn_glyph(other) else {
                            return Err(LevelError::UnknownGlyph {
                                glyph: other,
                                column,
                                row,
                            });
                        };
                        spawns.push(SpawnMarker {
                            archetype,
                            tile,
                            facing: 0.0,
                        });
                        Surface::Floor
                    }
                };
                cells.push(surface);
            }
        }

        Ok(Self {
            columns: u32::try_from(expected).unwrap_or(u32::MAX),
            rows: u32::try_from(layout.len()).unwrap_or(u32::MAX),
            tile_size,
            cells,
            spawns,
        })
    }

    /// Appends a spawn marker to the level.
    pub fn add_spawn(&mut self, marker: SpawnMarker) {
        self.spawns.push(marker);
    }

    /// Spawn markers placed in the level.
    #[must_use]
    pub fn spawns(&self) -> &[SpawnMarker] {
        &self.spawns
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Side length of a single square tile expressed in world units.
    #[must_use]
    pub const fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Surface stored at the tile, or `None` outside the grid.
    #[must_use]
    pub fn surface(&self, tile: TileCoord) -> Option<Surface> {
        self.index(tile).and_then(|index| self.cells.get(index).copied())
    }

    /// Replaces the surface of a tile. Returns `false` outside the grid.
    pub fn set_surface(&mut self, tile: TileCoord, surface: Surface) -> bool {
        let Some(cell) = self.index(tile).and_then(|index| self.cells.get_mut(index)) else {
            return false;
        };
        *cell = surface;
        true
    }

    /// Maps a world position onto the tile containing it.
    #[must_use]
    pub fn world_to_tile(&self, position: Vec3) -> Option<TileCoord> {
        if !position.x.is_finite() || !position.y.is_finite() {
            return None;
        }
        let column = (position.x / self.tile_size).floor();
        let row = (position.y / self.tile_size).floor();
        if column < 0.0 || row < 0.0 {
            return None;
        }
        let (column, row) = (column as u32, row as u32);
        if column >= self.columns || row >= self.rows {
            return None;
        }
        Some(TileCoord::new(column, row))
    }

    /// World position of the tile centre on the ground plane.
    #[must_use]
    pub fn tile_center(&self, tile: TileCoord) -> Vec3 {
        Vec3::new(
            (tile.column() as f32 + 0.5) * self.tile_size,
            (tile.row() as f32 + 0.5) * self.tile_size,
            0.0,
        )
    }

    /// Reports whether ground actors may stand on the tile.
    #[must_use]
    pub fn is_walkable(&self, tile: TileCoord) -> bool {
        self.surface(tile).is_some_and(Surface::is_walkable)
    }

    /// Reports whether airborne actors may pass over the tile.
    #[must_use]
    pub fn is_flyable(&self, tile: TileCoord) -> bool {
        self.surface(tile).is_some_and(Surface::is_flyable)
    }

    /// Reports whether an actor using `locomotion` may occupy the tile.
    #[must_use]
    pub fn is_passable(&self, tile: TileCoord, locomotion: Locomotion) -> bool {
        match locomotion {
            Locomotion::Grid => self.is_walkable(tile),
            Locomotion::Steering => self.is_flyable(tile),
        }
    }

    /// Reports whether the world position lies on a tile passable for `locomotion`.
    #[must_use]
    pub fn is_position_passable(&self, position: Vec3, locomotion: Locomotion) -> bool {
        self.world_to_tile(position)
            .is_some_and(|tile| self.is_passable(tile, locomotion))
    }

    /// Cardinal neighbours of the tile that lie inside the grid.
    pub fn neighbors(&self, tile: TileCoord) -> impl Iterator<Item = TileCoord> {
        let mut candidates = [None; 4];
        let mut count = 0;

        if let Some(row) = tile.row().checked_sub(1) {
            candidates[count] = Some(TileCoord::new(tile.column(), row));
            count += 1;
        }
        if let Some(column) = tile.column().checked_add(1) {
            if column < self.columns {
                candidates[count] = Some(TileCoord::new(column, tile.row()));
                count += 1;
            }
        }
        if let Some(row) = tile.row().checked_add(1) {
            if row < self.rows {
                candidates[count] = Some(TileCoord::new(tile.column(), row));
                count += 1;
            }
        }
        if let Some(column) = tile.column().checked_sub(1) {
            candidates[count] = Some(TileCoord::new(column, tile.row()));
            count += 1;
        }

        candidates.into_iter().take(count).flatten()
    }

    /// Reports whether a straight segment stays on tiles passable for `locomotion`.
    ///
    /// The segment is sampled at an eighth of a tile so that corners are not cut.
    #[must_use]
    pub fn segment_passable(&self, from: Vec3, to: Vec3, locomotion: Locomotion) -> bool {
        let delta = Vec3::new(to.x - from.x, to.y - from.y, 0.0);
        let spacing = self.tile_size / 8.0;
        let steps = (delta.length() / spacing).ceil().max(1.0) as u32;
        (0..=steps).all(|step| {
            let t = step as f32 / steps as f32;
            self.is_position_passable(from + delta * t, locomotion)
        })
    }

    /// Samples a fan of parallel rays between two points.
    ///
    /// The rays are offset perpendicular to the line of sight across `spread`
    /// world units and raised by the configured eye height. Sight succeeds when
    /// at least the configured fraction of rays reaches the destination. Each
    /// ray takes at most `max_samples_per_ray` samples.
    #[must_use]
    pub fn has_line_of_sight(&self, from: Vec3, to: Vec3, spread: f32, sight: &SightTuning) -> bool {
        let rays = sight.rays.max(1);
        let flat = Vec3::new(to.x - from.x, to.y - from.y, 0.0);
        let perpendicular = Vec3::new(-flat.y, flat.x, 0.0).normalize_or_zero();
        let lift = Vec3::new(0.0, 0.0, sight.vertical_offset);
        let length = (to - from).length();
        let samples = ((length / sight.sample_spacing.max(f32::EPSILON)).ceil() as u32)
            .clamp(1, sight.max_samples_per_ray.max(1));

        let clear = (0..rays)
            .filter(|&ray| {
                let offset = if rays == 1 {
                    0.0
                } else {
                    -spread * 0.5 + spread * ray as f32 / (rays - 1) as f32
                };
                let shift = perpendicular * offset + lift;
                self.ray_is_clear(from + shift, to + shift, samples, sight.cover_height)
            })
            .count();

        clear as f32 >= sight.required_fraction * rays as f32
    }

    fn ray_is_clear(&self, from: Vec3, to: Vec3, samples: u32, cover_height: f32) -> bool {
        (0..=samples).all(|sample| {
            let point = from.lerp(to, sample as f32 / samples as f32);
            match self.world_to_tile(point).and_then(|tile| self.surface(tile)) {
                Some(surface) => !surface.blocks_sight(point.z, cover_height),
                None => false,
            }
        })
    }

    /// Lowest-identity live actor standing on `tile`, skipping `excluding`.
    #[must_use]
    pub fn tile_occupier(
        &self,
        tile: TileCoord,
        actors: &ActorView,
        excluding: Option<ActorId>,
    ) -> Option<ActorId> {
        actors
            .iter()
            .filter(|actor| Some(actor.id) != excluding)
            .filter(|actor| !actor.state.is_terminal())
            .find(|actor| self.world_to_tile(actor.position) == Some(tile))
            .map(|actor| actor.id)
    }

    fn index(&self, tile: TileCoord) -> Option<usize> {
        if tile.column() >= self.columns || tile.row() >= self.rows {
            return None;
        }
        let width = usize::try_from(self.columns).ok()?;
        let column = usize::try_from(tile.column()).ok()?;
        let row = usize::try_from(tile.row()).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }
}

fn spawn_glyph(glyph: char) -> Option<Archetype> {
    match glyph {
        'm' => Some(Archetype::GroundMelee),
        'r' => Some(Archetype::GroundRanged),
        'f' => Some(Archetype::Flying),
        'B' => Some(Archetype::HeavyBoss),
        'w' => Some(Archetype::Caster),
        's' => Some(Archetype::WebLayer),
        _ => None,
    }
}
