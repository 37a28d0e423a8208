use glam::Vec3;
use grimhold_core::{Locomotion, TileCoord};
use grimhold_system_pathfinding::{smooth_path, PathError, Pathfinder, RetreatQuery};
use grimhold_world::Level;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn corridors() -> Level {
    Level::parse(
        &[
            "#########",
            "#...#...#",
            "#.#.#.#.#",
            "#.#...#.#",
            "#.#####.#",
            "#.......#",
            "#########",
        ],
        100.0,
    )
    .expect("corridors parse")
}

fn assert_contiguous(path: &[TileCoord]) {
    for pair in path.windows(2) {
        assert!(
            pair[0].is_adjacent(pair[1]),
            "{:?} and {:?} are not 4-adjacent",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn path_starts_at_start_and_ends_at_goal() {
    let level = corridors();
    let mut pathfinder = Pathfinder::default();
    let start = TileCoord::new(1, 1);
    let goal = TileCoord::new(7, 1);

    let path = pathfinder
        .find_path(&level, start, goal, Locomotion::Grid)
        .expect("goal reachable");

    assert_eq!(path.first(), Some(&start));
    assert_eq!(path.last(), Some(&goal));
    assert_contiguous(&path);
    assert!(path.iter().all(|tile| level.is_walkable(*tile)));
}

#[test]
fn path_is_shortest() {
    let level = Level::open(8, 8, 100.0);
    let mut pathfinder = Pathfinder::default();
    let start = TileCoord::new(0, 0);
    let goal = TileCoord::new(5, 3);
    let path = pathfinder
        .find_path(&level, start, goal, Locomotion::Grid)
        .expect("goal reachable");
    assert_eq!(path.len(), 9);
    assert_contiguous(&path);
}

#[test]
fn identical_start_and_goal_yield_single_tile() {
    let level = Level::open(5, 5, 100.0);
    let mut pathfinder = Pathfinder::default();
    let tile = TileCoord::new(0, 0);
    assert_eq!(
        pathfinder.find_path(&level, tile, tile, Locomotion::Grid),
        Ok(vec![tile])
    );
}

#[test]
fn walled_off_goal_is_unreachable() {
    let level = Level::parse(&[".#.", ".#.", ".#."], 100.0).expect("layout parses");
    let mut pathfinder = Pathfinder::default();
    assert_eq!(
        pathfinder.find_path(
            &level,
            TileCoord::new(0, 0),
            TileCoord::new(2, 2),
            Locomotion::Grid
        ),
        Err(PathError::Unreachable)
    );
    assert_eq!(
        pathfinder.find_path(
            &level,
            TileCoord::new(0, 0),
            TileCoord::new(9, 9),
            Locomotion::Grid
        ),
        Err(PathError::OutOfBounds {
            tile: TileCoord::new(9, 9)
        })
    );
}

#[test]
fn flyers_cross_water_that_stops_walkers() {
    let level = Level::parse(&["..~..", "..~..", "..~.."], 100.0).expect("layout parses");
    let mut pathfinder = Pathfinder::default();
    let start = TileCoord::new(0, 1);
    let goal = TileCoord::new(4, 1);
    assert_eq!(
        pathfinder.find_path(&level, start, goal, Locomotion::Grid),
        Err(PathError::Unreachable)
    );
    let flight = pathfinder
        .find_path(&level, start, goal, Locomotion::Steering)
        .expect("flyers cross water");
    assert_eq!(flight.len(), 5);
}

#[test]
fn expansion_budget_bounds_the_search() {
    let level = Level::open(50, 50, 100.0);
    let mut pathfinder = Pathfinder::new(10);
    assert_eq!(
        pathfinder.find_path(
            &level,
            TileCoord::new(0, 0),
            TileCoord::new(49, 49),
            Locomotion::Grid
        ),
        Err(PathError::Unreachable)
    );
}

#[test]
fn smoothing_keeps_endpoints_and_respects_walls() {
    let level = corridors();
    let mut pathfinder = Pathfinder::default();
    let start = TileCoord::new(1, 1);
    let goal = TileCoord::new(7, 5);
    let path = pathfinder
        .find_path(&level, start, goal, Locomotion::Grid)
        .expect("goal reachable");
    let smoothed = smooth_path(&level, &path, Locomotion::Grid);

    assert_eq!(smoothed.first(), Some(&start));
    assert_eq!(smoothed.last(), Some(&goal));
    assert!(smoothed.len() < path.len());
    for pair in smoothed.windows(2) {
        assert!(level.segment_passable(
            level.tile_center(pair[0]),
            level.tile_center(pair[1]),
            Locomotion::Grid
        ));
    }
}

#[test]
fn retreat_path_lands_inside_the_band() {
    let level = Level::open(20, 5, 100.0);
    let mut pathfinder = Pathfinder::default();
    let threat = level.tile_center(TileCoord::new(2, 2));
    let query = RetreatQuery {
        start: TileCoord::new(3, 2),
        threat,
        distance: 600.0,
        tolerance: 60.0,
        max_attempts: 3,
        max_path_len: 12,
    };

    let path = pathfinder
        .find_retreat_path(&level, &query, Locomotion::Grid)
        .expect("retreat tile found");
    let end = level.tile_center(*path.last().expect("non-empty path"));
    let distance = Vec3::new(end.x - threat.x, end.y - threat.y, 0.0).length();

    assert_eq!(path.first(), Some(&query.start));
    assert!((distance - 600.0).abs() <= 60.0);
    assert!(path.len() <= 13);
}

#[test]
fn retreat_widens_tolerance_before_failing() {
    let level = Level::open(5, 1, 100.0);
    let mut pathfinder = Pathfinder::default();
    let threat = level.tile_center(TileCoord::new(0, 0));
    let narrow = RetreatQuery {
        start: TileCoord::new(1, 0),
        threat,
        distance: 1000.0,
        tolerance: 100.0,
        max_attempts: 1,
        max_path_len: 10,
    };
    assert_eq!(
        pathfinder.find_retreat_path(&level, &narrow, Locomotion::Grid),
        Err(PathError::NoRetreat)
    );

    let widening = RetreatQuery {
        max_attempts: 7,
        ..narrow
    };
    let path = pathfinder
        .find_retreat_path(&level, &widening, Locomotion::Grid)
        .expect("widened band reaches the corridor end");
    assert_eq!(path.last(), Some(&TileCoord::new(4, 0)));
}

#[test]
fn random_reachable_tile_is_deterministic_and_reachable() {
    let level = Level::parse(
        &["......#...", "......#...", "......#...", "......#..."],
        100.0,
    )
    .expect("layout parses");
    let from = TileCoord::new(2, 1);

    let mut first_rng = ChaCha8Rng::seed_from_u64(7);
    let mut second_rng = ChaCha8Rng::seed_from_u64(7);
    let mut pathfinder = Pathfinder::default();

    let first: Vec<Option<TileCoord>> = (0..10)
        .map(|_| {
            pathfinder.random_reachable_tile(&level, from, 6, 20, Locomotion::Grid, &mut first_rng)
        })
        .collect();
    let second: Vec<Option<TileCoord>> = (0..10)
        .map(|_| {
            pathfinder.random_reachable_tile(&level, from, 6, 20, Locomotion::Grid, &mut second_rng)
        })
        .collect();

    assert_eq!(first, second);
    for tile in first.into_iter().flatten() {
        assert!(tile.column() < 6, "{tile:?} lies beyond the wall");
        assert_ne!(tile, from);
    }
}
