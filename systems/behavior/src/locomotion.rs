//! Turns a travel goal into movement commands for either locomotion model.

use glam::Vec3;
use grimhold_core::{Command, Locomotion, Motion, Path, TileCoord};
use grimhold_system_coordination::neighbors;
use grimhold_system_pathfinding::{smooth_path, waypoints, Pathfinder};
use grimhold_system_perception::flat_distance;
use grimhold_system_steering::{arrive, clamp_acceleration, seek, separation, stop_at_boundary};
use tracing::trace;

use crate::Ctx;

/// Heads for `goal`, planning a grid path when the actor walks.
pub(crate) fn travel(pathfinder: &mut Pathfinder, ctx: &mut Ctx<'_, '_>, goal: Vec3, speed: f32) {
    let actor = ctx.actor;
    let profile = ctx.profile;
    if profile.locomotion == Locomotion::Steering {
        drive(ctx, arrive(actor.position, goal, speed, profile.slow_radius));
        return;
    }

    let level = ctx.frame.level;
    let (Some(start), Some(goal_tile)) = (level.world_to_tile(actor.position), level.world_to_tile(goal))
    else {
        halt(ctx);
        return;
    };
    if start == goal_tile {
        drive(ctx, arrive(actor.position, goal, speed, profile.slow_radius));
        return;
    }

    let existing = actor.path.as_ref().filter(|path| !path.is_exhausted());
    let stale = existing.map_or(true, |path| path.goal() != goal_tile);
    let path = if stale && actor.timers.repath_cooldown.is_zero() {
        request_path(pathfinder, ctx, start, goal_tile)
    } else {
        existing.cloned()
    };

    match path {
        Some(path) => follow(ctx, path, speed),
        None => fallback(ctx, goal, speed),
    }
}

fn request_path(
    pathfinder: &mut Pathfinder,
    ctx: &mut Ctx<'_, '_>,
    start: TileCoord,
    goal: TileCoord,
) -> Option<Path> {
    let cooldown = ctx.frame.tuning.pathing.repath_cooldown();
    match pathfinder.find_path(ctx.frame.level, start, goal, ctx.profile.locomotion) {
        Ok(tiles) => {
            let path = plan(ctx, &tiles, goal);
            ctx.out.push(Command::AssignPath {
                actor: ctx.actor.id,
                path: path.clone(),
                cooldown,
            });
            Some(path)
        }
        Err(error) => {
            trace!(actor = ?ctx.actor.id, %error, "path request deferred");
            ctx.out.push(Command::DeferRepath {
                actor: ctx.actor.id,
                cooldown,
            });
            None
        }
    }
}

/// Smooths `tiles` into a waypoint path at the actor's resting height.
///
/// The start tile is skipped when the actor can already head straight for
/// the second waypoint, so frequent repaths do not pull it back to a centre.
pub(crate) fn plan(ctx: &Ctx<'_, '_>, tiles: &[TileCoord], goal: TileCoord) -> Path {
    let level = ctx.frame.level;
    let locomotion = ctx.profile.locomotion;
    let mut smoothed = smooth_path(level, tiles, locomotion);
    if smoothed.len() > 1
        && level.segment_passable(ctx.actor.position, level.tile_center(smoothed[1]), locomotion)
    {
        let _ = smoothed.remove(0);
    }
    let height = ctx.frame.environment.resting_height(locomotion);
    Path::new(waypoints(level, &smoothed, height), goal)
}

/// Walks along `path`, consuming waypoints inside the arrival radius.
pub(crate) fn follow(ctx: &mut Ctx<'_, '_>, mut path: Path, speed: f32) {
    let actor = ctx.actor;
    let arrival = ctx.frame.tuning.pathing.waypoint_arrival_radius;
    while let Some(waypoint) = path.current() {
        if flat_distance(actor.position, waypoint) > arrival {
            break;
        }
        path.advance();
        ctx.out.push(Command::AdvanceWaypoint { actor: actor.id });
    }

    let Some(waypoint) = path.current() else {
        halt(ctx);
        return;
    };
    // Land on the waypoint rather than stepping past it in one tick.
    let dt = ctx.frame.dt.as_secs_f32();
    let speed = if dt > 0.0 {
        speed.min(flat_distance(actor.position, waypoint) / dt)
    } else {
        speed
    };
    let last = path.cursor() + 1 == path.waypoints().len();
    let desired = if last {
        arrive(actor.position, waypoint, speed, ctx.profile.slow_radius)
    } else {
        seek(actor.position, waypoint, speed)
    };
    drive(ctx, desired);
}

/// Direct approach used when no path is available.
///
/// Walkers only step off the grid plan in the open world, where the water
/// guard keeps them on land, or when the straight line is clear.
fn fallback(ctx: &mut Ctx<'_, '_>, goal: Vec3, speed: f32) {
    let actor = ctx.actor;
    let frame = ctx.frame;
    let clear = frame.environment.guards_water()
        || frame
            .level
            .segment_passable(actor.position, goal, ctx.profile.locomotion);
    if clear {
        drive(ctx, seek(actor.position, goal, speed));
    } else {
        halt(ctx);
    }
}

/// Stops voluntary movement, decelerating flyers within their acceleration.
pub(crate) fn halt(ctx: &mut Ctx<'_, '_>) {
    drive(ctx, Vec3::ZERO);
}

/// Emits the movement for a desired velocity.
///
/// Separation from neighbours is blended in while moving, flyers respect
/// their acceleration limit and the boundary guard keeps every actor off
/// ground its locomotion cannot enter.
pub(crate) fn drive(ctx: &mut Ctx<'_, '_>, desired: Vec3) {
    let actor = ctx.actor;
    let profile = ctx.profile;
    let frame = ctx.frame;
    let locomotion = profile.locomotion;
    let dt = frame.dt.as_secs_f32();

    let mut velocity = desired;
    if desired != Vec3::ZERO {
        let spacing = &frame.tuning.coordination;
        let nearby = neighbors(
            ctx.actors,
            actor.id,
            actor.position,
            spacing.separation_radius,
        );
        velocity += separation(
            actor.position,
            nearby,
            spacing.separation_radius,
            spacing.separation_strength,
        );
    }
    if locomotion == Locomotion::Steering {
        velocity = clamp_acceleration(actor.velocity, velocity, profile.max_acceleration, dt);
    }

    let level = frame.level;
    let guarded = stop_at_boundary(actor.position, velocity, velocity.length() * dt, |point| {
        !level.is_position_passable(point, locomotion)
    });
    if guarded.blocked {
        trace!(actor = ?actor.id, "movement held at boundary");
    }
    if guarded.velocity == Vec3::ZERO && actor.velocity == Vec3::ZERO {
        return;
    }
    ctx.out.push(Command::MoveActor {
        actor: actor.id,
        velocity: guarded.velocity,
        motion: Motion::Locomotion,
    });
}
