use std::collections::BTreeSet;

use rand::{rngs::StdRng, seq::SliceRandom, Rng};

#[cfg(feature = "debug-traces")]
use tracing::{debug, trace};

use crate::{
    grid::Cell,
    layout::{
        Door, DoorId, DoorKind, DoorState, Junction, Level, Room, RoomId, Stair, StairDirection,
        StairId,
    },
};

/// Door kinds drawn for every junction, before secret doors are picked
pub const DOOR_KIND_WEIGHTS: [(DoorKind, u32); 4] = [
    (DoorKind::Wood, 55),
    (DoorKind::Iron, 25),
    (DoorKind::Stone, 15),
    (DoorKind::Magical, 5),
];

pub const DOOR_STATE_WEIGHTS: [(DoorState, u32); 3] = [
    (DoorState::Closed, 60),
    (DoorState::Open, 25),
    (DoorState::Locked, 15),
];

/// Range of the difficulty rolled for locked doors
pub const LOCK_DIFFICULTY_RANGE: std::ops::RangeInclusive<u8> = 10..=25;

/// Maximum number of stairs between two adjacent levels
pub const MAX_STAIRS_PER_LEVEL_PAIR: usize = 3;

/// Chance that a stair pair is a spiral staircase instead of a down/up pair
pub const SPIRAL_STAIR_PROBABILITY: f64 = 0.1;

fn pick_weighted<T: Copy>(table: &[(T, u32)], fallback: T, rng: &mut StdRng) -> T {
    table
        .choose_weighted(rng, |(_, weight)| *weight)
        .map_or(fallback, |(value, _)| *value)
}

/// Rolls one door for a junction.
///
/// Locked doors get a lock difficulty. Closed stone doors are stuck. Any door that is not locked becomes secret with probability `secret_door_ratio`.
pub fn roll_door(
    id: DoorId,
    junction: &Junction,
    secret_door_ratio: f32,
    rng: &mut StdRng,
) -> Door {
    let mut kind = pick_weighted(&DOOR_KIND_WEIGHTS, DoorKind::Wood, rng);
    let mut state = pick_weighted(&DOOR_STATE_WEIGHTS, DoorState::Closed, rng);
    let mut lock_difficulty = None;
    match state {
        DoorState::Locked => lock_difficulty = Some(rng.gen_range(LOCK_DIFFICULTY_RANGE)),
        DoorState::Closed if kind == DoorKind::Stone => state = DoorState::Stuck,
        _ => (),
    }
    if state != DoorState::Locked && rng.gen_bool(f64::from(secret_door_ratio.clamp(0., 1.))) {
        kind = DoorKind::Secret;
    }

    #[cfg(feature = "debug-traces")]
    trace!(
        "Door {} at {} for room {}: {:?} {:?}",
        id,
        junction.cell,
        junction.room,
        kind,
        state
    );

    Door {
        id,
        position: junction.cell,
        kind,
        state,
        lock_difficulty,
        room: junction.room,
        peer: junction.peer,
    }
}

/// Places exactly one door per junction on the level. Door ids continue after the doors already on the level.
pub fn place_doors(
    level: &mut Level,
    junctions: &[Junction],
    secret_door_ratio: f32,
    rng: &mut StdRng,
) {
    level.doors.reserve(junctions.len());
    for junction in junctions {
        let id = DoorId(level.doors.len() as u32);
        let door = roll_door(id, junction, secret_door_ratio, rng);
        level.doors.push(door);
    }
}

/// Picks up to `count` rooms spread as far as possible from each other.
///
/// Greedy farthest-point selection by centroid distance, seeded with the entry room: each pick maximizes its distance to the entry room and to the rooms already picked. Ties go to the lowest id.
pub fn dispersed_rooms(level: &Level, count: usize) -> Vec<RoomId> {
    let Some(entry) = level.entry_room().and_then(|entry| level.room(entry)) else {
        return Vec::new();
    };
    let mut anchors = vec![entry.bounds];
    let mut picked: Vec<RoomId> = Vec::with_capacity(count);
    while picked.len() < count.min(level.rooms.len()) {
        let best = level
            .rooms
            .iter()
            .filter(|room| !picked.contains(&room.id))
            .map(|room| {
                let spread = anchors
                    .iter()
                    .map(|anchor| anchor.centroid_distance(&room.bounds))
                    .fold(f64::INFINITY, f64::min);
                (room, spread)
            })
            // Only a strictly larger spread replaces the current pick, lowest id wins ties
            .fold(None, |best: Option<(&Room, f64)>, (room, spread)| match best {
                Some((_, best_spread)) if spread <= best_spread => best,
                _ => Some((room, spread)),
            });
        let Some((room, _)) = best else {
            break;
        };
        anchors.push(room.bounds);
        picked.push(room.id);
    }
    picked
}

/// Finds the room of `lower` that should receive the counterpart of a stair at `position`: the room containing the same cell, else the nearest room by centroid, rooms without stairs first.
fn counterpart_room(lower: &Level, position: &Cell) -> Option<RoomId> {
    if let Some(room) = lower.rooms.iter().find(|room| room.bounds.contains(position)) {
        return Some(room.id);
    }
    let with_stairs: BTreeSet<RoomId> = lower.stairs.iter().map(|stair| stair.room).collect();
    let (px, py) = (f64::from(position.x) + 0.5, f64::from(position.y) + 0.5);
    lower
        .rooms
        .iter()
        .map(|room| {
            let (cx, cy) = room.bounds.centroid();
            let distance = (cx - px).powi(2) + (cy - py).powi(2);
            (with_stairs.contains(&room.id), distance, room.id)
        })
        .min_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)).then(a.2.cmp(&b.2)))
        .map(|(_, _, id)| id)
}

/// Free cell of `room` closest to `target`
fn stair_cell(level: &Level, room: RoomId, target: &Cell) -> Option<Cell> {
    let room = level.room(room)?;
    let taken: BTreeSet<Cell> = level.stairs.iter().map(|stair| stair.position).collect();
    let clamped = room.bounds.clamp(target);
    if !taken.contains(&clamped) {
        return Some(clamped);
    }
    room.bounds
        .cells()
        .filter(|cell| !taken.contains(cell))
        .min_by_key(|cell| (cell.manhattan(target), *cell))
        .or(Some(clamped))
}

/// Links `upper` to the level just below it with 1 to 3 reciprocal stairs.
///
/// `next_stair_id` is shared by the whole dungeon so that stair ids are unique across levels. Returns the number of stair pairs placed.
pub fn place_stairs(
    upper: &mut Level,
    lower: &mut Level,
    next_stair_id: &mut u32,
    rng: &mut StdRng,
) -> usize {
    if upper.rooms.is_empty() || lower.rooms.is_empty() {
        return 0;
    }
    let count = rng.gen_range(1..=MAX_STAIRS_PER_LEVEL_PAIR).min(upper.rooms.len());
    let mut placed = 0;
    for room_id in dispersed_rooms(upper, count) {
        let Some(center) = upper.room(room_id).map(|room| room.bounds.center()) else {
            continue;
        };
        let Some(upper_position) = stair_cell(upper, room_id, &center) else {
            continue;
        };
        let Some(lower_room) = counterpart_room(lower, &upper_position) else {
            continue;
        };
        let Some(lower_position) = stair_cell(lower, lower_room, &upper_position) else {
            continue;
        };

        let (down, up) = match rng.gen_bool(SPIRAL_STAIR_PROBABILITY) {
            true => (StairDirection::Spiral, StairDirection::Spiral),
            false => (StairDirection::Down, StairDirection::Up),
        };
        let (upper_id, lower_id) = (StairId(*next_stair_id), StairId(*next_stair_id + 1));
        *next_stair_id += 2;

        upper.stairs.push(Stair {
            id: upper_id,
            position: upper_position,
            room: room_id,
            from_level: upper.index,
            to_level: lower.index,
            direction: down,
            counterpart: lower_id,
        });
        lower.stairs.push(Stair {
            id: lower_id,
            position: lower_position,
            room: lower_room,
            from_level: lower.index,
            to_level: upper.index,
            direction: up,
            counterpart: upper_id,
        });
        placed += 1;
    }

    #[cfg(feature = "debug-traces")]
    debug!(
        "Placed {} stair pairs between levels {} and {}",
        placed, upper.index, lower.index
    );

    placed
}
