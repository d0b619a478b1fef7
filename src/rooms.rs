use rand::{rngs::StdRng, Rng};

use crate::{
    grid::Rect,
    layout::{Level, Room, RoomId, RoomKind},
    partition::MARGIN,
    LevelFailure,
};

/// Largest shrink applied on one side of a leaf
const MAX_SHRINK: u32 = 2;

/// Carves one room inside each leaf, in leaf order. Room ids follow the leaf order, so the first room is the entry room.
///
/// Rooms never overlap since leaves are disjoint and each room stays inside its shrunk leaf.
pub fn synthesize_rooms(
    leaves: &[Rect],
    min_room_size: u32,
    max_room_size: u32,
    rng: &mut StdRng,
) -> Result<Vec<Room>, LevelFailure> {
    let mut rooms = Vec::with_capacity(leaves.len());
    for (index, leaf) in leaves.iter().enumerate() {
        let bounds = carve_room(leaf, min_room_size, max_room_size, rng)
            .ok_or(LevelFailure::RoomSynthesis { leaf: *leaf })?;
        rooms.push(Room::new(RoomId(index as u32), bounds));
    }
    if let Some(entry) = rooms.first_mut() {
        entry.kind = RoomKind::Entry;
    }
    Ok(rooms)
}

/// Returns `None` if the leaf cannot host a room of `min_room_size` once shrunk by [`MARGIN`] on each side
fn carve_room(
    leaf: &Rect,
    min_room_size: u32,
    max_room_size: u32,
    rng: &mut StdRng,
) -> Option<Rect> {
    let (x, width) = carve_span(leaf.width, min_room_size, max_room_size, rng)?;
    let (y, height) = carve_span(leaf.height, min_room_size, max_room_size, rng)?;
    Some(Rect::new(leaf.x + x as i32, leaf.y + y as i32, width, height))
}

/// Picks `(offset, size)` of a room span on one axis of a leaf side
fn carve_span(
    side: u32,
    min_room_size: u32,
    max_room_size: u32,
    rng: &mut StdRng,
) -> Option<(u32, u32)> {
    if side < min_room_size + 2 * MARGIN {
        return None;
    }
    let mut before = MARGIN;
    if side >= min_room_size + MAX_SHRINK + MARGIN && rng.gen_bool(0.5) {
        before = MAX_SHRINK;
    }
    let mut after = MARGIN;
    if side >= min_room_size + before + MAX_SHRINK && rng.gen_bool(0.5) {
        after = MAX_SHRINK;
    }
    let available = side - before - after;
    let size = rng.gen_range(min_room_size..=max_room_size.min(available));
    let offset = before + rng.gen_range(0..=available - size);
    Some((offset, size))
}

/// Tags rooms once the level is connected: entry (first room), exit (farthest room from the entry on the last level), special (largest remaining room when the level has at least 4 rooms), chambers otherwise.
///
/// Returns the exit room, if any.
pub fn assign_room_kinds(level: &mut Level, is_last_level: bool) -> Option<RoomId> {
    let entry = level.entry_room()?;
    for room in &mut level.rooms {
        room.kind = RoomKind::Chamber;
    }

    let mut exit = None;
    if is_last_level && level.rooms.len() >= 2 {
        let distances = level.hop_distances(entry);
        let mut best: Option<(u32, usize)> = None;
        for (index, distance) in distances.iter().enumerate().skip(1) {
            if let Some(distance) = distance {
                if best.map_or(true, |(best_distance, _)| *distance > best_distance) {
                    best = Some((*distance, index));
                }
            }
        }
        exit = best.map(|(_, index)| RoomId(index as u32));
    }

    if level.rooms.len() >= 4 {
        let special = level
            .rooms
            .iter()
            .filter(|room| room.id != entry && Some(room.id) != exit)
            .max_by(|a, b| a.bounds.area().cmp(&b.bounds.area()).then(b.id.cmp(&a.id)))
            .map(|room| room.id);
        if let Some(special) = special {
            level.rooms[special.0 as usize].kind = RoomKind::Special;
        }
    }
    if let Some(exit) = exit {
        level.rooms[exit.0 as usize].kind = RoomKind::Exit;
    }
    level.rooms[entry.0 as usize].kind = RoomKind::Entry;
    exit
}
