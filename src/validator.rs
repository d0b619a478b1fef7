use std::collections::BTreeSet;

use rand::rngs::StdRng;

use crate::{
    grid::{Cell, GridDefinition},
    layout::{Corridor, CorridorId, Junction, JunctionPeer, Level, RoomId, StairDirection},
    placement::place_doors,
    router::{
        corridor_junctions, orthogonal_path, push_unique_junctions, split_at_rooms, RoomOccupancy,
    },
    ConnectivityFailure, StairReciprocityFailure,
};

/// Summary of the repairs made on a level
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgeReport {
    /// Rooms that were not reachable from the entry before the repairs
    pub bridged_rooms: Vec<RoomId>,
    pub added_corridors: usize,
    pub added_doors: usize,
}

/// Makes every room of the level reachable from its entry room.
///
/// Each unreached room (ascending ids) is bridged to the nearest reached room by an L-shaped path that ignores the usual avoidance rules. The path is cut at room boundaries so corridor cells never lie inside a room, and each new junction gets a door.
pub fn ensure_connectivity(
    level: &mut Level,
    secret_door_ratio: f32,
    rng: &mut StdRng,
) -> Result<BridgeReport, ConnectivityFailure> {
    if level.rooms.is_empty() {
        return Err(ConnectivityFailure {
            level: level.index,
            unreached: Vec::new(),
        });
    }
    let occupancy =
        RoomOccupancy::new(GridDefinition::new(level.width, level.height), &level.rooms);
    let mut known_junctions: BTreeSet<(Cell, RoomId)> =
        level.doors.iter().map(|door| (door.position, door.room)).collect();
    let mut report = BridgeReport::default();

    loop {
        let reached = level.reachable_rooms();
        let Some(unreached) = level
            .rooms
            .iter()
            .map(|room| room.id)
            .find(|id| !reached.contains(id))
        else {
            break;
        };
        let Some(target) = nearest_reached_room(level, unreached, &reached) else {
            return Err(unreached_failure(level, &reached));
        };

        let doors_before = level.doors.len();
        let corridors_before = level.corridors.len();
        for horizontal_first in [true, false] {
            bridge(
                level,
                &occupancy,
                unreached,
                target,
                horizontal_first,
                &mut known_junctions,
                secret_door_ratio,
                rng,
            );
            if level.reachable_rooms().contains(&unreached) {
                break;
            }
        }
        if !level.reachable_rooms().contains(&unreached) {
            return Err(unreached_failure(level, &level.reachable_rooms()));
        }

        tracing::info!(
            "Level {}: bridged room {} to room {}",
            level.index,
            unreached,
            target
        );
        report.bridged_rooms.push(unreached);
        report.added_corridors += level.corridors.len() - corridors_before;
        report.added_doors += level.doors.len() - doors_before;
    }
    Ok(report)
}

fn unreached_failure(level: &Level, reached: &BTreeSet<RoomId>) -> ConnectivityFailure {
    let failure = ConnectivityFailure {
        level: level.index,
        unreached: level
            .rooms
            .iter()
            .map(|room| room.id)
            .filter(|id| !reached.contains(id))
            .collect(),
    };
    tracing::warn!("{}", failure);
    failure
}

/// Nearest reached room by centroid distance, lowest id on ties
fn nearest_reached_room(level: &Level, from: RoomId, reached: &BTreeSet<RoomId>) -> Option<RoomId> {
    let from = level.room(from)?;
    reached
        .iter()
        .filter_map(|id| level.room(*id))
        .map(|room| (from.bounds.centroid_distance(&room.bounds), room.id))
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, id)| id)
}

/// Lays a forced path from `from` to `to`, as corridors between every pair of consecutive rooms it crosses
#[allow(clippy::too_many_arguments)]
fn bridge(
    level: &mut Level,
    occupancy: &RoomOccupancy,
    from: RoomId,
    to: RoomId,
    horizontal_first: bool,
    known_junctions: &mut BTreeSet<(Cell, RoomId)>,
    secret_door_ratio: f32,
    rng: &mut StdRng,
) {
    let (Some(start), Some(end)) = (
        level.room(from).map(|room| room.bounds.center()),
        level.room(to).map(|room| room.bounds.center()),
    ) else {
        return;
    };
    let corner = match horizontal_first {
        true => Cell::new(end.x, start.y),
        false => Cell::new(start.x, end.y),
    };
    let path = orthogonal_path(&[start, corner, end]);

    let mut junctions = Vec::new();
    for segment in split_at_rooms(&path, occupancy) {
        let new_junctions = match segment.cells.is_empty() {
            // Rooms touching each other
            true => vec![Junction {
                cell: segment.from_edge,
                room: segment.from,
                peer: JunctionPeer::Room(segment.to),
            }],
            false => {
                let corridor = Corridor {
                    id: CorridorId(level.corridors.len() as u32),
                    from: segment.from,
                    to: segment.to,
                    cells: segment.cells,
                };
                let new_junctions = corridor_junctions(&corridor);
                level.corridors.push(corridor);
                new_junctions
            }
        };
        push_unique_junctions(&mut junctions, known_junctions, new_junctions);
    }
    place_doors(level, &junctions, secret_door_ratio, rng);
}

fn stairs_match(upper: StairDirection, lower: StairDirection) -> bool {
    matches!(
        (upper, lower),
        (StairDirection::Down, StairDirection::Up)
            | (StairDirection::Spiral, StairDirection::Spiral)
    )
}

/// Checks the stairs between two adjacent levels, `upper` being directly above `lower`.
///
/// Every stair of one level that leads to the other must have a reciprocal counterpart standing inside a room, and there must be at least one such pair.
pub fn check_level_pair(upper: &Level, lower: &Level) -> Result<(), StairReciprocityFailure> {
    let failure = StairReciprocityFailure {
        upper: upper.index,
        lower: lower.index,
    };
    let down_stairs: Vec<_> = upper
        .stairs
        .iter()
        .filter(|stair| stair.to_level == lower.index)
        .collect();
    if down_stairs.is_empty() {
        return Err(failure);
    }
    for stair in &down_stairs {
        let Some(counterpart) = lower
            .stairs
            .iter()
            .find(|other| other.id == stair.counterpart)
        else {
            return Err(failure);
        };
        let linked = counterpart.counterpart == stair.id
            && counterpart.to_level == upper.index
            && stairs_match(stair.direction, counterpart.direction)
            && upper
                .room(stair.room)
                .is_some_and(|room| room.bounds.contains(&stair.position))
            && lower
                .room(counterpart.room)
                .is_some_and(|room| room.bounds.contains(&counterpart.position));
        if !linked {
            return Err(failure);
        }
    }
    let up_stairs = lower
        .stairs
        .iter()
        .filter(|stair| stair.to_level == upper.index)
        .count();
    match up_stairs == down_stairs.len() {
        true => Ok(()),
        false => Err(failure),
    }
}

/// Checks every pair of adjacent levels, top to bottom. Levels must be ordered from the entry level downwards.
pub fn check_stair_reciprocity(levels: &[Level]) -> Result<(), StairReciprocityFailure> {
    for pair in levels.windows(2) {
        check_level_pair(&pair[0], &pair[1])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::{
        grid::Rect,
        layout::{Room, Stair, StairId},
    };

    fn level_with_rooms(bounds: &[Rect]) -> Level {
        let mut level = Level::new(0, 40, 20);
        for (id, rect) in bounds.iter().enumerate() {
            level.rooms.push(Room::new(RoomId(id as u32), *rect));
        }
        level
    }

    #[test]
    fn connected_level_is_left_untouched() {
        let mut level = level_with_rooms(&[Rect::new(1, 1, 3, 3), Rect::new(10, 1, 3, 3)]);
        level.corridors.push(Corridor {
            id: CorridorId(0),
            from: RoomId(0),
            to: RoomId(1),
            cells: (4..10).map(|x| Cell::new(x, 2)).collect(),
        });
        let before = level.clone();
        let mut rng = StdRng::seed_from_u64(0);
        let report = ensure_connectivity(&mut level, 0.1, &mut rng).unwrap();
        assert_eq!(report, BridgeReport::default());
        assert_eq!(level, before);
    }

    #[test]
    fn isolated_rooms_are_bridged() {
        let mut level = level_with_rooms(&[
            Rect::new(1, 1, 3, 3),
            Rect::new(10, 1, 3, 3),
            Rect::new(20, 10, 4, 4),
            Rect::new(1, 12, 3, 3),
        ]);
        let mut rng = StdRng::seed_from_u64(3);
        let report = ensure_connectivity(&mut level, 0.1, &mut rng).unwrap();

        assert_eq!(report.bridged_rooms, vec![RoomId(1), RoomId(2), RoomId(3)]);
        assert_eq!(level.reachable_rooms().len(), 4);
        for corridor in &level.corridors {
            for cell in &corridor.cells {
                assert!(level.rooms.iter().all(|room| !room.bounds.contains(cell)));
            }
            for pair in corridor.cells.windows(2) {
                assert_eq!(pair[0].manhattan(&pair[1]), 1);
            }
        }
        assert_eq!(report.added_doors, level.doors.len());
        assert!(level.doors.iter().all(|door| {
            level.room(door.room).is_some_and(|room| {
                room.bounds
                    .cells()
                    .any(|cell| cell.manhattan(&door.position) <= 1)
            })
        }));
    }

    #[test]
    fn touching_rooms_are_joined_by_a_door() {
        let mut level = level_with_rooms(&[Rect::new(0, 0, 3, 3), Rect::new(3, 0, 3, 3)]);
        let mut rng = StdRng::seed_from_u64(0);
        ensure_connectivity(&mut level, 0., &mut rng).unwrap();
        assert!(level.corridors.is_empty());
        assert_eq!(level.doors.len(), 1);
        // Bridged from the unreached room towards the entry
        assert_eq!(level.doors[0].room, RoomId(1));
        assert_eq!(level.doors[0].peer, JunctionPeer::Room(RoomId(0)));
        assert_eq!(level.reachable_rooms().len(), 2);
    }

    #[test]
    fn empty_level_cannot_be_connected() {
        let mut level = Level::new(-2, 10, 10);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            ensure_connectivity(&mut level, 0.1, &mut rng),
            Err(ConnectivityFailure {
                level: -2,
                unreached: Vec::new()
            })
        );
    }

    fn stair(
        id: u32,
        room: u32,
        position: Cell,
        levels: (i32, i32),
        direction: StairDirection,
        counterpart: u32,
    ) -> Stair {
        Stair {
            id: StairId(id),
            position,
            room: RoomId(room),
            from_level: levels.0,
            to_level: levels.1,
            direction,
            counterpart: StairId(counterpart),
        }
    }

    #[test]
    fn stair_reciprocity_is_checked_per_pair() {
        let mut upper = level_with_rooms(&[Rect::new(1, 1, 3, 3)]);
        let mut lower = level_with_rooms(&[Rect::new(1, 1, 3, 3)]);
        lower.index = -1;
        assert_eq!(
            check_level_pair(&upper, &lower),
            Err(StairReciprocityFailure { upper: 0, lower: -1 })
        );

        upper
            .stairs
            .push(stair(0, 0, Cell::new(2, 2), (0, -1), StairDirection::Down, 1));
        lower
            .stairs
            .push(stair(1, 0, Cell::new(2, 2), (-1, 0), StairDirection::Up, 0));
        assert_eq!(check_level_pair(&upper, &lower), Ok(()));
        assert_eq!(check_stair_reciprocity(&[upper.clone(), lower.clone()]), Ok(()));

        // Counterpart pointing elsewhere
        lower.stairs[0].counterpart = StairId(7);
        assert!(check_level_pair(&upper, &lower).is_err());

        // Mismatched directions
        lower.stairs[0].counterpart = StairId(0);
        lower.stairs[0].direction = StairDirection::Spiral;
        assert!(check_level_pair(&upper, &lower).is_err());
    }
}
