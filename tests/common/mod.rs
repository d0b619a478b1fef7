#![allow(dead_code)]

use std::collections::BTreeSet;

use ghx_dungeon_gen::{
    grid::Cell,
    layout::{JunctionPeer, Level, RoomId},
    wfc::{
        rules::TileRules,
        tile::{Connector, TileCatalog},
    },
    DungeonGenerator, DungeonLayout, GenerationParameters,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn crypt_catalog() -> TileCatalog {
    TileCatalog::from_json(include_str!("../catalogs/crypt.json")).unwrap()
}

pub fn generate(parameters: GenerationParameters) -> DungeonLayout {
    DungeonGenerator::builder()
        .with_parameters(parameters)
        .build()
        .unwrap()
        .generate()
        .unwrap()
}

pub fn check_connectivity(level: &Level) -> Result<(), String> {
    let reached = level.reachable_rooms();
    match reached.len() == level.rooms.len() {
        true => Ok(()),
        false => Err(format!(
            "level {}: {} of {} rooms reachable",
            level.index,
            reached.len(),
            level.rooms.len()
        )),
    }
}

pub fn check_no_overlap(level: &Level) -> Result<(), String> {
    for (index, room) in level.rooms.iter().enumerate() {
        for other in &level.rooms[index + 1..] {
            if room.bounds.intersects(&other.bounds) {
                return Err(format!(
                    "level {}: rooms {} and {} overlap",
                    level.index, room.id, other.id
                ));
            }
        }
    }
    Ok(())
}

/// Corridors are width-1 chains of 4-adjacent cells, without repeats, outside every room
pub fn check_corridors(level: &Level) -> Result<(), String> {
    for corridor in &level.corridors {
        if corridor.width() != 1 || corridor.cells.is_empty() {
            return Err(format!("level {}: corridor {} is malformed", level.index, corridor.id));
        }
        let unique: BTreeSet<&Cell> = corridor.cells.iter().collect();
        if unique.len() != corridor.cells.len() {
            return Err(format!("level {}: corridor {} revisits a cell", level.index, corridor.id));
        }
        if corridor.cells.windows(2).any(|pair| pair[0].manhattan(&pair[1]) != 1) {
            return Err(format!(
                "level {}: corridor {} is not 4-connected",
                level.index, corridor.id
            ));
        }
        for cell in &corridor.cells {
            if level.rooms.iter().any(|room| room.bounds.contains(cell)) {
                return Err(format!(
                    "level {}: corridor {} enters a room at {}",
                    level.index, corridor.id, cell
                ));
            }
        }
    }
    Ok(())
}

/// One door per junction: each corridor end facing a room and each room to room opening
pub fn check_door_coverage(level: &Level) -> Result<(), String> {
    let mut junctions: BTreeSet<(Cell, RoomId)> = BTreeSet::new();
    for corridor in &level.corridors {
        let (Some(first), Some(last)) = (corridor.cells.first(), corridor.cells.last()) else {
            continue;
        };
        junctions.insert((*first, corridor.from));
        if first != last {
            junctions.insert((*last, corridor.to));
        }
    }
    for door in &level.doors {
        if let JunctionPeer::Room(_) = door.peer {
            junctions.insert((door.position, door.room));
        }
    }
    let doors: BTreeSet<(Cell, RoomId)> = level
        .doors
        .iter()
        .map(|door| (door.position, door.room))
        .collect();
    match doors.len() == level.doors.len() && doors == junctions {
        true => Ok(()),
        false => Err(format!(
            "level {}: {} doors for {} junctions",
            level.index,
            level.doors.len(),
            junctions.len()
        )),
    }
}

pub fn check_stairs(layout: &DungeonLayout) -> Result<(), String> {
    for pair in layout.levels.windows(2) {
        let (upper, lower) = (&pair[0], &pair[1]);
        let down: Vec<_> = upper
            .stairs
            .iter()
            .filter(|stair| stair.to_level == lower.index)
            .collect();
        if down.is_empty() {
            return Err(format!("no stairs between {} and {}", upper.index, lower.index));
        }
        for stair in down {
            let reciprocal = lower.stairs.iter().any(|other| {
                other.id == stair.counterpart
                    && other.counterpart == stair.id
                    && other.to_level == upper.index
            });
            if !reciprocal {
                return Err(format!("stair {} of level {} has no way back", stair.id, upper.index));
            }
        }
    }
    Ok(())
}

pub fn check_layout(layout: &DungeonLayout) -> Result<(), String> {
    for level in &layout.levels {
        check_connectivity(level)?;
        check_no_overlap(level)?;
        check_corridors(level)?;
        check_door_coverage(level)?;
    }
    check_stairs(layout)
}

/// Every pair of adjacent collapsed tiles faces compatible connectors, and every border edge is enclosing
pub fn check_tile_edges(level: &Level, catalog: &TileCatalog) -> Result<(), String> {
    let Some(tiles) = &level.tiles else {
        return Ok(());
    };
    let rules = TileRules::new(catalog).map_err(|err| err.to_string())?;
    let connectors = |column: u32, row: u32| -> Option<[Connector; 4]> {
        let placed = tiles.tile_at(column, row)?;
        Some(catalog.tiles[placed.tile].rotated_connectors(placed.rotation))
    };
    assert_eq!(rules.sub_size(), tiles.sub_size);
    for row in 0..tiles.rows {
        for column in 0..tiles.columns {
            let here = connectors(column, row).ok_or("missing tile")?;
            // North, east, south, west
            if row == 0 && !here[0].is_enclosing()
                || column + 1 == tiles.columns && !here[1].is_enclosing()
                || row + 1 == tiles.rows && !here[2].is_enclosing()
                || column == 0 && !here[3].is_enclosing()
            {
                return Err(format!("tile ({}, {}) opens onto the level border", column, row));
            }
            if let Some(east) = connectors(column + 1, row) {
                if !here[1].is_compatible(east[3]) {
                    return Err(format!(
                        "tiles ({}, {}) and ({}, {}) mismatch",
                        column,
                        row,
                        column + 1,
                        row
                    ));
                }
            }
            if let Some(south) = connectors(column, row + 1) {
                if !here[2].is_compatible(south[0]) {
                    return Err(format!(
                        "tiles ({}, {}) and ({}, {}) mismatch",
                        column,
                        row,
                        column,
                        row + 1
                    ));
                }
            }
        }
    }
    Ok(())
}
