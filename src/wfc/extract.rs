use std::collections::{BTreeSet, VecDeque};

#[cfg(feature = "debug-traces")]
use tracing::debug;

use super::{rules::TileRules, solver::SolvedGrid};
use crate::{
    grid::{Cell, GridData, GridDefinition, Rect},
    layout::{
        CollapsedTiles, Corridor, CorridorId, Junction, JunctionPeer, PlacedTile, Room, RoomId,
        RoomKind,
    },
    router::{corridor_junctions, push_unique_junctions, RoomOccupancy},
};

/// Rooms, corridors and junctions read from a collapsed tile grid
#[derive(Clone, Debug)]
pub struct Extraction {
    pub rooms: Vec<Room>,
    pub corridors: Vec<Corridor>,
    pub junctions: Vec<Junction>,
    pub tiles: CollapsedTiles,
}

/// Open cells of the level once every tile pattern is stamped on it. Cells not covered by a whole tile stay solid.
pub fn rasterize(
    rules: &TileRules,
    solved: &SolvedGrid,
    level_grid: GridDefinition,
) -> GridData<bool> {
    let mut open = GridData::new(level_grid, false);
    let size = rules.sub_size() as i32;
    for cell in solved.grid.indexes() {
        let tile_cell = solved.grid.cell_at(cell);
        let pattern = &rules.variant(solved.variants[cell]).pattern;
        for (offset, is_open) in pattern.iter().enumerate() {
            let (dx, dy) = (offset as i32 % size, offset as i32 / size);
            open.set(&Cell::new(tile_cell.x * size + dx, tile_cell.y * size + dy), *is_open);
        }
    }
    open
}

/// Greedy maximal rectangles over the open cells, scanned row by row. A rectangle becomes a room only if both sides reach `min_room_size`.
fn find_rooms(open: &GridData<bool>, min_room_size: u32, max_room_size: u32) -> Vec<Room> {
    let grid = *open.grid();
    let mut taken = GridData::new(grid, false);
    let is_free = |taken: &GridData<bool>, cell: &Cell| {
        open.get(cell).copied().unwrap_or(false) && !taken.get(cell).copied().unwrap_or(true)
    };

    let mut rooms = Vec::new();
    for index in grid.indexes() {
        let origin = grid.cell_at(index);
        if !is_free(&taken, &origin) {
            continue;
        }
        let mut width = 1;
        while width < max_room_size
            && is_free(&taken, &Cell::new(origin.x + width as i32, origin.y))
        {
            width += 1;
        }
        let mut height = 1;
        while height < max_room_size
            && (0..width as i32)
                .all(|dx| is_free(&taken, &Cell::new(origin.x + dx, origin.y + height as i32)))
        {
            height += 1;
        }
        if width < min_room_size || height < min_room_size {
            continue;
        }
        let bounds = Rect::new(origin.x, origin.y, width, height);
        for cell in bounds.cells() {
            taken.set(&cell, true);
        }
        rooms.push(Room::new(RoomId(rooms.len() as u32), bounds));
    }
    rooms
}

/// 4-connected components of the open cells that are not inside a room, in scan order
fn corridor_components(open: &GridData<bool>, occupancy: &RoomOccupancy) -> Vec<Vec<Cell>> {
    let grid = *open.grid();
    let mut seen = GridData::new(grid, false);
    let mut components = Vec::new();
    for index in grid.indexes() {
        let start = grid.cell_at(index);
        let is_corridor = |cell: &Cell| {
            open.get(cell).copied().unwrap_or(false) && occupancy.room_at(cell).is_none()
        };
        if !is_corridor(&start) || seen.get(&start).copied().unwrap_or(true) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([start]);
        seen.set(&start, true);
        while let Some(cell) = queue.pop_front() {
            component.push(cell);
            for neighbour in cell.neighbours() {
                if is_corridor(&neighbour) && !seen.get(&neighbour).copied().unwrap_or(true) {
                    seen.set(&neighbour, true);
                    queue.push_back(neighbour);
                }
            }
        }
        components.push(component);
    }
    components
}

fn touches_room(cell: &Cell, room: RoomId, occupancy: &RoomOccupancy) -> bool {
    cell.neighbours()
        .iter()
        .any(|neighbour| occupancy.room_at(neighbour) == Some(room))
}

/// Shortest path inside `component` from a cell next to `from` to a cell next to `to`
fn component_path(
    component: &BTreeSet<Cell>,
    from: RoomId,
    to: RoomId,
    occupancy: &RoomOccupancy,
) -> Option<Vec<Cell>> {
    let grid = *occupancy.grid();
    let mut previous: GridData<Option<Cell>> = GridData::new(grid, None);
    let mut seen = GridData::new(grid, false);
    let mut queue = VecDeque::new();
    for cell in component.iter().filter(|cell| touches_room(cell, from, occupancy)) {
        seen.set(cell, true);
        queue.push_back(*cell);
    }
    while let Some(cell) = queue.pop_front() {
        if touches_room(&cell, to, occupancy) {
            let mut path = vec![cell];
            let mut current = cell;
            while let Some(Some(parent)) = previous.get(&current).copied() {
                path.push(parent);
                current = parent;
            }
            path.reverse();
            return Some(path);
        }
        for neighbour in cell.neighbours() {
            if component.contains(&neighbour) && !seen.get(&neighbour).copied().unwrap_or(true) {
                seen.set(&neighbour, true);
                previous.set(&neighbour, Some(cell));
                queue.push_back(neighbour);
            }
        }
    }
    None
}

/// Reads the level structure from a collapsed tile grid.
///
/// Each corridor component links the rooms it touches, in id order, through shortest paths. Rooms sharing an edge open directly onto each other.
pub fn extract_level(
    rules: &TileRules,
    solved: &SolvedGrid,
    level_grid: GridDefinition,
    min_room_size: u32,
    max_room_size: u32,
) -> Extraction {
    let open = rasterize(rules, solved, level_grid);
    let mut rooms = find_rooms(&open, min_room_size, max_room_size);
    if let Some(entry) = rooms.first_mut() {
        entry.kind = RoomKind::Entry;
    }
    let occupancy = RoomOccupancy::new(level_grid, &rooms);

    let mut corridors = Vec::new();
    let mut junctions = Vec::new();
    let mut known_junctions = BTreeSet::new();
    for component in corridor_components(&open, &occupancy) {
        let touched: BTreeSet<RoomId> = component
            .iter()
            .flat_map(|cell| cell.neighbours())
            .filter_map(|neighbour| occupancy.room_at(&neighbour))
            .collect();
        let component: BTreeSet<Cell> = component.into_iter().collect();
        let touched: Vec<RoomId> = touched.into_iter().collect();
        for pair in touched.windows(2) {
            let Some(cells) = component_path(&component, pair[0], pair[1], &occupancy) else {
                continue;
            };
            let corridor = Corridor {
                id: CorridorId(corridors.len() as u32),
                from: pair[0],
                to: pair[1],
                cells,
            };
            push_unique_junctions(
                &mut junctions,
                &mut known_junctions,
                corridor_junctions(&corridor),
            );
            corridors.push(corridor);
        }
    }

    // Rooms sharing an edge
    let mut linked_pairs = BTreeSet::new();
    for room in &rooms {
        for cell in room.bounds.cells() {
            for neighbour in cell.neighbours() {
                let Some(other) = occupancy.room_at(&neighbour) else {
                    continue;
                };
                if other > room.id && linked_pairs.insert((room.id, other)) {
                    push_unique_junctions(
                        &mut junctions,
                        &mut known_junctions,
                        vec![Junction {
                            cell,
                            room: room.id,
                            peer: JunctionPeer::Room(other),
                        }],
                    );
                }
            }
        }
    }

    #[cfg(feature = "debug-traces")]
    debug!(
        "Extracted {} rooms, {} corridors, {} junctions from the tile grid",
        rooms.len(),
        corridors.len(),
        junctions.len()
    );

    let tiles = CollapsedTiles {
        catalog: rules.catalog_id().to_string(),
        sub_size: rules.sub_size(),
        columns: solved.grid.size_x(),
        rows: solved.grid.size_y(),
        tiles: solved
            .variants
            .iter()
            .map(|&variant| {
                let variant = rules.variant(variant);
                PlacedTile {
                    tile: variant.tile,
                    rotation: variant.rotation,
                }
            })
            .collect(),
    };

    Extraction {
        rooms,
        corridors,
        junctions,
        tiles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wfc::{
        rules::TileRules,
        tile::{Connector, Tile, TileCatalog},
    };

    /// 1x1 tiles, so the tile grid is the level grid
    fn unit_rules() -> TileRules {
        TileRules::new(&TileCatalog::new(
            "unit",
            1,
            vec![
                Tile::new("floor", &["."], [Connector::Open; 4]),
                Tile::new("rock", &["#"], [Connector::Wall; 4]),
            ],
        ))
        .unwrap()
    }

    fn solved_from_map(map: &[&str]) -> SolvedGrid {
        let grid = GridDefinition::new(map[0].len() as u32, map.len() as u32);
        SolvedGrid {
            grid,
            variants: map
                .iter()
                .flat_map(|row| row.chars().map(|c| if c == '.' { 0 } else { 1 }))
                .collect(),
            iterations: 0,
            contradictions: 0,
        }
    }

    #[test]
    fn rooms_and_corridor_from_a_map() {
        let rules = unit_rules();
        let solved = solved_from_map(&[
            "##########",
            "#...######",
            "#.........",
            "#...###...",
            "######....",
        ]);
        assert_eq!(solved.variants.len(), 50);

        let extraction = extract_level(&rules, &solved, solved.grid, 2, 4);
        assert!(!extraction.rooms.is_empty());
        assert_eq!(extraction.rooms[0].kind, RoomKind::Entry);
        for (i, a) in extraction.rooms.iter().enumerate() {
            assert!(a.bounds.width >= 2 && a.bounds.height >= 2);
            for b in &extraction.rooms[i + 1..] {
                assert!(!a.bounds.intersects(&b.bounds));
            }
        }
        assert_eq!(extraction.tiles.tiles.len(), 50);
    }

    #[test]
    fn corridor_links_two_rooms() {
        let rules = unit_rules();
        let solved = solved_from_map(&[
            "###########",
            "#..#####..#",
            "#..........",
            "#..#####..#",
            "###########",
        ]);
        let extraction = extract_level(&rules, &solved, solved.grid, 2, 3);

        assert_eq!(extraction.rooms.len(), 2);
        assert_eq!(extraction.rooms[0].bounds, Rect::new(1, 1, 2, 3));
        assert_eq!(extraction.rooms[1].bounds, Rect::new(8, 1, 2, 3));
        assert_eq!(extraction.corridors.len(), 1);
        let corridor = &extraction.corridors[0];
        assert_eq!((corridor.from, corridor.to), (RoomId(0), RoomId(1)));
        assert_eq!(corridor.cells, (3..8).map(|x| Cell::new(x, 2)).collect::<Vec<_>>());
        assert_eq!(extraction.junctions.len(), 2);
    }

    #[test]
    fn touching_rooms_share_a_junction() {
        let rules = unit_rules();
        let solved = solved_from_map(&["#####", "#....", "#....", "#####"]);
        let extraction = extract_level(&rules, &solved, solved.grid, 2, 2);
        assert_eq!(extraction.rooms.len(), 2);
        assert!(extraction.corridors.is_empty());
        assert_eq!(
            extraction.junctions,
            vec![Junction {
                cell: Cell::new(2, 1),
                room: RoomId(0),
                peer: JunctionPeer::Room(RoomId(1)),
            }]
        );
    }

    #[test]
    fn patterns_are_stamped_per_tile() {
        use Connector::*;
        let rules = TileRules::new(&TileCatalog::new(
            "big",
            2,
            vec![Tile::new("half", &["..", "##"], [Wall, Open, Wall, Open])],
        ))
        .unwrap();
        let solved = SolvedGrid {
            grid: GridDefinition::new(2, 1),
            variants: vec![0, 0],
            iterations: 0,
            contradictions: 0,
        };
        let open = rasterize(&rules, &solved, GridDefinition::new(5, 2));
        let open_cells: Vec<_> = open
            .iter()
            .filter(|(_, open)| **open)
            .map(|(cell, _)| cell)
            .collect();
        assert_eq!(
            open_cells,
            vec![Cell::new(0, 0), Cell::new(1, 0), Cell::new(2, 0), Cell::new(3, 0)]
        );
    }
}
