use std::{
    collections::{BTreeSet, VecDeque},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::{
    grid::{Cell, Rect},
    wfc::tile::TileRotation,
};

/// Width, in cells, of every generated corridor
pub const CORRIDOR_WIDTH: u32 = 1;

macro_rules! layout_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

layout_id!(
    /// Id of a [`Room`], unique within its [`Level`]
    RoomId
);
layout_id!(
    /// Id of a [`Corridor`], unique within its [`Level`]
    CorridorId
);
layout_id!(
    /// Id of a [`Door`], unique within its [`Level`]
    DoorId
);
layout_id!(
    /// Id of a [`Stair`], unique within the whole [`DungeonLayout`]
    StairId
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Entry,
    Exit,
    Chamber,
    Special,
}

/// Something a room is connected to
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum ConnectionRef {
    Room(RoomId),
    Corridor(CorridorId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub bounds: Rect,
    pub kind: RoomKind,
    pub connections: BTreeSet<ConnectionRef>,
}

impl Room {
    pub fn new(id: RoomId, bounds: Rect) -> Self {
        Self {
            id,
            bounds,
            kind: RoomKind::Chamber,
            connections: BTreeSet::new(),
        }
    }
}

/// A width-1 path of 4-adjacent cells joining two rooms. Only its end cells touch the rooms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Corridor {
    pub id: CorridorId,
    pub from: RoomId,
    pub to: RoomId,
    /// Ordered waypoints, from the cell next to `from` to the cell next to `to`
    pub cells: Vec<Cell>,
}

impl Corridor {
    pub fn width(&self) -> u32 {
        CORRIDOR_WIDTH
    }
}

/// What the other side of a door junction is
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum JunctionPeer {
    Corridor(CorridorId),
    Room(RoomId),
}

/// A place where a room opens onto a corridor or onto another room. Each junction receives exactly one [`Door`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Junction {
    pub cell: Cell,
    pub room: RoomId,
    pub peer: JunctionPeer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorKind {
    Wood,
    Iron,
    Stone,
    Secret,
    Magical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    Open,
    Closed,
    Locked,
    Stuck,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Door {
    pub id: DoorId,
    pub position: Cell,
    pub kind: DoorKind,
    pub state: DoorState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_difficulty: Option<u8>,
    /// Room side of the junction
    pub room: RoomId,
    /// Other side of the junction
    pub peer: JunctionPeer,
}

impl Door {
    pub fn is_secret(&self) -> bool {
        self.kind == DoorKind::Secret
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StairDirection {
    Up,
    Down,
    Spiral,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stair {
    pub id: StairId,
    pub position: Cell,
    /// Room holding the stair
    pub room: RoomId,
    pub from_level: i32,
    pub to_level: i32,
    pub direction: StairDirection,
    /// The matching stair on `to_level`
    pub counterpart: StairId,
}

/// Collapsed tile grid of a level generated in tile mode
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollapsedTiles {
    pub catalog: String,
    /// Side, in grid cells, of one tile
    pub sub_size: u32,
    pub columns: u32,
    pub rows: u32,
    /// Row-major, `columns * rows` entries
    pub tiles: Vec<PlacedTile>,
}

impl CollapsedTiles {
    pub fn tile_at(&self, column: u32, row: u32) -> Option<&PlacedTile> {
        match column < self.columns && row < self.rows {
            true => self.tiles.get((column + row * self.columns) as usize),
            false => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedTile {
    /// Index of the tile in its catalog
    pub tile: usize,
    pub rotation: TileRotation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// 0 for the entry level, negative for deeper levels
    pub index: i32,
    pub width: u32,
    pub height: u32,
    pub rooms: Vec<Room>,
    pub corridors: Vec<Corridor>,
    pub doors: Vec<Door>,
    pub stairs: Vec<Stair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<CollapsedTiles>,
}

impl Level {
    pub fn new(index: i32, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
            rooms: Vec::new(),
            corridors: Vec::new(),
            doors: Vec::new(),
            stairs: Vec::new(),
            tiles: None,
        }
    }

    /// Rooms are stored in id order, so this is a direct lookup
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id.0 as usize).filter(|room| room.id == id)
    }

    /// The entry room of a level is always its first room
    pub fn entry_room(&self) -> Option<RoomId> {
        self.rooms.first().map(|room| room.id)
    }

    /// Room adjacency induced by corridors and room-to-room doors. Door states are ignored.
    ///
    /// `adjacency[room_index]` is sorted and deduplicated.
    pub fn room_adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![BTreeSet::new(); self.rooms.len()];
        let mut link = |a: RoomId, b: RoomId| {
            let (a, b) = (a.0 as usize, b.0 as usize);
            if a < adjacency.len() && b < adjacency.len() && a != b {
                adjacency[a].insert(b);
                adjacency[b].insert(a);
            }
        };
        for corridor in &self.corridors {
            link(corridor.from, corridor.to);
        }
        for door in &self.doors {
            if let JunctionPeer::Room(other) = door.peer {
                link(door.room, other);
            }
        }
        adjacency
            .into_iter()
            .map(|neighbours| neighbours.into_iter().collect())
            .collect()
    }

    /// Breadth-first hop distance from `start` to every room, `None` for unreachable rooms
    pub fn hop_distances(&self, start: RoomId) -> Vec<Option<u32>> {
        let adjacency = self.room_adjacency();
        let mut distances = vec![None; self.rooms.len()];
        let start = start.0 as usize;
        if start >= distances.len() {
            return distances;
        }
        distances[start] = Some(0);
        let mut open = VecDeque::from([start]);
        while let Some(room) = open.pop_front() {
            let next_distance = distances[room].map(|d| d + 1);
            for &neighbour in &adjacency[room] {
                if distances[neighbour].is_none() {
                    distances[neighbour] = next_distance;
                    open.push_back(neighbour);
                }
            }
        }
        distances
    }

    /// Rooms reachable from the entry room
    pub fn reachable_rooms(&self) -> BTreeSet<RoomId> {
        let Some(entry) = self.entry_room() else {
            return BTreeSet::new();
        };
        self.hop_distances(entry)
            .iter()
            .enumerate()
            .filter(|(_, distance)| distance.is_some())
            .map(|(index, _)| RoomId(index as u32))
            .collect()
    }

    /// Rebuilds every room's connection set from the corridors and doors of the level
    pub(crate) fn refresh_connections(&mut self) {
        for room in &mut self.rooms {
            room.connections.clear();
        }
        for index in 0..self.corridors.len() {
            let (id, from, to) = {
                let corridor = &self.corridors[index];
                (corridor.id, corridor.from, corridor.to)
            };
            for room in [from, to] {
                if let Some(room) = self.rooms.get_mut(room.0 as usize) {
                    room.connections.insert(ConnectionRef::Corridor(id));
                }
            }
        }
        for index in 0..self.doors.len() {
            let (room, peer) = (self.doors[index].room, self.doors[index].peer);
            if let JunctionPeer::Room(other) = peer {
                if let Some(room) = self.rooms.get_mut(room.0 as usize) {
                    room.connections.insert(ConnectionRef::Room(other));
                }
                if let Some(other_room) = self.rooms.get_mut(other.0 as usize) {
                    other_room.connections.insert(ConnectionRef::Room(room));
                }
            }
        }
    }
}

/// A room on a given level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub level: i32,
    pub room: RoomId,
}

/// A room on a given level that leads out of the dungeon
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitPoint {
    pub level: i32,
    pub room: RoomId,
}

/// A fully validated multi-level dungeon. Immutable once returned by the generator: request a new generation instead of editing it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DungeonLayout {
    /// Seed of the [`crate::params::GenerationParameters`] this layout was generated from
    pub seed: u64,
    /// Ordered from the entry level (index 0) downwards
    pub levels: Vec<Level>,
    pub entry: EntryPoint,
    pub exits: Vec<ExitPoint>,
}

impl DungeonLayout {
    pub fn level(&self, index: i32) -> Option<&Level> {
        self.levels.iter().find(|level| level.index == index)
    }

    /// Nested document (levels -> rooms/corridors/doors/stairs) for downstream storage
    pub fn to_document(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<DungeonLayout, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor(id: u32, from: u32, to: u32) -> Corridor {
        Corridor {
            id: CorridorId(id),
            from: RoomId(from),
            to: RoomId(to),
            cells: vec![Cell::new(0, 0)],
        }
    }

    fn level_with_rooms(count: u32) -> Level {
        let mut level = Level::new(0, 40, 40);
        for id in 0..count {
            level
                .rooms
                .push(Room::new(RoomId(id), Rect::new(id as i32 * 5, 0, 3, 3)));
        }
        level
    }

    #[test]
    fn hop_distances_follow_corridors_and_room_doors() {
        let mut level = level_with_rooms(4);
        level.corridors.push(corridor(0, 0, 1));
        level.doors.push(Door {
            id: DoorId(0),
            position: Cell::new(8, 1),
            kind: DoorKind::Wood,
            state: DoorState::Locked,
            lock_difficulty: Some(12),
            room: RoomId(1),
            peer: JunctionPeer::Room(RoomId(2)),
        });

        let distances = level.hop_distances(RoomId(0));
        assert_eq!(distances, vec![Some(0), Some(1), Some(2), None]);
        assert_eq!(
            level.reachable_rooms(),
            BTreeSet::from([RoomId(0), RoomId(1), RoomId(2)])
        );
    }

    #[test]
    fn refresh_connections_links_both_ends() {
        let mut level = level_with_rooms(2);
        level.corridors.push(corridor(3, 0, 1));
        level.refresh_connections();
        for room in &level.rooms {
            assert!(room
                .connections
                .contains(&ConnectionRef::Corridor(CorridorId(3))));
        }
    }

    #[test]
    fn layout_document_nests_levels() {
        let layout = DungeonLayout {
            seed: 7,
            levels: vec![level_with_rooms(1)],
            entry: EntryPoint {
                level: 0,
                room: RoomId(0),
            },
            exits: vec![],
        };
        let document = layout.to_document().unwrap();
        assert_eq!(document["levels"][0]["rooms"][0]["bounds"]["width"], 3);
        assert_eq!(document["levels"][0]["rooms"][0]["kind"], "chamber");

        let json = layout.to_json().unwrap();
        assert_eq!(DungeonLayout::from_json(&json).unwrap(), layout);
    }
}
