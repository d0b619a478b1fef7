use std::collections::BTreeSet;

use rand::{rngs::StdRng, Rng};

#[cfg(feature = "debug-traces")]
use tracing::trace;

use crate::{
    connectivity::RoomEdge,
    grid::{Cell, GridData, GridDefinition},
    layout::{Corridor, CorridorId, Junction, JunctionPeer, Room, RoomId},
    RoutingFailure,
};

/// Default number of candidate paths tried for one edge before giving up
pub const DEFAULT_ROUTING_ATTEMPTS: u32 = 12;

/// How far past the span between two rooms the middle leg of a detour may go
const DETOUR_REACH: i32 = 3;

/// Which room, if any, covers each cell of a level
#[derive(Clone, Debug)]
pub struct RoomOccupancy {
    cells: GridData<Option<RoomId>>,
}

impl RoomOccupancy {
    pub fn new(grid: GridDefinition, rooms: &[Room]) -> Self {
        let mut cells = GridData::new(grid, None);
        for room in rooms {
            for cell in room.bounds.cells() {
                cells.set(&cell, Some(room.id));
            }
        }
        Self { cells }
    }

    pub fn grid(&self) -> &GridDefinition {
        self.cells.grid()
    }

    pub fn room_at(&self, cell: &Cell) -> Option<RoomId> {
        self.cells.get(cell).copied().flatten()
    }
}

/// Corridors and junctions produced for a set of edges, plus the edges that could not be routed
#[derive(Clone, Debug, Default)]
pub struct RoutingOutcome {
    pub corridors: Vec<Corridor>,
    pub junctions: Vec<Junction>,
    pub failures: Vec<RoutingFailure>,
}

/// Shape of a candidate path between two room centers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PathShape {
    HorizontalFirst,
    VerticalFirst,
    /// Horizontal, vertical at the given column, horizontal
    HorizontalDetour(i32),
    /// Vertical, horizontal at the given row, vertical
    VerticalDetour(i32),
}

impl PathShape {
    fn waypoints(&self, from: Cell, to: Cell) -> Vec<Cell> {
        match *self {
            PathShape::HorizontalFirst => vec![from, Cell::new(to.x, from.y), to],
            PathShape::VerticalFirst => vec![from, Cell::new(from.x, to.y), to],
            PathShape::HorizontalDetour(column) => vec![
                from,
                Cell::new(column, from.y),
                Cell::new(column, to.y),
                to,
            ],
            PathShape::VerticalDetour(row) => {
                vec![from, Cell::new(from.x, row), Cell::new(to.x, row), to]
            }
        }
    }
}

/// Joins aligned waypoints with straight runs of 4-adjacent cells
pub(crate) fn orthogonal_path(waypoints: &[Cell]) -> Vec<Cell> {
    let mut path: Vec<Cell> = Vec::new();
    for waypoint in waypoints {
        let Some(&current) = path.last() else {
            path.push(*waypoint);
            continue;
        };
        let (dx, dy) = ((waypoint.x - current.x).signum(), (waypoint.y - current.y).signum());
        let mut cell = current;
        while cell != *waypoint {
            // Waypoints are aligned on one axis, move on x first if ever they are not
            cell = match cell.x != waypoint.x {
                true => Cell::new(cell.x + dx, cell.y),
                false => Cell::new(cell.x, cell.y + dy),
            };
            path.push(cell);
        }
    }
    path
}

/// Keeps the cells strictly between the last cell inside `from` and the next cell inside `to`.
///
/// Returns `None` if the path never leaves `from` to reach `to`, or if nothing is left between them.
fn trim_between_rooms(
    path: &[Cell],
    from: RoomId,
    to: RoomId,
    occupancy: &RoomOccupancy,
) -> Option<Vec<Cell>> {
    let last_in_from = path
        .iter()
        .rposition(|cell| occupancy.room_at(cell) == Some(from))?;
    let first_in_to = last_in_from
        + path[last_in_from..]
            .iter()
            .position(|cell| occupancy.room_at(cell) == Some(to))?;
    match first_in_to > last_in_from + 1 {
        true => Some(path[last_in_from + 1..first_in_to].to_vec()),
        false => None,
    }
}

fn crossed_room_cells(cells: &[Cell], occupancy: &RoomOccupancy) -> usize {
    cells
        .iter()
        .filter(|cell| occupancy.room_at(cell).is_some())
        .count()
}

fn is_routable(cells: &[Cell], occupancy: &RoomOccupancy) -> bool {
    let mut seen = BTreeSet::new();
    cells.iter().all(|cell| {
        occupancy.grid().contains(cell) && occupancy.room_at(cell).is_none() && seen.insert(*cell)
    })
}

/// Candidate shapes for an edge, the two L-shapes first (fewest crossed room cells first), then detours ordered by their distance to the midpoint.
fn candidate_shapes(
    from: Cell,
    to: Cell,
    from_room: RoomId,
    to_room: RoomId,
    occupancy: &RoomOccupancy,
    max_attempts: u32,
    rng: &mut StdRng,
) -> Vec<PathShape> {
    let crossings = |shape: PathShape| {
        let path = orthogonal_path(&shape.waypoints(from, to));
        trim_between_rooms(&path, from_room, to_room, occupancy)
            .map_or(usize::MAX, |cells| crossed_room_cells(&cells, occupancy))
    };
    let horizontal = crossings(PathShape::HorizontalFirst);
    let vertical = crossings(PathShape::VerticalFirst);
    let horizontal_first = match horizontal.cmp(&vertical) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => rng.gen_bool(0.5),
    };
    let mut shapes = match horizontal_first {
        true => vec![PathShape::HorizontalFirst, PathShape::VerticalFirst],
        false => vec![PathShape::VerticalFirst, PathShape::HorizontalFirst],
    };

    let mut detours = Vec::new();
    if from.y != to.y {
        let (low, high) = (from.x.min(to.x), from.x.max(to.x));
        let middle = (from.x + to.x).div_euclid(2);
        for column in (low - DETOUR_REACH)..=(high + DETOUR_REACH) {
            if column != from.x
                && column != to.x
                && occupancy.grid().contains(&Cell::new(column, 0))
            {
                detours.push((column.abs_diff(middle), PathShape::HorizontalDetour(column)));
            }
        }
    }
    if from.x != to.x {
        let (low, high) = (from.y.min(to.y), from.y.max(to.y));
        let middle = (from.y + to.y).div_euclid(2);
        for row in (low - DETOUR_REACH)..=(high + DETOUR_REACH) {
            if row != from.y && row != to.y && occupancy.grid().contains(&Cell::new(0, row)) {
                detours.push((row.abs_diff(middle), PathShape::VerticalDetour(row)));
            }
        }
    }
    // Stable sort: horizontal detours before vertical ones at equal distance
    detours.sort_by_key(|(distance, _)| *distance);
    shapes.extend(detours.into_iter().map(|(_, shape)| shape));
    shapes.truncate(max_attempts.max(1) as usize);
    shapes
}

/// Tries to find a corridor for one edge. Returns the corridor cells or the number of candidates tried.
fn route_edge(
    from_room: &Room,
    to_room: &Room,
    occupancy: &RoomOccupancy,
    max_attempts: u32,
    rng: &mut StdRng,
) -> Result<Vec<Cell>, u32> {
    let (from, to) = (from_room.bounds.center(), to_room.bounds.center());
    let shapes = candidate_shapes(from, to, from_room.id, to_room.id, occupancy, max_attempts, rng);
    for shape in &shapes {
        let path = orthogonal_path(&shape.waypoints(from, to));
        let Some(cells) = trim_between_rooms(&path, from_room.id, to_room.id, occupancy) else {
            continue;
        };
        if is_routable(&cells, occupancy) {
            #[cfg(feature = "debug-traces")]
            trace!(
                "Routed room {} to room {} with {:?}, {} cells",
                from_room.id,
                to_room.id,
                shape,
                cells.len()
            );
            return Ok(cells);
        }
    }
    Err(shapes.len() as u32)
}

/// Junctions at both ends of a corridor. A corridor of a single cell opens both rooms onto each other.
pub(crate) fn corridor_junctions(corridor: &Corridor) -> Vec<Junction> {
    let (Some(first), Some(last)) = (corridor.cells.first(), corridor.cells.last()) else {
        return Vec::new();
    };
    if first == last {
        return vec![Junction {
            cell: *first,
            room: corridor.from,
            peer: JunctionPeer::Room(corridor.to),
        }];
    }
    vec![
        Junction {
            cell: *first,
            room: corridor.from,
            peer: JunctionPeer::Corridor(corridor.id),
        },
        Junction {
            cell: *last,
            room: corridor.to,
            peer: JunctionPeer::Corridor(corridor.id),
        },
    ]
}

/// Appends the junctions whose (cell, room) pair is not yet known
pub(crate) fn push_unique_junctions(
    junctions: &mut Vec<Junction>,
    known: &mut BTreeSet<(Cell, RoomId)>,
    new_junctions: Vec<Junction>,
) {
    for junction in new_junctions {
        if known.insert((junction.cell, junction.room)) {
            junctions.push(junction);
        }
    }
}

/// Routes every edge into a width-1 orthogonal corridor that never crosses a third room.
///
/// Corridor ids start at `first_corridor_id`. Edges that cannot be routed are reported in [`RoutingOutcome::failures`] and left to the validator.
pub fn route_corridors(
    occupancy: &RoomOccupancy,
    rooms: &[Room],
    edges: &[RoomEdge],
    max_attempts: u32,
    first_corridor_id: u32,
    rng: &mut StdRng,
) -> RoutingOutcome {
    let mut outcome = RoutingOutcome::default();
    let mut known_junctions = BTreeSet::new();
    let mut next_id = first_corridor_id;

    for edge in edges {
        let (Some(from_room), Some(to_room)) =
            (rooms.get(edge.a.0 as usize), rooms.get(edge.b.0 as usize))
        else {
            continue;
        };
        match route_edge(from_room, to_room, occupancy, max_attempts, rng) {
            Ok(cells) => {
                let corridor = Corridor {
                    id: CorridorId(next_id),
                    from: from_room.id,
                    to: to_room.id,
                    cells,
                };
                next_id += 1;
                push_unique_junctions(
                    &mut outcome.junctions,
                    &mut known_junctions,
                    corridor_junctions(&corridor),
                );
                outcome.corridors.push(corridor);
            }
            Err(attempts) => {
                let failure = RoutingFailure {
                    from: from_room.id,
                    to: to_room.id,
                    attempts,
                };
                tracing::warn!("{}", failure);
                outcome.failures.push(failure);
            }
        }
    }
    outcome
}

/// A piece of a forced path: free cells between two different rooms. Empty `cells` means the rooms touch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PathSegment {
    pub from: RoomId,
    pub to: RoomId,
    pub cells: Vec<Cell>,
    /// Last cell of `from` before the segment
    pub from_edge: Cell,
}

/// Cuts a path at room boundaries. Each run of free cells between two distinct rooms becomes a segment; runs that come back to the same room or never reach a room are dropped.
pub(crate) fn split_at_rooms(path: &[Cell], occupancy: &RoomOccupancy) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut last_room: Option<(RoomId, Cell)> = None;
    let mut run = Vec::new();
    for cell in path {
        match occupancy.room_at(cell) {
            Some(room) => {
                if let Some((previous, edge)) = last_room {
                    if previous != room {
                        segments.push(PathSegment {
                            from: previous,
                            to: room,
                            cells: std::mem::take(&mut run),
                            from_edge: edge,
                        });
                    }
                }
                run.clear();
                last_room = Some((room, *cell));
            }
            None => run.push(*cell),
        }
    }
    segments
}
