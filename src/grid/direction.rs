use serde::{Deserialize, Serialize};

/// Cardinal direction on a 2d dungeon grid. `y` grows towards [`Direction::South`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

/// All the directions, in the order used to index per-edge arrays (connectors, support counts, ...)
pub const ALL_DIRECTIONS: &[Direction] = &[
    Direction::North,
    Direction::East,
    Direction::South,
    Direction::West,
];

impl Direction {
    /// Returns the opposite direction
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Returns the direction obtained after a clockwise quarter turn
    pub fn rotated_clockwise(&self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    /// Unit displacement when moving one cell in this direction
    pub fn delta(&self) -> GridDelta {
        match self {
            Direction::North => GridDelta { dx: 0, dy: -1 },
            Direction::East => GridDelta { dx: 1, dy: 0 },
            Direction::South => GridDelta { dx: 0, dy: 1 },
            Direction::West => GridDelta { dx: -1, dy: 0 },
        }
    }

    #[inline]
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

/// Displacement between two cells
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridDelta {
    pub dx: i32,
    pub dy: i32,
}

impl GridDelta {
    pub fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}
