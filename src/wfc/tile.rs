use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[cfg(feature = "debug-traces")]
use tracing::warn;

use crate::{
    grid::direction::{Direction, ALL_DIRECTIONS},
    RulesError,
};

/// Index of a tile in its [`TileCatalog`]
pub type TileIndex = usize;

/// Per-edge compatibility descriptor of a [`Tile`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connector {
    Open,
    Wall,
    Door,
    Corner,
}

impl Connector {
    /// Two facing edges are compatible when they carry the same connector, or when a wall meets a corner
    pub fn is_compatible(self, other: Connector) -> bool {
        self == other
            || matches!(
                (self, other),
                (Connector::Wall, Connector::Corner) | (Connector::Corner, Connector::Wall)
            )
    }

    /// Connectors allowed on the outer edges of a level
    pub fn is_enclosing(self) -> bool {
        matches!(self, Connector::Wall | Connector::Corner)
    }
}

/// Clockwise rotation of a tile
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TileRotation {
    #[default]
    Rot0,
    Rot90,
    Rot180,
    Rot270,
}

/// All the rotations, in expansion order
pub const ALL_TILE_ROTATIONS: &[TileRotation] = &[
    TileRotation::Rot0,
    TileRotation::Rot90,
    TileRotation::Rot180,
    TileRotation::Rot270,
];

impl TileRotation {
    /// Number of clockwise quarter turns
    pub fn index(&self) -> usize {
        match self {
            TileRotation::Rot0 => 0,
            TileRotation::Rot90 => 1,
            TileRotation::Rot180 => 2,
            TileRotation::Rot270 => 3,
        }
    }

    /// Where an edge facing `direction` ends up after this rotation
    pub fn rotate(&self, direction: Direction) -> Direction {
        let mut rotated = direction;
        for _ in 0..self.index() {
            rotated = rotated.rotated_clockwise();
        }
        rotated
    }
}

fn default_weight() -> f32 {
    1.0
}

fn default_rotations() -> BTreeSet<TileRotation> {
    BTreeSet::from([TileRotation::Rot0])
}

/// Immutable catalog entry: an occupancy pattern plus one connector per edge.
///
/// The pattern is given as `sub_size` rows of `sub_size` characters, `.` for an open (walkable) cell, anything else for a solid one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub name: String,
    pub pattern: Vec<String>,
    /// North, east, south, west
    pub connectors: [Connector; 4],
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Allowed rotations. [`TileRotation::Rot0`] is always allowed.
    #[serde(default = "default_rotations")]
    pub rotations: BTreeSet<TileRotation>,
}

impl Tile {
    /// Creates a [`Tile`] with a weight of 1 and no rotation
    pub fn new<S: Into<String>>(name: S, pattern: &[&str], connectors: [Connector; 4]) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.iter().map(|row| row.to_string()).collect(),
            connectors,
            weight: default_weight(),
            rotations: default_rotations(),
        }
    }

    /// Specify this [`Tile`] weight. All the rotations of the tile share it.
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// Allows every rotation of this [`Tile`]
    pub fn with_all_rotations(mut self) -> Self {
        self.rotations = ALL_TILE_ROTATIONS.iter().copied().collect();
        self
    }

    /// Allows the given rotations of this [`Tile`], in addition to [`TileRotation::Rot0`]
    pub fn with_rotations<R: IntoIterator<Item = TileRotation>>(mut self, rotations: R) -> Self {
        self.rotations = rotations.into_iter().collect();
        self.rotations.insert(TileRotation::Rot0);
        self
    }

    /// Connectors of the tile once rotated, indexed by [`Direction`]
    pub fn rotated_connectors(&self, rotation: TileRotation) -> [Connector; 4] {
        let mut rotated = self.connectors;
        for &direction in ALL_DIRECTIONS {
            rotated[rotation.rotate(direction).index()] = self.connectors[direction.index()];
        }
        rotated
    }

    /// Open cells of the tile once rotated, row-major
    pub fn rotated_pattern(&self, rotation: TileRotation) -> Vec<bool> {
        let size = self.pattern.len();
        let open: Vec<bool> = self
            .pattern
            .iter()
            .flat_map(|row| row.chars().map(|c| c == '.'))
            .collect();
        let mut rotated = open;
        for _ in 0..rotation.index() {
            let previous = rotated.clone();
            for row in 0..size {
                for column in 0..size {
                    // Clockwise: new (row, col) comes from (size - 1 - col, row)
                    rotated[row * size + column] = previous[(size - 1 - column) * size + row];
                }
            }
        }
        rotated
    }
}

/// Named, read-only set of tiles sharing the same sub-grid size
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileCatalog {
    pub id: String,
    /// Side, in level cells, of every tile
    pub sub_size: u32,
    pub tiles: Vec<Tile>,
}

impl TileCatalog {
    pub fn new<S: Into<String>>(id: S, sub_size: u32, tiles: Vec<Tile>) -> Self {
        Self {
            id: id.into(),
            sub_size,
            tiles,
        }
    }

    pub fn from_json(json: &str) -> Result<TileCatalog, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns an error if the catalog is empty, if a pattern does not match the sub-grid size or if a weight is not strictly positive.
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.tiles.is_empty() {
            return Err(RulesError::NoTiles);
        }
        if self.sub_size == 0 {
            return Err(RulesError::EmptySubGrid);
        }
        let size = self.sub_size as usize;
        for tile in &self.tiles {
            let found: usize = tile.pattern.iter().map(|row| row.chars().count()).sum();
            let well_formed = tile.pattern.len() == size
                && tile.pattern.iter().all(|row| row.chars().count() == size);
            if !well_formed {
                return Err(RulesError::PatternSizeMismatch {
                    tile: tile.name.clone(),
                    expected: size * size,
                    found,
                });
            }
            if !(tile.weight > 0.) {
                #[cfg(feature = "debug-traces")]
                warn!("Tile {} has an invalid weight {}", tile.name, tile.weight);
                return Err(RulesError::InvalidWeight(tile.name.clone()));
            }
        }
        Ok(())
    }
}
