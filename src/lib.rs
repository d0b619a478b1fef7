//! Multi-level dungeon layout generation.
//!
//! A [`DungeonGenerator`] turns [`GenerationParameters`] into a validated [`DungeonLayout`], either through space
//! partitioning + spanning tree + corridor routing, or through wave function collapse over a tile catalog.

use grid::Rect;
use layout::RoomId;
use params::ParametersError;

/// Recursively splits a grid into leaf regions
pub mod partition;
/// Builds the room connection graph (spanning tree + loops)
pub mod connectivity;
/// Drives the whole generation: mode selection, retries, multi-level assembly
pub mod generator;
/// Cells, rectangles and grid definitions shared by all generators
pub mod grid;
/// Generated dungeon data model
pub mod layout;
/// Generation input
pub mod params;
/// Doors on junctions, stairs between levels
pub mod placement;
/// Carves one room per leaf region
pub mod rooms;
/// Turns graph edges into corridors
pub mod router;
/// Deterministic sub-seed derivation
pub mod seed;
/// Reachability and stair reciprocity checks, with bridging repairs
pub mod validator;
/// Tile based generation with wave function collapse
pub mod wfc;

pub use generator::{builder::GeneratorBuilder, DungeonGenerator};
pub use layout::DungeonLayout;
pub use params::{GenerationMode, GenerationParameters};

/// A region larger than the leaf threshold could not be split. Not fatal: the region is kept as a leaf.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("No valid split for region {bounds}, kept as a leaf")]
pub struct PartitionFailure {
    pub bounds: Rect,
}

/// No collision-free corridor was found for a graph edge. Recovered by the validator bridging.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("No corridor from room {from} to room {to} after {attempts} candidate paths")]
pub struct RoutingFailure {
    pub from: RoomId,
    pub to: RoomId,
    pub attempts: u32,
}

/// Some rooms could not be bridged to the entry room
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Rooms {unreached:?} of level {level} cannot be connected to the entry")]
pub struct ConnectivityFailure {
    pub level: i32,
    pub unreached: Vec<RoomId>,
}

/// Two adjacent levels are not linked by reciprocal stairs
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Levels {upper} and {lower} are not linked by reciprocal stairs")]
pub struct StairReciprocityFailure {
    pub upper: i32,
    pub lower: i32,
}

/// The wave function collapse ran out of budget. Not fatal: the level falls back to the partition pipeline.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Tile collapse exhausted ({iterations} iterations, {contradictions} contradictions)")]
pub struct WfcExhausted {
    pub iterations: u32,
    pub contradictions: u32,
}

/// Failure of one level generation attempt. Triggers a retry of the level (or level pair).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LevelFailure {
    #[error("Leaf region {leaf} cannot host a room of the minimum size")]
    RoomSynthesis { leaf: Rect },
    #[error(transparent)]
    Connectivity(#[from] ConnectivityFailure),
    #[error(transparent)]
    StairReciprocity(#[from] StairReciprocityFailure),
}

/// Errors on tile catalogs
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RulesError {
    #[error("Empty tile catalog")]
    NoTiles,
    #[error("Tile sub-grid size must be non-zero")]
    EmptySubGrid,
    #[error("Tile {tile} has a pattern of {found} cells, expected {expected}")]
    PatternSizeMismatch {
        tile: String,
        expected: usize,
        found: usize,
    },
    #[error("Tile {0} has a non-positive weight")]
    InvalidWeight(String),
}

/// Errors returned to the caller of a [`DungeonGenerator`]
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("Invalid generation parameters: {0}")]
    InvalidParameters(#[from] ParametersError),
    #[error("No tile catalog registered under id {catalog:?}")]
    MissingTileCatalog { catalog: String },
    #[error("Invalid tile catalog: {0}")]
    InvalidTileCatalog(#[from] RulesError),
    #[error("Generation exhausted after {attempts} attempts, last failure: {last_failure}")]
    GenerationExhausted {
        /// Parameters of the failed request, for diagnosis
        parameters: Box<GenerationParameters>,
        attempts: u32,
        last_failure: LevelFailure,
    },
}
