use rand::rngs::StdRng;

use crate::{
    grid::GridDefinition,
    layout::{Junction, Level},
    WfcExhausted,
};

use self::{
    extract::extract_level,
    node_heuristic::NodeSelectionHeuristic,
    rules::TileRules,
    solver::{TileSolver, WfcBudget},
};

/// Reads rooms, corridors and junctions back from a collapsed tile grid
pub mod extract;
/// Defines the heuristics used to choose the next tile cell to collapse
pub mod node_heuristic;
/// Adjacency rules between rotated tile variants
pub mod rules;
/// Collapse, propagation and backtracking
pub mod solver;
/// Tile catalogs, tiles and connectors
pub mod tile;

/// Tile generation of one level: collapse a tile grid covering the level, then read its rooms and corridors.
///
/// Returns the level along with the junctions that still need doors. Fails with [`WfcExhausted`] if the collapse runs out of budget, or if the collapsed grid holds no room at all.
#[allow(clippy::too_many_arguments)]
pub fn generate_tile_level(
    rules: &TileRules,
    index: i32,
    width: u32,
    height: u32,
    min_room_size: u32,
    max_room_size: u32,
    heuristic: NodeSelectionHeuristic,
    budget: WfcBudget,
    rng: &mut StdRng,
) -> Result<(Level, Vec<Junction>), WfcExhausted> {
    let sub_size = rules.sub_size().max(1);
    let tile_grid = GridDefinition::new(width / sub_size, height / sub_size);
    let solved = TileSolver::new(rules, tile_grid, heuristic, budget).solve(rng)?;

    let extraction = extract_level(
        rules,
        &solved,
        GridDefinition::new(width, height),
        min_room_size,
        max_room_size,
    );
    if extraction.rooms.is_empty() {
        let exhausted = WfcExhausted {
            iterations: solved.iterations,
            contradictions: solved.contradictions,
        };
        #[cfg(feature = "debug-traces")]
        tracing::debug!("Level {}: collapsed tile grid holds no room", index);
        return Err(exhausted);
    }

    let mut level = Level::new(index, width, height);
    level.rooms = extraction.rooms;
    level.corridors = extraction.corridors;
    level.tiles = Some(extraction.tiles);
    Ok((level, extraction.junctions))
}
