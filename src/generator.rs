use std::{collections::BTreeMap, sync::Arc};

use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::{
    connectivity::build_room_graph,
    grid::GridDefinition,
    layout::{DungeonLayout, EntryPoint, ExitPoint, Level, RoomId},
    params::{GenerationMode, GenerationParameters},
    partition::{partition, PartitionSettings},
    placement::{place_doors, place_stairs},
    rooms::{assign_room_kinds, synthesize_rooms},
    router::{route_corridors, RoomOccupancy},
    seed::{derive_level_seed, derive_stream_seed, seeded_rng, STAIRS_STREAM},
    validator::{check_level_pair, ensure_connectivity},
    wfc::{
        generate_tile_level, node_heuristic::NodeSelectionHeuristic, rules::TileRules,
        solver::WfcBudget,
    },
    GeneratorError, LevelFailure, StairReciprocityFailure,
};

use self::builder::{GeneratorBuilder, Unset};

/// Defines a [`GeneratorBuilder`] used to create a [`DungeonGenerator`]
pub mod builder;

/// Density is multiplied by this factor on each level retry
const DENSITY_RELAXATION: f32 = 0.75;
/// Lowest density a retry may relax to
const MIN_RELAXED_DENSITY: f32 = 0.05;

/// Builds [`DungeonLayout`]s from validated [`GenerationParameters`].
///
/// A generator holds no mutable state: [`DungeonGenerator::generate`] only reads it, so the same
/// generator can be shared between threads and always returns the same layout.
#[derive(Clone, Debug)]
pub struct DungeonGenerator {
    // Configuration
    parameters: GenerationParameters,
    max_retry_count: u32,
    routing_attempts: u32,
    wfc_budget: WfcBudget,
    node_heuristic: NodeSelectionHeuristic,

    /// Tile rules, keyed by catalog id
    catalogs: BTreeMap<String, Arc<TileRules>>,
}

impl DungeonGenerator {
    /// Returns a new `GeneratorBuilder`
    pub fn builder() -> GeneratorBuilder<Unset> {
        GeneratorBuilder::new()
    }

    pub fn parameters(&self) -> &GenerationParameters {
        &self.parameters
    }

    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    /// Generates every level, links adjacent levels with stairs and tags the rooms.
    ///
    /// Returns a fully validated layout, or an error. A failed level is retried with a new sub-seed
    /// and a relaxed room density, up to `max_retry_count` attempts.
    pub fn generate(&self) -> Result<DungeonLayout, GeneratorError> {
        let levels_count = self.parameters.levels;
        let mut attempts = vec![0; levels_count as usize];
        let mut levels = Vec::with_capacity(levels_count as usize);
        for ordinal in 0..levels_count {
            let (level, attempt) = self.generate_level_with_retries(ordinal, 0)?;
            attempts[ordinal as usize] = attempt;
            levels.push(level);
        }

        self.link_levels_with_retries(&mut levels, &mut attempts)?;

        let mut exits = Vec::new();
        let last_ordinal = levels.len().saturating_sub(1);
        for (ordinal, level) in levels.iter_mut().enumerate() {
            if let Some(room) = assign_room_kinds(level, ordinal == last_ordinal) {
                exits.push(ExitPoint {
                    level: level.index,
                    room,
                });
            }
            level.refresh_connections();
        }

        info!(
            "Generated dungeon with seed {}: {} levels, {} rooms",
            self.parameters.seed,
            levels.len(),
            levels.iter().map(|level| level.rooms.len()).sum::<usize>()
        );

        Ok(DungeonLayout {
            seed: self.parameters.seed,
            levels,
            entry: EntryPoint {
                level: 0,
                room: RoomId(0),
            },
            exits,
        })
    }

    /// Links the levels with stairs. A pair that fails the stair check is regenerated with the next
    /// attempt of both its levels, then every pair is linked again.
    fn link_levels_with_retries(
        &self,
        levels: &mut [Level],
        attempts: &mut [u32],
    ) -> Result<(), GeneratorError> {
        let mut stair_retries = 0;
        while let Err(failure) = self.link_levels(levels) {
            stair_retries += 1;
            if stair_retries >= self.max_retry_count {
                return Err(self.exhausted(stair_retries, failure.into()));
            }
            info!(
                "{}, regenerating both levels (retry {}/{})",
                failure, stair_retries, self.max_retry_count
            );
            for index in [failure.upper, failure.lower] {
                let ordinal = index.unsigned_abs() as usize;
                let (level, attempt) =
                    self.generate_level_with_retries(ordinal as u32, attempts[ordinal] + 1)?;
                attempts[ordinal] = attempt;
                levels[ordinal] = level;
            }
        }
        Ok(())
    }

    /// Places the stairs of every adjacent pair, top to bottom, and checks them. Stairs placed
    /// before are discarded so that a replay yields the same ids.
    fn link_levels(&self, levels: &mut [Level]) -> Result<(), StairReciprocityFailure> {
        for level in levels.iter_mut() {
            level.stairs.clear();
        }
        let mut next_stair_id = 0;
        for pair in 1..levels.len() {
            let (above, below) = levels.split_at_mut(pair);
            let (upper, lower) = (&mut above[pair - 1], &mut below[0]);
            let stream = STAIRS_STREAM ^ pair as u64;
            let mut rng = seeded_rng(derive_stream_seed(self.parameters.seed, stream));
            place_stairs(upper, lower, &mut next_stair_id, &mut rng);
            check_level_pair(upper, lower)?;
        }
        Ok(())
    }

    /// Generates the `ordinal`-th level starting at `first_attempt`. Returns the level and the
    /// attempt that produced it.
    fn generate_level_with_retries(
        &self,
        ordinal: u32,
        first_attempt: u32,
    ) -> Result<(Level, u32), GeneratorError> {
        let mut attempt = first_attempt;
        loop {
            let density = self.relaxed_density(attempt);
            let seed = derive_level_seed(self.parameters.seed, ordinal, attempt);
            let failure = match self.generate_level(ordinal, density, &mut seeded_rng(seed)) {
                Ok(level) => return Ok((level, attempt)),
                Err(failure) => failure,
            };

            attempt += 1;
            if attempt >= self.max_retry_count {
                return Err(self.exhausted(attempt, failure));
            }
            warn!(
                "Level {} failed: {}, retrying {}/{} with density {}",
                -(ordinal as i32),
                failure,
                attempt,
                self.max_retry_count,
                self.relaxed_density(attempt)
            );
        }
    }

    fn relaxed_density(&self, attempt: u32) -> f32 {
        let density = self.parameters.room_density;
        let relaxed = density * DENSITY_RELAXATION.powi(attempt as i32);
        relaxed.max(MIN_RELAXED_DENSITY.min(density))
    }

    /// One attempt at one level, every component drawing from the same `rng`
    fn generate_level(
        &self,
        ordinal: u32,
        density: f32,
        rng: &mut StdRng,
    ) -> Result<Level, LevelFailure> {
        let parameters = &self.parameters;
        let index = -(ordinal as i32);

        let tiled = match (parameters.mode, parameters.tile_catalog.as_ref()) {
            (GenerationMode::Tile, Some(catalog)) => self.generate_tiled_level(index, catalog, rng),
            _ => None,
        };
        let mut level = match tiled {
            Some(level) => level,
            None => self.generate_partitioned_level(index, density, rng)?,
        };

        let report = ensure_connectivity(&mut level, parameters.secret_door_ratio, rng)?;
        if !report.bridged_rooms.is_empty() {
            info!(
                "Level {}: bridged rooms {:?} with {} corridors",
                index, report.bridged_rooms, report.added_corridors
            );
        }
        Ok(level)
    }

    /// Tile mode. Returns `None` when the collapse is exhausted, so that the level falls back to the
    /// partition pipeline.
    fn generate_tiled_level(&self, index: i32, catalog: &str, rng: &mut StdRng) -> Option<Level> {
        let parameters = &self.parameters;
        let Some(rules) = self.catalogs.get(catalog) else {
            warn!(
                "Level {}: no rules for catalog {:?}, falling back to partition",
                index, catalog
            );
            return None;
        };
        match generate_tile_level(
            rules,
            index,
            parameters.width,
            parameters.height,
            parameters.min_room_size,
            parameters.max_room_size,
            self.node_heuristic,
            self.wfc_budget,
            rng,
        ) {
            Ok((mut level, junctions)) => {
                place_doors(&mut level, &junctions, parameters.secret_door_ratio, rng);
                Some(level)
            }
            Err(exhausted) => {
                info!("Level {}: {}, falling back to partition", index, exhausted);
                None
            }
        }
    }

    fn generate_partitioned_level(
        &self,
        index: i32,
        density: f32,
        rng: &mut StdRng,
    ) -> Result<Level, LevelFailure> {
        let parameters = &self.parameters;
        let grid = GridDefinition::new(parameters.width, parameters.height);
        let settings = PartitionSettings::new(
            parameters.min_room_size,
            parameters.max_room_size,
            density,
            parameters.width,
            parameters.height,
        );
        let partition = partition(grid.bounds(), &settings, rng);
        for failure in &partition.failures {
            info!("Level {}: {}", index, failure);
        }

        let rooms = synthesize_rooms(
            &partition.tree.leaf_bounds(),
            parameters.min_room_size,
            parameters.max_room_size,
            rng,
        )?;
        let bounds: Vec<_> = rooms.iter().map(|room| room.bounds).collect();
        let graph = build_room_graph(&bounds, parameters.extra_connections_ratio, rng);

        let occupancy = RoomOccupancy::new(grid, &rooms);
        let routing = route_corridors(
            &occupancy,
            &rooms,
            graph.edges(),
            self.routing_attempts,
            0,
            rng,
        );

        let mut level = Level::new(index, parameters.width, parameters.height);
        level.rooms = rooms;
        level.corridors = routing.corridors;
        place_doors(&mut level, &routing.junctions, parameters.secret_door_ratio, rng);
        Ok(level)
    }

    fn exhausted(&self, attempts: u32, last_failure: LevelFailure) -> GeneratorError {
        GeneratorError::GenerationExhausted {
            parameters: Box::new(self.parameters.clone()),
            attempts,
            last_failure,
        }
    }
}
