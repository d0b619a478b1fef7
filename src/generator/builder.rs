use std::{collections::BTreeMap, marker::PhantomData, sync::Arc};

use crate::{
    params::{GenerationMode, GenerationParameters},
    router::DEFAULT_ROUTING_ATTEMPTS,
    wfc::{
        node_heuristic::NodeSelectionHeuristic,
        rules::TileRules,
        solver::WfcBudget,
        tile::TileCatalog,
    },
    GeneratorError,
};

use super::DungeonGenerator;

/// Default number of attempts for a level before the generation is declared exhausted
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 8;

/// Internal type used to provide a type-safe builder
pub enum Set {}
/// Internal type used to provide a type-safe builder
pub enum Unset {}

/// Used to instantiate a [`DungeonGenerator`]. Parameters are required, every other setting has a default value.
///
/// ### Example
///
/// ```
/// use ghx_dungeon_gen::{DungeonGenerator, GenerationParameters};
///
/// let parameters = GenerationParameters::builder()
///     .with_grid_size(30, 20)
///     .with_seed(7)
///     .build()
///     .unwrap();
/// let generator = DungeonGenerator::builder()
///     .with_parameters(parameters)
///     .with_max_retry_count(4)
///     .build()
///     .unwrap();
/// let layout = generator.generate().unwrap();
/// assert_eq!(layout.levels.len(), 1);
/// ```
pub struct GeneratorBuilder<P> {
    parameters: Option<GenerationParameters>,
    max_retry_count: u32,
    routing_attempts: u32,
    wfc_budget: WfcBudget,
    node_heuristic: NodeSelectionHeuristic,
    catalogs: Vec<TileCatalog>,
    shared_rules: Vec<Arc<TileRules>>,
    typestate: PhantomData<P>,
}

impl GeneratorBuilder<Unset> {
    /// Creates a [`GeneratorBuilder`] with its values set to their default.
    pub fn new() -> Self {
        Self {
            parameters: None,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            routing_attempts: DEFAULT_ROUTING_ATTEMPTS,
            wfc_budget: WfcBudget::default(),
            node_heuristic: NodeSelectionHeuristic::default(),
            catalogs: Vec::new(),
            shared_rules: Vec::new(),
            typestate: PhantomData,
        }
    }

    /// Sets the [`GenerationParameters`] to be used by the [`DungeonGenerator`]. They are validated on [`GeneratorBuilder::build`].
    pub fn with_parameters(self, parameters: GenerationParameters) -> GeneratorBuilder<Set> {
        GeneratorBuilder {
            parameters: Some(parameters),
            max_retry_count: self.max_retry_count,
            routing_attempts: self.routing_attempts,
            wfc_budget: self.wfc_budget,
            node_heuristic: self.node_heuristic,
            catalogs: self.catalogs,
            shared_rules: self.shared_rules,
            typestate: PhantomData,
        }
    }
}

impl Default for GeneratorBuilder<Unset> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> GeneratorBuilder<P> {
    /// Specifies how many attempts a level gets before the generation fails. Values below 1 are raised to 1.
    pub fn with_max_retry_count(mut self, max_retry_count: u32) -> Self {
        self.max_retry_count = max_retry_count.max(1);
        self
    }

    /// Number of candidate paths tried by the corridor router for each room pair
    pub fn with_routing_attempts(mut self, routing_attempts: u32) -> Self {
        self.routing_attempts = routing_attempts.max(1);
        self
    }

    /// Budget of one tile collapse. Past it, the level falls back to the partition pipeline.
    pub fn with_wfc_budget(mut self, max_iterations: u32, max_contradictions: u32) -> Self {
        self.wfc_budget = WfcBudget {
            max_iterations,
            max_contradictions,
        };
        self
    }

    pub fn with_node_heuristic(mut self, heuristic: NodeSelectionHeuristic) -> Self {
        self.node_heuristic = heuristic;
        self
    }

    /// Registers a tile catalog under its own id. Its rules are built on [`GeneratorBuilder::build`].
    pub fn with_catalog(mut self, catalog: TileCatalog) -> Self {
        self.catalogs.push(catalog);
        self
    }

    /// Registers rules that were already built, possibly shared with other generators
    pub fn with_shared_rules(mut self, rules: Arc<TileRules>) -> Self {
        self.shared_rules.push(rules);
        self
    }
}

impl GeneratorBuilder<Set> {
    /// Validates the parameters, builds the tile rules and instantiates the [`DungeonGenerator`].
    ///
    /// Fails if the parameters are invalid, if a catalog is invalid, or if tile mode references a catalog that was not registered.
    pub fn build(self) -> Result<DungeonGenerator, GeneratorError> {
        let parameters = self.parameters.unwrap_or_default();
        parameters.validate()?;

        let mut catalogs = BTreeMap::new();
        for rules in self.shared_rules {
            catalogs.insert(rules.catalog_id().to_owned(), rules);
        }
        for catalog in &self.catalogs {
            catalogs.insert(catalog.id.clone(), Arc::new(TileRules::new(catalog)?));
        }

        if parameters.mode == GenerationMode::Tile {
            if let Some(catalog) = &parameters.tile_catalog {
                if !catalogs.contains_key(catalog) {
                    return Err(GeneratorError::MissingTileCatalog {
                        catalog: catalog.clone(),
                    });
                }
            }
        }

        Ok(DungeonGenerator {
            parameters,
            max_retry_count: self.max_retry_count,
            routing_attempts: self.routing_attempts,
            wfc_budget: self.wfc_budget,
            node_heuristic: self.node_heuristic,
            catalogs,
        })
    }
}
