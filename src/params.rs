use serde::{Deserialize, Serialize};

/// Default grid width, in cells
pub const DEFAULT_WIDTH: u32 = 48;
/// Default grid height, in cells
pub const DEFAULT_HEIGHT: u32 = 32;
pub const DEFAULT_LEVELS: u32 = 1;
pub const DEFAULT_MIN_ROOM_SIZE: u32 = 3;
pub const DEFAULT_MAX_ROOM_SIZE: u32 = 8;
pub const DEFAULT_ROOM_DENSITY: f32 = 0.5;
pub const DEFAULT_EXTRA_CONNECTIONS_RATIO: f32 = 0.25;
pub const DEFAULT_SECRET_DOOR_RATIO: f32 = 0.10;

/// Errors detected on [`GenerationParameters`] before any generation happens
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParametersError {
    #[error("Grid dimensions must be non-zero, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("A dungeon needs at least one level")]
    NoLevels,
    #[error("Invalid room size range [{min}, {max}]")]
    InvalidRoomSize { min: u32, max: u32 },
    #[error("Room density must be in (0, 1], got {0}")]
    InvalidDensity(f32),
    #[error("Ratio `{name}` must be in [0, 1], got {value}")]
    InvalidRatio { name: &'static str, value: f32 },
    #[error("Tile mode requires a tile catalog id")]
    MissingCatalogId,
    #[error("Failed to parse parameters: {0}")]
    Parse(String),
}

/// Which generator builds the levels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Space partition, spanning tree and corridor routing
    #[default]
    Partition,
    /// Wave function collapse over a tile catalog, falling back to [`GenerationMode::Partition`] when exhausted
    Tile,
}

/// Immutable input of a generation. For a given seed, fully determines the generated [`crate::DungeonLayout`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParameters {
    pub width: u32,
    pub height: u32,
    pub levels: u32,
    pub min_room_size: u32,
    pub max_room_size: u32,
    /// Target share of the grid covered by rooms, in (0, 1]. Drives how finely the grid is partitioned.
    pub room_density: f32,
    /// Extra corridors added on top of the spanning tree, as a fraction of the room count
    pub extra_connections_ratio: f32,
    /// Fraction of non-locked doors turned into secret doors
    pub secret_door_ratio: f32,
    pub mode: GenerationMode,
    pub seed: u64,
    /// Id of the tile catalog used in [`GenerationMode::Tile`]
    pub tile_catalog: Option<String>,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            levels: DEFAULT_LEVELS,
            min_room_size: DEFAULT_MIN_ROOM_SIZE,
            max_room_size: DEFAULT_MAX_ROOM_SIZE,
            room_density: DEFAULT_ROOM_DENSITY,
            extra_connections_ratio: DEFAULT_EXTRA_CONNECTIONS_RATIO,
            secret_door_ratio: DEFAULT_SECRET_DOOR_RATIO,
            mode: GenerationMode::Partition,
            seed: 0,
            tile_catalog: None,
        }
    }
}

impl GenerationParameters {
    /// Returns a [`GenerationParametersBuilder`] starting from the default values
    pub fn builder() -> GenerationParametersBuilder {
        GenerationParametersBuilder::default()
    }

    /// Deserializes parameters from JSON (missing fields take their default value) and validates them
    pub fn from_json(json: &str) -> Result<GenerationParameters, ParametersError> {
        let parameters: GenerationParameters =
            serde_json::from_str(json).map_err(|err| ParametersError::Parse(err.to_string()))?;
        parameters.validate()?;
        Ok(parameters)
    }

    /// Checks the parameters consistency.
    ///
    /// A minimum room size that does not fit in the grid is accepted here: generation will exhaust its retries instead.
    pub fn validate(&self) -> Result<(), ParametersError> {
        if self.width == 0 || self.height == 0 {
            return Err(ParametersError::EmptyGrid {
                width: self.width,
                height: self.height,
            });
        }
        if self.levels == 0 {
            return Err(ParametersError::NoLevels);
        }
        if self.min_room_size == 0 || self.min_room_size > self.max_room_size {
            return Err(ParametersError::InvalidRoomSize {
                min: self.min_room_size,
                max: self.max_room_size,
            });
        }
        if !(self.room_density > 0. && self.room_density <= 1.) {
            return Err(ParametersError::InvalidDensity(self.room_density));
        }
        for (name, value) in [
            ("extra_connections_ratio", self.extra_connections_ratio),
            ("secret_door_ratio", self.secret_door_ratio),
        ] {
            if !(0. ..=1.).contains(&value) {
                return Err(ParametersError::InvalidRatio { name, value });
            }
        }
        if self.mode == GenerationMode::Tile && self.tile_catalog.is_none() {
            return Err(ParametersError::MissingCatalogId);
        }
        Ok(())
    }
}

/// Used to create validated [`GenerationParameters`]
///
/// ### Example
///
/// ```
/// use ghx_dungeon_gen::params::GenerationParameters;
///
/// let parameters = GenerationParameters::builder()
///     .with_grid_size(20, 20)
///     .with_room_size(2, 6)
///     .with_room_density(0.3)
///     .with_seed(42)
///     .build()
///     .unwrap();
/// assert_eq!(parameters.levels, 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct GenerationParametersBuilder {
    parameters: GenerationParameters,
}

impl GenerationParametersBuilder {
    pub fn with_grid_size(mut self, width: u32, height: u32) -> Self {
        self.parameters.width = width;
        self.parameters.height = height;
        self
    }

    pub fn with_levels(mut self, levels: u32) -> Self {
        self.parameters.levels = levels;
        self
    }

    pub fn with_room_size(mut self, min: u32, max: u32) -> Self {
        self.parameters.min_room_size = min;
        self.parameters.max_room_size = max;
        self
    }

    pub fn with_room_density(mut self, density: f32) -> Self {
        self.parameters.room_density = density;
        self
    }

    pub fn with_extra_connections_ratio(mut self, ratio: f32) -> Self {
        self.parameters.extra_connections_ratio = ratio;
        self
    }

    pub fn with_secret_door_ratio(mut self, ratio: f32) -> Self {
        self.parameters.secret_door_ratio = ratio;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.parameters.seed = seed;
        self
    }

    /// Switches to [`GenerationMode::Tile`] using the catalog registered under `catalog_id`
    pub fn with_tile_catalog<S: Into<String>>(mut self, catalog_id: S) -> Self {
        self.parameters.mode = GenerationMode::Tile;
        self.parameters.tile_catalog = Some(catalog_id.into());
        self
    }

    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.parameters.mode = mode;
        self
    }

    pub fn build(self) -> Result<GenerationParameters, ParametersError> {
        self.parameters.validate()?;
        Ok(self.parameters)
    }
}
