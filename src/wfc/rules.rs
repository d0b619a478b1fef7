use ndarray::{Array, Ix2};

#[cfg(feature = "debug-traces")]
use tracing::trace;

use super::tile::{Connector, TileCatalog, TileIndex, TileRotation};
use crate::{
    grid::direction::{Direction, ALL_DIRECTIONS},
    RulesError,
};

/// Index of a rotated tile variant in [`TileRules`]
pub type TileVariantIndex = usize;

/// One allowed rotation of a catalog tile
#[derive(Clone, Debug, PartialEq)]
pub struct TileVariant {
    /// Index of the tile in its catalog
    pub tile: TileIndex,
    pub rotation: TileRotation,
    pub connectors: [Connector; 4],
    /// Row-major, `true` for open cells
    pub pattern: Vec<bool>,
    pub weight: f32,
}

/// Adjacency rules derived from a [`TileCatalog`]. A same set of [`TileRules`] can be shared by every level generation.
#[derive(Clone, Debug)]
pub struct TileRules {
    catalog_id: String,
    sub_size: u32,
    variants: Vec<TileVariant>,
    /// `allowed_neighbours[(variant, direction)]` holds all the variants allowed next to `variant` in `direction`, in increasing order.
    allowed_neighbours: Array<Vec<TileVariantIndex>, Ix2>,
}

impl TileRules {
    /// Expands every tile into its allowed rotations and computes which variants may face each other.
    pub fn new(catalog: &TileCatalog) -> Result<TileRules, RulesError> {
        catalog.validate()?;

        let mut variants = Vec::new();
        for (tile_index, tile) in catalog.tiles.iter().enumerate() {
            for &rotation in &tile.rotations {
                variants.push(TileVariant {
                    tile: tile_index,
                    rotation,
                    connectors: tile.rotated_connectors(rotation),
                    pattern: tile.rotated_pattern(rotation),
                    weight: tile.weight,
                });
            }
        }

        let mut allowed_neighbours =
            Array::from_elem((variants.len(), ALL_DIRECTIONS.len()), Vec::new());
        for (index, variant) in variants.iter().enumerate() {
            for &direction in ALL_DIRECTIONS {
                let connector = variant.connectors[direction.index()];
                let facing = direction.opposite().index();
                allowed_neighbours[(index, direction.index())] = variants
                    .iter()
                    .enumerate()
                    .filter(|(_, other)| connector.is_compatible(other.connectors[facing]))
                    .map(|(other_index, _)| other_index)
                    .collect();
            }
        }

        #[cfg(feature = "debug-traces")]
        trace!(
            "Built rules for catalog {}: {} variants, allowed_neighbours: {:?}",
            catalog.id,
            variants.len(),
            allowed_neighbours
        );

        Ok(TileRules {
            catalog_id: catalog.id.clone(),
            sub_size: catalog.sub_size,
            variants,
            allowed_neighbours,
        })
    }

    #[inline]
    pub(crate) fn allowed_variants(
        &self,
        variant: TileVariantIndex,
        direction: Direction,
    ) -> &Vec<TileVariantIndex> {
        &self.allowed_neighbours[(variant, direction.index())]
    }

    /// `true` if `variant` may sit on the border of the level with its `direction` edge facing outwards
    #[inline]
    pub(crate) fn allowed_on_border(
        &self,
        variant: TileVariantIndex,
        direction: Direction,
    ) -> bool {
        self.variants[variant].connectors[direction.index()].is_enclosing()
    }

    #[inline]
    pub(crate) fn weight(&self, variant: TileVariantIndex) -> f32 {
        self.variants[variant].weight
    }

    /// Returns the number of variants (rotations included)
    #[inline]
    pub fn variants_count(&self) -> usize {
        self.variants.len()
    }

    #[inline]
    pub fn variant(&self, index: TileVariantIndex) -> &TileVariant {
        &self.variants[index]
    }

    pub fn catalog_id(&self) -> &str {
        &self.catalog_id
    }

    pub fn sub_size(&self) -> u32 {
        self.sub_size
    }
}
