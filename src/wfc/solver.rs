use bitvec::{bitvec, order::LocalBits, slice::IterOnes, vec::BitVec};
use ndarray::{Array, Ix3};
use rand::{
    distributions::{Distribution, WeightedIndex},
    rngs::StdRng,
};

#[cfg(feature = "debug-traces")]
use tracing::{debug, trace};

use super::{
    node_heuristic::{InternalNodeSelectionHeuristic, NodeSelectionHeuristic},
    rules::{TileRules, TileVariantIndex},
};
use crate::{
    grid::{direction::ALL_DIRECTIONS, CellIndex, GridDefinition},
    WfcExhausted,
};

/// Default maximum number of collapse steps for one level
pub const DEFAULT_MAX_ITERATIONS: u32 = 4096;
/// Default maximum number of contradictions (each one costs a backtrack) for one level
pub const DEFAULT_MAX_CONTRADICTIONS: u32 = 256;

/// Bounds the work done by the solver before it gives up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WfcBudget {
    pub max_iterations: u32,
    pub max_contradictions: u32,
}

impl Default for WfcBudget {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_contradictions: DEFAULT_MAX_CONTRADICTIONS,
        }
    }
}

/// A cell was left without any possible variant
#[derive(Clone, Copy, Debug)]
struct Contradiction;

struct PropagationEntry {
    cell: CellIndex,
    variant: TileVariantIndex,
}

/// Everything needed to resume the collapse from a given point. Support counts are not stored: they are recomputed from the candidates.
#[derive(Clone)]
struct SolverState {
    /// `candidates[cell * variants_count + variant]` is true (1) if `variant` is still allowed on `cell`
    candidates: BitVec<usize>,
    /// Stores how many variants are still possible for a given cell
    possible_variants_counts: Vec<usize>,
    heuristic: InternalNodeSelectionHeuristic,
}

/// A collapse decision that can be undone
struct Checkpoint {
    cell: CellIndex,
    variant: TileVariantIndex,
    /// State right before the decision
    state: SolverState,
}

/// Fully collapsed tile grid, one variant per tile cell
#[derive(Clone, Debug, PartialEq)]
pub struct SolvedGrid {
    pub grid: GridDefinition,
    /// Row-major
    pub variants: Vec<TileVariantIndex>,
    pub iterations: u32,
    pub contradictions: u32,
}

/// Wave function collapse over a tile grid with AC-4 style support counting and an explicit stack of checkpoints for backtracking.
pub struct TileSolver<'a> {
    rules: &'a TileRules,
    grid: GridDefinition,
    budget: WfcBudget,
    state: SolverState,
    /// The value at `supports_count[cell][variant][direction]` represents the number of supports of `variant` at `cell` from `direction`
    supports_count: Array<usize, Ix3>,
    /// Stack of bans to propagate
    propagation_stack: Vec<PropagationEntry>,
    checkpoints: Vec<Checkpoint>,
    iterations: u32,
    contradictions: u32,
}

impl<'a> TileSolver<'a> {
    pub fn new(
        rules: &'a TileRules,
        grid: GridDefinition,
        heuristic: NodeSelectionHeuristic,
        budget: WfcBudget,
    ) -> Self {
        let variants_count = rules.variants_count();
        let cells_count = grid.total_size();
        Self {
            rules,
            budget,
            state: SolverState {
                candidates: bitvec![1; cells_count * variants_count],
                possible_variants_counts: vec![variants_count; cells_count],
                heuristic: InternalNodeSelectionHeuristic::from_external(
                    heuristic,
                    rules,
                    cells_count,
                ),
            },
            supports_count: Array::zeros((cells_count, variants_count, ALL_DIRECTIONS.len())),
            propagation_stack: Vec::new(),
            checkpoints: Vec::new(),
            iterations: 0,
            contradictions: 0,
            grid,
        }
    }

    #[inline]
    fn is_variant_possible(&self, cell: CellIndex, variant: TileVariantIndex) -> bool {
        self.state.candidates[cell * self.rules.variants_count() + variant]
    }

    pub(crate) fn possible_variants(&self, cell: CellIndex) -> IterOnes<'_, usize, LocalBits> {
        let count = self.rules.variants_count();
        self.state.candidates[cell * count..cell * count + count].iter_ones()
    }

    fn exhausted(&self) -> WfcExhausted {
        let exhausted = WfcExhausted {
            iterations: self.iterations,
            contradictions: self.contradictions,
        };
        #[cfg(feature = "debug-traces")]
        debug!("Solver stopped: {}", exhausted);
        exhausted
    }

    /// Runs the collapse to completion, or until the budget is spent or every choice has been refuted.
    pub fn solve(mut self, rng: &mut StdRng) -> Result<SolvedGrid, WfcExhausted> {
        if self.grid.total_size() == 0 || self.initialize().is_err() {
            return Err(self.exhausted());
        }

        loop {
            let Some(cell) = self
                .state
                .heuristic
                .select_node(&self.state.possible_variants_counts)
            else {
                break;
            };
            if self.iterations >= self.budget.max_iterations {
                return Err(self.exhausted());
            }
            self.iterations += 1;

            let variant = self.select_variant(cell, rng);

            #[cfg(feature = "debug-traces")]
            debug!("Collapse cell {} to variant {}", cell, variant);

            self.checkpoints.push(Checkpoint {
                cell,
                variant,
                state: self.state.clone(),
            });
            self.handle_selected(cell, variant);

            if self.propagate().is_err() {
                loop {
                    self.contradictions += 1;
                    if self.contradictions > self.budget.max_contradictions {
                        return Err(self.exhausted());
                    }
                    match self.backtrack() {
                        Ok(()) => break,
                        Err(BacktrackError::Contradiction) => continue,
                        // Every decision has been refuted
                        Err(BacktrackError::NoCheckpointLeft) => return Err(self.exhausted()),
                    }
                }
            }
        }

        Ok(SolvedGrid {
            variants: self
                .grid
                .indexes()
                .map(|cell| self.possible_variants(cell).next().unwrap_or(0))
                .collect(),
            grid: self.grid,
            iterations: self.iterations,
            contradictions: self.contradictions,
        })
    }

    /// Restores the last checkpoint and bans the choice that led to the contradiction
    fn backtrack(&mut self) -> Result<(), BacktrackError> {
        let Some(checkpoint) = self.checkpoints.pop() else {
            return Err(BacktrackError::NoCheckpointLeft);
        };

        #[cfg(feature = "debug-traces")]
        debug!(
            "Contradiction, backtrack on cell {}, variant {} excluded",
            checkpoint.cell, checkpoint.variant
        );

        self.state = checkpoint.state;
        self.propagation_stack.clear();
        self.recompute_supports();
        self.ban_variant_from_cell(checkpoint.cell, checkpoint.variant)
            .map_err(|_| BacktrackError::Contradiction)?;
        self.propagate().map_err(|_| BacktrackError::Contradiction)
    }

    /// Bans the variants that cannot face the level border, then sets the support counts and propagates the resulting bans.
    fn initialize(&mut self) -> Result<(), Contradiction> {
        for cell in self.grid.indexes() {
            for &direction in ALL_DIRECTIONS {
                if self.grid.next_index(cell, direction).is_some() {
                    continue;
                }
                for variant in 0..self.rules.variants_count() {
                    if self.is_variant_possible(cell, variant)
                        && !self.rules.allowed_on_border(variant, direction)
                    {
                        self.ban_variant_from_cell(cell, variant)?;
                    }
                }
            }
        }
        // Border bans are already accounted for by the recomputed counts
        self.recompute_supports();
        self.propagation_stack.clear();
        for cell in self.grid.indexes() {
            for variant in 0..self.rules.variants_count() {
                if !self.is_variant_possible(cell, variant) {
                    continue;
                }
                let unsupported = ALL_DIRECTIONS.iter().any(|direction| {
                    self.grid.next_index(cell, direction.opposite()).is_some()
                        && self.supports_count[(cell, variant, direction.index())] == 0
                });
                if unsupported {
                    self.ban_variant_from_cell(cell, variant)?;
                }
            }
        }
        self.propagate()
    }

    /// Support counts as they are once every queued ban has been propagated
    fn recompute_supports(&mut self) {
        self.supports_count.fill(0);
        for cell in self.grid.indexes() {
            for &direction in ALL_DIRECTIONS {
                // Supports "from" `direction` come from the neighbour in the opposite direction
                let Some(neighbour) = self.grid.next_index(cell, direction.opposite()) else {
                    continue;
                };
                for variant in 0..self.rules.variants_count() {
                    if !self.is_variant_possible(cell, variant) {
                        continue;
                    }
                    self.supports_count[(cell, variant, direction.index())] = self
                        .rules
                        .allowed_variants(variant, direction.opposite())
                        .iter()
                        .filter(|&&other| self.is_variant_possible(neighbour, other))
                        .count();
                }
            }
        }
    }

    /// Weighted random choice among the variants still possible on `cell`
    fn select_variant(&self, cell: CellIndex, rng: &mut StdRng) -> TileVariantIndex {
        let possible_variants: Vec<TileVariantIndex> = self.possible_variants(cell).collect();
        let weights = possible_variants
            .iter()
            .map(|&variant| self.rules.weight(variant));
        match WeightedIndex::new(weights) {
            Ok(distribution) => possible_variants[distribution.sample(rng)],
            // Weights are validated with the catalog, keep the first candidate if they ever were not
            Err(_) => possible_variants.first().copied().unwrap_or(0),
        }
    }

    fn handle_selected(&mut self, cell: CellIndex, selected: TileVariantIndex) {
        for variant in 0..self.rules.variants_count() {
            if variant == selected || !self.is_variant_possible(cell, variant) {
                continue;
            }
            self.propagation_stack.push(PropagationEntry { cell, variant });
            for &direction in ALL_DIRECTIONS {
                self.supports_count[(cell, variant, direction.index())] = 0;
            }
        }
        let count = self.rules.variants_count();
        for mut bit in self.state.candidates[cell * count..cell * count + count].iter_mut() {
            *bit = false;
        }
        self.state.candidates.set(cell * count + selected, true);
        self.state.possible_variants_counts[cell] = 1;
    }

    /// Returns [`Contradiction`] if the cell has no possible variants left.
    ///
    /// Should only be called with a variant that is still possible for this cell
    fn ban_variant_from_cell(
        &mut self,
        cell: CellIndex,
        variant: TileVariantIndex,
    ) -> Result<(), Contradiction> {
        for &direction in ALL_DIRECTIONS {
            self.supports_count[(cell, variant, direction.index())] = 0;
        }
        self.state
            .candidates
            .set(cell * self.rules.variants_count() + variant, false);
        let variants_left = &mut self.state.possible_variants_counts[cell];
        *variants_left = variants_left.saturating_sub(1);
        let variants_left = *variants_left;
        self.state
            .heuristic
            .handle_ban(cell, variant, self.rules.weight(variant));

        #[cfg(feature = "debug-traces")]
        trace!(
            "Ban variant {} from cell {}, {} variants left",
            variant,
            cell,
            variants_left
        );

        if variants_left == 0 {
            return Err(Contradiction);
        }
        self.propagation_stack.push(PropagationEntry { cell, variant });
        Ok(())
    }

    fn propagate(&mut self) -> Result<(), Contradiction> {
        let rules = self.rules;
        while let Some(from) = self.propagation_stack.pop() {
            for &direction in ALL_DIRECTIONS {
                let Some(to_cell) = self.grid.next_index(from.cell, direction) else {
                    continue;
                };
                // Decrease the support count of all variants previously supported by "from"
                for &variant in rules.allowed_variants(from.variant, direction) {
                    let supports_count =
                        &mut self.supports_count[(to_cell, variant, direction.index())];
                    if *supports_count > 0 {
                        *supports_count -= 1;
                        // Only queue the ban once, when the count reaches 0
                        if *supports_count == 0 {
                            self.ban_variant_from_cell(to_cell, variant)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BacktrackError {
    NoCheckpointLeft,
    Contradiction,
}
