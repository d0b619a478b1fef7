use super::rules::TileRules;
use crate::grid::CellIndex;

/// Defines a heuristic for the choice of the next tile cell to collapse. For some given rules, each heuristic leads to different layouts and different contradiction rates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NodeSelectionHeuristic {
    /// The cell with the minimum count of possible variants remaining is chosen at each step. Ties go to the lowest cell index.
    ///
    /// Similar to `MinimumEntropy` when the tiles have all more or less the same weight.
    #[default]
    MinimumRemainingValue,
    /// The cell with the minimum Shannon entropy (computed from the tile weights) is chosen at each step. Ties go to the lowest cell index.
    MinimumEntropy,
}

/// Heuristic state. Cloned into the solver checkpoints, so restoring a checkpoint restores the entropies.
#[derive(Clone, Debug)]
pub(crate) enum InternalNodeSelectionHeuristic {
    MinimumRemainingValue,
    MinimumEntropy {
        /// Current entropy data for a given cell
        node_entropies: Vec<NodeEntropyData>,
        /// Value of `weight * log(weight)` for a given variant
        variants_weight_log_weights: Vec<f32>,
    },
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct NodeEntropyData {
    /// Shannon entropy of the cell
    entropy: f32,
    /// Sum of the weights of the variants still possible on the cell
    weight_sum: f32,
    /// Sum of `weight * log(weight)` of the variants still possible on the cell
    weight_log_weight_sum: f32,
}

impl NodeEntropyData {
    fn new(weight_sum: f32, weight_log_weight_sum: f32) -> Self {
        Self {
            entropy: entropy(weight_sum, weight_log_weight_sum),
            weight_sum,
            weight_log_weight_sum,
        }
    }
}

fn entropy(weight_sum: f32, weight_log_weight_sum: f32) -> f32 {
    f32::ln(weight_sum) - weight_log_weight_sum / weight_sum
}

impl InternalNodeSelectionHeuristic {
    pub(crate) fn from_external(
        heuristic: NodeSelectionHeuristic,
        rules: &TileRules,
        cells_count: usize,
    ) -> Self {
        match heuristic {
            NodeSelectionHeuristic::MinimumRemainingValue => {
                InternalNodeSelectionHeuristic::MinimumRemainingValue
            }
            NodeSelectionHeuristic::MinimumEntropy => {
                let mut variants_weight_log_weights = Vec::with_capacity(rules.variants_count());
                let mut weight_sum = 0.;
                let mut weight_log_weight_sum = 0.;
                for variant in 0..rules.variants_count() {
                    let weight = rules.weight(variant);
                    let weight_log_weight = weight * f32::ln(weight);
                    variants_weight_log_weights.push(weight_log_weight);
                    weight_sum += weight;
                    weight_log_weight_sum += weight_log_weight;
                }
                InternalNodeSelectionHeuristic::MinimumEntropy {
                    node_entropies: vec![
                        NodeEntropyData::new(weight_sum, weight_log_weight_sum);
                        cells_count
                    ],
                    variants_weight_log_weights,
                }
            }
        }
    }

    pub(crate) fn handle_ban(&mut self, cell: CellIndex, variant: usize, weight: f32) {
        if let InternalNodeSelectionHeuristic::MinimumEntropy {
            node_entropies,
            variants_weight_log_weights,
        } = self
        {
            let node_entropy = &mut node_entropies[cell];
            node_entropy.weight_sum -= weight;
            node_entropy.weight_log_weight_sum -= variants_weight_log_weights[variant];
            node_entropy.entropy =
                entropy(node_entropy.weight_sum, node_entropy.weight_log_weight_sum);
        }
    }

    /// Picks a cell that is not collapsed yet, `None` if every cell is collapsed
    pub(crate) fn select_node(&self, possible_variants_counts: &[usize]) -> Option<CellIndex> {
        let mut min = f32::MAX;
        let mut picked_node = None;
        for (index, &possibilities_count) in possible_variants_counts.iter().enumerate() {
            if possibilities_count <= 1 {
                continue;
            }
            let value = match self {
                InternalNodeSelectionHeuristic::MinimumRemainingValue => possibilities_count as f32,
                InternalNodeSelectionHeuristic::MinimumEntropy { node_entropies, .. } => {
                    node_entropies[index].entropy
                }
            };
            // Strict comparison: the lowest index wins ties
            if value < min {
                min = value;
                picked_node = Some(index);
            }
        }
        picked_node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wfc::tile::{Connector, Tile, TileCatalog};

    fn rules() -> TileRules {
        TileRules::new(&TileCatalog::new(
            "test",
            1,
            vec![
                Tile::new("a", &["."], [Connector::Open; 4]),
                Tile::new("b", &["#"], [Connector::Wall; 4]).with_weight(8.),
                Tile::new("c", &["#"], [Connector::Corner; 4]),
            ],
        ))
        .unwrap()
    }

    #[test]
    fn minimum_remaining_value_prefers_lowest_index_on_ties() {
        let heuristic = InternalNodeSelectionHeuristic::from_external(
            NodeSelectionHeuristic::MinimumRemainingValue,
            &rules(),
            4,
        );
        assert_eq!(heuristic.select_node(&[3, 2, 2, 3]), Some(1));
        assert_eq!(heuristic.select_node(&[1, 1, 1, 1]), None);
    }

    #[test]
    fn minimum_entropy_follows_bans() {
        let rules = rules();
        let mut heuristic = InternalNodeSelectionHeuristic::from_external(
            NodeSelectionHeuristic::MinimumEntropy,
            &rules,
            3,
        );
        assert_eq!(heuristic.select_node(&[3, 3, 3]), Some(0));

        // Cell 2 keeps the heavy tile and one light tile: its entropy drops below the others
        heuristic.handle_ban(2, 0, rules.weight(0));
        assert_eq!(heuristic.select_node(&[3, 3, 2]), Some(2));
    }
}
