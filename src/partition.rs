use rand::{rngs::StdRng, Rng};

#[cfg(feature = "debug-traces")]
use tracing::trace;

use crate::{grid::Rect, PartitionFailure};

/// Cells reserved on each side of a leaf for corridors
pub const MARGIN: u32 = 1;

/// Index of a node in a [`PartitionTree`]
pub type PartitionNodeIndex = usize;

/// Split direction of an inner node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitAxis {
    /// The region is cut by a vertical line, its width is divided
    Vertical,
    /// The region is cut by a horizontal line, its height is divided
    Horizontal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PartitionNode {
    pub bounds: Rect,
    pub depth: u32,
    pub parent: Option<PartitionNodeIndex>,
    /// `None` for a leaf
    pub children: Option<[PartitionNodeIndex; 2]>,
    pub split: Option<SplitAxis>,
}

impl PartitionNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Binary space partition stored as an arena. The root is at index 0.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionTree {
    nodes: Vec<PartitionNode>,
}

impl PartitionTree {
    pub fn nodes(&self) -> &[PartitionNode] {
        &self.nodes
    }

    pub fn node(&self, index: PartitionNodeIndex) -> &PartitionNode {
        &self.nodes[index]
    }

    /// Leaf indexes in depth-first order, first child before second child
    pub fn leaves(&self) -> Vec<PartitionNodeIndex> {
        let mut leaves = Vec::new();
        let mut stack = vec![0];
        while let Some(index) = stack.pop() {
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            match node.children {
                Some([first, second]) => {
                    stack.push(second);
                    stack.push(first);
                }
                None => leaves.push(index),
            }
        }
        leaves
    }

    /// Bounds of the leaves, in [`PartitionTree::leaves`] order
    pub fn leaf_bounds(&self) -> Vec<Rect> {
        self.leaves()
            .into_iter()
            .map(|index| self.nodes[index].bounds)
            .collect()
    }
}

/// Stop conditions and split constraints of the partitioner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionSettings {
    /// No split may produce a side below this
    pub min_leaf_size: u32,
    /// Regions whose larger side is below this are not split further
    pub stop_size: u32,
    pub max_depth: u32,
}

impl PartitionSettings {
    /// Derives the settings from the room size constraints and the requested room density on a `width`x`height` grid.
    pub fn new(
        min_room_size: u32,
        max_room_size: u32,
        density: f32,
        width: u32,
        height: u32,
    ) -> Self {
        let average_footprint = (min_room_size + max_room_size) as f32 / 2. + (2 * MARGIN) as f32;
        let target_rooms =
            (density * (width as f32 * height as f32) / (average_footprint * average_footprint))
                .ceil()
                .max(1.);
        Self {
            min_leaf_size: min_room_size + 2 * MARGIN,
            stop_size: max_room_size + 2 * MARGIN,
            max_depth: target_rooms.log2().ceil() as u32,
        }
    }
}

/// Result of a partition: the tree, and the regions that should have been split but could not be.
#[derive(Clone, Debug)]
pub struct Partition {
    pub tree: PartitionTree,
    pub failures: Vec<PartitionFailure>,
}

/// Recursively splits `bounds` into leaf regions.
pub fn partition(bounds: Rect, settings: &PartitionSettings, rng: &mut StdRng) -> Partition {
    let mut nodes = vec![PartitionNode {
        bounds,
        depth: 0,
        parent: None,
        children: None,
        split: None,
    }];
    let mut failures = Vec::new();

    // Explicit work stack instead of recursion
    let mut to_split = vec![0];
    while let Some(index) = to_split.pop() {
        let PartitionNode { bounds, depth, .. } = nodes[index];
        if depth >= settings.max_depth || bounds.width.max(bounds.height) < settings.stop_size {
            continue;
        }

        let Some(axis) = choose_axis(&bounds, settings.min_leaf_size, rng) else {
            #[cfg(feature = "debug-traces")]
            trace!("Partition failure on region {}", bounds);
            failures.push(PartitionFailure { bounds });
            continue;
        };
        let [first, second] = split(&bounds, axis, settings.min_leaf_size, rng);

        #[cfg(feature = "debug-traces")]
        trace!("Split {} {:?} into {} and {}", bounds, axis, first, second);

        let first_index = nodes.len();
        for child in [first, second] {
            nodes.push(PartitionNode {
                bounds: child,
                depth: depth + 1,
                parent: Some(index),
                children: None,
                split: None,
            });
        }
        nodes[index].children = Some([first_index, first_index + 1]);
        nodes[index].split = Some(axis);
        to_split.push(first_index + 1);
        to_split.push(first_index);
    }

    Partition {
        tree: PartitionTree { nodes },
        failures,
    }
}

/// When both axes are eligible, the vertical cut is picked with a probability proportional to the region's width share, which avoids slivers.
fn choose_axis(bounds: &Rect, min_leaf_size: u32, rng: &mut StdRng) -> Option<SplitAxis> {
    let vertical = bounds.width >= 2 * min_leaf_size;
    let horizontal = bounds.height >= 2 * min_leaf_size;
    match (vertical, horizontal) {
        (false, false) => None,
        (true, false) => Some(SplitAxis::Vertical),
        (false, true) => Some(SplitAxis::Horizontal),
        (true, true) => {
            let width_share = f64::from(bounds.width) / f64::from(bounds.width + bounds.height);
            match rng.gen_bool(width_share) {
                true => Some(SplitAxis::Vertical),
                false => Some(SplitAxis::Horizontal),
            }
        }
    }
}

fn split(bounds: &Rect, axis: SplitAxis, min_leaf_size: u32, rng: &mut StdRng) -> [Rect; 2] {
    match axis {
        SplitAxis::Vertical => {
            let offset = rng.gen_range(min_leaf_size..=bounds.width - min_leaf_size);
            [
                Rect::new(bounds.x, bounds.y, offset, bounds.height),
                Rect::new(
                    bounds.x + offset as i32,
                    bounds.y,
                    bounds.width - offset,
                    bounds.height,
                ),
            ]
        }
        SplitAxis::Horizontal => {
            let offset = rng.gen_range(min_leaf_size..=bounds.height - min_leaf_size);
            [
                Rect::new(bounds.x, bounds.y, bounds.width, offset),
                Rect::new(
                    bounds.x,
                    bounds.y + offset as i32,
                    bounds.width,
                    bounds.height - offset,
                ),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn settings() -> PartitionSettings {
        PartitionSettings::new(2, 6, 0.3, 20, 20)
    }

    #[test]
    fn settings_follow_density() {
        let sparse = PartitionSettings::new(3, 8, 0.1, 48, 32);
        let dense = PartitionSettings::new(3, 8, 1.0, 48, 32);
        assert!(sparse.max_depth < dense.max_depth);
        assert_eq!(dense.min_leaf_size, 5);
        assert_eq!(dense.stop_size, 10);
        assert_eq!(settings().max_depth, 2);
    }

    #[test]
    fn leaves_tile_the_grid_without_overlap() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let bounds = Rect::new(0, 0, 48, 32);
            let partition = partition(bounds, &PartitionSettings::new(3, 8, 1.0, 48, 32), &mut rng);
            let leaves = partition.tree.leaf_bounds();

            let total_area: u32 = leaves.iter().map(Rect::area).sum();
            assert_eq!(total_area, bounds.area());
            for (i, a) in leaves.iter().enumerate() {
                assert!(a.width >= 5 && a.height >= 5, "leaf {a} below minimum");
                for b in &leaves[i + 1..] {
                    assert!(!a.intersects(b));
                }
            }
        }
    }

    #[test]
    fn arena_links_are_consistent() {
        let mut rng = StdRng::seed_from_u64(3);
        let partition = partition(
            Rect::new(0, 0, 40, 40),
            &PartitionSettings::new(2, 6, 1.0, 40, 40),
            &mut rng,
        );
        let tree = &partition.tree;
        assert!(tree.node(0).parent.is_none());
        for (index, node) in tree.nodes().iter().enumerate() {
            if let Some(children) = node.children {
                for child in children {
                    assert_eq!(tree.node(child).parent, Some(index));
                    assert_eq!(tree.node(child).depth, node.depth + 1);
                }
            }
        }
    }

    #[test]
    fn max_depth_zero_keeps_a_single_leaf() {
        let mut rng = StdRng::seed_from_u64(1);
        let settings = PartitionSettings {
            min_leaf_size: 3,
            stop_size: 4,
            max_depth: 0,
        };
        let partition = partition(Rect::new(0, 0, 30, 30), &settings, &mut rng);
        assert_eq!(partition.tree.leaves(), vec![0]);
        assert!(partition.failures.is_empty());
    }

    #[test]
    fn unsplittable_large_region_is_reported_and_kept() {
        let mut rng = StdRng::seed_from_u64(1);
        let settings = PartitionSettings {
            min_leaf_size: 7,
            stop_size: 7,
            max_depth: 8,
        };
        let partition = partition(Rect::new(0, 0, 12, 12), &settings, &mut rng);
        assert_eq!(partition.tree.leaves().len(), 1);
        assert_eq!(
            partition.failures,
            vec![PartitionFailure {
                bounds: Rect::new(0, 0, 12, 12)
            }]
        );
    }
}
