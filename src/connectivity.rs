use std::cmp::Ordering;

use rand::{rngs::StdRng, seq::index::sample};

#[cfg(feature = "debug-traces")]
use tracing::debug;

use crate::{grid::Rect, layout::RoomId};

/// Undirected edge between two rooms, stored with `a < b`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomEdge {
    pub a: RoomId,
    pub b: RoomId,
}

impl RoomEdge {
    pub fn new(a: RoomId, b: RoomId) -> Self {
        match a <= b {
            true => Self { a, b },
            false => Self { a: b, b: a },
        }
    }
}

/// Connectivity graph over the rooms of a level, as an adjacency list over room indexes
#[derive(Clone, Debug, PartialEq)]
pub struct RoomGraph {
    /// Spanning tree edges first, then extra edges
    edges: Vec<RoomEdge>,
    tree_edges_count: usize,
    adjacency: Vec<Vec<usize>>,
}

impl RoomGraph {
    pub fn edges(&self) -> &[RoomEdge] {
        &self.edges
    }

    pub fn tree_edges(&self) -> &[RoomEdge] {
        &self.edges[..self.tree_edges_count]
    }

    pub fn extra_edges(&self) -> &[RoomEdge] {
        &self.edges[self.tree_edges_count..]
    }

    pub fn nodes_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn neighbours(&self, room: RoomId) -> &[usize] {
        &self.adjacency[room.0 as usize]
    }

    /// `true` if every node can be reached from node 0
    pub fn is_connected(&self) -> bool {
        let mut seen = vec![false; self.adjacency.len()];
        let mut stack = vec![0];
        let mut seen_count = 0;
        while let Some(node) = stack.pop() {
            if node >= seen.len() || seen[node] {
                continue;
            }
            seen[node] = true;
            seen_count += 1;
            stack.extend(self.adjacency[node].iter().copied());
        }
        seen_count == self.adjacency.len()
    }
}

struct CandidateEdge {
    edge: RoomEdge,
    distance: f64,
}

/// Orders by distance, then by lowest room ids. This is the deterministic tie-break used everywhere in the builder.
fn compare_candidates(x: &CandidateEdge, y: &CandidateEdge) -> Ordering {
    x.distance
        .total_cmp(&y.distance)
        .then(x.edge.a.cmp(&y.edge.a))
        .then(x.edge.b.cmp(&y.edge.b))
}

/// Disjoint sets for Kruskal
struct DisjointSets {
    parents: Vec<usize>,
}

impl DisjointSets {
    fn new(count: usize) -> Self {
        Self {
            parents: (0..count).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parents[node] != node {
            self.parents[node] = self.parents[self.parents[node]];
            node = self.parents[node];
        }
        node
    }

    /// Returns `false` if both nodes were already in the same set
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a == root_b {
            return false;
        }
        // Lowest root wins, keeps the structure independent of call order
        let (low, high) = (root_a.min(root_b), root_a.max(root_b));
        self.parents[high] = low;
        true
    }
}

/// Builds a minimum spanning tree over room centroids (euclidean distance), then adds `round(extra_connections_ratio * room_count)` extra edges.
///
/// Extra edges are sampled uniformly among the `2 * count` shortest pairs that are not tree edges, so loops stay short.
pub fn build_room_graph(
    rooms: &[Rect],
    extra_connections_ratio: f32,
    rng: &mut StdRng,
) -> RoomGraph {
    let mut candidates = Vec::with_capacity(rooms.len() * rooms.len().saturating_sub(1) / 2);
    for (i, a) in rooms.iter().enumerate() {
        for (j, b) in rooms.iter().enumerate().skip(i + 1) {
            candidates.push(CandidateEdge {
                edge: RoomEdge::new(RoomId(i as u32), RoomId(j as u32)),
                distance: a.centroid_distance(b),
            });
        }
    }
    candidates.sort_by(compare_candidates);

    let mut sets = DisjointSets::new(rooms.len());
    let mut edges = Vec::with_capacity(rooms.len());
    let mut remaining = Vec::new();
    for candidate in candidates {
        let (a, b) = (candidate.edge.a.0 as usize, candidate.edge.b.0 as usize);
        match sets.union(a, b) {
            true => edges.push(candidate.edge),
            false => remaining.push(candidate),
        }
    }
    let tree_edges_count = edges.len();

    let extra_count =
        ((extra_connections_ratio * rooms.len() as f32).round() as usize).min(remaining.len());
    if extra_count > 0 {
        let shortlist = (2 * extra_count).min(remaining.len());
        let mut picked: Vec<usize> = sample(rng, shortlist, extra_count).into_vec();
        picked.sort_unstable();
        edges.extend(picked.into_iter().map(|index| remaining[index].edge));
    }

    #[cfg(feature = "debug-traces")]
    debug!(
        "Room graph: {} tree edges, {} extra edges",
        tree_edges_count,
        edges.len() - tree_edges_count
    );

    let mut adjacency = vec![Vec::new(); rooms.len()];
    for edge in &edges {
        adjacency[edge.a.0 as usize].push(edge.b.0 as usize);
        adjacency[edge.b.0 as usize].push(edge.a.0 as usize);
    }
    for neighbours in &mut adjacency {
        neighbours.sort_unstable();
    }

    RoomGraph {
        edges,
        tree_edges_count,
        adjacency,
    }
}
