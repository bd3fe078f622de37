use std::collections::HashMap;

use crate::domain::flow::Flow;

/// One edge of the contention multigraph. `ordinal` is the 1-based position
/// of the underlying flow within its batch; parallel edges (same rack pair)
/// keep distinct ordinals and stay distinct edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentionEdge {
    pub left: usize,
    pub right: usize,
    pub ordinal: usize,
}

/// Bipartite contention multigraph of one batch of simultaneous flows.
///
/// Left nodes are source racks (suffix `-L`), right nodes are destination
/// racks (suffix `-R`). Two flows contend iff their edges share an endpoint,
/// which covers shared source, shared destination and parallel edges.
#[derive(Debug, Clone)]
pub struct ContentionGraph {
    left_names: Vec<String>,
    right_names: Vec<String>,
    edges: Vec<ContentionEdge>,
    left_degrees: Vec<usize>,
    right_degrees: Vec<usize>,
}

impl ContentionGraph {
    /// Builds the multigraph for one batch. Node indices are interned in
    /// first-seen (ordinal) order, so identical input always yields an
    /// identical graph.
    pub fn from_batch(batch: &[&Flow]) -> Self {
        let mut left_index: HashMap<String, usize> = HashMap::new();
        let mut right_index: HashMap<String, usize> = HashMap::new();

        let mut left_names: Vec<String> = Vec::new();
        let mut right_names: Vec<String> = Vec::new();
        let mut edges: Vec<ContentionEdge> = Vec::with_capacity(batch.len());

        for (position, flow) in batch.iter().enumerate() {
            let left_name = format!("{}-L", flow.src_rack);
            let right_name = format!("{}-R", flow.dst_rack);

            let left = *left_index.entry(left_name.clone()).or_insert_with(|| {
                left_names.push(left_name);
                left_names.len() - 1
            });

            let right = *right_index.entry(right_name.clone()).or_insert_with(|| {
                right_names.push(right_name);
                right_names.len() - 1
            });

            edges.push(ContentionEdge { left, right, ordinal: position + 1 });
        }

        let mut left_degrees = vec![0usize; left_names.len()];
        let mut right_degrees = vec![0usize; right_names.len()];

        for edge in &edges {
            left_degrees[edge.left] += 1;
            right_degrees[edge.right] += 1;
        }

        Self { left_names, right_names, edges, left_degrees, right_degrees }
    }

    /// Δ: the largest number of edges incident to any single node, left or
    /// right. The chromatic index of a bipartite multigraph equals Δ, so this
    /// is also the number of colors the colorer may use.
    pub fn max_degree(&self) -> usize {
        let left_max = self.left_degrees.iter().copied().max().unwrap_or(0);
        let right_max = self.right_degrees.iter().copied().max().unwrap_or(0);
        left_max.max(right_max)
    }

    pub fn edges(&self) -> &[ContentionEdge] {
        &self.edges
    }

    pub fn num_left_nodes(&self) -> usize {
        self.left_names.len()
    }

    pub fn num_right_nodes(&self) -> usize {
        self.right_names.len()
    }

    pub fn left_name(&self, index: usize) -> &str {
        &self.left_names[index]
    }

    pub fn right_name(&self, index: usize) -> &str {
        &self.right_names[index]
    }
}
