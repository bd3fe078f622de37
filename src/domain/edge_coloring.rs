use crate::domain::contention_graph::ContentionGraph;
use crate::error::{Error, Result};

/// Result of coloring one batch's contention graph. `colors[i]` is the
/// 1-based color of the edge with ordinal `i + 1`.
#[derive(Debug, Clone)]
pub struct EdgeColoring {
    pub colors: Vec<usize>,
    pub num_colors: usize,
}

/// Computes a proper edge coloring of a bipartite contention multigraph
/// using at most Δ colors.
///
/// ### Algorithm Logic
/// Constructive König coloring. Edges are processed in ordinal order:
/// 1. Assign the smallest color that is free at both endpoints, if one exists.
/// 2. Otherwise take α = smallest color free at the left endpoint and
///    β = smallest color free at the right endpoint, swap α and β along the
///    alternating chain starting at the right endpoint, and assign α.
///
/// The chain never reaches the left endpoint (the chain's edge count parity
/// would contradict the bipartition), so step 2 always succeeds and no edge
/// ever needs a color above Δ. Processing in ordinal order makes the result
/// deterministic for identical input.
#[derive(Debug)]
pub struct EdgeColorer {
    /// left_at[node][color - 1] = edge currently carrying that color at node.
    left_at: Vec<Vec<Option<usize>>>,
    right_at: Vec<Vec<Option<usize>>>,
    colors: Vec<usize>,
    max_colors: usize,
}

impl EdgeColorer {
    /// Colors the given graph. Returns `Error::InternalInvariant` if the
    /// produced coloring fails its own verification, which is structurally
    /// impossible for a valid bipartite multigraph and therefore fatal.
    pub fn color(graph: &ContentionGraph) -> Result<EdgeColoring> {
        let max_colors = graph.max_degree();

        let mut colorer = EdgeColorer {
            left_at: vec![vec![None; max_colors]; graph.num_left_nodes()],
            right_at: vec![vec![None; max_colors]; graph.num_right_nodes()],
            colors: vec![0; graph.edges().len()],
            max_colors,
        };

        for (edge_index, edge) in graph.edges().iter().enumerate() {
            let common = colorer.smallest_common_free(edge.left, edge.right);

            match common {
                Some(color) => colorer.assign(graph, edge_index, color),
                None => {
                    let alpha = colorer
                        .smallest_free(&colorer.left_at[edge.left])
                        .ok_or_else(|| Error::InternalInvariant(format!("no free color at left node {} with Δ = {}", edge.left, max_colors)))?;
                    let beta = colorer
                        .smallest_free(&colorer.right_at[edge.right])
                        .ok_or_else(|| Error::InternalInvariant(format!("no free color at right node {} with Δ = {}", edge.right, max_colors)))?;

                    colorer.swap_alternating_chain(graph, edge.right, alpha, beta);
                    colorer.assign(graph, edge_index, alpha);
                }
            }
        }

        colorer.verify(graph)?;

        let num_colors = colorer.colors.iter().copied().max().unwrap_or(0);
        Ok(EdgeColoring { colors: colorer.colors, num_colors })
    }

    fn smallest_free(&self, slots: &[Option<usize>]) -> Option<usize> {
        slots.iter().position(|slot| slot.is_none()).map(|index| index + 1)
    }

    fn smallest_common_free(&self, left: usize, right: usize) -> Option<usize> {
        for color in 1..=self.max_colors {
            if self.left_at[left][color - 1].is_none() && self.right_at[right][color - 1].is_none() {
                return Some(color);
            }
        }
        None
    }

    fn assign(&mut self, graph: &ContentionGraph, edge_index: usize, color: usize) {
        let edge = graph.edges()[edge_index];
        self.colors[edge_index] = color;
        self.left_at[edge.left][color - 1] = Some(edge_index);
        self.right_at[edge.right][color - 1] = Some(edge_index);
    }

    /// Walks the maximal chain of edges alternately colored α and β that
    /// starts at `start_right` with an α edge, then exchanges the two colors
    /// on every chain edge. Afterwards α is free at `start_right`.
    fn swap_alternating_chain(&mut self, graph: &ContentionGraph, start_right: usize, alpha: usize, beta: usize) {
        // Collect first, then swap: mutating the lookup tables mid-walk would
        // clobber the slot the next step has to read.
        let mut chain: Vec<usize> = Vec::new();
        let mut at_right_side = true;
        let mut node = start_right;
        let mut wanted = alpha;

        loop {
            let slot = if at_right_side { self.right_at[node][wanted - 1] } else { self.left_at[node][wanted - 1] };

            let edge_index = match slot {
                Some(edge_index) => edge_index,
                None => break,
            };

            chain.push(edge_index);

            let edge = graph.edges()[edge_index];
            node = if at_right_side { edge.left } else { edge.right };
            at_right_side = !at_right_side;
            wanted = if wanted == alpha { beta } else { alpha };
        }

        for &edge_index in &chain {
            let edge = graph.edges()[edge_index];
            let old = self.colors[edge_index];

            self.left_at[edge.left][old - 1] = None;
            self.right_at[edge.right][old - 1] = None;
        }

        for &edge_index in &chain {
            let old = self.colors[edge_index];
            let new = if old == alpha { beta } else { alpha };
            self.colors[edge_index] = new;

            let edge = graph.edges()[edge_index];
            self.left_at[edge.left][new - 1] = Some(edge_index);
            self.right_at[edge.right][new - 1] = Some(edge_index);
        }
    }

    /// Re-checks the proper-coloring contract from scratch. A violation here
    /// is an internal invariant failure, never a recoverable condition.
    fn verify(&self, graph: &ContentionGraph) -> Result<()> {
        let edges = graph.edges();

        for (i, a) in edges.iter().enumerate() {
            if self.colors[i] == 0 || self.colors[i] > self.max_colors {
                return Err(Error::InternalInvariant(format!("edge with ordinal {} has color {} outside 1..={}", a.ordinal, self.colors[i], self.max_colors)));
            }

            for (j, b) in edges.iter().enumerate().skip(i + 1) {
                let share_endpoint = a.left == b.left || a.right == b.right;

                if share_endpoint && self.colors[i] == self.colors[j] {
                    return Err(Error::InternalInvariant(format!(
                        "edges with ordinals {} and {} share an endpoint but both carry color {}",
                        a.ordinal, b.ordinal, self.colors[i]
                    )));
                }
            }
        }

        Ok(())
    }
}
