//! Per-node work items run inside executor rounds.
//!
//! Every kernel reads only shared state (graph, current affinities, cluster
//! sums) and writes only the row of the node it is called for.

use crate::graph::{DirectedGraph, NodeId};

/// Conductance reported for nodes whose neighborhood has no volume.
pub const CONDUCTANCE_SENTINEL: f32 = 1e38;

/// `Σ_c a[c]·b[c]`.
#[inline]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Edge probability `max(1 - e^{-s}, floor)`.
#[inline]
pub(crate) fn edge_prob(s: f32, floor: f32) -> f32 {
    (-(-s).exp_m1()).max(floor)
}

#[inline(always)]
fn row(matrix: &[f32], node: usize, k: usize) -> &[f32] {
    &matrix[node * k..(node + 1) * k]
}

/// Read-only view of the model state a round needs.
pub(crate) struct Kernel<'a, E> {
    pub(crate) graph: &'a DirectedGraph<E>,
    pub(crate) k: usize,
    pub(crate) out: &'a [f32],
    pub(crate) inc: &'a [f32],
    pub(crate) sum_out: &'a [f32],
    pub(crate) sum_in: &'a [f32],
    pub(crate) background: f32,
}

impl<'a, E> Kernel<'a, E> {
    /// Log-likelihood contribution of `node`'s out-edges and non-edges.
    pub(crate) fn likelihood(&self, node: usize) -> f64 {
        let a_out = row(self.out, node, self.k);
        let a_in = row(self.inc, node, self.k);

        let mut sum: f64 = a_out
            .iter()
            .zip(self.sum_in)
            .zip(a_in)
            .map(|((&o, &total), &own)| -f64::from(o) * f64::from(total - own))
            .sum();
        for &v in self.graph.out_neighbors(node as NodeId) {
            let s = dot(a_out, row(self.inc, v as usize, self.k));
            let p = edge_prob(s, self.background);
            sum += f64::from(s) + f64::from(p).ln();
        }
        sum
    }

    /// Writes `∂L/∂affi_out[node, ·]` into `grad`.
    pub(crate) fn gradient_out(&self, node: usize, grad: &mut [f32]) {
        let a_out = row(self.out, node, self.k);
        let a_in = row(self.inc, node, self.k);
        for ((g, &own), &total) in grad.iter_mut().zip(a_in).zip(self.sum_in) {
            *g = own - total;
        }
        for &v in self.graph.out_neighbors(node as NodeId) {
            let b = row(self.inc, v as usize, self.k);
            let p = edge_prob(dot(a_out, b), self.background);
            for (g, &x) in grad.iter_mut().zip(b) {
                *g += x / p;
            }
        }
    }

    /// Writes `∂L/∂affi_in[node, ·]` into `grad`.
    pub(crate) fn gradient_in(&self, node: usize, grad: &mut [f32]) {
        let a_out = row(self.out, node, self.k);
        let a_in = row(self.inc, node, self.k);
        for ((g, &own), &total) in grad.iter_mut().zip(a_out).zip(self.sum_out) {
            *g = own - total;
        }
        for &u in self.graph.in_neighbors(node as NodeId) {
            let a = row(self.out, u as usize, self.k);
            let p = edge_prob(dot(a, a_in), self.background);
            for (g, &x) in grad.iter_mut().zip(a) {
                *g += x / p;
            }
        }
    }

    /// Column sums `(Σ_i out[i, c], Σ_i in[i, c])`.
    pub(crate) fn cluster_sums(&self, cluster: usize) -> (f32, f32) {
        let n = self.out.len() / self.k;
        let (mut out, mut inc) = (0f64, 0f64);
        for i in 0..n {
            out += f64::from(self.out[i * self.k + cluster]);
            inc += f64::from(self.inc[i * self.k + cluster]);
        }
        (out as f32, inc as f32)
    }
}

/// Sampled local conductance of `node`'s neighborhood.
///
/// The neighborhood volume is the total degree of `node` and of its
/// distinct neighbors. Second-hop adjacency runs are sampled every
/// `max(1, volume / 100)` positions, the stride phase carried across runs;
/// a sampled node counts toward the cut unless it is `node` or adjacent to
/// it. The cut is scaled back up by `volume / samples` and divided by
/// `min(volume, edge_num)`. Empty neighborhoods get [`CONDUCTANCE_SENTINEL`].
pub(crate) fn conductance<E>(graph: &DirectedGraph<E>, node: NodeId) -> f32 {
    let volume_of = |v: NodeId| u64::from(graph.out_degree(v)) + u64::from(graph.in_degree(v));
    let neighbors = || {
        graph
            .out_neighbors(node)
            .iter()
            .chain(graph.in_only_neighbors(node))
            .copied()
    };

    let volume = volume_of(node) + neighbors().map(volume_of).sum::<u64>();
    let stride = (volume / 100).max(1);

    let (mut cut, mut samples, mut phase) = (0u64, 0u64, 0u64);
    for v in neighbors() {
        for run in [graph.out_neighbors(v), graph.in_neighbors(v)] {
            let mut i = (phase % stride) as usize;
            while i < run.len() {
                let w = run[i];
                if w != node && !graph.has_edge(node, w) && !graph.has_edge(w, node) {
                    cut += 1;
                }
                samples += 1;
                i += stride as usize;
            }
            phase += run.len() as u64;
        }
    }

    let cut = if cut == 0 || volume == 0 {
        0
    } else {
        cut * volume / samples
    };
    let size = volume.min(graph.edge_num());
    if size == 0 {
        CONDUCTANCE_SENTINEL
    } else {
        cut as f32 / size as f32
    }
}
