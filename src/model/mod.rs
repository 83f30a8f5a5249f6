//! Directed affiliation model fitted by projected gradient ascent.
//!
//! Every node `u` carries two nonnegative rows of `k` cluster strengths,
//! `affi_out[u]` and `affi_in[u]`. An edge `u -> v` appears with probability
//!
//! ```text
//! p(u, v) = max(1 - exp(-s(u, v)), 1/n),   s(u, v) = Σ_c affi_out[u, c] · affi_in[v, c]
//! ```
//!
//! and the model maximizes the log-likelihood `L = Σ_u L(u)` with
//!
//! ```text
//! L(u) = -Σ_c affi_out[u, c] · (Σ_v affi_in[v, c] - affi_in[u, c])
//!        + Σ_{v ∈ out(u)} [ s(u, v) + ln p(u, v) ]
//! ```
//!
//! Each step updates one side (out or in) of every node at once: the
//! gradient is computed in one executor round, then a backtracking line
//! search tries `max(0, old + alpha · grad)` with shrinking `alpha` until the
//! sufficient-gain test passes or the attempts run out. All per-node passes
//! (likelihood, gradient, conductance, cluster sums) run on the model's
//! [`BarrierExecutor`].
//!
//! # Example
//! ```
//! use coda::graph::DirectedGraph;
//! use coda::model::{AffiliationModel, OptimizerConfig};
//!
//! let graph = DirectedGraph::build(4, &[0, 1, 2, 3, 0, 2], &[1, 0, 3, 2, 2, 0]).unwrap();
//! let mut model = AffiliationModel::new(&graph, 2, 2).unwrap();
//! model.init_random(7);
//!
//! let before = model.likelihood();
//! model.converge(&OptimizerConfig::default(), None);
//! assert!(model.likelihood() >= before);
//! ```

use crate::concurrency::{BarrierExecutor, DoubleBuffer};
use crate::error::{Error, Result};
use crate::graph::{DirectedGraph, NodeId};

pub mod config;
mod kernels;
mod seed;

pub use config::{OptimizerConfig, SeedStrategy, TrainConfig};
pub use kernels::CONDUCTANCE_SENTINEL;

use kernels::Kernel;

/// Which affinity matrix a step updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Out,
    In,
}

/// `(after - before) / |before|`, or 0 when `before` is 0.
pub fn relative_gain(before: f64, after: f64) -> f64 {
    if before == 0.0 {
        0.0
    } else {
        (after - before) / before.abs()
    }
}

/// Affiliation model bound to a graph and an executor.
pub struct AffiliationModel<'g, E = ()> {
    graph: &'g DirectedGraph<E>,
    executor: BarrierExecutor,
    cluster_num: usize,
    background: f32,
    /// Current affinities plus the pre-step snapshot.
    affi_out: DoubleBuffer<Vec<f32>>,
    affi_in: DoubleBuffer<Vec<f32>>,
    grad_out: Vec<f32>,
    grad_in: Vec<f32>,
    sum_out: Vec<f32>,
    sum_in: Vec<f32>,
    sum_scratch: Vec<(f32, f32)>,
    node_likelihood: DoubleBuffer<Vec<f64>>,
    /// Cached total of `node_likelihood`; `None` when stale.
    total: DoubleBuffer<Option<f64>>,
    conductance: Vec<f32>,
}

impl<'g, E: Sync> AffiliationModel<'g, E> {
    /// Allocates all buffers for `cluster_num` clusters and starts `threads` lanes.
    ///
    /// Affinities start at zero; call one of the `init_*` methods or
    /// [`set_affinities`](Self::set_affinities) before optimizing.
    ///
    /// # Errors
    /// [`Error::InvalidClusterCount`] if `cluster_num == 0`, [`Error::Io`] if
    /// a lane thread cannot be spawned.
    ///
    /// # Panics
    /// Panics if `threads == 0`.
    pub fn new(graph: &'g DirectedGraph<E>, cluster_num: usize, threads: usize) -> Result<Self> {
        if cluster_num == 0 {
            return Err(Error::InvalidClusterCount(cluster_num));
        }
        let n = graph.node_num() as usize;
        let size = n * cluster_num;
        tracing::debug!(nodes = n, clusters = cluster_num, threads, "allocating affiliation model");

        let executor = BarrierExecutor::try_new(n, threads)?;
        let mut model = Self {
            graph,
            executor,
            cluster_num,
            background: 1.0 / n.max(1) as f32,
            affi_out: DoubleBuffer::splat(vec![0.0; size]),
            affi_in: DoubleBuffer::splat(vec![0.0; size]),
            grad_out: vec![0.0; size],
            grad_in: vec![0.0; size],
            sum_out: vec![0.0; cluster_num],
            sum_in: vec![0.0; cluster_num],
            sum_scratch: vec![(0.0, 0.0); cluster_num],
            node_likelihood: DoubleBuffer::splat(vec![0.0; n]),
            total: DoubleBuffer::splat(None),
            conductance: vec![0.0; n],
        };
        model.make_affi_sum();
        Ok(model)
    }

    /// The graph being modeled.
    pub fn graph(&self) -> &'g DirectedGraph<E> {
        self.graph
    }

    /// The executor running the per-node rounds.
    pub fn executor(&self) -> &BarrierExecutor {
        &self.executor
    }

    /// Number of nodes.
    pub fn node_num(&self) -> usize {
        self.graph.node_num() as usize
    }

    /// Number of clusters `k`.
    pub fn cluster_num(&self) -> usize {
        self.cluster_num
    }

    /// Probability floor `1/n`.
    pub fn background_prob(&self) -> f32 {
        self.background
    }

    /// Row-major `n × k` out-affinities.
    pub fn affinity_out(&self) -> &[f32] {
        self.affi_out.current()
    }

    /// Row-major `n × k` in-affinities.
    pub fn affinity_in(&self) -> &[f32] {
        self.affi_in.current()
    }

    /// Out-affinities of `node`.
    pub fn affinity_out_row(&self, node: NodeId) -> &[f32] {
        let k = self.cluster_num;
        &self.affi_out.current()[node as usize * k..(node as usize + 1) * k]
    }

    /// In-affinities of `node`.
    pub fn affinity_in_row(&self, node: NodeId) -> &[f32] {
        let k = self.cluster_num;
        &self.affi_in.current()[node as usize * k..(node as usize + 1) * k]
    }

    /// Per-cluster totals of the out-affinities.
    pub fn cluster_sums_out(&self) -> &[f32] {
        &self.sum_out
    }

    /// Per-cluster totals of the in-affinities.
    pub fn cluster_sums_in(&self) -> &[f32] {
        &self.sum_in
    }

    /// Out-gradient from the last out-step.
    pub fn gradient_out(&self) -> &[f32] {
        &self.grad_out
    }

    /// In-gradient from the last in-step.
    pub fn gradient_in(&self) -> &[f32] {
        &self.grad_in
    }

    /// Local conductance estimate of `node` from the last
    /// [`init_min_neighborhood`](Self::init_min_neighborhood) (0 before that).
    pub fn conductance(&self, node: NodeId) -> f32 {
        self.conductance[node as usize]
    }

    /// Replaces both affinity matrices, e.g. to resume from dumps.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] if a slice is not `n × k` long,
    /// [`Error::InvalidAffinity`] for a negative or non-finite entry.
    pub fn set_affinities(&mut self, out: &[f32], inc: &[f32]) -> Result<()> {
        let expected = self.node_num() * self.cluster_num;
        for matrix in [out, inc] {
            if matrix.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    found: matrix.len(),
                });
            }
            if let Some(at) = matrix.iter().position(|x| !x.is_finite() || *x < 0.0) {
                return Err(Error::InvalidAffinity {
                    node: at / self.cluster_num,
                    cluster: at % self.cluster_num,
                });
            }
        }
        self.affi_out.current_mut().copy_from_slice(out);
        self.affi_in.current_mut().copy_from_slice(inc);
        self.affinities_changed();
        Ok(())
    }

    /// Total log-likelihood.
    pub fn likelihood(&mut self) -> f64 {
        self.likelihood_masked(None)
    }

    /// Log-likelihood summed over the nodes with `mask[node] == true`
    /// (all nodes for `None`).
    ///
    /// # Panics
    /// Panics if the mask length differs from the node count.
    pub fn likelihood_masked(&mut self, mask: Option<&[bool]>) -> f64 {
        let total = self.refresh_likelihood();
        match mask {
            None => total,
            Some(mask) => {
                assert_eq!(mask.len(), self.node_num(), "mask length must equal node count");
                self.node_likelihood
                    .current()
                    .iter()
                    .zip(mask)
                    .filter(|(_, &used)| used)
                    .map(|(l, _)| l)
                    .sum()
            }
        }
    }

    /// Likelihood contribution of `node`.
    pub fn node_likelihood(&mut self, node: NodeId) -> f64 {
        self.refresh_likelihood();
        self.node_likelihood.current()[node as usize]
    }

    /// One line-searched step on the out-affinities.
    ///
    /// Returns the accepted step length, or 0 if no attempt passed the
    /// sufficient-gain test (affinities are then unchanged).
    pub fn iterate_out(&mut self, cfg: &OptimizerConfig, mask: Option<&[bool]>) -> f32 {
        self.iterate(Side::Out, cfg, mask)
    }

    /// One line-searched step on the in-affinities; see [`iterate_out`](Self::iterate_out).
    pub fn iterate_in(&mut self, cfg: &OptimizerConfig, mask: Option<&[bool]>) -> f32 {
        self.iterate(Side::In, cfg, mask)
    }

    /// Repeats out-steps until one fails or gains less than `cfg.rel_improve`.
    ///
    /// Returns the relative likelihood gain of the whole pass.
    pub fn argmin_out(&mut self, cfg: &OptimizerConfig, mask: Option<&[bool]>) -> f64 {
        self.argmin(Side::Out, cfg, mask)
    }

    /// In-side counterpart of [`argmin_out`](Self::argmin_out).
    pub fn argmin_in(&mut self, cfg: &OptimizerConfig, mask: Option<&[bool]>) -> f64 {
        self.argmin(Side::In, cfg, mask)
    }

    /// Alternates out and in passes until neither gains `cfg.rel_improve`
    /// or `cfg.max_rounds` is reached.
    ///
    /// Returns the relative likelihood gain over the whole run.
    pub fn converge(&mut self, cfg: &OptimizerConfig, mask: Option<&[bool]>) -> f64 {
        let l0 = self.likelihood_masked(mask);
        for round in 0..cfg.max_rounds {
            let improve_out = self.argmin_out(cfg, mask);
            let improve_in = self.argmin_in(cfg, mask);
            tracing::info!(round, improve_out, improve_in, "converge round");
            if improve_out < cfg.rel_improve && improve_in < cfg.rel_improve {
                break;
            }
        }
        let l1 = self.likelihood_masked(mask);
        if l1 <= l0 {
            tracing::warn!(likelihood = l1, "no step was accepted");
        } else {
            tracing::info!(likelihood = l1, "converged");
        }
        relative_gain(l0, l1)
    }

    fn argmin(&mut self, side: Side, cfg: &OptimizerConfig, mask: Option<&[bool]>) -> f64 {
        let l0 = self.likelihood_masked(mask);
        let mut steps = 0usize;
        loop {
            let l1 = self.likelihood_masked(mask);
            let step = self.iterate(side, cfg, mask);
            let l2 = self.likelihood_masked(mask);
            if step == 0.0 {
                break;
            }
            steps += 1;
            if relative_gain(l1, l2) < cfg.rel_improve {
                break;
            }
        }
        let improve = relative_gain(l0, self.likelihood_masked(mask));
        tracing::debug!(?side, steps, improve, "argmin pass");
        improve
    }

    fn iterate(&mut self, side: Side, cfg: &OptimizerConfig, mask: Option<&[bool]>) -> f32 {
        let l0 = self.likelihood_masked(mask);
        self.make_gradient(side);

        // The pre-step affinities and their likelihoods move to the scratch
        // slots so a failed search can swap them back.
        self.affinities_mut(side).swap();
        self.node_likelihood.swap();
        self.total.swap();

        let grad = match side {
            Side::Out => &self.grad_out,
            Side::In => &self.grad_in,
        };
        let norm2: f64 = grad.iter().map(|&g| f64::from(g) * f64::from(g)).sum();
        let min_gain = norm2 * f64::from(cfg.scale);
        let mut alpha = if norm2 > 0.0 {
            (f64::from(cfg.alpha) / norm2.sqrt()) as f32
        } else {
            cfg.alpha
        };
        tracing::debug!(?side, alpha, norm2, "line search");

        for attempt in 0..cfg.max_backtracks {
            self.project_step(side, alpha);
            self.affinities_changed();
            let l1 = self.likelihood_masked(mask);
            tracing::debug!(attempt, alpha, gain = relative_gain(l0, l1), "line search attempt");
            if l1 > l0 + f64::from(alpha) * min_gain {
                return alpha;
            }
            alpha *= cfg.decay;
        }

        self.affinities_mut(side).swap();
        self.node_likelihood.swap();
        self.total.swap();
        self.make_affi_sum();
        tracing::debug!(?side, "line search exhausted");
        0.0
    }

    fn affinities_mut(&mut self, side: Side) -> &mut DoubleBuffer<Vec<f32>> {
        match side {
            Side::Out => &mut self.affi_out,
            Side::In => &mut self.affi_in,
        }
    }

    /// `current = max(0, scratch + alpha · grad)` row by row.
    fn project_step(&mut self, side: Side, alpha: f32) {
        let (buffer, grad) = match side {
            Side::Out => (&mut self.affi_out, &self.grad_out),
            Side::In => (&mut self.affi_in, &self.grad_in),
        };
        let (next, prev) = buffer.split_mut();
        let prev: &[f32] = prev;
        let k = self.cluster_num;
        self.executor.round_rows(next, k, |i, row| {
            let base = i * k;
            for (c, slot) in row.iter_mut().enumerate() {
                *slot = (prev[base + c] + alpha * grad[base + c]).max(0.0);
            }
        });
    }

    fn make_gradient(&mut self, side: Side) {
        let kernel = Kernel {
            graph: self.graph,
            k: self.cluster_num,
            out: self.affi_out.current(),
            inc: self.affi_in.current(),
            sum_out: &self.sum_out,
            sum_in: &self.sum_in,
            background: self.background,
        };
        match side {
            Side::Out => self
                .executor
                .round_rows(&mut self.grad_out, self.cluster_num, |i, g| kernel.gradient_out(i, g)),
            Side::In => self
                .executor
                .round_rows(&mut self.grad_in, self.cluster_num, |i, g| kernel.gradient_in(i, g)),
        }
    }

    /// Recomputes the per-cluster totals, one cluster per item.
    fn make_affi_sum(&mut self) {
        let kernel = Kernel {
            graph: self.graph,
            k: self.cluster_num,
            out: self.affi_out.current(),
            inc: self.affi_in.current(),
            sum_out: &[],
            sum_in: &[],
            background: self.background,
        };
        self.executor
            .round_map(&mut self.sum_scratch, |c| kernel.cluster_sums(c));
        for (c, &(out, inc)) in self.sum_scratch.iter().enumerate() {
            self.sum_out[c] = out;
            self.sum_in[c] = inc;
        }
    }

    /// Rebuilds the sums and drops the cached likelihood.
    fn affinities_changed(&mut self) {
        self.make_affi_sum();
        *self.total.current_mut() = None;
    }

    fn refresh_likelihood(&mut self) -> f64 {
        if let Some(total) = *self.total.current() {
            return total;
        }
        let kernel = Kernel {
            graph: self.graph,
            k: self.cluster_num,
            out: self.affi_out.current(),
            inc: self.affi_in.current(),
            sum_out: &self.sum_out,
            sum_in: &self.sum_in,
            background: self.background,
        };
        let buf = self.node_likelihood.current_mut();
        self.executor.round_map(buf, |i| kernel.likelihood(i));
        let total = buf.iter().sum();
        *self.total.current_mut() = Some(total);
        total
    }
}

impl<'g, E> std::fmt::Debug for AffiliationModel<'g, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffiliationModel")
            .field("node_num", &self.graph.node_num())
            .field("cluster_num", &self.cluster_num)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
