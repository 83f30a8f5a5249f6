//! Affinity initialization.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{kernels, AffiliationModel};
use crate::graph::{DirectedGraph, NodeId};

impl<'g, E: Sync> AffiliationModel<'g, E> {
    /// Fills both matrices with uniform `[0, 1)` draws from an RNG seeded
    /// with `seed`. Identical seeds give identical affinities.
    pub fn init_random(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let (out, inc) = (self.affi_out.current_mut(), self.affi_in.current_mut());
        for (o, i) in out.iter_mut().zip(inc.iter_mut()) {
            *o = rng.random();
            *i = rng.random();
        }
        self.affinities_changed();
    }

    /// Seeds cluster `c` with the egonet of the `c`-th candidate, candidates
    /// ranked by `out_degree + in_degree - bi_degree + 1` (largest first,
    /// ties to the larger id).
    ///
    /// `is_seed` restricts the candidates (`None` admits every node).
    /// Clusters beyond the number of candidates stay empty.
    ///
    /// # Panics
    /// Panics if the mask length differs from the node count.
    pub fn init_neighborhood(&mut self, is_seed: Option<&[bool]>) {
        let graph = self.graph;
        check_mask(graph, is_seed);
        let candidates: Vec<NodeId> = (0..graph.node_num())
            .filter(|&i| is_seed.map_or(true, |s| s[i as usize]))
            .collect();
        self.seed_egonets(candidates);
    }

    /// Seeds from nodes whose sampled local conductance is strictly below
    /// that of every neighbor and which have at least one neighbor in
    /// `is_seed` (any neighbor for `None`). Candidates are ranked and
    /// expanded as in [`init_neighborhood`](Self::init_neighborhood).
    ///
    /// The conductance estimates stay available via
    /// [`conductance`](Self::conductance).
    ///
    /// # Panics
    /// Panics if the mask length differs from the node count.
    pub fn init_min_neighborhood(&mut self, is_seed: Option<&[bool]>) {
        let graph = self.graph;
        check_mask(graph, is_seed);
        self.executor
            .round_map(&mut self.conductance, |i| kernels::conductance(graph, i as NodeId));

        let cond = &self.conductance;
        let candidates: Vec<NodeId> = (0..graph.node_num())
            .filter(|&i| {
                let mut nbrs = graph.out_neighbors(i).iter().chain(graph.in_neighbors(i));
                let own = cond[i as usize];
                let is_min = nbrs.clone().all(|&j| own < cond[j as usize]);
                is_min && nbrs.any(|&j| is_seed.map_or(true, |s| s[j as usize]))
            })
            .collect();
        self.seed_egonets(candidates);
    }

    fn seed_egonets(&mut self, candidates: Vec<NodeId>) {
        let graph = self.graph;
        let k = self.cluster_num;

        let mut ranked: Vec<(u32, NodeId)> = candidates
            .into_iter()
            .map(|i| (graph.out_degree(i) + graph.in_degree(i) - graph.bi_degree(i) + 1, i))
            .collect();
        ranked.sort_unstable_by(|a, b| b.cmp(a));
        tracing::info!(seeds = ranked.len(), clusters = k, "seeding from egonets");

        let (out, inc) = (self.affi_out.current_mut(), self.affi_in.current_mut());
        out.fill(0.0);
        inc.fill(0.0);

        let mut egonet: Vec<NodeId> = Vec::new();
        for (c, &(_, center)) in ranked.iter().take(k).enumerate() {
            let bi = graph.bi_degree(center) as usize;
            let out_nbrs = graph.out_neighbors(center);
            let in_nbrs = graph.in_neighbors(center);

            egonet.clear();
            egonet.extend_from_slice(out_nbrs);
            egonet.extend_from_slice(&in_nbrs[bi..]);
            egonet.sort_unstable();
            let in_egonet = |run: &[NodeId]| run.iter().any(|w| egonet.binary_search(w).is_ok());

            for &v in &out_nbrs[..bi] {
                out[v as usize * k + c] = 1.0;
                inc[v as usize * k + c] = 1.0;
            }
            for &v in &out_nbrs[bi..] {
                inc[v as usize * k + c] = 1.0;
                if in_egonet(graph.out_neighbors(v)) {
                    out[v as usize * k + c] = 1.0;
                }
            }
            for &v in &in_nbrs[bi..] {
                out[v as usize * k + c] = 1.0;
                if in_egonet(graph.in_neighbors(v)) {
                    inc[v as usize * k + c] = 1.0;
                }
            }
        }
        self.affinities_changed();
    }
}

fn check_mask<E>(graph: &DirectedGraph<E>, mask: Option<&[bool]>) {
    if let Some(mask) = mask {
        assert_eq!(
            mask.len(),
            graph.node_num() as usize,
            "mask length must equal node count"
        );
    }
}
