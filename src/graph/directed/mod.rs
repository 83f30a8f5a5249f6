//! An immutable directed graph in paired CSR layout.
//!
//! Every node owns two neighbor runs, one in `out_nbrs` and one in `in_nbrs`.
//! Each run is split into two ascending partitions:
//!
//! ```text
//! out_nbrs[out_offsets[i]..out_offsets[i + 1]]
//!   = [ mutual neighbors (bi_degree[i] ids) | out-only neighbors ]
//! in_nbrs[in_offsets[i]..in_offsets[i + 1]]
//!   = [ mutual neighbors (bi_degree[i] ids) | in-only neighbors  ]
//! ```
//!
//! A neighbor is *mutual* when edges exist in both directions. The split
//! turns "is this edge bidirectional" into a prefix test and keeps each
//! partition binary-searchable.
//!
//! ### Performance Characteristics
//! | Operation | Complexity | Notes |
//! |-----------|------------|-------|
//! | `build` | \(O(n + m)\) | Counting sorts plus one tagging pass |
//! | `out_neighbors` / `in_neighbors` | \(O(1)\) | Borrowed slice |
//! | `out_degree` / `in_degree` / `bi_degree` | \(O(1)\) | |
//! | `has_edge` | \(O(\log d)\) | Binary search on the smaller side |
//! | `reverse` | \(O(1)\) | Swaps array roles |

use core::ops::Range;

mod build;
pub mod codec;
mod storage;

pub use build::GraphBuilder;
pub use storage::GraphFormat;

/// Node identifier.
pub type NodeId = u32;

/// Per-edge attributes aligned with the out and in neighbor arrays.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EdgeAttrs<E> {
    pub(crate) out: Vec<E>,
    pub(crate) inc: Vec<E>,
}

/// A directed graph with sorted, partitioned adjacency in both directions.
///
/// `E` is the optional edge attribute type. Attribute-free graphs use the
/// default `()` and carry no attribute storage at all.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectedGraph<E = ()> {
    node_num: u32,
    edge_num: u64,
    out_offsets: Vec<u64>,
    in_offsets: Vec<u64>,
    bi_degrees: Vec<u32>,
    out_nbrs: Vec<NodeId>,
    in_nbrs: Vec<NodeId>,
    edge_attrs: Option<EdgeAttrs<E>>,
    labels: Option<Vec<String>>,
}

impl<E> Default for DirectedGraph<E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl DirectedGraph<()> {
    /// Builds an attribute-free graph from parallel endpoint arrays.
    ///
    /// Edge `e` runs from `sources[e]` to `dests[e]`. Repeated pairs are
    /// collapsed into one edge.
    ///
    /// # Errors
    /// [`Error::LengthMismatch`](crate::Error::LengthMismatch) if the arrays differ in
    /// length, [`Error::NodeOutOfRange`](crate::Error::NodeOutOfRange) if an endpoint is `>= node_num`.
    pub fn build(node_num: u32, sources: &[NodeId], dests: &[NodeId]) -> crate::Result<Self> {
        build::assemble::<()>(node_num, sources, dests, None, None)
    }
}

impl<E> DirectedGraph<E> {
    /// The graph with no nodes.
    pub fn empty() -> Self {
        Self {
            node_num: 0,
            edge_num: 0,
            out_offsets: vec![0],
            in_offsets: vec![0],
            bi_degrees: Vec::new(),
            out_nbrs: Vec::new(),
            in_nbrs: Vec::new(),
            edge_attrs: None,
            labels: None,
        }
    }

    /// Drops all storage and returns to the empty graph.
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    /// Number of nodes.
    #[inline(always)]
    pub fn node_num(&self) -> u32 {
        self.node_num
    }

    /// Number of (distinct) edges.
    #[inline(always)]
    pub fn edge_num(&self) -> u64 {
        self.edge_num
    }

    /// Returns `true` if the graph has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node_num == 0
    }

    #[inline(always)]
    fn out_range(&self, node: NodeId) -> Range<usize> {
        let i = node as usize;
        self.out_offsets[i] as usize..self.out_offsets[i + 1] as usize
    }

    #[inline(always)]
    fn in_range(&self, node: NodeId) -> Range<usize> {
        let i = node as usize;
        self.in_offsets[i] as usize..self.in_offsets[i + 1] as usize
    }

    /// Out-degree of `node`.
    ///
    /// # Panics
    /// Panics if `node >= node_num()`.
    #[inline]
    pub fn out_degree(&self, node: NodeId) -> u32 {
        let i = node as usize;
        (self.out_offsets[i + 1] - self.out_offsets[i]) as u32
    }

    /// In-degree of `node`.
    #[inline]
    pub fn in_degree(&self, node: NodeId) -> u32 {
        let i = node as usize;
        (self.in_offsets[i + 1] - self.in_offsets[i]) as u32
    }

    /// Number of mutual neighbors of `node`.
    #[inline]
    pub fn bi_degree(&self, node: NodeId) -> u32 {
        self.bi_degrees[node as usize]
    }

    /// Out-neighbors: mutual ones first, then out-only ones, each ascending.
    #[inline]
    pub fn out_neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.out_nbrs[self.out_range(node)]
    }

    /// In-neighbors: mutual ones first, then in-only ones, each ascending.
    #[inline]
    pub fn in_neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.in_nbrs[self.in_range(node)]
    }

    /// Mutual neighbors, ascending.
    #[inline]
    pub fn bi_neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.out_neighbors(node)[..self.bi_degree(node) as usize]
    }

    /// Out-neighbors without an edge back, ascending.
    #[inline]
    pub fn out_only_neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.out_neighbors(node)[self.bi_degree(node) as usize..]
    }

    /// In-neighbors without an edge back, ascending.
    #[inline]
    pub fn in_only_neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.in_neighbors(node)[self.bi_degree(node) as usize..]
    }

    /// Checks if the edge `from -> to` exists.
    ///
    /// Searches whichever of `from`'s out-run or `to`'s in-run is shorter.
    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        let (run, bi, key) = if self.out_degree(from) < self.in_degree(to) {
            (self.out_neighbors(from), self.bi_degree(from), to)
        } else {
            (self.in_neighbors(to), self.bi_degree(to), from)
        };
        let (mutual, single) = run.split_at(bi as usize);
        mutual.binary_search(&key).is_ok() || single.binary_search(&key).is_ok()
    }

    /// Swaps the roles of out- and in-adjacency (and edge attributes).
    pub fn reverse(&mut self) {
        core::mem::swap(&mut self.out_offsets, &mut self.in_offsets);
        core::mem::swap(&mut self.out_nbrs, &mut self.in_nbrs);
        if let Some(attrs) = &mut self.edge_attrs {
            core::mem::swap(&mut attrs.out, &mut attrs.inc);
        }
    }

    /// Attributes of `node`'s out-edges, aligned with [`out_neighbors`](Self::out_neighbors).
    pub fn out_edge_attrs(&self, node: NodeId) -> Option<&[E]> {
        let range = self.out_range(node);
        self.edge_attrs.as_ref().map(|a| &a.out[range])
    }

    /// Attributes of `node`'s in-edges, aligned with [`in_neighbors`](Self::in_neighbors).
    pub fn in_edge_attrs(&self, node: NodeId) -> Option<&[E]> {
        let range = self.in_range(node);
        self.edge_attrs.as_ref().map(|a| &a.inc[range])
    }

    /// Returns `true` if edge attributes are attached.
    pub fn has_edge_attrs(&self) -> bool {
        self.edge_attrs.is_some()
    }

    /// The node label table, if any.
    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Label of `node`, if labels are attached.
    pub fn label(&self, node: NodeId) -> Option<&str> {
        self.labels
            .as_ref()
            .and_then(|l| l.get(node as usize))
            .map(String::as_str)
    }

    /// Finds the node carrying `label`.
    ///
    /// The label table is searched by bisection, so it must be sorted
    /// ascending (tables produced by [`crate::io::edge_list`] are).
    pub fn node_by_label(&self, label: &str) -> Option<NodeId> {
        let labels = self.labels.as_ref()?;
        labels
            .binary_search_by(|probe| probe.as_str().cmp(label))
            .ok()
            .map(|i| i as NodeId)
    }

    /// Iterates all `(source, dest)` pairs grouped by source.
    pub fn out_edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        (0..self.node_num).flat_map(move |u| self.out_neighbors(u).iter().map(move |&v| (u, v)))
    }

    /// Iterates all `(source, dest)` pairs grouped by destination.
    pub fn in_edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        (0..self.node_num).flat_map(move |v| self.in_neighbors(v).iter().map(move |&u| (u, v)))
    }

    /// Total number of mutual adjacencies, counting each mutual pair twice.
    pub fn bi_degree_sum(&self) -> u64 {
        self.bi_degrees.iter().map(|&d| u64::from(d)).sum()
    }

    /// Raw out offsets (`node_num + 1` entries).
    pub fn out_offsets(&self) -> &[u64] {
        &self.out_offsets
    }

    /// Raw in offsets (`node_num + 1` entries).
    pub fn in_offsets(&self) -> &[u64] {
        &self.in_offsets
    }

    /// Raw mutual-degree array.
    pub fn bi_degrees(&self) -> &[u32] {
        &self.bi_degrees
    }

    /// Raw concatenated out-neighbor runs.
    pub fn out_nbrs(&self) -> &[NodeId] {
        &self.out_nbrs
    }

    /// Raw concatenated in-neighbor runs.
    pub fn in_nbrs(&self) -> &[NodeId] {
        &self.in_nbrs
    }

    /// Checks every structural invariant of the layout.
    ///
    /// Offsets start at zero, never decrease and end at `edge_num`; ids are in
    /// range; `bi_degree` fits both runs; every partition is strictly
    /// ascending; and the mutual prefixes of the out- and in-runs agree.
    ///
    /// # Errors
    /// [`Error::Corrupt`](crate::Error::Corrupt) naming the first violated property.
    pub fn verify(&self) -> crate::Result<()> {
        use crate::Error::Corrupt;

        let n = self.node_num as usize;
        if self.out_offsets.len() != n + 1 || self.in_offsets.len() != n + 1 {
            return Err(Corrupt("offset array length"));
        }
        if self.bi_degrees.len() != n {
            return Err(Corrupt("bi-degree array length"));
        }
        for (offsets, nbrs) in [
            (&self.out_offsets, &self.out_nbrs),
            (&self.in_offsets, &self.in_nbrs),
        ] {
            if offsets[0] != 0 || offsets[n] != self.edge_num || nbrs.len() as u64 != self.edge_num {
                return Err(Corrupt("offsets do not span the edge array"));
            }
            if offsets.windows(2).any(|w| w[0] > w[1]) {
                return Err(Corrupt("offsets decrease"));
            }
            if nbrs.iter().any(|&v| v >= self.node_num) {
                return Err(Corrupt("neighbor id out of range"));
            }
        }
        if let Some(attrs) = &self.edge_attrs {
            if attrs.out.len() != self.out_nbrs.len() || attrs.inc.len() != self.in_nbrs.len() {
                return Err(Corrupt("edge attribute count"));
            }
        }
        if let Some(labels) = &self.labels {
            if labels.len() != n {
                return Err(Corrupt("label count"));
            }
        }

        let strictly_ascending = |run: &[NodeId]| run.windows(2).all(|w| w[0] < w[1]);
        for u in 0..self.node_num {
            let bi = self.bi_degree(u);
            if bi > self.out_degree(u) || bi > self.in_degree(u) {
                return Err(Corrupt("bi-degree exceeds degree"));
            }
            let bi = bi as usize;
            let (out_bi, out_single) = self.out_neighbors(u).split_at(bi);
            let (in_bi, in_single) = self.in_neighbors(u).split_at(bi);
            if out_bi != in_bi {
                return Err(Corrupt("mutual prefixes disagree"));
            }
            if !strictly_ascending(out_bi) || !strictly_ascending(out_single) || !strictly_ascending(in_single) {
                return Err(Corrupt("partition not strictly ascending"));
            }
        }
        Ok(())
    }
}
