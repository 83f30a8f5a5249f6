//! Edge-list to CSR construction.

use super::{DirectedGraph, EdgeAttrs, NodeId};
use crate::error::{Error, Result};

const OUT_TAG: u8 = 1;
const IN_TAG: u8 = 2;
const BI_TAG: u8 = OUT_TAG | IN_TAG;

/// Incremental edge collector producing a [`DirectedGraph`].
///
/// # Example
/// ```
/// use coda::graph::GraphBuilder;
///
/// let mut builder = GraphBuilder::new(3);
/// builder.edge(0, 1).edge(1, 0).edge(1, 2);
/// let graph = builder.build().unwrap();
///
/// assert_eq!(graph.edge_num(), 3);
/// assert_eq!(graph.bi_neighbors(1), &[0]);
/// assert!(graph.has_edge(1, 2));
/// assert!(!graph.has_edge(2, 1));
/// ```
#[derive(Clone, Debug)]
pub struct GraphBuilder<E = ()> {
    node_num: u32,
    sources: Vec<NodeId>,
    dests: Vec<NodeId>,
    attrs: Option<Vec<E>>,
    labels: Option<Vec<String>>,
}

impl GraphBuilder<()> {
    /// Starts an attribute-free graph on `node_num` nodes.
    pub fn new(node_num: u32) -> Self {
        Self {
            node_num,
            sources: Vec::new(),
            dests: Vec::new(),
            attrs: None,
            labels: None,
        }
    }

    /// Adds the edge `from -> to`.
    pub fn edge(&mut self, from: NodeId, to: NodeId) -> &mut Self {
        self.sources.push(from);
        self.dests.push(to);
        self
    }

    /// Adds every `(from, to)` pair of `edges`.
    pub fn edges<I: IntoIterator<Item = (NodeId, NodeId)>>(&mut self, edges: I) -> &mut Self {
        for (from, to) in edges {
            self.edge(from, to);
        }
        self
    }
}

impl<E: Copy> GraphBuilder<E> {
    /// Starts a graph on `node_num` nodes whose edges carry an `E` each.
    pub fn with_edge_attrs(node_num: u32) -> Self {
        Self {
            node_num,
            sources: Vec::new(),
            dests: Vec::new(),
            attrs: Some(Vec::new()),
            labels: None,
        }
    }

    /// Adds the edge `from -> to` carrying `attr`.
    ///
    /// # Panics
    /// Panics if the builder was created without attribute storage.
    pub fn edge_with(&mut self, from: NodeId, to: NodeId, attr: E) -> &mut Self {
        let attrs = self
            .attrs
            .as_mut()
            .expect("builder was created without edge attributes");
        attrs.push(attr);
        self.sources.push(from);
        self.dests.push(to);
        self
    }

    /// Attaches a label table, one entry per node.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] if `labels.len() != node_num`.
    pub fn labels(&mut self, labels: Vec<String>) -> Result<&mut Self> {
        if labels.len() != self.node_num as usize {
            return Err(Error::DimensionMismatch {
                expected: self.node_num as usize,
                found: labels.len(),
            });
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// Number of edges added so far, duplicates included.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if no edge was added.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Finishes construction.
    ///
    /// # Errors
    /// [`Error::NodeOutOfRange`] if an endpoint is `>= node_num`.
    pub fn build(self) -> Result<DirectedGraph<E>> {
        assemble(
            self.node_num,
            &self.sources,
            &self.dests,
            self.attrs.as_deref(),
            self.labels,
        )
    }
}

/// Stable counting sort of `ids` into `buckets` keyed by `key`.
///
/// Returns the sorted ids and the `buckets + 1` bucket boundaries.
fn bucket_by(ids: &[usize], buckets: usize, key: impl Fn(usize) -> usize) -> (Vec<usize>, Vec<usize>) {
    let mut bounds = vec![0usize; buckets + 1];
    for &id in ids {
        bounds[key(id) + 1] += 1;
    }
    for i in 0..buckets {
        bounds[i + 1] += bounds[i];
    }
    let mut cursor = bounds[..buckets].to_vec();
    let mut sorted = vec![0usize; ids.len()];
    for &id in ids {
        let k = key(id);
        sorted[cursor[k]] = id;
        cursor[k] += 1;
    }
    (sorted, bounds)
}

pub(super) fn assemble<E: Copy>(
    node_num: u32,
    sources: &[NodeId],
    dests: &[NodeId],
    attrs: Option<&[E]>,
    labels: Option<Vec<String>>,
) -> Result<DirectedGraph<E>> {
    if sources.len() != dests.len() {
        return Err(Error::LengthMismatch {
            sources: sources.len(),
            dests: dests.len(),
        });
    }
    if let Some(&bad) = sources.iter().chain(dests).find(|&&v| v >= node_num) {
        return Err(Error::NodeOutOfRange {
            node: u64::from(bad),
            node_num,
        });
    }
    debug_assert!(attrs.map_or(true, |a| a.len() == sources.len()));

    let n = node_num as usize;
    let src = |e: usize| sources[e] as usize;
    let dst = |e: usize| dests[e] as usize;

    // Bucketing by destination and then by source leaves each source bucket
    // ordered by destination, so repeated pairs end up adjacent.
    let all: Vec<usize> = (0..sources.len()).collect();
    let (by_dest, _) = bucket_by(&all, n, dst);
    drop(all);
    let (by_source, source_bounds) = bucket_by(&by_dest, n, src);
    drop(by_dest);

    let mut out_ids = Vec::with_capacity(by_source.len());
    let mut out_offsets = vec![0u64; n + 1];
    for u in 0..n {
        let mut last = None;
        for &e in &by_source[source_bounds[u]..source_bounds[u + 1]] {
            if last != Some(dests[e]) {
                out_ids.push(e);
                last = Some(dests[e]);
            }
        }
        out_offsets[u + 1] = out_ids.len() as u64;
    }
    drop(by_source);

    // Walking sources in ascending order fills each destination bucket in
    // ascending source order.
    let (in_ids, in_bounds) = bucket_by(&out_ids, n, dst);
    let in_offsets: Vec<u64> = in_bounds.iter().map(|&b| b as u64).collect();

    let mut out_nbrs: Vec<NodeId> = out_ids.iter().map(|&e| dests[e]).collect();
    let mut in_nbrs: Vec<NodeId> = in_ids.iter().map(|&e| sources[e]).collect();
    let mut edge_attrs = attrs.map(|a| EdgeAttrs {
        out: out_ids.iter().map(|&e| a[e]).collect(),
        inc: in_ids.iter().map(|&e| a[e]).collect(),
    });
    drop(out_ids);
    drop(in_ids);

    let mut bi_degrees = vec![0u32; n];
    let mut tags = vec![0u8; n];
    let mut scratch = Partitioner::default();
    for u in 0..n {
        let out = out_offsets[u] as usize..out_offsets[u + 1] as usize;
        let inc = in_offsets[u] as usize..in_offsets[u + 1] as usize;

        for &v in &out_nbrs[out.clone()] {
            tags[v as usize] |= OUT_TAG;
        }
        for &v in &in_nbrs[inc.clone()] {
            tags[v as usize] |= IN_TAG;
        }

        let bi = scratch.split(
            &mut out_nbrs[out.clone()],
            edge_attrs.as_mut().map(|a| &mut a.out[out.clone()]),
            &tags,
        );
        let bi_in = scratch.split(
            &mut in_nbrs[inc.clone()],
            edge_attrs.as_mut().map(|a| &mut a.inc[inc.clone()]),
            &tags,
        );
        debug_assert_eq!(bi, bi_in);
        bi_degrees[u] = bi as u32;

        for &v in out_nbrs[out].iter().chain(&in_nbrs[inc]) {
            tags[v as usize] = 0;
        }
    }

    let edge_num = out_nbrs.len() as u64;
    tracing::debug!(
        nodes = node_num,
        edges = edge_num,
        collapsed = sources.len() as u64 - edge_num,
        "built directed graph"
    );

    Ok(DirectedGraph {
        node_num,
        edge_num,
        out_offsets,
        in_offsets,
        bi_degrees,
        out_nbrs,
        in_nbrs,
        edge_attrs,
        labels,
    })
}

/// Reusable buffers for the stable mutual/one-directional split.
struct Partitioner<E> {
    order: Vec<usize>,
    nodes: Vec<NodeId>,
    attrs: Vec<E>,
}

impl<E> Default for Partitioner<E> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            nodes: Vec::new(),
            attrs: Vec::new(),
        }
    }
}

impl<E: Copy> Partitioner<E> {
    /// Moves mutual neighbors (tagged both ways) to the front of `run`,
    /// preserving relative order on both sides. Returns the mutual count.
    fn split(&mut self, run: &mut [NodeId], attrs: Option<&mut [E]>, tags: &[u8]) -> usize {
        self.order.clear();
        self.order
            .extend((0..run.len()).filter(|&p| tags[run[p] as usize] == BI_TAG));
        let bi = self.order.len();
        if bi == 0 || bi == run.len() {
            return bi;
        }
        self.order
            .extend((0..run.len()).filter(|&p| tags[run[p] as usize] != BI_TAG));

        self.nodes.clear();
        self.nodes.extend(self.order.iter().map(|&p| run[p]));
        run.copy_from_slice(&self.nodes);

        if let Some(attrs) = attrs {
            self.attrs.clear();
            self.attrs.extend(self.order.iter().map(|&p| attrs[p]));
            attrs.copy_from_slice(&self.attrs);
        }
        bi
    }
}
