//! # `coda` - Overlapping Communities in Directed Graphs
//!
//! Fits a directed affiliation model to a graph: every node gets nonnegative
//! "outgoing" and "incoming" strengths per community, and the probability of
//! an edge `u -> v` grows with how much `u`'s outgoing strengths overlap
//! `v`'s incoming ones. Communities are recovered by projected gradient
//! ascent on the log-likelihood, parallelized over nodes.
//!
//! ## Architecture
//!
//! 1. **Graph store** ([`graph::DirectedGraph`]):
//!    - Paired CSR (out- and in-adjacency), built in \(O(n + m)\)
//!    - Every neighbor run split into a mutual prefix and a one-directional
//!      suffix, both ascending
//!    - Plain or delta/varint-compressed binary storage, optional labels and
//!      edge attributes
//!
//! 2. **Barrier executor** ([`concurrency::BarrierExecutor`]):
//!    - Persistent lanes, one rendezvous per round
//!    - Static round-robin item ownership, so each item's row is written by
//!      exactly one lane
//!
//! 3. **Affiliation model** ([`model::AffiliationModel`]):
//!    - Likelihood and gradient kernels run as executor rounds
//!    - Backtracking line search with a sufficient-gain test
//!    - Random, egonet and minimal-conductance seeding
//!
//! ## Example
//!
//! ```rust
//! use coda::io::parse_edge_list;
//! use coda::model::{AffiliationModel, OptimizerConfig};
//!
//! let graph = parse_edge_list(b"a b\nb a\nb c\nc a\nd e\ne d\n", b' ').unwrap();
//! assert_eq!(graph.node_num(), 5);
//!
//! let mut model = AffiliationModel::new(&graph, 2, 2).unwrap();
//! model.init_neighborhood(None);
//! model.converge(&OptimizerConfig::default(), None);
//! assert!(model.affinity_out().iter().all(|&x| x >= 0.0));
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

pub mod concurrency;
pub mod error;
pub mod graph;
pub mod io;
pub mod model;

pub use concurrency::{BarrierExecutor, DoubleBuffer, LaneState};
pub use error::{Error, Result};
pub use graph::{DirectedGraph, GraphBuilder, GraphFormat, NodeId};
pub use model::{AffiliationModel, OptimizerConfig, SeedStrategy, TrainConfig};
