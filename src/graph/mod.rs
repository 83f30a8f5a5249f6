//! Graph storage.
//!
//! - `directed`: immutable paired-CSR directed graph with mutual/one-directional
//!   neighbor partitioning, builder and binary (plain or compressed) storage.

pub mod directed;

pub use directed::{DirectedGraph, GraphBuilder, GraphFormat, NodeId};
