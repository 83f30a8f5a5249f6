//! Round-based parallel execution over per-node work.
//!
//! The optimizer drives all of its per-node passes through a
//! [`BarrierExecutor`]: a fixed set of lanes that run one operation per
//! round, each lane owning a static round-robin share of the items. Writes go
//! through [`round_rows`](BarrierExecutor::round_rows) /
//! [`round_map`](BarrierExecutor::round_map), which hand every item an
//! exclusive borrow of its own row, and reads of the previous round's state
//! stay shared.

pub mod disjoint;
pub mod double_buffer;
pub mod executor;

pub use disjoint::DisjointRows;
pub use double_buffer::DoubleBuffer;
pub use executor::{BarrierExecutor, LaneState};
