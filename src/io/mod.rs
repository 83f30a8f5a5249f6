//! Text and binary I/O around the graph store and the model.
//!
//! - `chunked`: block-chunked typed transfer and affinity-matrix dumps.
//! - `edge_list`: edge-list text to a labeled graph.
//! - `labels`: per-node label text.

pub mod chunked;
pub mod edge_list;
pub mod labels;

pub use chunked::{load_matrix, read_chunked, save_matrix, write_chunked, BLOCK_BYTES};
pub use edge_list::{parse_edge_list, read_edge_list};
pub use labels::{parse_labels, read_labels};
