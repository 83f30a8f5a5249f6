//! Crate-wide error type.

use core::fmt;
use std::io;

/// Result alias for `coda`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by graph construction, serialization, and the affiliation model.
#[derive(Debug)]
pub enum Error {
    /// Underlying reader or writer failed.
    Io(io::Error),

    /// A section ended before all of its elements were transferred.
    Truncated {
        /// Which section was being transferred.
        section: &'static str,
        /// Number of elements requested.
        expected: usize,
        /// Number of elements actually transferred.
        found: usize,
    },

    /// The leading format tag is neither plain nor compressed.
    UnknownFormat(u8),

    /// Decoded structure violates the CSR invariants.
    Corrupt(&'static str),

    /// Stored edge-attribute width does not match the requested attribute type.
    AttrLayout {
        /// `size_of::<E>()` of the requested type.
        expected: usize,
        /// Width recorded in the file.
        found: usize,
    },

    /// Source and destination arrays differ in length.
    LengthMismatch {
        /// Number of sources.
        sources: usize,
        /// Number of destinations.
        dests: usize,
    },

    /// An edge endpoint is not a valid node id.
    NodeOutOfRange {
        /// Offending id.
        node: u64,
        /// Number of nodes in the graph.
        node_num: u32,
    },

    /// An edge-list line has no separator or a non-UTF-8 identifier.
    MalformedEdge {
        /// Zero-based line index.
        line: usize,
        /// Line content (lossy UTF-8).
        content: String,
    },

    /// Cluster count must be positive.
    InvalidClusterCount(usize),

    /// Matrix dimension mismatch.
    DimensionMismatch {
        /// Expected number of elements.
        expected: usize,
        /// Provided number of elements.
        found: usize,
    },

    /// Affinities must be finite and nonnegative.
    InvalidAffinity {
        /// Row of the offending value.
        node: usize,
        /// Column of the offending value.
        cluster: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "i/o error: {e}"),
            Error::Truncated {
                section,
                expected,
                found,
            } => write!(
                f,
                "truncated {section}: expected {expected} elements, transferred {found}"
            ),
            Error::UnknownFormat(tag) => write!(f, "unknown graph format tag {tag}"),
            Error::Corrupt(what) => write!(f, "corrupt graph data: {what}"),
            Error::AttrLayout { expected, found } => write!(
                f,
                "edge attribute width mismatch: expected {expected} bytes, file has {found}"
            ),
            Error::LengthMismatch { sources, dests } => write!(
                f,
                "edge endpoint arrays differ in length: {sources} sources, {dests} destinations"
            ),
            Error::NodeOutOfRange { node, node_num } => {
                write!(f, "node {node} is out of range for {node_num} nodes")
            }
            Error::MalformedEdge { line, content } => {
                write!(f, "incorrect format in line {line}: {content}")
            }
            Error::InvalidClusterCount(k) => write!(f, "invalid cluster count {k}"),
            Error::DimensionMismatch { expected, found } => write!(
                f,
                "dimension mismatch: expected {expected} elements, found {found}"
            ),
            Error::InvalidAffinity { node, cluster } => write!(
                f,
                "affinity at node {node}, cluster {cluster} is negative or not finite"
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
