//! Edge-list text to labeled [`DirectedGraph`].
//!
//! Each line holds one edge: a source identifier, a single separator byte
//! and a destination identifier. Identifiers are UTF-8 strings;
//! the distinct ones are sorted and node `i` is the `i`-th smallest, so the
//! label table of the result is sorted and supports
//! [`DirectedGraph::node_by_label`].

use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::graph::{DirectedGraph, GraphBuilder, NodeId};

/// Splits `text` into lines ending in `\n`, `\r\n` or `\r`.
///
/// A terminator at the very end does not start another line.
pub(crate) fn lines(text: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(end) => {
                let line = &rest[..end];
                let skip = if rest[end] == b'\r' && rest.get(end + 1) == Some(&b'\n') {
                    2
                } else {
                    1
                };
                rest = &rest[end + skip..];
                Some(line)
            }
            None => {
                let line = rest;
                rest = &[];
                Some(line)
            }
        }
    })
}

/// Parses an edge list held in memory.
///
/// Repeated edges collapse into one; see [`GraphBuilder`].
///
/// # Errors
/// [`Error::MalformedEdge`] for the first line without `separator` or
/// with an identifier that is not UTF-8.
pub fn parse_edge_list(text: &[u8], separator: u8) -> Result<DirectedGraph> {
    let mut edges: Vec<(&str, &str)> = Vec::new();
    for (line, raw) in lines(text).enumerate() {
        let malformed = || Error::MalformedEdge {
            line,
            content: String::from_utf8_lossy(raw).into_owned(),
        };
        let at = raw.iter().position(|&b| b == separator).ok_or_else(malformed)?;
        let source = std::str::from_utf8(&raw[..at]).map_err(|_| malformed())?;
        let dest = std::str::from_utf8(&raw[at + 1..]).map_err(|_| malformed())?;
        edges.push((source, dest));
    }

    let mut ids: Vec<&str> = edges.iter().flat_map(|&(a, b)| [a, b]).collect();
    #[cfg(feature = "parallel")]
    ids.par_sort_unstable();
    #[cfg(not(feature = "parallel"))]
    ids.sort_unstable();
    ids.dedup();

    let node_num = u32::try_from(ids.len()).map_err(|_| Error::NodeOutOfRange {
        node: ids.len() as u64,
        node_num: u32::MAX,
    })?;
    // Every token is in `ids`, so the search always hits.
    let node_of = |token: &str| ids.binary_search(&token).unwrap_or_else(|i| i) as NodeId;

    let mut builder = GraphBuilder::new(node_num);
    builder.edges(edges.iter().map(|&(a, b)| (node_of(a), node_of(b))));
    builder.labels(ids.iter().map(|&id| id.to_owned()).collect())?;

    tracing::info!(nodes = node_num, lines = edges.len(), "parsed edge list");
    builder.build()
}

/// Reads and parses the edge-list file at `path`.
///
/// # Errors
/// [`Error::Io`] if the file cannot be read, otherwise as [`parse_edge_list`].
pub fn read_edge_list<P: AsRef<Path>>(path: P, separator: u8) -> Result<DirectedGraph> {
    let text = std::fs::read(path)?;
    parse_edge_list(&text, separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_terminators() {
        let text = b"a\nb\r\nc\rd\n";
        let got: Vec<&[u8]> = lines(text).collect();
        assert_eq!(got, vec![&b"a"[..], &b"b"[..], &b"c"[..], &b"d"[..]]);
        assert_eq!(lines(b"").count(), 0);
        assert_eq!(lines(b"x").count(), 1);
    }

    #[test]
    fn identifiers_become_sorted_labels() {
        let graph = parse_edge_list(b"bob\talice\nalice\tbob\ncarol\tbob\n", b'\t').unwrap();
        assert_eq!(graph.node_num(), 3);
        assert_eq!(
            graph.labels().unwrap(),
            &["alice".to_owned(), "bob".to_owned(), "carol".to_owned()]
        );
        let (alice, bob, carol) = (0, 1, 2);
        assert!(graph.has_edge(bob, alice));
        assert!(graph.has_edge(carol, bob));
        assert_eq!(graph.bi_neighbors(alice), &[bob]);
        assert_eq!(graph.node_by_label("carol"), Some(carol));
    }

    #[test]
    fn missing_separator_is_reported() {
        let err = parse_edge_list(b"1 2\n3-4\n", b' ').unwrap_err();
        match err {
            Error::MalformedEdge { line, content } => {
                assert_eq!(line, 1);
                assert_eq!(content, "3-4");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_utf8_identifier_is_rejected() {
        // Both would read back as "a\u{FFFD}" if decoded lossily.
        let err = parse_edge_list(b"a\xff b\na\xfe b\n", b' ').unwrap_err();
        assert!(matches!(err, Error::MalformedEdge { line: 0, .. }));
    }

    #[test]
    fn only_first_separator_splits() {
        let graph = parse_edge_list(b"a,b,c\n", b',').unwrap();
        assert_eq!(graph.labels().unwrap(), &["a".to_owned(), "b,c".to_owned()]);
        assert_eq!(graph.edge_num(), 1);
    }
}
