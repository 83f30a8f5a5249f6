//! Node label text (`<identifier> <label>` per line) resolved against a
//! graph's sorted identifier table.

use std::path::Path;

use crate::error::Result;
use crate::graph::DirectedGraph;

/// Resolves every `identifier label` line of `text` against `graph`.
///
/// Tokens are whitespace-separated; lines with fewer than two tokens and
/// identifiers unknown to the graph are skipped. A later line for the same
/// node replaces an earlier one. Nodes without a matching line map to `None`.
pub fn parse_labels<E>(graph: &DirectedGraph<E>, text: &str) -> Vec<Option<String>> {
    let mut labels = vec![None; graph.node_num() as usize];
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let (Some(id), Some(label)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        if let Some(node) = graph.node_by_label(id) {
            labels[node as usize] = Some(label.to_owned());
        }
    }
    labels
}

/// Reads the label file at `path`; see [`parse_labels`].
///
/// # Errors
/// [`Error::Io`](crate::Error::Io) if the file cannot be read.
pub fn read_labels<E, P: AsRef<Path>>(graph: &DirectedGraph<E>, path: P) -> Result<Vec<Option<String>>> {
    let bytes = std::fs::read(path)?;
    Ok(parse_labels(graph, &String::from_utf8_lossy(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::parse_edge_list;

    #[test]
    fn resolves_known_identifiers() {
        let graph = parse_edge_list(b"u1 u2\nu2 u3\n", b' ').unwrap();
        let labels = parse_labels(&graph, "u2 blue\nu9 red\nu1\tgreen extra\n\nu2 teal\n");
        assert_eq!(
            labels,
            vec![Some("green".to_owned()), Some("teal".to_owned()), None]
        );
    }

    #[test]
    fn unlabeled_graph_gets_nothing() {
        let graph = DirectedGraph::build(2, &[0], &[1]).unwrap();
        assert_eq!(parse_labels(&graph, "0 x\n1 y\n"), vec![None, None]);
    }
}
