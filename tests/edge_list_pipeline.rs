use coda::io::{load_matrix, parse_edge_list, read_edge_list, read_labels, save_matrix};
use coda::{DirectedGraph, Error, GraphFormat};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::PathBuf;

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("coda-{}-{name}", std::process::id()))
}

#[test]
fn test_edge_list_to_binary_file_and_back() {
    let edges_path = scratch_path("pipeline.tsv");
    std::fs::write(&edges_path, "alice\tbob\nbob\talice\nbob\tcarol\r\ncarol\tdave\ndave\tcarol\nalice\tbob\n").unwrap();

    let graph = read_edge_list(&edges_path, b'\t').unwrap();
    assert_eq!(graph.node_num(), 4);
    assert_eq!(graph.edge_num(), 5);

    let alice = graph.node_by_label("alice").unwrap();
    let bob = graph.node_by_label("bob").unwrap();
    let carol = graph.node_by_label("carol").unwrap();
    assert!(graph.has_edge(alice, bob));
    assert!(graph.has_edge(bob, carol));
    assert!(!graph.has_edge(carol, bob));
    assert_eq!(graph.bi_degree(bob), 1);

    let graph_path = scratch_path("pipeline.bin");
    graph
        .save(&mut BufWriter::new(File::create(&graph_path).unwrap()), GraphFormat::Compressed)
        .unwrap();
    let loaded: DirectedGraph = DirectedGraph::load(&mut BufReader::new(File::open(&graph_path).unwrap())).unwrap();
    assert_eq!(loaded.labels(), graph.labels());
    for u in 0..4 {
        assert_eq!(loaded.out_neighbors(u), graph.out_neighbors(u));
        assert_eq!(loaded.in_neighbors(u), graph.in_neighbors(u));
    }

    let labels_path = scratch_path("pipeline.labels");
    std::fs::write(&labels_path, "carol red\nerin blue\nalice green\n\nbob\n").unwrap();
    let labels = read_labels(&loaded, &labels_path).unwrap();
    assert_eq!(labels[alice as usize].as_deref(), Some("green"));
    assert_eq!(labels[carol as usize].as_deref(), Some("red"));
    assert_eq!(labels[bob as usize], None);

    for path in [edges_path, graph_path, labels_path] {
        let _ = std::fs::remove_file(path);
    }
}

#[test]
fn test_malformed_line_is_reported() {
    let err = parse_edge_list(b"1 2\n2 3\n3-4\n", b' ').unwrap_err();
    match err {
        Error::MalformedEdge { line, content } => {
            assert_eq!(line, 2);
            assert_eq!(content, "3-4");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let err = read_edge_list(scratch_path("does-not-exist"), b' ').unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_matrix_dump_and_short_read() {
    let data: Vec<f32> = (0..12).map(|i| i as f32 * 0.25).collect();
    let mut buf = Vec::new();
    save_matrix(&mut buf, &data).unwrap();
    assert_eq!(buf.len(), 12 * 4);

    assert_eq!(load_matrix(&mut Cursor::new(&buf), 4, 3).unwrap(), data);
    let err = load_matrix(&mut Cursor::new(&buf), 5, 3).unwrap_err();
    assert!(matches!(err, Error::Truncated { expected: 15, .. }));
}
