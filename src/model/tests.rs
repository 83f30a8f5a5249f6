//! Tests for the affiliation model.

use super::*;

fn triangle() -> DirectedGraph {
    DirectedGraph::build(3, &[0, 1, 2], &[1, 2, 0]).unwrap()
}

/// Two bidirectional 4-cliques joined by a single edge 3 -> 4.
fn two_cliques() -> DirectedGraph {
    let mut sources = Vec::new();
    let mut dests = Vec::new();
    for base in [0u32, 4] {
        for a in 0..4 {
            for b in 0..4 {
                if a != b {
                    sources.push(base + a);
                    dests.push(base + b);
                }
            }
        }
    }
    sources.push(3);
    dests.push(4);
    DirectedGraph::build(8, &sources, &dests).unwrap()
}

fn direct_likelihood(graph: &DirectedGraph, out: &[f32], inc: &[f32], k: usize, node: u32) -> f64 {
    let n = graph.node_num() as usize;
    let row = |m: &[f32], i: usize| m[i * k..(i + 1) * k].to_vec();
    let mut total = 0.0f64;
    for c in 0..k {
        let sum_in: f64 = (0..n).map(|i| f64::from(inc[i * k + c])).sum();
        total -= f64::from(out[node as usize * k + c]) * (sum_in - f64::from(inc[node as usize * k + c]));
    }
    for &v in graph.out_neighbors(node) {
        let s: f64 = row(out, node as usize)
            .iter()
            .zip(row(inc, v as usize))
            .map(|(a, b)| f64::from(*a) * f64::from(b))
            .sum();
        let p = (1.0 - (-s).exp()).max(1.0 / n as f64);
        total += s + p.ln();
    }
    total
}

#[test]
fn test_rejects_zero_clusters() {
    let graph = triangle();
    assert!(matches!(
        AffiliationModel::new(&graph, 0, 1),
        Err(Error::InvalidClusterCount(0))
    ));
}

#[test]
fn test_triangle_likelihood_matches_formula() {
    let graph = triangle();
    let mut model = AffiliationModel::new(&graph, 1, 2).unwrap();
    model.init_random(42);
    assert_eq!(model.background_prob(), 1.0 / 3.0);

    let out = model.affinity_out().to_vec();
    let inc = model.affinity_in().to_vec();
    let mut expected_total = 0.0;
    for node in 0..3 {
        let expected = direct_likelihood(&graph, &out, &inc, 1, node);
        let got = model.node_likelihood(node);
        assert!((got - expected).abs() < 1e-5, "node {node}: {got} vs {expected}");
        expected_total += expected;
    }
    assert!((model.likelihood() - expected_total).abs() < 1e-5);
}

#[test]
fn test_random_init_is_reproducible() {
    let graph = two_cliques();
    let mut a = AffiliationModel::new(&graph, 3, 2).unwrap();
    let mut b = AffiliationModel::new(&graph, 3, 3).unwrap();
    a.init_random(9);
    b.init_random(9);
    assert_eq!(a.affinity_out(), b.affinity_out());
    assert_eq!(a.affinity_in(), b.affinity_in());
    assert!(a.affinity_out().iter().all(|&x| (0.0..1.0).contains(&x)));

    let sum0: f32 = (0..8).map(|i| a.affinity_in_row(i)[0]).sum();
    assert!((a.cluster_sums_in()[0] - sum0).abs() < 1e-5);
}

#[test]
fn test_zero_gradient_is_a_noop() {
    let graph = two_cliques();
    let mut model = AffiliationModel::new(&graph, 2, 2).unwrap();
    // No candidates: every affinity is zero, so both gradients vanish.
    model.init_neighborhood(Some(&[false; 8][..]));
    let before = model.likelihood();

    let cfg = OptimizerConfig::default();
    assert_eq!(model.iterate_out(&cfg, None), 0.0);
    assert_eq!(model.iterate_in(&cfg, None), 0.0);

    assert!(model.gradient_out().iter().all(|&g| g == 0.0));
    assert!(model.gradient_in().iter().all(|&g| g == 0.0));
    assert!(model.affinity_out().iter().all(|&x| x == 0.0));
    assert!(model.affinity_in().iter().all(|&x| x == 0.0));
    assert_eq!(model.likelihood(), before);
}

#[test]
fn test_accepted_step_raises_likelihood() {
    let graph = two_cliques();
    let mut model = AffiliationModel::new(&graph, 2, 4).unwrap();
    model.init_random(3);
    let cfg = OptimizerConfig::default();

    let l0 = model.likelihood();
    let step = model.iterate_out(&cfg, None);
    assert!(step > 0.0);
    let l1 = model.likelihood();
    assert!(l1 > l0);

    let step = model.iterate_in(&cfg, None);
    assert!(step > 0.0);
    assert!(model.likelihood() > l1);
    assert!(model.affinity_in().iter().all(|&x| x >= 0.0));
}

#[test]
fn test_converge_improves_and_stays_projected() {
    let graph = two_cliques();
    let mut model = AffiliationModel::new(&graph, 2, 2).unwrap();
    model.init_random(11);
    let before = model.likelihood();

    let gain = model.converge(&OptimizerConfig::default(), None);
    let after = model.likelihood();
    assert!(after > before);
    assert!((gain - relative_gain(before, after)).abs() < 1e-12);
    assert!(model.affinity_out().iter().all(|&x| x >= 0.0 && x.is_finite()));
}

#[test]
fn test_masked_likelihood_sums_selected_nodes() {
    let graph = two_cliques();
    let mut model = AffiliationModel::new(&graph, 2, 2).unwrap();
    model.init_random(5);
    let mask = [true, false, true, false, false, false, false, true];
    let expected: f64 = [0u32, 2, 7].iter().map(|&i| model.node_likelihood(i)).sum();
    assert!((model.likelihood_masked(Some(&mask[..])) - expected).abs() < 1e-9);
}

#[test]
fn test_neighborhood_seeding_assignments() {
    // 0 <-> 1, 0 -> 2, 2 -> 3, 3 -> 0, node 4 isolated.
    let graph = DirectedGraph::build(5, &[0, 1, 0, 2, 3], &[1, 0, 2, 3, 0]).unwrap();
    let mut model = AffiliationModel::new(&graph, 2, 2).unwrap();
    model.init_neighborhood(None);

    // Scores: 0 -> 4, 2 -> 3, 3 -> 3, 1 -> 2, 4 -> 1; the tie goes to 3.
    // Cluster 0 is 0's egonet {1, 2, 3}.
    let col = |m: &[f32], c: usize| (0..5).map(|i| m[i * 2 + c]).collect::<Vec<_>>();
    assert_eq!(col(model.affinity_out(), 0), [0.0, 1.0, 1.0, 1.0, 0.0]);
    assert_eq!(col(model.affinity_in(), 0), [0.0, 1.0, 1.0, 1.0, 0.0]);
    // Cluster 1 is 3's egonet {0, 2}.
    assert_eq!(col(model.affinity_out(), 1), [1.0, 0.0, 1.0, 0.0, 0.0]);
    assert_eq!(col(model.affinity_in(), 1), [1.0, 0.0, 1.0, 0.0, 0.0]);

    assert_eq!(model.cluster_sums_out(), &[3.0, 2.0]);
}

#[test]
fn test_min_neighborhood_on_a_star() {
    // Center 0 mutually linked to 1..=4; node 5 isolated.
    let mut sources = Vec::new();
    let mut dests = Vec::new();
    for leaf in 1..=4 {
        sources.extend([0, leaf]);
        dests.extend([leaf, 0]);
    }
    let graph = DirectedGraph::build(6, &sources, &dests).unwrap();
    let mut model = AffiliationModel::new(&graph, 2, 3).unwrap();
    model.init_min_neighborhood(None);

    assert_eq!(model.conductance(0), 0.0);
    // Volume 10, six of eight sampled second-hop nodes are cut: 6 * 10 / 8 = 7.
    assert_eq!(model.conductance(1), 7.0 / 8.0);
    assert_eq!(model.conductance(5), CONDUCTANCE_SENTINEL);

    // Only the center is a local minimum.
    for leaf in 1..=4 {
        assert_eq!(model.affinity_out_row(leaf), &[1.0, 0.0]);
        assert_eq!(model.affinity_in_row(leaf), &[1.0, 0.0]);
    }
    assert_eq!(model.affinity_out_row(0), &[0.0, 0.0]);
    assert_eq!(model.cluster_sums_in(), &[4.0, 0.0]);

    // Restricting seeds to the isolated node leaves no candidate.
    let mut mask = [false; 6];
    mask[5] = true;
    model.init_min_neighborhood(Some(&mask[..]));
    assert!(model.affinity_out().iter().all(|&x| x == 0.0));
}

#[test]
fn test_set_affinities_validates_and_invalidates() {
    let graph = triangle();
    let mut model = AffiliationModel::new(&graph, 2, 1).unwrap();
    let zeros = model.likelihood();

    assert!(matches!(
        model.set_affinities(&[0.0; 5], &[0.0; 6]),
        Err(Error::DimensionMismatch { expected: 6, found: 5 })
    ));
    let mut bad = [0.5f32; 6];
    bad[3] = -1.0;
    assert!(matches!(
        model.set_affinities(&[0.5; 6], &bad),
        Err(Error::InvalidAffinity { node: 1, cluster: 1 })
    ));

    model.set_affinities(&[0.5; 6], &[0.5; 6]).unwrap();
    assert_eq!(model.cluster_sums_out(), &[1.5, 1.5]);
    assert_ne!(model.likelihood(), zeros);
}

#[test]
fn test_masked_step_accepts_on_masked_total_and_moves_every_row() {
    let graph = two_cliques();
    let mut model = AffiliationModel::new(&graph, 2, 3).unwrap();
    model.init_random(3);
    let cfg = OptimizerConfig::default();
    let mask = [true, true, true, true, false, false, false, false];

    let l0 = model.likelihood_masked(Some(&mask[..]));
    let before = model.affinity_out().to_vec();
    let step = model.iterate_out(&cfg, Some(&mask[..]));
    assert!(step > 0.0);

    let grad = model.gradient_out().to_vec();
    let norm2: f64 = grad.iter().map(|&g| f64::from(g) * f64::from(g)).sum();
    let l1 = model.likelihood_masked(Some(&mask[..]));
    assert!(l1 > l0 + f64::from(step) * (norm2 * f64::from(cfg.scale)));

    // Nodes outside the mask are stepped like the rest.
    for i in 4..8 {
        for c in 0..2 {
            let expected = (before[i * 2 + c] + step * grad[i * 2 + c]).max(0.0);
            assert_eq!(model.affinity_out_row(i as u32)[c], expected);
        }
    }
    assert_ne!(&model.affinity_out()[8..], &before[8..]);
}

#[test]
fn test_masked_converge_does_not_lower_masked_likelihood() {
    let graph = two_cliques();
    let mut model = AffiliationModel::new(&graph, 2, 2).unwrap();
    model.init_random(11);
    let mask = [false, true, true, true, true, true, true, false];

    let before = model.likelihood_masked(Some(&mask[..]));
    let gain = model.converge(&OptimizerConfig::default(), Some(&mask[..]));
    let after = model.likelihood_masked(Some(&mask[..]));
    assert!(after >= before);
    assert!((gain - relative_gain(before, after)).abs() < 1e-12);
}
