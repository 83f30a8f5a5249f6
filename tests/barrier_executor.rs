use coda::concurrency::{BarrierExecutor, LaneState};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

#[test]
fn test_hundred_rounds_touch_every_node_once_per_round() {
    const LANES: usize = 8;
    const NODES: usize = 1000;
    const ROUNDS: u32 = 100;

    let mut exec = BarrierExecutor::new(NODES, LANES);
    let counters: Vec<AtomicU32> = (0..NODES).map(|_| AtomicU32::new(0)).collect();
    // Round in which each node was last visited.
    let stamps: Vec<AtomicU32> = (0..NODES).map(|_| AtomicU32::new(0)).collect();

    for round in 1..=ROUNDS {
        exec.round(|i| {
            let previous = stamps[i].swap(round, Ordering::Relaxed);
            assert_eq!(previous, round - 1, "node {i} visited twice in round {round}");
            counters[i].fetch_add(1, Ordering::Relaxed);
        });
    }

    assert!(counters.iter().all(|c| c.load(Ordering::Relaxed) == ROUNDS));
    assert_eq!(exec.rounds(), u64::from(ROUNDS));
    assert_eq!(exec.lane_states(), vec![LaneState::Suspended; LANES]);
}

#[test]
fn test_round_rows_gives_exclusive_rows() {
    let mut exec = BarrierExecutor::new(0, 3);
    let mut matrix = vec![0u64; 50 * 4];
    for _ in 0..10 {
        exec.round_rows(&mut matrix, 4, |i, row| {
            for (c, x) in row.iter_mut().enumerate() {
                *x += (i * 4 + c) as u64;
            }
        });
    }
    for (idx, &x) in matrix.iter().enumerate() {
        assert_eq!(x, idx as u64 * 10);
    }
}

#[test]
fn test_rounds_see_previous_round_writes() {
    // Jacobi-style: round r reads what round r - 1 wrote.
    let mut exec = BarrierExecutor::new(64, 4);
    let mut current = vec![1u64; 64];
    let mut next = vec![0u64; 64];
    for _ in 0..5 {
        let prev = &current;
        exec.round_map(&mut next, |i| prev[i] + prev[(i + 1) % 64]);
        std::mem::swap(&mut current, &mut next);
    }
    assert!(current.iter().all(|&x| x == 32));
}

#[test]
fn test_empty_rounds_and_drop() {
    let hits = AtomicUsize::new(0);
    {
        let mut exec = BarrierExecutor::new(0, 2);
        exec.round(|_| {
            hits.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(exec.rounds(), 1);
    }
    assert_eq!(hits.into_inner(), 0);
}
