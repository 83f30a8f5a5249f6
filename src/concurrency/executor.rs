//! `BarrierExecutor`: persistent lanes driven one barrier round at a time.
//!
//! A round hands one per-item operation to every lane. Lane `l` of `T` runs
//! the operation on items `l, l + T, l + 2T, ...`, so within a round every
//! item (and every row indexed by an item) is owned by exactly one lane.
//!
//! Two `std::sync::Barrier`s sized `lanes + 1` bracket each round:
//!
//! ```text
//! caller:  publish job ─ start.wait() ──────────────── finish.wait() ─ return
//! lane l:              ─ start.wait() ─ run owned items ─ finish.wait() ─ loop
//! ```
//!
//! `round` returns only after every lane has passed `finish`, which is what
//! allows the operation to borrow from the caller's stack.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::io;
use std::sync::{Arc, Barrier, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_utils::CachePadded;

use super::DisjointRows;

/// Observable state of one lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LaneState {
    /// Parked at the start barrier.
    Suspended = 0,
    /// Inside a round.
    Running = 1,
    /// Left its loop during shutdown.
    Exiting = 2,
}

impl LaneState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LaneState::Suspended,
            1 => LaneState::Running,
            _ => LaneState::Exiting,
        }
    }
}

type Op = dyn Fn(usize) + Sync;

/// The operation of the round in flight.
#[derive(Clone, Copy)]
struct Job {
    /// Borrowed from the caller of `round_over` and valid until it returns.
    op: *const Op,
    count: usize,
}

// SAFETY: the pointee is `Sync` and outlives every dereference (see `round_over`).
unsafe impl Send for Job {}

type Payload = Box<dyn Any + Send + 'static>;

struct Shared {
    start: Barrier,
    finish: Barrier,
    /// `None` once shutdown has begun.
    job: Mutex<Option<Job>>,
    states: Box<[CachePadded<AtomicU8>]>,
    panic: Mutex<Option<Payload>>,
    /// Set once every lane is spawned: `true` to enter the round loop,
    /// `false` to exit without touching the barriers.
    gate: Mutex<Option<bool>>,
    gate_open: Condvar,
}

impl Shared {
    fn set_state(&self, lane: usize, state: LaneState) {
        self.states[lane].store(state as u8, Ordering::Release);
    }

    fn open_gate(&self, run: bool) {
        *lock(&self.gate) = Some(run);
        self.gate_open.notify_all();
    }

    fn wait_gate(&self) -> bool {
        let mut gate = lock(&self.gate);
        loop {
            if let Some(run) = *gate {
                return run;
            }
            gate = self
                .gate_open
                .wait(gate)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

type LaneBody = Box<dyn FnOnce() + Send>;

/// A fixed pool of worker lanes executing barrier-synchronized rounds.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use coda::concurrency::BarrierExecutor;
///
/// let mut exec = BarrierExecutor::new(100, 4);
/// let total = AtomicUsize::new(0);
/// exec.round(|i| {
///     total.fetch_add(i, Ordering::Relaxed);
/// });
/// assert_eq!(total.into_inner(), 4950);
///
/// let mut squares = vec![0usize; 10];
/// exec.round_map(&mut squares, |i| i * i);
/// assert_eq!(squares[9], 81);
/// ```
pub struct BarrierExecutor {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
    node_count: usize,
    rounds: u64,
}

impl BarrierExecutor {
    /// Spawns `lanes` persistent worker threads for rounds over `node_count` items.
    ///
    /// # Panics
    /// Panics if `lanes == 0` or a thread cannot be spawned.
    pub fn new(node_count: usize, lanes: usize) -> Self {
        match Self::try_new(node_count, lanes) {
            Ok(exec) => exec,
            Err(e) => panic!("failed to spawn executor lane: {e}"),
        }
    }

    /// Like [`new`](Self::new), but reports a failed thread spawn.
    ///
    /// Lanes started before the failure are stopped and joined.
    ///
    /// # Errors
    /// The spawn error of the first lane that could not be started.
    ///
    /// # Panics
    /// Panics if `lanes == 0`.
    pub fn try_new(node_count: usize, lanes: usize) -> io::Result<Self> {
        Self::start(node_count, lanes, |lane, body| {
            std::thread::Builder::new()
                .name(format!("coda-lane-{lane}"))
                .spawn(body)
        })
    }

    fn start<S>(node_count: usize, lanes: usize, mut spawn: S) -> io::Result<Self>
    where
        S: FnMut(usize, LaneBody) -> io::Result<JoinHandle<()>>,
    {
        assert!(lanes != 0, "lanes must be > 0");

        let shared = Arc::new(Shared {
            start: Barrier::new(lanes + 1),
            finish: Barrier::new(lanes + 1),
            job: Mutex::new(None),
            states: (0..lanes)
                .map(|_| CachePadded::new(AtomicU8::new(LaneState::Suspended as u8)))
                .collect(),
            panic: Mutex::new(None),
            gate: Mutex::new(None),
            gate_open: Condvar::new(),
        });

        let mut handles = Vec::with_capacity(lanes);
        for lane in 0..lanes {
            let lane_shared = Arc::clone(&shared);
            match spawn(lane, Box::new(move || lane_main(&lane_shared, lane, lanes))) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    shared.open_gate(false);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    tracing::warn!(lane, error = %e, "executor lane failed to spawn");
                    return Err(e);
                }
            }
        }
        shared.open_gate(true);

        tracing::debug!(lanes, node_count, "executor started");
        Ok(Self {
            shared,
            handles,
            node_count,
            rounds: 0,
        })
    }

    /// Number of worker lanes.
    #[inline]
    pub fn lanes(&self) -> usize {
        self.shared.states.len()
    }

    /// Item count used by [`round`](Self::round).
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of completed rounds.
    #[inline]
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Snapshot of every lane's state.
    pub fn lane_states(&self) -> Vec<LaneState> {
        self.shared
            .states
            .iter()
            .map(|s| LaneState::from_u8(s.load(Ordering::Acquire)))
            .collect()
    }

    /// Runs `op(i)` for every `i < node_count()` and waits for all lanes.
    pub fn round<F>(&mut self, op: F)
    where
        F: Fn(usize) + Sync,
    {
        self.round_over(self.node_count, op);
    }

    /// Runs `op(i)` for every `i < count` and waits for all lanes.
    ///
    /// # Panics
    /// If `op` panics on any lane, the round still completes and the first
    /// panic payload is resumed on the calling thread.
    pub fn round_over<F>(&mut self, count: usize, op: F)
    where
        F: Fn(usize) + Sync,
    {
        let op: &(dyn Fn(usize) + Sync) = &op;
        // SAFETY: only the lifetime bound is erased. Lanes dereference the
        // pointer between the two barriers below, and this function does not
        // return before the second one.
        let op = unsafe { std::mem::transmute::<&(dyn Fn(usize) + Sync), *const Op>(op) };

        *lock(&self.shared.job) = Some(Job { op, count });
        self.shared.start.wait();
        self.shared.finish.wait();
        *lock(&self.shared.job) = None;
        self.rounds += 1;

        if let Some(payload) = lock(&self.shared.panic).take() {
            panic::resume_unwind(payload);
        }
    }

    /// Gives `op` exclusive access to row `i` of `out` for every row.
    ///
    /// `out` is split into rows of `width` elements; the round covers
    /// `out.len() / width` items.
    ///
    /// # Panics
    /// Panics if `width == 0` or `out.len()` is not a multiple of `width`.
    pub fn round_rows<T, F>(&mut self, out: &mut [T], width: usize, op: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        let rows = DisjointRows::new(out, width);
        let count = rows.rows();
        self.round_over(count, |i| {
            // SAFETY: each index is visited by exactly one lane per round.
            let row = unsafe { rows.row_mut(i) };
            op(i, row);
        });
    }

    /// Stores `op(i)` into `out[i]` for every element.
    pub fn round_map<T, F>(&mut self, out: &mut [T], op: F)
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        self.round_rows(out, 1, |i, slot| slot[0] = op(i));
    }

    /// Stops every lane and joins it. Called by `Drop`.
    pub fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        *lock(&self.shared.job) = None;
        self.shared.start.wait();
        for handle in self.handles.drain(..) {
            // Lanes catch op panics, so a join error cannot carry one.
            let _ = handle.join();
        }
        tracing::debug!(rounds = self.rounds, "executor stopped");
    }
}

impl Drop for BarrierExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for BarrierExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarrierExecutor")
            .field("lanes", &self.lanes())
            .field("node_count", &self.node_count)
            .field("rounds", &self.rounds)
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lane_main(shared: &Shared, lane: usize, lanes: usize) {
    if !shared.wait_gate() {
        shared.set_state(lane, LaneState::Exiting);
        return;
    }
    loop {
        shared.start.wait();
        let Some(job) = *lock(&shared.job) else {
            shared.set_state(lane, LaneState::Exiting);
            return;
        };

        shared.set_state(lane, LaneState::Running);
        // SAFETY: the caller is blocked in `round_over` until `finish`.
        let op = unsafe { &*job.op };
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut i = lane;
            while i < job.count {
                op(i);
                i += lanes;
            }
        }));
        if let Err(payload) = result {
            lock(&shared.panic).get_or_insert(payload);
        }
        shared.set_state(lane, LaneState::Suspended);
        shared.finish.wait();
    }
}
