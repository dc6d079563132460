use crate::delay::DelayRng;
use crate::fence::FenceStrength;
use crate::sema::Semaphore;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::atomic::{AtomicBool, AtomicU32};

/// Which of the two symmetric workers a thread runs as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    A,
    B,
}

impl Role {
    // The two generators have to produce different delay patterns, or the
    // two transactions march in lockstep and the race window never opens.
    fn seed(self) -> u32 {
        match self {
            Role::A => 1,
            Role::B => 2,
        }
    }
}

/// What one completed round observed: each worker's view of the other's
/// test cell at the moment it loaded it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub r1: u32,
    pub r2: u32,
}

impl Outcome {
    /// Both loads observed "not yet written".
    ///
    /// Under any interleaving of the four operations that respects program
    /// order, one store precedes the other thread's load, so at least one
    /// result is 1. Both being 0 means each store became visible to the
    /// opposite thread only after that thread's load had already run.
    ///
    /// Note the predicate is deliberately blind to the asymmetric case
    /// where only one side observes staleness: a single stale read is
    /// indistinguishable from the load simply having run first.
    pub fn is_reordered(self) -> bool {
        self.r1 == 0 && self.r2 == 0
    }
}

/// All state shared between the controller and the two workers. The
/// controller owns it; each worker holds a reference plus its `Role`.
///
/// The test cells and result cells are atomics accessed with Relaxed
/// ordering everywhere. That is the closest Rust gets to the reference
/// experiment's bare integers: no synchronization at all beyond the fence
/// under test, without stepping outside the language's memory model. The
/// actual exclusion comes from the handshake: the controller only touches
/// the cells while both workers sit parked on their begin semaphores, and
/// each worker only touches its half during its own released window.
pub struct ProbeState {
    begin_a: Semaphore,
    begin_b: Semaphore,
    done: Semaphore,
    x: AtomicU32,
    y: AtomicU32,
    r1: AtomicU32,
    r2: AtomicU32,
    stop: AtomicBool,
}

impl ProbeState {
    pub const fn new() -> Self {
        Self {
            begin_a: Semaphore::new(),
            begin_b: Semaphore::new(),
            done: Semaphore::new(),
            x: AtomicU32::new(0),
            y: AtomicU32::new(0),
            r1: AtomicU32::new(0),
            r2: AtomicU32::new(0),
            stop: AtomicBool::new(false),
        }
    }

    fn begin(&self, role: Role) -> &Semaphore {
        match role {
            Role::A => &self.begin_a,
            Role::B => &self.begin_b,
        }
    }

    /// Run one worker until [`request_stop`](Self::request_stop). Call once
    /// per role, each on its own thread.
    pub fn worker(&self, role: Role, fence: FenceStrength) {
        let mut rng = DelayRng::new(role.seed());
        loop {
            self.begin(role).wait();
            if self.stop.load(Relaxed) {
                return;
            }
            // Randomize where inside the released window the transaction
            // lands, so the two workers keep colliding at fresh offsets.
            rng.delay();

            match role {
                Role::A => {
                    self.x.store(1, Relaxed);
                    fence.apply();
                    let seen = self.y.load(Relaxed);
                    self.r1.store(seen, Relaxed);
                }
                Role::B => {
                    self.y.store(1, Relaxed);
                    fence.apply();
                    let seen = self.x.load(Relaxed);
                    self.r2.store(seen, Relaxed);
                }
            }
            self.done.signal();
        }
    }

    /// Drive one handshake round and report what the workers observed.
    pub fn run_iteration(&self) -> Outcome {
        // Both workers are parked on their begin semaphores here, so the
        // cells are ours to reset.
        self.x.store(0, Relaxed);
        self.y.store(0, Relaxed);
        self.begin_a.signal();
        self.begin_b.signal();
        // Two completions on a shared counter. Which worker contributed
        // which does not matter.
        self.done.wait();
        self.done.wait();
        Outcome {
            r1: self.r1.load(Relaxed),
            r2: self.r2.load(Relaxed),
        }
    }

    /// Make both workers leave their loops at the next iteration boundary.
    ///
    /// The probe normally runs until the process is killed; the stop flag
    /// exists so the loops can also be wound down in an orderly way, which
    /// the tests rely on.
    pub fn request_stop(&self) {
        self.stop.store(true, Relaxed);
        self.begin_a.signal();
        self.begin_b.signal();
    }
}

impl Default for ProbeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Controller loop: repeat the experiment, tally anomalies, print one line
/// per detection. Detections are the tool's product, so they go to raw
/// stdout rather than the log.
///
/// `limit` bounds the loop for tests; the binary passes `None` and never
/// returns. Returns the number of detections.
pub fn run_controller(state: &ProbeState, limit: Option<u64>) -> u64 {
    let mut detected = 0u64;
    let mut iteration = 0u64;
    loop {
        iteration += 1;
        let outcome = state.run_iteration();
        if outcome.is_reordered() {
            detected += 1;
            println!("{detected} reorders detected after {iteration} iterations");
        }
        if let Some(limit) = limit {
            if iteration >= limit {
                return detected;
            }
        }
    }
}

#[test]
fn both_zero_is_the_only_anomaly() {
    assert!(Outcome { r1: 0, r2: 0 }.is_reordered());
    assert!(!Outcome { r1: 0, r2: 1 }.is_reordered());
    assert!(!Outcome { r1: 1, r2: 0 }.is_reordered());
    assert!(!Outcome { r1: 1, r2: 1 }.is_reordered());
}

#[test]
fn full_fence_never_reorders() {
    use std::thread;

    let state = ProbeState::new();
    thread::scope(|s| {
        s.spawn(|| state.worker(Role::A, FenceStrength::Full));
        s.spawn(|| state.worker(Role::B, FenceStrength::Full));
        for _ in 0..5_000 {
            let outcome = state.run_iteration();
            assert!(
                !outcome.is_reordered(),
                "seq-cst fences must forbid the (0, 0) outcome"
            );
            // The cells only ever hold 0 or 1, so the results can too.
            assert!(outcome.r1 <= 1 && outcome.r2 <= 1, "outcome = {outcome:?}");
        }
        state.request_stop();
    });
}

#[test]
fn workers_stop_at_the_iteration_boundary() {
    use std::thread;

    let state = ProbeState::new();
    thread::scope(|s| {
        let a = s.spawn(|| state.worker(Role::A, FenceStrength::CompilerOnly));
        let b = s.spawn(|| state.worker(Role::B, FenceStrength::CompilerOnly));
        for _ in 0..100 {
            state.run_iteration();
        }
        state.request_stop();
        a.join().unwrap();
        b.join().unwrap();
    });
}

#[test]
fn controller_honors_the_iteration_bound() {
    use std::thread;

    let state = ProbeState::new();
    thread::scope(|s| {
        s.spawn(|| state.worker(Role::A, FenceStrength::Full));
        s.spawn(|| state.worker(Role::B, FenceStrength::Full));
        let detected = run_controller(&state, Some(1_000));
        assert_eq!(detected, 0);
        state.request_stop();
    });
}
