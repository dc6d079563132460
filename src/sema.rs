use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::thread;

// Spin budget before each yield. 100 is the practical value Rust's own
// mutex used on Linux; past that the remaining wait is usually long enough
// that burning the core stops paying off.
const SPIN_LIMIT: u32 = 100;

/// Lock-free counting semaphore, the only synchronization in the probe.
///
/// `wait` never parks the thread through the OS. The probe measures
/// sub-microsecond effects, and a futex-style sleep would both add latency
/// and drag its own ordering side effects into the experiment. Spinning
/// with a yield hint keeps the handshake on the timescale under test.
pub struct Semaphore {
    count: AtomicU32,
}

impl Semaphore {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// Increment the count, releasing one waiter.
    ///
    /// Release ordering: everything the signaling thread wrote before this
    /// call is visible to whichever thread claims this increment with an
    /// acquire `wait`.
    pub fn signal(&self) {
        self.count.fetch_add(1, Release);
    }

    /// Decrement the count by exactly one, spinning until it is positive.
    ///
    /// A plain load screens the count first; compare_exchange is only
    /// attempted when there is something to claim, so waiters do not keep
    /// invalidating the cache line while the count sits at zero. A failed
    /// claim means another waiter raced ahead, and we simply go around
    /// again. The count can never be observed negative: the only decrement
    /// is this CAS from a value seen to be positive.
    ///
    /// No timeout. Every wait in the protocol has a matching signal, so
    /// blocking here forever is only reachable through a protocol bug.
    pub fn wait(&self) {
        let mut spin = 0u32;
        loop {
            let count = self.count.load(Relaxed);
            if count > 0
                && self
                    .count
                    .compare_exchange(count, count - 1, Acquire, Relaxed)
                    .is_ok()
            {
                return;
            }
            if spin < SPIN_LIMIT {
                spin += 1;
                std::hint::spin_loop();
            } else {
                thread::yield_now();
            }
        }
    }
}

#[test]
fn waits_consume_prior_signals() {
    let sema = Semaphore::new();
    for _ in 0..5 {
        sema.signal();
    }
    for _ in 0..5 {
        sema.wait();
    }
    // Drained back to zero: one more round trip still works.
    sema.signal();
    sema.wait();
}

#[test]
fn wait_sees_writes_from_before_signal() {
    use std::sync::atomic::AtomicU64;

    let data = AtomicU64::new(0);
    let sema = Semaphore::new();
    thread::scope(|s| {
        s.spawn(|| {
            data.store(123, Relaxed);
            sema.signal();
        });
        sema.wait();
        // The relaxed store is published by the release/acquire edge on
        // the count, so this cannot observe 0.
        assert_eq!(data.load(Relaxed), 123);
    });
}

#[test]
fn one_signal_releases_exactly_one_waiter() {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    let sema = Semaphore::new();
    let released = AtomicUsize::new(0);
    thread::scope(|s| {
        for _ in 0..3 {
            s.spawn(|| {
                sema.wait();
                released.fetch_add(1, Relaxed);
            });
        }
        sema.signal();
        while released.load(Relaxed) == 0 {
            thread::yield_now();
        }
        // Leave the other two waiters time to slip through if the count
        // handling were broken.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(released.load(Relaxed), 1);
        sema.signal();
        sema.signal();
    });
    assert_eq!(released.load(Relaxed), 3);
}

#[test]
fn racing_signals_and_waits_all_complete() {
    let sema = Semaphore::new();
    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                for _ in 0..10_000 {
                    sema.signal();
                }
            });
        }
        for _ in 0..2 {
            s.spawn(|| {
                for _ in 0..10_000 {
                    sema.wait();
                }
            });
        }
    });
    // 20,000 signals against 20,000 waits in arbitrary interleavings; the
    // count must end exactly where it started.
    sema.signal();
    sema.wait();
}
