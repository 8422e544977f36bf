use std::collections::HashMap;
use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;

use super::KeyedStrategy;
use super::Reason;

const DEFAULT_SHARDS: usize = 16;

/// A keyed Sliding Window Log implementation.
///
/// Each client key owns a log of the instants at which its requests were
/// admitted. On every call the log is pruned to the trailing window, and the
/// request is admitted only while the pruned log holds fewer than `capacity`
/// entries. The admitted instant is appended; rejected requests leave no
/// trace.
///
/// At most exactly `capacity` requests are admitted per key within any
/// trailing window. (Careless window-log renditions compare the pruned count
/// with `> capacity` *before* appending, quietly allowing `capacity + 1`
/// admissions per window; that off-by-one is deliberately not reproduced
/// here.)
///
/// Client entries are created lazily and evicted once idle for a full
/// window, either by an explicit [`sweep`](WindowLog::sweep) or by the
/// opportunistic sweep that `process` runs at most once per sweep interval.
#[derive(Debug)]
pub struct WindowLog {
    capacity: usize,
    window_ns: u64,
    shards: Box<[Mutex<Shard>]>,
    shard_mask: u64,
    sweep_interval_ns: u64,
    /// Timestamp (nanos from anchor) of the last idle-client sweep.
    last_sweep: AtomicU64,
    clock: Clock,
    /// A fixed point in time to calculate deltas from.
    anchor: Instant,
}

type Shard = HashMap<String, ClientWindow>;

/// The recent request history for one client key.
///
/// Instants are nanos from the limiter's anchor, in non-decreasing order.
#[derive(Debug, Default)]
struct ClientWindow {
    hits: VecDeque<u64>,
}

impl WindowLog {
    /// Creates a new `WindowLog` strategy.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of requests admitted per key within
    ///   any trailing window.
    /// * `window` - The length of the trailing window.
    pub fn new(capacity: NonZeroUsize, window: Duration) -> Self {
        Self::with_clock(capacity, window, Clock::new())
    }

    /// Creates a `WindowLog` reading time from the supplied clock.
    ///
    /// Pass a `quanta` mock clock to drive time from tests.
    pub fn with_clock(capacity: NonZeroUsize, window: Duration, clock: Clock) -> Self {
        let anchor = clock.now();
        let window_ns = window.as_nanos() as u64;

        Self {
            capacity: capacity.get(),
            window_ns,
            shards: build_shards(DEFAULT_SHARDS),
            shard_mask: (DEFAULT_SHARDS - 1) as u64,
            sweep_interval_ns: window_ns,
            last_sweep: AtomicU64::new(0),
            clock,
            anchor,
        }
    }

    /// Sets the number of shards in the lock table, rounded up to the next
    /// power of two.
    ///
    /// More shards reduce contention between unrelated keys. Call this at
    /// construction time: any state already recorded is discarded.
    pub fn with_shards(mut self, shards: NonZeroUsize) -> Self {
        let count = shards.get().next_power_of_two();
        self.shards = build_shards(count);
        self.shard_mask = (count - 1) as u64;
        self
    }

    /// Sets how often `process` opportunistically sweeps idle clients.
    ///
    /// Defaults to one window length. `Duration::ZERO` disables the
    /// opportunistic sweep; [`sweep`](WindowLog::sweep) remains available.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ns = interval.as_nanos() as u64;
        self
    }

    /// Removes every client whose newest admitted request is at least one
    /// window old. Such clients would prune to an empty log anyway; dropping
    /// them bounds memory for long-running processes.
    pub fn sweep(&self) {
        self.sweep_at(self.now_ns());
    }

    /// Number of client keys currently resident in the table.
    pub fn tracked_clients(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().expect("lock poisoned").len())
            .sum()
    }

    fn now_ns(&self) -> u64 {
        self.clock.now().duration_since(self.anchor).as_nanos() as u64
    }

    fn shard_for(&self, key: &str) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() & self.shard_mask) as usize]
    }

    fn sweep_at(&self, now: u64) {
        // One shard at a time; never nests with the caller's shard lock.
        for shard in &self.shards {
            let mut clients = shard.lock().expect("lock poisoned");
            clients.retain(|_, window| {
                window
                    .hits
                    .back()
                    .is_some_and(|&newest| now.saturating_sub(newest) < self.window_ns)
            });
        }
    }

    fn maybe_sweep(&self, now: u64) {
        if self.sweep_interval_ns == 0 {
            return;
        }

        let last = self.last_sweep.load(Ordering::Acquire);
        if now.saturating_sub(last) < self.sweep_interval_ns {
            return;
        }

        // Elect a single sweeper; losers carry on with their request.
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            self.sweep_at(now);
        }
    }

    #[cfg(test)]
    pub(crate) fn recorded(&self, key: &str) -> usize {
        let clients = self.shard_for(key).lock().expect("lock poisoned");
        clients.get(key).map_or(0, |window| window.hits.len())
    }
}

impl KeyedStrategy for WindowLog {
    #[inline]
    fn process(&self, key: &str) -> ControlFlow<Reason> {
        let now = self.now_ns();
        self.maybe_sweep(now);

        let mut clients = self.shard_for(key).lock().expect("lock poisoned");
        let window = clients.entry(key.to_string()).or_default();

        // 1. Prune instants that have aged out of the trailing window.
        while window
            .hits
            .front()
            .is_some_and(|&t| now.saturating_sub(t) >= self.window_ns)
        {
            window.hits.pop_front();
        }

        // 2. Full log: the next slot frees when the oldest instant ages out.
        if window.hits.len() >= self.capacity
            && let Some(&oldest) = window.hits.front()
        {
            let retry_after = (oldest + self.window_ns).saturating_sub(now);
            return ControlFlow::Break(Reason::Overloaded {
                retry_after: Duration::from_nanos(retry_after),
            });
        }

        // 3. Admit and record.
        window.hits.push_back(now);
        ControlFlow::Continue(())
    }
}

fn build_shards(count: usize) -> Box<[Mutex<Shard>]> {
    (0..count).map(|_| Mutex::new(Shard::new())).collect()
}
