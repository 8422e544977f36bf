//! # tally-limit
//!
//! `tally-limit` provides keyed, per-client rate limiting.
//!
//! ## Core Philosophy
//!
//! Most rate limiters maintain a single global budget, which lets one noisy
//! client starve everyone else. `tally-limit` keeps an independent tally per
//! client identity (an IP address, an API key, a tenant id) and makes the
//! admission decision against that client's own trailing window.
//!
//! ## Key Concepts
//!
//! * **Keyed**: every decision is scoped to an opaque client key. Distinct
//!   keys never share budget.
//! * **Sharded Locking**: per-client state lives in a sharded lock table, so
//!   the critical section for one client never serializes unrelated clients.
//! * **Lazy Evaluation**: windows are pruned at the moment of the request,
//!   eliminating the need for background worker threads or timers. An
//!   opportunistic sweep evicts clients that have gone idle.
//! * **Injectable Time**: the clock is a constructor input, so tests can
//!   simulate arbitrary time progression without sleeping.
//!
//! ## Example
//!
//! ```rust
//! use tally_limit::WindowLog;
//! use tally_limit::KeyedStrategy;
//! use std::time::Duration;
//! use std::num::NonZeroUsize;
//!
//! let limit = NonZeroUsize::new(5).unwrap();
//! let window = Duration::from_secs(10);
//! let limiter = WindowLog::new(limit, window);
//!
//! if limiter.process("203.0.113.7").is_continue() {
//!     // Request allowed
//! }
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod window_log;

pub use window_log::WindowLog;

/// Reasons why a request might be rejected by a strategy.
#[derive(Debug, PartialEq)]
pub enum Reason {
    Overloaded { retry_after: Duration },
}

/// The core trait for keyed rate-limiting algorithms.
///
/// Strategies must be `Send` and `Sync` to allow sharing across thread
/// boundaries via `Arc`.
pub trait KeyedStrategy: Debug {
    /// Attempts to process a single request attributed to `key`.
    ///
    /// The key is an opaque, stable client identity. Callers are expected to
    /// validate it before reaching the limiter; an empty key is tracked like
    /// any other.
    ///
    /// # Errors
    ///
    /// Returns `Reason` if the rate limit for `key` has been reached.
    /// Rejection is a normal admission-control outcome, not a failure: the
    /// limiter's state stays valid and later calls for the same key may be
    /// admitted again once the window slides.
    fn process(&self, key: &str) -> ControlFlow<Reason>;
}
