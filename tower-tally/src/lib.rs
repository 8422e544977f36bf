//! # Tower Tally
//!
//! `tower-tally` is a keyed, per-client rate limiting stack built for the
//! [Tower](https://github.com/tower-rs/tower) ecosystem.
//!
//! ## The Keyed Stack
//! Global rate limiters make one budget decision for all callers, so a
//! single noisy client can exhaust everyone's capacity. This crate attributes
//! every request to a client key (via a [`KeyExtractor`]) and asks a
//! [`tally_limit::KeyedStrategy`] for a per-client decision instead:
//!
//! 1. **Fail Fast**: a client over its budget is answered immediately with
//!    `TallyError::RateLimited`, carrying the `retry_after` hint. Rejected
//!    requests are never queued, so they add no memory or tail latency.
//! 2. **Managed Stack**: [`ManagedKeyedRateLimitLayer`] pre-composes the
//!    limiter with a hard timeout and load shedding, and maps the mixed
//!    Tower errors into a unified, cloneable [`TallyError`] domain.
//! 3. **Key Validation**: requests whose key cannot be extracted are
//!    rejected with `TallyError::MissingKey` before they reach the limiter.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`TallyError`], allowing automatic
//!   conversion to HTTP status codes (408, 503, 429, 400, 500), and the
//!   [`ForwardedForKey`] extractor.

mod error;
mod extract;
mod layer;
mod managed_layer;
mod service;


#[cfg(doc)]
use tally_limit::KeyedStrategy;

pub use error::TallyError;
#[cfg(feature = "axum")]
pub use extract::ForwardedForKey;
pub use extract::KeyExtractor;
pub use layer::KeyedRateLimitLayer;
pub use managed_layer::ManagedKeyedRateLimitLayer;
pub use service::KeyedRateLimitService;
pub use service::ResponseFuture;
