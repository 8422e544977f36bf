use std::sync::Arc;

use tally_limit::KeyedStrategy;
use tower::Layer;

use crate::service::KeyedRateLimitService;

/// Applies keyed rate limiting to requests.
///
/// Every service produced by this layer shares the same limiter, so clones
/// of a stack charge the same per-client budgets.
#[derive(Debug)]
pub struct KeyedRateLimitLayer<L, X>
where
    L: ?Sized,
{
    limiter: Arc<L>,
    extractor: X,
}

impl<L, X> Clone for KeyedRateLimitLayer<L, X>
where
    L: ?Sized,
    X: Clone,
{
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            extractor: self.extractor.clone(),
        }
    }
}

impl<L, X> KeyedRateLimitLayer<L, X>
where
    L: KeyedStrategy + ?Sized,
{
    /// Create a KeyedRateLimitLayer charging each request to the key
    /// derived by `extractor`.
    pub fn new(limiter: Arc<L>, extractor: X) -> Self {
        KeyedRateLimitLayer { limiter, extractor }
    }
}

impl<L, S, X> Layer<S> for KeyedRateLimitLayer<L, X>
where
    L: ?Sized,
    X: Clone,
{
    type Service = KeyedRateLimitService<L, S, X>;

    fn layer(&self, service: S) -> Self::Service {
        KeyedRateLimitService::new(service, self.limiter.clone(), self.extractor.clone())
    }
}
