use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tally_limit::KeyedStrategy;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::util::BoxCloneSyncService;

use crate::KeyedRateLimitService;
use crate::TallyError;
use crate::extract::KeyExtractor;

/// A keyed rate limiting stack for production traffic.
///
/// This layer uses a "Shed-First" architecture. A client over its budget is
/// rejected immediately rather than queued, and requests that do get through
/// run under a hard deadline.
///
/// ### Error Responsibilities:
/// - **RateLimited (`TallyError::RateLimited`)**: the request's client is
///   over its per-key budget. Decided in `call`, near-instant.
/// - **LoadShedding (`TallyError::Overloaded`)**: the inner service itself
///   is not ready to accept more work.
/// - **Timeout (`TallyError::Timeout`)**: the *inner service* took too long
///   to respond (e.g. a slow database query).
///
/// This separation ensures that rate-limit rejections never suffer from
/// "buffer bloat" tail latencies.
pub struct ManagedKeyedRateLimitLayer<L, X, Req> {
    limiter: Arc<L>,
    extractor: X,
    max_wait: Duration,
    _phantom: PhantomData<fn(Req)>,
}

// Note: Deriving Clone causes issues when using the layer with Axum.
// We'll just implement it explicitly.
impl<L, X, Req> Clone for ManagedKeyedRateLimitLayer<L, X, Req>
where
    X: Clone,
{
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            extractor: self.extractor.clone(),
            max_wait: self.max_wait,
            _phantom: PhantomData,
        }
    }
}

impl<S, L, X, Req> Layer<S> for ManagedKeyedRateLimitLayer<L, X, Req>
where
    L: KeyedStrategy + Send + Sync + 'static,
    X: KeyExtractor<Req> + Clone + Send + Sync + 'static,
    S: Service<Req, Error = BoxError> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Response: 'static,
    Req: Send + 'static,
{
    type Service = BoxCloneSyncService<Req, S::Response, BoxError>;

    fn layer(&self, inner: S) -> Self::Service {
        let rl = KeyedRateLimitService::new(inner, self.limiter.clone(), self.extractor.clone());

        // Timeout is outer to ensure a hard deadline on the entire process.
        let svc = tower::ServiceBuilder::new()
            .timeout(self.max_wait)
            .load_shed()
            .service(rl);

        // Map the mixed errors into TallyError
        let mapped_svc = tower::util::MapErr::new(svc, |err: BoxError| {
            if err.is::<tower::timeout::error::Elapsed>() {
                BoxError::from(TallyError::Timeout)
            } else if err.is::<tower::load_shed::error::Overloaded>() {
                BoxError::from(TallyError::Overloaded)
            } else if err.is::<TallyError>() {
                err
            } else {
                // Wrap any other inner service errors
                Box::from(TallyError::Inner(err.to_string()))
            }
        });

        BoxCloneSyncService::new(mapped_svc)
    }
}

impl<L: KeyedStrategy, X, Req> ManagedKeyedRateLimitLayer<L, X, Req> {
    pub fn new(limiter: Arc<L>, extractor: X, max_wait: Duration) -> Self {
        Self {
            limiter,
            extractor,
            max_wait,
            _phantom: PhantomData,
        }
    }
}
