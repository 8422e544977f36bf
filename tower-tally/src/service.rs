use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;

use tally_limit::KeyedStrategy;
use tally_limit::Reason;

use crate::error::TallyError;
use crate::extract::KeyExtractor;

#[derive(Clone, Debug)]
struct KeyedRateLimitMetrics {
    admitted: Counter<u64>,
    rejected: Counter<u64>,
}

/// Applies a per-client admission decision to each request.
///
/// The decision needs the request itself (to derive the client key), so it
/// is made in `call` rather than `poll_ready`; readiness is the inner
/// service's alone. Over-budget clients are answered immediately with
/// [`TallyError::RateLimited`] and never reach the inner service.
#[derive(Debug)]
pub struct KeyedRateLimitService<L, S, X>
where
    L: ?Sized,
{
    inner: S,
    limiter: Arc<L>,
    extractor: X,
    instruments: KeyedRateLimitMetrics,
}

pin_project! {
    #[project = KindProj]
    enum Kind<F> {
        Inner {
            #[pin]
            future: F,
        },
        Rejected {
            error: Option<TallyError>,
        },
    }
}

pin_project! {
    /// A future that resolves rejected requests without touching the inner
    /// service.
    pub struct ResponseFuture<F> {
        #[pin]
        kind: Kind<F>,
    }
}

impl<F> ResponseFuture<F> {
    fn forwarded(future: F) -> Self {
        Self {
            kind: Kind::Inner { future },
        }
    }

    fn rejected(error: TallyError) -> Self {
        Self {
            kind: Kind::Rejected { error: Some(error) },
        }
    }
}

impl<F, T, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: From<BoxError>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().kind.project() {
            KindProj::Inner { future } => future.poll(cx),
            KindProj::Rejected { error } => {
                let error = error.take().expect("polled after completion");
                Poll::Ready(Err(E::from(Box::new(error))))
            }
        }
    }
}

impl<L, S, X> Clone for KeyedRateLimitService<L, S, X>
where
    L: ?Sized,
    S: Clone,
    X: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            extractor: self.extractor.clone(),
            instruments: self.instruments.clone(),
        }
    }
}

impl<L, S, X, Req> Service<Req> for KeyedRateLimitService<L, S, X>
where
    L: KeyedStrategy + ?Sized + Send + Sync + 'static,
    S: Service<Req, Error = BoxError>,
    X: KeyExtractor<Req>,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let key = match self.extractor.extract(&req) {
            Some(key) if !key.is_empty() => key,
            _ => {
                self.instruments
                    .rejected
                    .add(1, &[KeyValue::new("reason", "missing_key")]);
                return ResponseFuture::rejected(TallyError::MissingKey);
            }
        };

        match self.limiter.process(&key) {
            ControlFlow::Continue(()) => {
                self.instruments.admitted.add(1, &[]);
                ResponseFuture::forwarded(self.inner.call(req))
            }
            ControlFlow::Break(Reason::Overloaded { retry_after }) => {
                self.instruments
                    .rejected
                    .add(1, &[KeyValue::new("reason", "over_limit")]);
                ResponseFuture::rejected(TallyError::RateLimited { retry_after })
            }
        }
    }
}

impl<L, S, X> KeyedRateLimitService<L, S, X>
where
    L: ?Sized,
{
    pub fn new(inner: S, limiter: Arc<L>, extractor: X) -> Self {
        let meter = global::meter("keyed_rate_limit_service");
        let instruments = KeyedRateLimitMetrics {
            admitted: meter.u64_counter("admitted").build(),
            rejected: meter.u64_counter("rejected").build(),
        };

        Self {
            inner,
            limiter,
            extractor,
            instruments,
        }
    }
}
