use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use tokio::time::Sleep;
use tokio::time::sleep;
use tower::BoxError;
use tower::Service;

use joke_limit::Reason;
use joke_limit::Strategy;

use crate::error::JokeError;

#[derive(Clone, Debug)]
struct AdmissionMetrics {
    denied: Counter<u64>,
    waited: Counter<u64>,
}

/// Gates every request on an admission [`Strategy`].
///
/// A unit is taken from the strategy in `poll_ready`, before the inner
/// service is ever called. Once taken it is spent, whatever happens to the
/// request afterwards.
///
/// In fail-fast mode a denial is reported immediately as
/// [`JokeError::AdmissionDenied`]. Otherwise the service sleeps for the
/// strategy's `retry_after` hint and asks again, for as long as it takes.
/// Callers bound that wait by dropping the readiness future. A later caller
/// finishes any sleep left pending and then asks the strategy afresh.
#[derive(Debug)]
pub struct AdmissionService<L, S>
where
    L: ?Sized,
{
    inner: S,
    limiter: Arc<L>,
    sleep: Option<Pin<Box<Sleep>>>,
    permit_acquired: bool,
    fail_fast: bool,
    instruments: AdmissionMetrics,
}

// Manually implement Clone because Pin<Box<Sleep>> cannot be cloned
impl<L, S> Clone for AdmissionService<L, S>
where
    L: ?Sized,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            // A clone never inherits a permit or a pending wait
            sleep: None,
            permit_acquired: false,
            fail_fast: self.fail_fast,
            instruments: self.instruments.clone(),
        }
    }
}

impl<L, S, Req> Service<Req> for AdmissionService<L, S>
where
    L: Strategy + ?Sized + 'static,
    S: Service<Req, Error = BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // 1. Finish any wait we are in the middle of
        if let Some(ref mut fut) = self.sleep {
            match fut.as_mut().poll(cx) {
                Poll::Ready(_) => self.sleep = None,
                Poll::Pending => return Poll::Pending,
            }
        }

        // 2. Inner readiness first, so we never take a unit we cannot use
        match self.inner.poll_ready(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => {}
        }

        if self.permit_acquired {
            return Poll::Ready(Ok(()));
        }

        // 3. Ask the strategy
        match self.limiter.process() {
            ControlFlow::Continue(()) => {
                self.permit_acquired = true;
                Poll::Ready(Ok(()))
            }
            ControlFlow::Break(reason) => {
                let retry_after = reason.retry_after();
                let reason_label = match reason {
                    Reason::Exhausted { .. } => "exhausted",
                    Reason::TooSoon { .. } => "too_soon",
                };
                let label = KeyValue::new("reason", reason_label);

                if self.fail_fast {
                    self.instruments.denied.add(1, &[label]);
                    tracing::debug!(?retry_after, "admission denied");
                    return Poll::Ready(Err(Box::new(JokeError::AdmissionDenied { retry_after })));
                }

                self.instruments.waited.add(1, &[label]);
                let mut sleep_fut = Box::pin(sleep(retry_after));
                match sleep_fut.as_mut().poll(cx) {
                    Poll::Pending => {
                        self.sleep = Some(sleep_fut);
                        Poll::Pending
                    }
                    Poll::Ready(_) => {
                        // Zero hint: try again on the next poll
                        cx.waker().wake_by_ref();
                        Poll::Pending
                    }
                }
            }
        }
    }

    fn call(&mut self, req: Req) -> Self::Future {
        self.permit_acquired = false;
        self.inner.call(req)
    }
}

impl<L, S> AdmissionService<L, S>
where
    L: ?Sized,
{
    pub fn new(inner: S, limiter: Arc<L>) -> Self {
        let meter = global::meter("joke_client");
        let instruments = AdmissionMetrics {
            denied: meter.u64_counter("admission.denied").build(),
            waited: meter.u64_counter("admission.waited").build(),
        };

        Self {
            inner,
            limiter,
            sleep: None,
            permit_acquired: false,
            fail_fast: false,
            instruments,
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn limiter(&self) -> &Arc<L> {
        &self.limiter
    }
}
