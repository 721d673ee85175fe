use std::sync::Arc;

use joke_limit::Strategy;
use tower::Layer;

use crate::service::AdmissionService;

/// Applies admission control to requests.
#[derive(Debug)]
pub struct AdmissionLayer<L>
where
    L: ?Sized,
{
    limiter: Arc<L>,
    fail_fast: bool,
}

impl<L> Clone for AdmissionLayer<L>
where
    L: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            fail_fast: self.fail_fast,
        }
    }
}

impl<L> AdmissionLayer<L>
where
    L: Strategy + ?Sized,
{
    /// Create an AdmissionLayer. Services built from it share `limiter`.
    pub fn new(limiter: Arc<L>) -> Self {
        AdmissionLayer {
            limiter,
            fail_fast: false,
        }
    }

    /// Set whether a denial should fail the request immediately.
    ///
    /// If `true`, the service returns `JokeError::AdmissionDenied` instead
    /// of waiting for the budget to refill.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

impl<L, S> Layer<S> for AdmissionLayer<L>
where
    L: ?Sized,
{
    type Service = AdmissionService<L, S>;

    fn layer(&self, service: S) -> Self::Service {
        AdmissionService::new(service, Arc::clone(&self.limiter)).with_fail_fast(self.fail_fast)
    }
}
