use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;

use pin_project_lite::pin_project;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tower::BoxError;
use tower::Service;
use tower::ServiceExt;

use crate::error::JokeError;

struct Job<Req, Resp> {
    request: Req,
    respond: oneshot::Sender<Result<Resp, BoxError>>,
}

#[derive(Debug)]
struct Shared {
    queued: AtomicUsize,
    running: AtomicUsize,
    stop: watch::Sender<bool>,
}

/// Runs operations one at a time, in submission order.
///
/// Submitted requests wait in an unbounded FIFO queue served by a single
/// worker task. The worker waits until the inner service is ready, which is
/// where admission happens when the inner service is an
/// [`AdmissionService`](crate::AdmissionService) in waiting mode, and then
/// drives the call to completion before touching the next request. At most
/// one operation is ever in flight.
///
/// If the caller drops its [`ResponseFuture`] (for instance because its
/// timeout fired), a request that has not started is skipped without
/// consuming admission, and a request that is running is aborted.
///
/// [`Scheduler::stop`] refuses everything still queued. The operation
/// already running when `stop` is called is allowed to finish and its
/// caller still receives the result.
pub struct Scheduler<Req, Resp> {
    tx: mpsc::UnboundedSender<Job<Req, Resp>>,
    shared: Arc<Shared>,
}

impl<Req, Resp> Clone for Scheduler<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<Req, Resp> fmt::Debug for Scheduler<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("queued", &self.queued())
            .field("running", &self.running())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

pin_project! {
    /// Resolves to the outcome of one scheduled operation.
    pub struct ResponseFuture<Resp> {
        #[pin]
        rx: oneshot::Receiver<Result<Resp, BoxError>>,
        refused: bool,
    }
}

impl<Resp> Future for ResponseFuture<Resp> {
    type Output = Result<Resp, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if *this.refused {
            return Poll::Ready(Err(stopped()));
        }
        match this.rx.poll(cx) {
            Poll::Ready(Ok(res)) => Poll::Ready(res),
            // The worker is gone
            Poll::Ready(Err(_)) => Poll::Ready(Err(stopped())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<Req, Resp> Scheduler<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Creates a scheduler in front of `service` and spawns its worker.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new<S>(service: S) -> Self
    where
        S: Service<Req, Response = Resp, Error = BoxError> + Send + 'static,
        S::Future: Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            queued: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            stop,
        });

        tokio::spawn(work(service, rx, stop_rx, Arc::clone(&shared)));
        tracing::info!("request scheduler started");

        Self { tx, shared }
    }
}

impl<Req, Resp> Scheduler<Req, Resp> {
    /// Queues `request` behind everything submitted before it.
    pub fn schedule(&self, request: Req) -> ResponseFuture<Resp> {
        let (respond, rx) = oneshot::channel();
        if self.is_stopped() {
            return ResponseFuture { rx, refused: true };
        }

        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        let refused = match self.tx.send(Job { request, respond }) {
            Ok(()) => false,
            Err(_) => {
                self.shared.queued.fetch_sub(1, Ordering::SeqCst);
                true
            }
        };
        ResponseFuture { rx, refused }
    }

    /// Operations waiting to start.
    pub fn queued(&self) -> usize {
        self.shared.queued.load(Ordering::SeqCst)
    }

    /// Operations in flight: 0 or 1.
    pub fn running(&self) -> usize {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        *self.shared.stop.borrow()
    }

    /// Stops the scheduler. Calling it again has no further effect.
    ///
    /// Once this returns, no queued operation will start. Queued and future
    /// submissions resolve to a transport failure.
    pub fn stop(&self) {
        if !self.shared.stop.send_replace(true) {
            tracing::info!(queued = self.queued(), "request scheduler stopped");
        }
    }
}

impl<Req, Resp> Service<Req> for Scheduler<Req, Resp> {
    type Response = Resp;
    type Error = BoxError;
    type Future = ResponseFuture<Resp>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.is_stopped() {
            Poll::Ready(Err(stopped()))
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn call(&mut self, request: Req) -> Self::Future {
        self.schedule(request)
    }
}

fn stopped() -> BoxError {
    Box::new(JokeError::transport("request scheduler stopped"))
}

async fn work<S, Req, Resp>(
    mut service: S,
    mut rx: mpsc::UnboundedReceiver<Job<Req, Resp>>,
    mut stop: watch::Receiver<bool>,
    shared: Arc<Shared>,
) where
    S: Service<Req, Response = Resp, Error = BoxError>,
{
    while let Some(Job {
        request,
        mut respond,
    }) = rx.recv().await
    {
        shared.queued.fetch_sub(1, Ordering::SeqCst);

        if respond.is_closed() {
            continue;
        }
        if *stop.borrow_and_update() {
            rx.close();
            let _ = respond.send(Err(stopped()));
            continue;
        }

        let ready = tokio::select! {
            biased;
            _ = stop.changed() => None,
            _ = respond.closed() => continue,
            ready = service.ready() => Some(ready.map(|_| ())),
        };

        let ready = match ready {
            Some(ready) => ready,
            None => {
                rx.close();
                let _ = respond.send(Err(stopped()));
                continue;
            }
        };
        if let Err(err) = ready {
            let _ = respond.send(Err(err));
            continue;
        }

        // Marking the operation as running and observing the stop flag happen
        // under the flag's lock, so `stop` cannot slip in between.
        let refused = {
            let flag = stop.borrow();
            if !*flag {
                shared.running.store(1, Ordering::SeqCst);
            }
            *flag
        };
        if refused {
            rx.close();
            let _ = respond.send(Err(stopped()));
            continue;
        }

        let outcome = tokio::select! {
            res = service.call(request) => Some(res),
            _ = respond.closed() => None,
        };
        shared.running.store(0, Ordering::SeqCst);

        match outcome {
            Some(res) => {
                let _ = respond.send(res);
            }
            None => tracing::debug!("scheduled request abandoned by its caller"),
        }
    }
}
