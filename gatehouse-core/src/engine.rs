//! Routing-engine contract and the dispatcher that drives it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::trace;

use crate::error::Result;
use crate::request::SyntheticRequest;
use crate::response::{FinishedResponse, ResponseHandle, SyntheticResponse};

/// An in-process routing engine.
///
/// The engine owns the response once [`routing`](Self::routing) is called
/// and alone decides when it is finished (or destroyed).
#[async_trait::async_trait]
pub trait RoutingEngine: Send + Sync + 'static {
    /// Resolve once the engine can accept traffic.
    async fn ready(&self) {}

    /// Hand off a request/response pair.
    fn routing(&self, request: SyntheticRequest, response: SyntheticResponse);
}

/// Drives a [`RoutingEngine`]: waits for readiness once, submits a pair and
/// awaits the response's completion.
pub struct Dispatcher<E> {
    engine: Arc<E>,
    ready: AtomicBool,
}

impl<E: RoutingEngine> Dispatcher<E> {
    /// Create a dispatcher for an engine.
    pub fn new(engine: E) -> Self {
        Self::from_arc(Arc::new(engine))
    }

    /// Create a dispatcher for a shared engine.
    pub fn from_arc(engine: Arc<E>) -> Self {
        Self {
            engine,
            ready: AtomicBool::new(false),
        }
    }

    /// The engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Check if the engine has reported readiness.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Submit a pair and wait for the response to finish.
    ///
    /// Requests arriving before the engine is ready wait for it rather than
    /// being dropped.
    pub async fn submit(
        &self,
        request: SyntheticRequest,
        response: SyntheticResponse,
        handle: ResponseHandle,
    ) -> Result<FinishedResponse> {
        if !self.is_ready() {
            trace!("waiting for routing engine");
            self.engine.ready().await;
            self.ready.store(true, Ordering::Release);
        }

        self.engine.routing(request, response);
        handle.finished().await
    }
}

/// Signals a deferred [`HandlerEngine`] that it may accept traffic.
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

impl ReadySignal {
    /// Mark the engine ready.
    pub fn mark_ready(&self) {
        self.tx.send_replace(true);
    }
}

/// A routing engine backed by an async closure.
///
/// Each pair is handled on its own tokio task.
///
/// ```rust,ignore
/// let engine = HandlerEngine::new(|_req, mut res| async move {
///     let _ = res.set_header("content-type", "text/plain");
///     let _ = res.end_with("hello");
/// });
/// ```
pub struct HandlerEngine<F> {
    handler: Arc<F>,
    ready: watch::Receiver<bool>,
}

impl<F, Fut> HandlerEngine<F>
where
    F: Fn(SyntheticRequest, SyntheticResponse) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    /// Create an engine that is ready immediately.
    pub fn new(handler: F) -> Self {
        let (engine, signal) = Self::deferred(handler);
        signal.mark_ready();
        engine
    }

    /// Create an engine that waits for a [`ReadySignal`].
    pub fn deferred(handler: F) -> (Self, ReadySignal) {
        let (tx, rx) = watch::channel(false);
        let engine = Self {
            handler: Arc::new(handler),
            ready: rx,
        };
        (engine, ReadySignal { tx })
    }
}

#[async_trait::async_trait]
impl<F, Fut> RoutingEngine for HandlerEngine<F>
where
    F: Fn(SyntheticRequest, SyntheticResponse) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn ready(&self) {
        let mut rx = self.ready.clone();
        while !*rx.borrow_and_update() {
            // Signal dropped without ever firing: treat as ready.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn routing(&self, request: SyntheticRequest, response: SyntheticResponse) {
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            handler(request, response).await;
        });
    }
}
