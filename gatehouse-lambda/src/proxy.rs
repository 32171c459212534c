//! The gateway proxy: one event in, one reply out.

use std::sync::Arc;
use tracing::{debug, error};

use gatehouse_core::{
    Dispatcher, FinishedResponse, ProtocolVersion, ResponseOptions, RoutingEngine,
    SyntheticRequest, SyntheticResponse,
};

use crate::config::ProxyConfig;
use crate::context::{InvocationContext, InvocationScope, LambdaArguments};
use crate::error::{LambdaError, Result};
use crate::event::GatewayEvent;
use crate::reply::{GatewayReply, build_reply};
use crate::request::request_options;

/// Bridges gateway events to a routing engine.
///
/// Cloning is cheap; clones share the engine and the configuration.
pub struct LambdaProxy<E> {
    dispatcher: Arc<Dispatcher<E>>,
    config: Arc<ProxyConfig>,
}

impl<E> Clone for LambdaProxy<E> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E: RoutingEngine> LambdaProxy<E> {
    /// Create a proxy with the default configuration.
    pub fn new(engine: E) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(engine)),
            config: Arc::new(ProxyConfig::default()),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// The configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The dispatcher driving the engine.
    pub fn dispatcher(&self) -> &Dispatcher<E> {
        &self.dispatcher
    }

    /// Handle one event.
    ///
    /// Never fails: any error is logged and answered with a bare 500.
    pub async fn handle(
        &self,
        event: GatewayEvent,
        context: Option<InvocationContext>,
    ) -> GatewayReply {
        self.try_handle(event, context)
            .await
            .unwrap_or_else(|err| degrade(&err))
    }

    /// Handle one event, passing the outcome to `callback` as well.
    ///
    /// `callback` runs exactly once, with the error when routing failed.
    /// The returned reply is the same one [`handle`](Self::handle) would
    /// give.
    pub async fn handle_with_callback<F>(
        &self,
        event: GatewayEvent,
        context: Option<InvocationContext>,
        callback: F,
    ) -> GatewayReply
    where
        F: FnOnce(Result<GatewayReply>),
    {
        let result = self.try_handle(event, context).await;
        let reply = match &result {
            Ok(reply) => reply.clone(),
            Err(err) => degrade(err),
        };
        callback(result);
        reply
    }

    /// Handle one event, returning routing errors instead of degrading.
    pub async fn try_handle(
        &self,
        event: GatewayEvent,
        mut context: Option<InvocationContext>,
    ) -> Result<GatewayReply> {
        if let (Some(ctx), Some(waits)) = (
            context.as_mut(),
            self.config.callback_waits_for_empty_event_loop,
        ) {
            ctx.callback_waits_for_empty_event_loop = Some(waits);
        }

        let version = event.protocol_version();
        let scope = InvocationScope::new(LambdaArguments {
            event: event.clone(),
            context: context.clone(),
        });

        let result = self
            .route(&event, context.as_ref(), &scope, version)
            .await
            .map(|finished| build_reply(&finished, version, &self.config));

        if self.config.log_responses {
            if let Ok(reply) = &result {
                debug!(
                    status = reply.status_code,
                    base64 = reply.is_base64_encoded,
                    "Gateway reply"
                );
            }
        }

        scope.clear();
        result
    }

    async fn route(
        &self,
        event: &GatewayEvent,
        context: Option<&InvocationContext>,
        scope: &InvocationScope,
        version: ProtocolVersion,
    ) -> Result<FinishedResponse> {
        let options = request_options(event, context, &self.config)?;
        let mut request = SyntheticRequest::new(options)?;

        if self.config.log_requests {
            debug!(
                method = %request.method(),
                path = %request.path(),
                request_id = ?event.request_id(),
                "Handling gateway event"
            );
        }

        if self.config.decorate_request {
            request.decorate(self.config.decoration_property_name.clone(), scope.clone());
        }

        let (response, handle) = SyntheticResponse::new(ResponseOptions {
            version,
            keep_alive_timeout: self.config.keep_alive_timeout,
        });

        let submit = self.dispatcher.submit(request, response, handle);
        match self.config.invocation_timeout {
            Some(limit) => tokio::time::timeout(limit, submit)
                .await
                .map_err(|_| LambdaError::Timeout(limit))?
                .map_err(LambdaError::from),
            None => Ok(submit.await?),
        }
    }
}

fn degrade(err: &LambdaError) -> GatewayReply {
    error!(error = %err, "Routing failed, replying with 500");
    GatewayReply::degraded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::HandlerEngine;

    #[tokio::test]
    async fn test_handle_text() {
        let proxy = LambdaProxy::new(HandlerEngine::new(|_req, mut res: SyntheticResponse| async move {
            let _ = res.set_header("content-type", "text/plain");
            let _ = res.end_with("hi");
        }));
        let reply = proxy
            .handle(GatewayEvent::default(), Some(InvocationContext::new("req-1")))
            .await;

        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.body, "hi");
    }

    #[tokio::test]
    async fn test_destroyed_response_degrades() {
        let proxy = LambdaProxy::new(HandlerEngine::new(|_req, mut res: SyntheticResponse| async move {
            res.destroy("boom");
        }));
        let reply = proxy.handle(GatewayEvent::default(), None).await;

        assert_eq!(reply, GatewayReply::degraded());
    }

    #[tokio::test]
    async fn test_callback_receives_error() {
        let proxy = LambdaProxy::new(HandlerEngine::new(|_req, res: SyntheticResponse| async move {
            drop(res);
        }));

        let mut seen = None;
        let reply = proxy
            .handle_with_callback(GatewayEvent::default(), None, |result| {
                seen = Some(result.is_err());
            })
            .await;

        assert_eq!(seen, Some(true));
        assert_eq!(reply.status_code, 500);
    }

    #[tokio::test]
    async fn test_callback_receives_reply_once() {
        let proxy = LambdaProxy::new(HandlerEngine::new(|_req, mut res: SyntheticResponse| async move {
            let _ = res.set_header("content-type", "text/plain");
            let _ = res.end_with("done");
        }));

        let mut calls = 0;
        let mut seen = None;
        let reply = proxy
            .handle_with_callback(GatewayEvent::default(), None, |result| {
                calls += 1;
                seen = result.ok();
            })
            .await;

        assert_eq!(calls, 1);
        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.body, "done");
        assert_eq!(seen, Some(reply));
    }

    #[tokio::test]
    async fn test_callback_waits_forwarded_to_context() {
        let proxy = LambdaProxy::new(HandlerEngine::new(|req: SyntheticRequest, mut res: SyntheticResponse| async move {
            let waits = req
                .decoration::<InvocationScope>("awsLambda")
                .and_then(|scope| scope.context())
                .and_then(|ctx| ctx.callback_waits_for_empty_event_loop);
            let _ = res.end_with(format!("{waits:?}"));
        }))
        .with_config(ProxyConfig::default().callback_waits_for_empty_event_loop(false));

        let reply = proxy
            .handle(GatewayEvent::default(), Some(InvocationContext::new("req-1")))
            .await;
        assert_eq!(reply.body, "Some(false)");
    }
}
