//! Lambda runtime loop.

use lambda_runtime::{LambdaEvent, run, service_fn};
use tracing::info;

use gatehouse_core::RoutingEngine;

use crate::config::ProxyConfig;
use crate::context::InvocationContext;
use crate::error::Result;
use crate::event::GatewayEvent;
use crate::proxy::LambdaProxy;
use crate::reply::GatewayReply;

/// Runs a routing engine on the Lambda runtime.
///
/// Each invocation payload is read as a [`GatewayEvent`] and answered with
/// a [`GatewayReply`].
pub struct LambdaRuntime<E> {
    proxy: LambdaProxy<E>,
}

impl<E: RoutingEngine> LambdaRuntime<E> {
    /// Create a new Lambda runtime.
    pub fn new(engine: E) -> Self {
        Self {
            proxy: LambdaProxy::new(engine),
        }
    }

    /// Set the proxy configuration.
    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.proxy = self.proxy.with_config(config);
        self
    }

    /// The proxy handling each invocation.
    pub fn proxy(&self) -> &LambdaProxy<E> {
        &self.proxy
    }

    /// Run the Lambda runtime.
    ///
    /// This function never returns under normal operation.
    pub async fn run(self) -> Result<()> {
        self.proxy.config().validate()?;
        info!("Starting gatehouse Lambda runtime");

        let proxy = self.proxy;
        run(service_fn(move |event: LambdaEvent<GatewayEvent>| {
            let proxy = proxy.clone();
            async move {
                let (payload, context) = event.into_parts();
                let context = InvocationContext::from(&context);
                Ok::<GatewayReply, lambda_runtime::Error>(proxy.handle(payload, Some(context)).await)
            }
        }))
        .await?;

        Ok(())
    }
}
