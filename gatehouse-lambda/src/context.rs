//! Invocation context and the per-invocation scope handed to handlers.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::event::GatewayEvent;

/// Serializable view of the Lambda invocation context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationContext {
    /// Lambda request id.
    pub aws_request_id: String,
    /// Function name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Function version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_version: Option<String>,
    /// ARN used to invoke the function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoked_function_arn: Option<String>,
    /// Configured memory in MB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_in_mb: Option<i32>,
    /// CloudWatch log group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_group_name: Option<String>,
    /// CloudWatch log stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_stream_name: Option<String>,
    /// Execution deadline, in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    /// X-Ray trace id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xray_trace_id: Option<String>,
    /// Forwarded from configuration unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_waits_for_empty_event_loop: Option<bool>,
}

impl InvocationContext {
    /// Create a context with only a request id.
    pub fn new(aws_request_id: impl Into<String>) -> Self {
        Self {
            aws_request_id: aws_request_id.into(),
            ..Default::default()
        }
    }
}

impl From<&lambda_runtime::Context> for InvocationContext {
    fn from(ctx: &lambda_runtime::Context) -> Self {
        let env = &ctx.env_config;
        Self {
            aws_request_id: ctx.request_id.clone(),
            function_name: Some(env.function_name.clone()),
            function_version: Some(env.version.clone()),
            invoked_function_arn: Some(ctx.invoked_function_arn.clone()),
            memory_limit_in_mb: Some(env.memory),
            log_group_name: Some(env.log_group.clone()),
            log_stream_name: Some(env.log_stream.clone()),
            deadline_ms: Some(ctx.deadline),
            xray_trace_id: ctx.xray_trace_id.clone(),
            callback_waits_for_empty_event_loop: None,
        }
    }
}

/// The raw event and context of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaArguments {
    /// The gateway event.
    pub event: GatewayEvent,
    /// The invocation context, when running under Lambda.
    pub context: Option<InvocationContext>,
}

/// Handle to the current invocation's arguments.
///
/// Each invocation gets its own scope, attached to its request as a
/// decoration. The scope is emptied once the reply is built, so a handler
/// that holds on to it never sees arguments from another invocation.
#[derive(Debug, Clone, Default)]
pub struct InvocationScope {
    inner: Arc<RwLock<Option<Arc<LambdaArguments>>>>,
}

impl InvocationScope {
    /// Create a scope holding `arguments`.
    pub fn new(arguments: LambdaArguments) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(Arc::new(arguments)))),
        }
    }

    /// Current arguments, or `None` once the invocation is over.
    pub fn arguments(&self) -> Option<Arc<LambdaArguments>> {
        self.inner.read().clone()
    }

    /// Current event.
    pub fn event(&self) -> Option<GatewayEvent> {
        self.arguments().map(|args| args.event.clone())
    }

    /// Current invocation context.
    pub fn context(&self) -> Option<InvocationContext> {
        self.arguments().and_then(|args| args.context.clone())
    }

    /// Check if the invocation is still in progress.
    pub fn is_active(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Empty the scope.
    pub fn clear(&self) {
        self.inner.write().take();
    }
}
