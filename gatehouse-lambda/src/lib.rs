//! # Gatehouse Lambda
//!
//! Serves API Gateway (REST and HTTP API) and Application Load Balancer
//! events with an in-process routing engine.
//!
//! Each event becomes a synthetic request/response pair; the engine fills
//! in the response, and the result is shaped back into the reply the
//! gateway expects, including cookies and base64 bodies.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gatehouse_core::HandlerEngine;
//! use gatehouse_lambda::{LambdaRuntime, ProxyConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gatehouse_lambda::LambdaError> {
//!     gatehouse_lambda::init_tracing();
//!
//!     let engine = HandlerEngine::new(|_req, mut res| async move {
//!         let _ = res.set_header("content-type", "application/json; charset=utf-8");
//!         let _ = res.end_with(r#"{"hello":"world"}"#);
//!     });
//!
//!     LambdaRuntime::new(engine)
//!         .with_config(ProxyConfig::from_env().binary_mime_types(["image/png"]))
//!         .run()
//!         .await
//! }
//! ```
//!
//! ## Invocation Arguments
//!
//! With `decorate_request` enabled (the default), every request carries an
//! [`InvocationScope`] under the configured decoration name:
//!
//! ```rust,ignore
//! let scope = req.decoration::<InvocationScope>("awsLambda");
//! let request_id = scope.and_then(|s| s.context()).map(|c| c.aws_request_id);
//! ```

mod config;
mod context;
mod error;
mod event;
mod proxy;
mod reply;
mod request;
mod runtime;
mod serde_ext;

pub use config::{Base64Predicate, DEFAULT_DECORATION_PROPERTY, ProxyConfig};
pub use context::{InvocationContext, InvocationScope, LambdaArguments};
pub use error::{LambdaError, Result};
pub use event::{GatewayEvent, HttpDescription, Identity, RequestContext};
pub use proxy::LambdaProxy;
pub use reply::{DraftReply, GatewayReply, build_reply, content_encoding_heuristic, is_base64_encoded};
pub use request::{
    CONTEXT_HEADER, EVENT_HEADER, REQUEST_ID_HEADER, request_options, resolve_headers,
    resolve_method, resolve_path, resolve_query,
};
pub use runtime::LambdaRuntime;

// Re-export lambda types
pub use lambda_runtime;

/// Initialize tracing for Lambda/CloudWatch.
///
/// This sets up structured JSON logging suitable for CloudWatch Logs.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init();
}

/// Initialize tracing with a custom log level.
pub fn init_tracing_with_level(level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::new(level);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init();
}
