// Gatehouse - serve gateway events with an in-process HTTP routing engine
//
// This library turns API Gateway and ALB events into synthetic
// request/response pairs and shapes the finished response back into the
// reply the gateway expects.

// Re-export core functionality
pub use gatehouse_core::*;

// Re-export optional crates
#[cfg(feature = "lambda")]
pub use gatehouse_lambda;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Chunk,
        CoreError,
        Dispatcher,
        Encoding,
        FinishedResponse,
        HandlerEngine,
        ProtocolVersion,
        QueryMapping,
        QueryValue,
        RequestOptions,
        RoutingEngine,
        SyntheticRequest,
        SyntheticResponse,
        inject,
    };

    #[cfg(feature = "lambda")]
    pub use gatehouse_lambda::{
        GatewayEvent,
        GatewayReply,
        InvocationContext,
        InvocationScope,
        LambdaError,
        LambdaProxy,
        LambdaRuntime,
        ProxyConfig,
    };
}
