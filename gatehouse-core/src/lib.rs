//! # Gatehouse Core
//!
//! In-memory stand-ins for a network connection, so an HTTP routing engine
//! can serve a request that never touched a socket.
//!
//! - [`SyntheticRequest`] is a single-shot readable body with a normalized
//!   URL, lowercase headers and a [`MockSocket`].
//! - [`SyntheticResponse`] buffers status, headers and body chunks, and
//!   resolves its [`ResponseHandle`] exactly once.
//! - [`RoutingEngine`] is the contract an engine implements;
//!   [`Dispatcher`] waits for readiness and submits pairs.
//!
//! ```rust,ignore
//! use gatehouse_core::{Dispatcher, HandlerEngine, RequestOptions, inject};
//!
//! let dispatcher = Dispatcher::new(HandlerEngine::new(|_req, mut res| async move {
//!     let _ = res.write_head(200, [("content-type", "text/plain")]);
//!     let _ = res.end_with("hello");
//! }));
//!
//! let finished = inject(&dispatcher, RequestOptions::new("GET", "/")).await?;
//! assert_eq!(finished.payload(false), "hello");
//! ```

pub mod date;
pub mod engine;
pub mod error;
pub mod headers;
pub mod inject;
pub mod normalize;
pub mod query;
pub mod request;
pub mod response;

pub use engine::{Dispatcher, HandlerEngine, ReadySignal, RoutingEngine};
pub use error::{CoreError, Result};
pub use headers::{HeaderEntry, HeaderStore, HeaderValue};
pub use inject::{inject, inject_with_callback};
pub use normalize::{RequestTarget, host_header, parse_url, path_and_query};
pub use query::{QueryMapping, QueryValue, parse_query_string};
pub use request::{Encoding, MockSocket, RequestChunk, RequestOptions, SyntheticRequest};
pub use response::{
    Chunk, Completion, FinishedResponse, Head, ProtocolVersion, ResponseHandle, ResponseOptions,
    ResponseState, SyntheticResponse,
};
