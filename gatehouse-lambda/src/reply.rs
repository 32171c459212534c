//! Response-to-reply adapter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use gatehouse_core::{FinishedResponse, ProtocolVersion};

use crate::config::ProxyConfig;

/// The reply envelope a gateway expects back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayReply {
    /// HTTP status code.
    pub status_code: u16,
    /// Body, base64-encoded when `is_base64_encoded` is set.
    pub body: String,
    /// Lowercase-keyed headers.
    pub headers: HashMap<String, String>,
    /// Whether `body` is base64-encoded.
    pub is_base64_encoded: bool,
    /// Response cookies (payload 2.0 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<String>>,
    /// Multi-value headers (payload 1.0 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_value_headers: Option<HashMap<String, Vec<String>>>,
}

impl GatewayReply {
    /// The reply sent when routing fails.
    pub fn degraded() -> Self {
        Self {
            status_code: 500,
            ..Default::default()
        }
    }
}

/// What a binary-detection predicate gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct DraftReply<'a> {
    /// Status code.
    pub status_code: u16,
    /// Content type without parameters.
    pub content_type: Option<&'a str>,
    /// Lowercase-keyed headers.
    pub headers: &'a HashMap<String, String>,
    /// The finished response.
    pub response: &'a FinishedResponse,
}

impl DraftReply<'_> {
    /// Get a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.header(name)
    }
}

/// Default binary detection: a compressed body is never text.
pub fn content_encoding_heuristic(draft: &DraftReply<'_>) -> bool {
    draft
        .header("content-encoding")
        .is_some_and(|enc| !enc.trim().eq_ignore_ascii_case("identity"))
}

/// Decide whether the reply body must be base64-encoded.
pub fn is_base64_encoded(finished: &FinishedResponse, config: &ProxyConfig) -> bool {
    let draft = DraftReply {
        status_code: finished.status_code(),
        content_type: finished.content_type(),
        headers: finished.headers(),
        response: finished,
    };

    let listed = draft
        .content_type
        .is_some_and(|ct| config.is_binary_mime_type(ct));
    let enforced = match &config.enforce_base64 {
        Some(predicate) => predicate(&draft),
        None => content_encoding_heuristic(&draft),
    };

    // Bytes that are not text cannot travel in a string body.
    listed || enforced || (finished.has_binary() && !finished.is_utf8())
}

/// Shape a finished response into a gateway reply.
pub fn build_reply(
    finished: &FinishedResponse,
    version: ProtocolVersion,
    config: &ProxyConfig,
) -> GatewayReply {
    let base64 = is_base64_encoded(finished, config);

    let mut reply = GatewayReply {
        status_code: finished.status_code(),
        body: finished.payload(base64),
        headers: finished.headers().clone(),
        is_base64_encoded: base64,
        cookies: None,
        multi_value_headers: None,
    };

    match version {
        ProtocolVersion::V2 => reply.cookies = finished.cookies().map(<[String]>::to_vec),
        ProtocolVersion::V1 => reply.multi_value_headers = finished.multi_value_headers().cloned(),
    }

    reply
}
