//! Gateway event model.
//!
//! Covers API Gateway REST (payload 1.0), HTTP API (payload 2.0) and
//! Application Load Balancer events. Fields this crate does not interpret
//! are kept in `extra` so the event can be serialized back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use gatehouse_core::{ProtocolVersion, QueryMapping};

use crate::serde_ext;

/// An HTTP-trigger event as delivered to the function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEvent {
    /// Payload format version (`1.0`, `2.0` or absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// HTTP method (payload 1.0 and ALB).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    /// Request path (payload 1.0 and ALB).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Request path (payload 2.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_path: Option<String>,
    /// Single-value query parameters.
    #[serde(
        default,
        deserialize_with = "serde_ext::query",
        skip_serializing_if = "Option::is_none"
    )]
    pub query_string_parameters: Option<QueryMapping>,
    /// Multi-value query parameters.
    #[serde(
        default,
        deserialize_with = "serde_ext::query",
        skip_serializing_if = "Option::is_none"
    )]
    pub multi_value_query_string_parameters: Option<QueryMapping>,
    /// Single-value headers.
    #[serde(
        default,
        deserialize_with = "serde_ext::string_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub headers: Option<HashMap<String, String>>,
    /// Multi-value headers.
    #[serde(
        default,
        deserialize_with = "serde_ext::multi_string_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub multi_value_headers: Option<HashMap<String, Vec<String>>>,
    /// Body, base64-encoded when `is_base64_encoded` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Whether `body` is base64-encoded.
    #[serde(default)]
    pub is_base64_encoded: bool,
    /// Request cookies (payload 2.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<String>>,
    /// Request context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_context: Option<RequestContext>,
    /// Everything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request context attached by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Deployment stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Resource path template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_path: Option<String>,
    /// Gateway request id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Present for load-balancer events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elb: Option<Value>,
    /// HTTP description (payload 2.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpDescription>,
    /// Caller identity (payload 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    /// Everything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `requestContext.http` of a payload 2.0 event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDescription {
    /// HTTP method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Request path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Client address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    /// Everything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `requestContext.identity` of a payload 1.0 event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Client address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    /// Everything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GatewayEvent {
    /// Parse an event from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Payload format version.
    pub fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion::from_version(self.version.as_deref())
    }

    /// Check if the event comes from a load balancer.
    pub fn is_load_balancer(&self) -> bool {
        self.request_context
            .as_ref()
            .is_some_and(|ctx| ctx.elb.as_ref().is_some_and(|elb| !elb.is_null()))
    }

    /// Gateway request id, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.request_context.as_ref()?.request_id.as_deref()
    }

    /// Client address reported by the gateway.
    pub fn source_ip(&self) -> Option<&str> {
        let ctx = self.request_context.as_ref()?;
        ctx.http
            .as_ref()
            .and_then(|http| http.source_ip.as_deref())
            .or_else(|| ctx.identity.as_ref().and_then(|id| id.source_ip.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_v1_event() {
        let event = GatewayEvent::from_json(
            r#"{
                "httpMethod": "GET",
                "path": "/prod/users",
                "headers": {"Accept": "application/json"},
                "multiValueHeaders": {"Accept": ["application/json"]},
                "queryStringParameters": null,
                "body": null,
                "isBase64Encoded": false,
                "resource": "/users",
                "requestContext": {
                    "stage": "prod",
                    "resourcePath": "/users",
                    "requestId": "abc-123",
                    "identity": {"sourceIp": "10.0.0.1"}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(event.protocol_version(), ProtocolVersion::V1);
        assert_eq!(event.http_method.as_deref(), Some("GET"));
        assert!(event.query_string_parameters.is_none());
        assert_eq!(event.request_id(), Some("abc-123"));
        assert_eq!(event.source_ip(), Some("10.0.0.1"));
        assert!(!event.is_load_balancer());
        assert_eq!(event.extra.get("resource"), Some(&Value::from("/users")));
    }

    #[test]
    fn test_parse_v2_event() {
        let event = GatewayEvent::from_json(
            r#"{
                "version": "2.0",
                "rawPath": "/items",
                "rawQueryString": "a=1",
                "cookies": ["s=1"],
                "queryStringParameters": {"a": "1"},
                "requestContext": {
                    "http": {"method": "POST", "path": "/items", "sourceIp": "1.2.3.4"},
                    "requestId": "r-1"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(event.protocol_version(), ProtocolVersion::V2);
        assert_eq!(event.raw_path.as_deref(), Some("/items"));
        assert_eq!(event.source_ip(), Some("1.2.3.4"));
        assert_eq!(event.cookies, Some(vec!["s=1".to_string()]));
    }

    #[test]
    fn test_parse_alb_event() {
        let event = GatewayEvent::from_json(
            r#"{
                "httpMethod": "GET",
                "path": "/",
                "multiValueQueryStringParameters": {"q": ["x", "y"]},
                "requestContext": {"elb": {"targetGroupArn": "arn:aws:elasticloadbalancing:..."}}
            }"#,
        )
        .unwrap();

        assert!(event.is_load_balancer());
    }

    #[test]
    fn test_empty_string_query_is_absent() {
        let event = GatewayEvent::from_json(
            r#"{"version": "2.0", "httpMethod": "GET", "path": "/test", "queryStringParameters": ""}"#,
        )
        .unwrap();
        assert!(event.query_string_parameters.is_none());
    }

    #[test]
    fn test_serialize_skips_absent_fields() {
        let event = GatewayEvent {
            http_method: Some("GET".to_string()),
            path: Some("/".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["httpMethod"], "GET");
        assert!(json.get("body").is_none());
        assert!(json.get("headers").is_none());
    }
}
