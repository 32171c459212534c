//! Event-to-request adapter.
//!
//! Turns a [`GatewayEvent`] into [`RequestOptions`] for a synthetic request:
//! method, stage-stripped path, merged query, flattened headers, body and
//! the optional serialized invocation arguments.

use std::borrow::Cow;
use std::collections::HashMap;
use tracing::trace;

use gatehouse_core::{Encoding, ProtocolVersion, QueryMapping, QueryValue, RequestOptions};

use crate::config::ProxyConfig;
use crate::context::InvocationContext;
use crate::error::Result;
use crate::event::GatewayEvent;

/// Header carrying the URL-encoded event when arguments are serialized.
pub const EVENT_HEADER: &str = "x-apigateway-event";
/// Header carrying the URL-encoded invocation context.
pub const CONTEXT_HEADER: &str = "x-apigateway-context";
/// Request-id header filled from the gateway request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build request options for `event`.
pub fn request_options(
    event: &GatewayEvent,
    context: Option<&InvocationContext>,
    config: &ProxyConfig,
) -> Result<RequestOptions> {
    let method = resolve_method(event);
    let path = resolve_path(event);
    let query = resolve_query(event);
    let headers = resolve_headers(event, context, config)?;

    trace!(method = %method, path = %path, "adapted gateway event");

    let mut options = RequestOptions::new(method, path)
        .query(query)
        .host(config.base_host.clone());

    if let Some(ip) = event.source_ip() {
        options = options.remote_address(ip);
    }

    let encoding = if event.is_base64_encoded {
        Encoding::Base64
    } else {
        Encoding::Utf8
    };
    options = options.body(event.body.clone().unwrap_or_default(), encoding);

    for (name, value) in headers {
        options = options.header(name, value);
    }

    Ok(options)
}

/// HTTP method: `httpMethod`, then `requestContext.http.method`, then `GET`.
pub fn resolve_method(event: &GatewayEvent) -> String {
    event
        .http_method
        .clone()
        .or_else(|| {
            event
                .request_context
                .as_ref()
                .and_then(|ctx| ctx.http.as_ref())
                .and_then(|http| http.method.clone())
        })
        .unwrap_or_else(|| "GET".to_string())
}

/// Request path, with the stage prefix removed when only the path carries it.
///
/// Invoking through the default execute-api domain puts `/{stage}` in front
/// of the path but not in front of `resourcePath`.
pub fn resolve_path(event: &GatewayEvent) -> String {
    let path = event
        .path
        .as_deref()
        .filter(|p| !p.is_empty())
        .or(event.raw_path.as_deref().filter(|p| !p.is_empty()))
        .unwrap_or("/");

    let Some(ctx) = &event.request_context else {
        return path.to_string();
    };

    match (ctx.stage.as_deref(), ctx.resource_path.as_deref()) {
        (Some(stage), Some(resource_path)) if !stage.is_empty() => {
            let prefix = format!("/{stage}/");
            if path.starts_with(&prefix) && !resource_path.starts_with(&prefix) {
                path[stage.len() + 1..].to_string()
            } else {
                path.to_string()
            }
        }
        _ => path.to_string(),
    }
}

/// Merge the event's query representations.
pub fn resolve_query(event: &GatewayEvent) -> QueryMapping {
    if event.is_load_balancer() {
        load_balancer_query(event)
    } else {
        standard_query(event)
    }
}

// Keys and values arrive percent-encoded; multi-value form wins outright.
fn load_balancer_query(event: &GatewayEvent) -> QueryMapping {
    let v2 = event.protocol_version() == ProtocolVersion::V2;

    if let Some(multi) = &event.multi_value_query_string_parameters {
        return multi
            .iter()
            .map(|(k, v)| {
                let values: Vec<String> = v.values().into_iter().map(decode_component).collect();
                (decode_component(k), QueryValue::Multi(values))
            })
            .collect();
    }

    let Some(single) = &event.query_string_parameters else {
        return QueryMapping::new();
    };

    single
        .iter()
        .map(|(k, v)| {
            let value = match v {
                QueryValue::Single(s) => {
                    let decoded = QueryValue::Single(decode_component(s));
                    if v2 { decoded.split_commas() } else { decoded }
                }
                QueryValue::Multi(vs) => {
                    QueryValue::Multi(vs.iter().map(|s| decode_component(s)).collect())
                }
            };
            (decode_component(k), value)
        })
        .collect()
}

fn standard_query(event: &GatewayEvent) -> QueryMapping {
    let mut query = event.query_string_parameters.clone().unwrap_or_default();
    if event.protocol_version() == ProtocolVersion::V2 {
        query = query.map_values(QueryValue::split_commas);
    }
    if let Some(multi) = &event.multi_value_query_string_parameters {
        query.merge(multi.clone());
    }
    query
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}

/// Flatten the event's headers into one lowercase-keyed map.
///
/// Multi-value headers are joined with `,` and win over the single-value
/// form. Serialized arguments, the request id and v2 cookies are added on
/// top.
pub fn resolve_headers(
    event: &GatewayEvent,
    context: Option<&InvocationContext>,
    config: &ProxyConfig,
) -> Result<HashMap<String, String>> {
    let mut headers: HashMap<String, String> = event
        .headers
        .iter()
        .flatten()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
        .collect();

    for (name, values) in event.multi_value_headers.iter().flatten() {
        headers.insert(name.to_ascii_lowercase(), values.join(","));
    }

    if config.serialize_lambda_arguments {
        let stripped = GatewayEvent {
            body: None,
            ..event.clone()
        };
        let json = serde_json::to_string(&stripped)?;
        headers.insert(EVENT_HEADER.to_string(), urlencoding::encode(&json).into_owned());

        if let Some(context) = context {
            let json = serde_json::to_string(context)?;
            headers.insert(CONTEXT_HEADER.to_string(), urlencoding::encode(&json).into_owned());
        }
    }

    if let Some(request_id) = event.request_id() {
        headers
            .entry(REQUEST_ID_HEADER.to_string())
            .or_insert_with(|| request_id.to_string());
    }

    if let Some(cookies) = event.cookies.as_ref().filter(|c| !c.is_empty()) {
        let joined = cookies.join(";");
        let cookie = match headers.remove("cookie") {
            Some(existing) if !existing.is_empty() => format!("{existing};{joined}"),
            _ => joined,
        };
        headers.insert("cookie".to_string(), cookie);
    }

    Ok(headers)
}
