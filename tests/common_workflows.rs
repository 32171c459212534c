//! Integration tests for common Gatehouse workflows.
//!
//! These tests verify that the most common use cases work correctly.

#![cfg(feature = "lambda")]

use gatehouse::prelude::*;
use serde_json::json;

fn event(value: serde_json::Value) -> GatewayEvent {
    serde_json::from_value(value).unwrap()
}

// =============================================================================
// Inject Tests
// =============================================================================

#[tokio::test]
async fn test_inject_without_gateway() {
    let dispatcher = Dispatcher::new(HandlerEngine::new(|req: SyntheticRequest, mut res: SyntheticResponse| async move {
        let _ = res.write_head(200, [("content-type", "text/plain")]);
        let _ = res.end_with(format!("{} {}", req.method(), req.url()));
    }));

    let finished = inject(&dispatcher, RequestOptions::new("GET", "/ping"))
        .await
        .unwrap();

    assert_eq!(finished.status_code(), 200);
    assert_eq!(finished.payload(false), "GET /ping");
}

// =============================================================================
// REST API (payload 1.0) Tests
// =============================================================================

#[tokio::test]
async fn test_rest_api_json_endpoint() {
    let proxy = LambdaProxy::new(HandlerEngine::new(|req: SyntheticRequest, mut res: SyntheticResponse| async move {
        if req.method() == "GET" && req.path() == "/users" {
            let _ = res.write_head(200, [("content-type", "application/json; charset=utf-8")]);
            let _ = res.end_with(json!([{"id": 1}]).to_string());
        } else {
            let _ = res.write_head(404, ());
            let _ = res.end();
        }
    }));

    let found = proxy
        .handle(
            event(json!({
                "httpMethod": "GET",
                "path": "/dev/users",
                "headers": {"Accept": "application/json"},
                "requestContext": {"stage": "dev", "resourcePath": "/users", "requestId": "r-1"}
            })),
            Some(InvocationContext::new("aws-1")),
        )
        .await;
    assert_eq!(found.status_code, 200);
    assert_eq!(found.body, r#"[{"id":1}]"#);

    let missing = proxy
        .handle(event(json!({"httpMethod": "GET", "path": "/nope"})), None)
        .await;
    assert_eq!(missing.status_code, 404);
    assert_eq!(missing.body, "");
}

#[tokio::test]
async fn test_rest_api_login_sets_cookies() {
    let proxy = LambdaProxy::new(HandlerEngine::new(|_req, mut res: SyntheticResponse| async move {
        let _ = res.append_header("Set-Cookie", "session=abc; HttpOnly");
        let _ = res.append_header("Set-Cookie", "theme=dark");
        let _ = res.write_head(204, ());
        let _ = res.end();
    }));

    let reply = proxy
        .handle(event(json!({"httpMethod": "POST", "path": "/login"})), None)
        .await;
    let json = serde_json::to_value(&reply).unwrap();

    assert_eq!(json["statusCode"], 204);
    assert_eq!(
        json["multiValueHeaders"]["set-cookie"],
        json!(["session=abc; HttpOnly", "theme=dark"])
    );
    assert!(json["headers"].get("set-cookie").is_none());
}

// =============================================================================
// HTTP API (payload 2.0) Tests
// =============================================================================

#[tokio::test]
async fn test_http_api_query_and_cookies() {
    let proxy = LambdaProxy::new(HandlerEngine::new(|req: SyntheticRequest, mut res: SyntheticResponse| async move {
        let _ = res.append_header("set-cookie", "a=1");
        let _ = res.append_header("set-cookie", "b=2");
        let _ = res.end_with(format!(
            "{}|{}",
            req.query_string().unwrap_or_default(),
            req.header("cookie").unwrap_or_default()
        ));
    }));

    let reply = proxy
        .handle(
            event(json!({
                "version": "2.0",
                "rawPath": "/search",
                "rawQueryString": "tags=a,b",
                "queryStringParameters": {"tags": "a,b"},
                "cookies": ["x=1"],
                "requestContext": {"http": {"method": "GET"}}
            })),
            None,
        )
        .await;

    assert_eq!(reply.body, "tags=a&tags=b|x=1");
    assert_eq!(reply.cookies, Some(vec!["a=1".to_string(), "b=2".to_string()]));
}

// =============================================================================
// Load Balancer Tests
// =============================================================================

#[tokio::test]
async fn test_alb_gzip_body_is_base64() {
    let proxy = LambdaProxy::new(HandlerEngine::new(|_req, mut res: SyntheticResponse| async move {
        let _ = res.set_header("content-encoding", "gzip");
        let _ = res.end_with(vec![0x1f_u8, 0x8b, 0x08]);
    }));

    let reply = proxy
        .handle(
            event(json!({
                "httpMethod": "GET",
                "path": "/asset",
                "multiValueQueryStringParameters": {"v": ["1"]},
                "requestContext": {"elb": {"targetGroupArn": "arn"}}
            })),
            None,
        )
        .await;

    assert!(reply.is_base64_encoded);
    assert_eq!(reply.body, "H4sI");
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[tokio::test]
async fn test_fault_never_escapes() {
    let proxy = LambdaProxy::new(HandlerEngine::new(|_req, mut res: SyntheticResponse| async move {
        res.destroy("database unavailable");
    }));

    let reply = proxy.handle(GatewayEvent::default(), None).await;

    assert_eq!(reply, GatewayReply::degraded());
}
