//! Drive a routing engine directly from request options.

use tracing::error;

use crate::engine::{Dispatcher, RoutingEngine};
use crate::error::Result;
use crate::request::{RequestOptions, SyntheticRequest};
use crate::response::{FinishedResponse, ResponseOptions, SyntheticResponse};

/// Build a request from `options`, route it and wait for the response.
pub async fn inject<E: RoutingEngine>(
    dispatcher: &Dispatcher<E>,
    options: RequestOptions,
) -> Result<FinishedResponse> {
    let request = SyntheticRequest::new(options)?;
    let (response, handle) = SyntheticResponse::new(ResponseOptions::default());

    let result = dispatcher.submit(request, response, handle).await;
    if let Err(err) = &result {
        error!(error = %err, "injected request failed");
    }
    result
}

/// Callback flavour of [`inject`]; `callback` runs exactly once.
pub async fn inject_with_callback<E, F>(dispatcher: &Dispatcher<E>, options: RequestOptions, callback: F)
where
    E: RoutingEngine,
    F: FnOnce(Result<FinishedResponse>),
{
    callback(inject(dispatcher, options).await);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HandlerEngine;
    use crate::error::CoreError;
    use crate::request::Encoding;

    #[tokio::test]
    async fn test_inject_echoes_body() {
        let dispatcher = Dispatcher::new(HandlerEngine::new(|mut req, mut res| async move {
            match req.read_to_end() {
                Ok(body) => {
                    let _ = res.write_head(200, [("content-type", "application/octet-stream")]);
                    let _ = res.end_with(body);
                }
                Err(err) => res.destroy(err.to_string()),
            }
        }));

        let options = RequestOptions::new("POST", "/echo").body("AAEC", Encoding::Base64);
        let finished = inject(&dispatcher, options).await.unwrap();

        assert_eq!(finished.body().as_ref(), &[0u8, 1, 2]);
        assert!(finished.has_binary());
        assert_eq!(finished.payload(true), "AAEC");
    }

    #[tokio::test]
    async fn test_inject_reports_fault() {
        let dispatcher = Dispatcher::new(HandlerEngine::new(|_req, mut res| async move {
            res.destroy("handler failed");
        }));

        let err = inject(&dispatcher, RequestOptions::default()).await.unwrap_err();
        assert_eq!(err, CoreError::Routing("handler failed".to_string()));
    }

    #[tokio::test]
    async fn test_inject_with_callback() {
        let dispatcher = Dispatcher::new(HandlerEngine::new(|_req, mut res| async move {
            let _ = res.set_status(204);
            let _ = res.end();
        }));

        let mut status = None;
        inject_with_callback(&dispatcher, RequestOptions::default(), |result| {
            status = result.ok().map(|r| r.status_code());
        })
        .await;
        assert_eq!(status, Some(204));
    }
}
