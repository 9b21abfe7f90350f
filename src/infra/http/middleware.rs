use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tag the request with a fresh id; the render session and the response log
/// both pick it up from the extensions.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Log failed responses once their status is committed.
///
/// A streamed page returns here as soon as its shell is ready, so the timing
/// is time to shell and the body may still be streaming when the line is
/// written.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let shell_started = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let time_to_shell_ms = shell_started.elapsed().as_millis();
    let streamed = response.body().size_hint().exact().is_none();
    let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let cause = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        error!(
            target = "sheetstream::http::response",
            request_id = %request_id,
            status = status.as_u16(),
            method = %method,
            path = %path,
            time_to_shell_ms,
            streamed,
            source,
            cause = %cause,
            chain = ?messages,
            "page committed with a server error status",
        );
    } else {
        warn!(
            target = "sheetstream::http::response",
            request_id = %request_id,
            status = status.as_u16(),
            method = %method,
            path = %path,
            time_to_shell_ms,
            source,
            cause = %cause,
            "request rejected before rendering",
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::{
        Extension, Router,
        http::StatusCode,
        middleware,
        response::IntoResponse,
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;

    async fn echo_request_id(Extension(ctx): Extension<RequestContext>) -> String {
        ctx.request_id
    }

    async fn failing_shell() -> Response {
        let mut response = (StatusCode::INTERNAL_SERVER_ERROR, "fallback").into_response();
        ErrorReport::from_message("test::shell", StatusCode::INTERNAL_SERVER_ERROR, "shell failed")
            .attach(&mut response);
        response
    }

    fn router() -> Router {
        Router::new()
            .route("/id", get(echo_request_id))
            .route("/fail", get(failing_shell))
            .layer(middleware::from_fn(log_responses))
            .layer(middleware::from_fn(set_request_context))
    }

    fn request(path: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn request_context_reaches_handler_and_response() {
        let response = router().oneshot(request("/id")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let ctx = response
            .extensions()
            .get::<RequestContext>()
            .cloned()
            .expect("request context on response");
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .expect("body")
            .to_bytes();

        assert_eq!(body, ctx.request_id.as_bytes());
        assert!(Uuid::parse_str(&ctx.request_id).is_ok());
    }

    #[tokio::test]
    async fn error_report_is_consumed_by_response_log() {
        let response = router().oneshot(request("/fail")).await.expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<ErrorReport>().is_none());
        assert!(response.extensions().get::<RequestContext>().is_some());
    }
}
