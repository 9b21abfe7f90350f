//! Streaming render controller.
//!
//! Drives one render session from request to end of stream: arms the shell
//! deadline, waits for the shell, commits status and headers, then pipes the
//! rest of the pass through the chunk rewriter into the response body.
//!
//! Errors observed before the shell change the status to 500; errors after
//! it are only logged, because headers are already on the wire.

use std::{convert::Infallible, sync::Arc, time::Instant};

use async_stream::stream;
use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;
use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::{
    config::RenderSettings,
    domain::{assets::AssetManifest, view::Component},
    presentation::views::render_client_shell_response,
};

use super::{
    deadline::FallbackTimer, error::ErrorReport, pass::RenderPass, rewrite::ChunkRewriter,
    session::RenderSession,
};

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Process-wide inputs shared by every render.
#[derive(Clone)]
pub struct RenderState {
    pub app: Arc<dyn Component>,
    pub assets: Arc<AssetManifest>,
    pub settings: RenderSettings,
}

impl RenderState {
    pub fn new(app: Arc<dyn Component>, assets: AssetManifest, settings: RenderSettings) -> Self {
        Self {
            app,
            assets: Arc::new(assets),
            settings,
        }
    }
}

/// Render `url` into a streaming HTML response.
///
/// Returns once the shell is ready (or the pass failed without one); the rest
/// of the document is produced while the response body is polled.
pub async fn render(request_id: &str, url: &str, state: &RenderState) -> Response {
    let started = Instant::now();
    let session = RenderSession::new(request_id, url, &state.settings);
    let timer = FallbackTimer::arm(state.settings.abort_delay, session.abort_handle());
    let pass = RenderPass::new(
        Arc::clone(&state.app),
        Arc::clone(&state.assets),
        session.data(),
        session.styles(),
        session.abort_signal(),
        session.observer(),
    );
    let mut fragments = Box::pin(pass.into_stream());

    let Some(shell) = fragments.next().await else {
        warn!(
            target = "sheetstream::render::controller",
            request_id = %session.request_id(),
            url = %session.url(),
            "render pass produced no shell; sending client-rendered document"
        );
        counter!("sheetstream_render_shell_failed_total").increment(1);
        let mut guard = SessionGuard::new(session, timer);
        guard.complete();
        return render_client_shell_response(&state.assets, StatusCode::INTERNAL_SERVER_ERROR);
    };

    let status = if session.had_error() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    session.mark_shell_sent();
    histogram!("sheetstream_render_shell_ms").record(started.elapsed().as_secs_f64() * 1000.0);
    counter!("sheetstream_render_shell_total", "status" => status.as_u16().to_string())
        .increment(1);
    info!(
        target = "sheetstream::render::controller",
        request_id = %session.request_id(),
        url = %session.url(),
        status = status.as_u16(),
        aborted = session.was_aborted(),
        "shell ready; streaming response"
    );

    let mut rewriter = ChunkRewriter::new(session.styles());
    let mut guard = SessionGuard::new(session, timer);
    let body = stream! {
        yield Ok::<Bytes, Infallible>(rewriter.rewrite(shell).into_bytes());
        while let Some(fragment) = fragments.next().await {
            yield Ok(rewriter.rewrite(fragment).into_bytes());
        }
        counter!("sheetstream_style_blocks_injected_total")
            .increment(rewriter.injected_blocks() as u64);
        guard.complete();
    };

    let mut response = Body::from_stream(body).into_response();
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
    if status.is_server_error() {
        ErrorReport::from_message(
            "application::controller::render",
            status,
            "component error before the shell; streaming with client fallbacks",
        )
        .attach(&mut response);
    }
    response
}

/// Tears the session down when the response ends, whether the stream ran to
/// completion or the connection went away first.
struct SessionGuard {
    session: RenderSession,
    timer: Option<FallbackTimer>,
    completed: bool,
}

impl SessionGuard {
    fn new(session: RenderSession, timer: FallbackTimer) -> Self {
        Self {
            session,
            timer: Some(timer),
            completed: false,
        }
    }

    fn complete(&mut self) {
        self.completed = true;
        self.release();
        info!(
            target = "sheetstream::render::controller",
            request_id = %self.session.request_id(),
            had_error = self.session.had_error(),
            "response stream complete"
        );
    }

    fn release(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.disarm();
            if self.session.was_aborted() {
                counter!("sheetstream_render_abort_total").increment(1);
            }
        }
        self.session.teardown();
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.completed {
            warn!(
                target = "sheetstream::render::controller",
                request_id = %self.session.request_id(),
                url = %self.session.url(),
                "response stream dropped before completion; client connection closed"
            );
            self.release();
        }
    }
}
