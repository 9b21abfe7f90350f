use axum::{
    Extension, Router,
    extract::State,
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::controller::{self, RenderState},
    infra::assets::serve_client,
};

use super::middleware::{RequestContext, log_responses, set_request_context};

/// Router for the page renderer and the client bundle it references.
pub fn build_router(state: RenderState) -> Router {
    Router::new()
        .route("/_health", get(health))
        .route("/main.js", get(serve_client))
        .route("/main.css", get(serve_client))
        .route("/", get(render_page))
        .route("/{*path}", get(render_page))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

async fn render_page(
    State(state): State<RenderState>,
    Extension(ctx): Extension<RequestContext>,
    uri: Uri,
) -> Response {
    let url = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    controller::render(&ctx.request_id, url, &state).await
}
