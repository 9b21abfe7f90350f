use std::{collections::HashSet, sync::Arc, time::Duration};

use axum::{body::Body, http::Request};
use http_body_util::BodyExt;
use metrics_util::debugging::DebuggingRecorder;
use sheetstream::{
    application::controller::RenderState, config::RenderSettings,
    domain::assets::AssetManifest, infra::http::build_router, presentation::app::DemoApp,
};
use tower::ServiceExt;

#[tokio::test(start_paused = true)]
async fn render_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let state = RenderState::new(
        Arc::new(DemoApp::new()),
        AssetManifest::default(),
        RenderSettings {
            data_delay: Duration::from_secs(10),
            abort_delay: Duration::from_millis(50),
        },
    );
    let response = build_router(state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    response
        .into_body()
        .collect()
        .await
        .expect("drain body");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        "sheetstream_render_shell_total",
        "sheetstream_render_abort_total",
        "sheetstream_style_blocks_injected_total",
    ] {
        assert!(names.contains(expected), "missing metric {expected}");
    }
}
