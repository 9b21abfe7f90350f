use std::{future::IntoFuture, process, sync::Arc};

use axum::http::StatusCode;
use http_body_util::BodyExt;
use sheetstream::{
    application::{
        controller::{self, RenderState},
        error::AppError,
    },
    config,
    domain::view::Component,
    infra::{assets, error::InfraError, http, telemetry},
    presentation::app::DemoApp,
};
use tokio::{io::AsyncWriteExt, sync::watch};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    let manifest = assets::load_manifest(settings.assets.manifest_path.as_deref()).await?;
    let app: Arc<dyn Component> = Arc::new(DemoApp::new());
    let state = RenderState::new(app, manifest, settings.render);

    match command {
        config::Command::Serve(_) => serve_http(&settings, state).await,
        config::Command::Render(args) => render_to_stdout(state, args).await,
    }
}

async fn serve_http(settings: &config::Settings, state: RenderState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "sheetstream::serve",
        addr = %settings.server.addr,
        data_delay_ms = settings.render.data_delay.as_millis() as u64,
        abort_delay_ms = settings.render.abort_delay.as_millis() as u64,
        "listening"
    );

    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            wait_for_shutdown().await;
            let _ = stopping_tx.send(true);
        },
    );

    let grace = settings.server.graceful_shutdown;
    let drain_deadline = async move {
        let closed = stopping_rx.wait_for(|stopping| *stopping).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server.into_future() => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            info!(target = "sheetstream::serve", "server stopped");
        }
        _ = drain_deadline => {
            warn!(
                target = "sheetstream::serve",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out; dropping open streams"
            );
        }
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "sheetstream::serve",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "sheetstream::serve", "shutdown signal received");
}

async fn render_to_stdout(state: RenderState, args: config::RenderArgs) -> Result<(), AppError> {
    let request_id = Uuid::new_v4().to_string();
    let response = controller::render(&request_id, &args.url, &state).await;
    let status = response.status();

    let mut body = response.into_body();
    let mut stdout = tokio::io::stdout();
    let mut fragments = 0usize;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|err| AppError::unexpected(format!("body error: {err}")))?;
        let Ok(data) = frame.into_data() else {
            continue;
        };
        if args.show_fragments && fragments > 0 {
            stdout
                .write_all(format!("\n<!-- fragment {fragments} -->\n").as_bytes())
                .await
                .map_err(InfraError::from)?;
        }
        stdout.write_all(&data).await.map_err(InfraError::from)?;
        stdout.flush().await.map_err(InfraError::from)?;
        fragments += 1;
    }
    stdout.write_all(b"\n").await.map_err(InfraError::from)?;

    info!(
        target = "sheetstream::render",
        url = %args.url,
        status = status.as_u16(),
        fragments,
        "render complete"
    );

    if status != StatusCode::OK {
        return Err(AppError::unexpected(format!(
            "render of `{}` finished with status {status}",
            args.url
        )));
    }
    Ok(())
}
