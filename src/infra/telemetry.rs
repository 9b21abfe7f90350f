use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so the `render` command can write documents to stdout.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "sheetstream_render_shell_total",
            Unit::Count,
            "Total number of shells sent, labelled by response status."
        );
        describe_counter!(
            "sheetstream_render_shell_failed_total",
            Unit::Count,
            "Total number of renders that failed before producing a shell."
        );
        describe_counter!(
            "sheetstream_render_abort_total",
            Unit::Count,
            "Total number of renders handed to the client by the shell deadline."
        );
        describe_counter!(
            "sheetstream_render_error_total",
            Unit::Count,
            "Total number of component errors observed while rendering."
        );
        describe_counter!(
            "sheetstream_style_blocks_injected_total",
            Unit::Count,
            "Total number of style blocks spliced into streamed fragments."
        );
        describe_histogram!(
            "sheetstream_render_shell_ms",
            Unit::Milliseconds,
            "Time from request to shell ready in milliseconds."
        );
    });
}
