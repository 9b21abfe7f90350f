use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the sheetstream binary.
#[derive(Debug, Parser)]
#[command(
    name = "sheetstream",
    version,
    about = "Streaming HTML renderer with in-stream style injection"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SHEETSTREAM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve streamed pages over HTTP.
    Serve(Box<ServeArgs>),
    /// Render one URL and write the streamed document to stdout.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub render: RenderOverrides,

    #[command(flatten)]
    pub assets: AssetOverrides,

    /// Print a marker line between flushed fragments.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub show_fragments: bool,

    /// URL to render.
    #[arg(value_name = "URL", default_value = "/")]
    pub url: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the simulated data-fetch delay in milliseconds.
    #[arg(long = "render-data-delay-ms", value_name = "MILLIS")]
    pub data_delay_ms: Option<u64>,

    /// Override the shell deadline after which rendering is handed to the client.
    #[arg(long = "render-abort-delay-ms", value_name = "MILLIS")]
    pub abort_delay_ms: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct AssetOverrides {
    /// Override the path of the JSON asset manifest.
    #[arg(long = "assets-manifest", value_name = "PATH")]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub render: RenderOverrides,

    #[command(flatten)]
    pub assets: AssetOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}
