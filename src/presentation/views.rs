use crate::{
    application::error::{ErrorReport, HttpError},
    domain::assets::AssetManifest,
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

const CLIENT_SHELL_TITLE: &str = "Loading";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

/// Minimal document that leaves all rendering to the client bundle.
#[derive(Template)]
#[template(path = "client_shell.html")]
pub struct ClientShellTemplate {
    pub title: &'static str,
    pub stylesheet: Option<String>,
    pub bootstrap: Option<String>,
}

impl ClientShellTemplate {
    pub fn from_manifest(assets: &AssetManifest) -> Self {
        Self {
            title: CLIENT_SHELL_TITLE,
            stylesheet: assets.stylesheet().map(str::to_string),
            bootstrap: assets.bootstrap_script().map(str::to_string),
        }
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

/// Respond with the client-rendered document, used when no shell could be
/// produced on the server.
pub fn render_client_shell_response(assets: &AssetManifest, status: StatusCode) -> Response {
    match render_template(ClientShellTemplate::from_manifest(assets)) {
        Ok(html) => {
            let mut response = (status, html).into_response();
            ErrorReport::from_message(
                "presentation::views::render_client_shell_response",
                status,
                "Server render failed before the shell; client will render",
            )
            .attach(&mut response);
            response
        }
        Err(err) => err.into_response(),
    }
}
