//! Client asset manifest loading and embedded static asset serving.

use std::{borrow::Cow, path::Path};

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, include_dir};
use mime_guess::{Mime, MimeGuess};
use tracing::info;

use crate::{
    application::error::ErrorReport,
    domain::assets::{AssetManifest, BOOTSTRAP_SCRIPT},
};

use super::error::InfraError;

static CLIENT_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

/// Load the asset manifest from `path`, or fall back to the built-in one.
///
/// A manifest that does not map the bootstrap script is rejected, since every
/// shell must reference it.
pub async fn load_manifest(path: Option<&Path>) -> Result<AssetManifest, InfraError> {
    let Some(path) = path else {
        return Ok(AssetManifest::default());
    };

    let raw = tokio::fs::read(path).await?;
    let manifest: AssetManifest = serde_json::from_slice(&raw)
        .map_err(|err| InfraError::manifest(path, format!("failed to parse: {err}")))?;

    if manifest.bootstrap_script().is_none() {
        return Err(InfraError::manifest(
            path,
            format!("missing `{BOOTSTRAP_SCRIPT}` entry"),
        ));
    }

    info!(
        target = "sheetstream::infra::assets",
        path = %path.display(),
        entries = manifest.iter().count(),
        "asset manifest loaded"
    );
    Ok(manifest)
}

/// Serve the embedded client bundle file named by the request path.
pub async fn serve_client(uri: Uri) -> Response {
    serve_static(
        &CLIENT_ASSETS,
        Some(uri.path().to_string()),
        "infra::assets::serve_client",
    )
}

fn serve_static(
    bundle: &'static Dir<'static>,
    path: Option<String>,
    source: &'static str,
) -> Response {
    match resolve_asset(bundle, path) {
        Ok(Some(asset)) => asset.into_response(),
        Ok(None) => not_found_response(source),
        Err(status) => rejected_response(source, status),
    }
}

fn not_found_response(source: &'static str) -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

fn rejected_response(source: &'static str, status: StatusCode) -> Response {
    let mut response = status.into_response();
    ErrorReport::from_message(source, status, "Static asset request rejected")
        .attach(&mut response);
    response
}

struct Asset<'a> {
    contents: Cow<'a, [u8]>,
    mime: MimeGuess,
}

fn resolve_asset(
    bundle: &'static Dir<'static>,
    path: Option<String>,
) -> Result<Option<Asset<'static>>, StatusCode> {
    let candidate = path.unwrap_or_default();
    let candidate = candidate.trim_start_matches('/');

    if candidate.is_empty() || candidate.ends_with('/') {
        return Ok(None);
    }
    if candidate.contains("..") {
        return Err(StatusCode::BAD_REQUEST);
    }

    let Some(file) = bundle.get_file(candidate) else {
        return Ok(None);
    };

    Ok(Some(Asset {
        contents: Cow::Borrowed(file.contents()),
        mime: mime_guess::from_path(candidate),
    }))
}

impl IntoResponse for Asset<'static> {
    fn into_response(self) -> Response {
        let mime = self.mime.first_or_octet_stream();
        match self.contents {
            Cow::Borrowed(slice) => build_response(Bytes::from_static(slice), mime),
            Cow::Owned(bytes) => build_response(Bytes::from(bytes), mime),
        }
    }
}

fn build_response(bytes: Bytes, mime: Mime) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    // Bundle names are not fingerprinted.
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    response
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn resolves_embedded_bundle_files() {
        let asset = resolve_asset(&CLIENT_ASSETS, Some("/main.js".to_string()))
            .expect("accepted")
            .expect("main.js is embedded");
        assert!(
            asset
                .mime
                .first_or_octet_stream()
                .essence_str()
                .ends_with("javascript")
        );
        assert!(!asset.contents.is_empty());
    }

    #[test]
    fn rejects_traversal_and_directories() {
        assert_eq!(
            resolve_asset(&CLIENT_ASSETS, Some("/../Cargo.toml".to_string())).err(),
            Some(StatusCode::BAD_REQUEST)
        );
        assert!(matches!(
            resolve_asset(&CLIENT_ASSETS, Some("/".to_string())),
            Ok(None)
        ));
        assert!(matches!(
            resolve_asset(&CLIENT_ASSETS, Some("/missing.js".to_string())),
            Ok(None)
        ));
    }

    #[tokio::test]
    async fn missing_manifest_path_uses_builtin_manifest() {
        let manifest = load_manifest(None).await.expect("builtin manifest");
        assert_eq!(manifest, AssetManifest::default());
    }

    #[tokio::test]
    async fn manifest_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"main.js": "/static/main.abc123.js", "main.css": "/static/main.css"}}"#
        )
        .expect("write manifest");

        let manifest = load_manifest(Some(file.path())).await.expect("parsed");
        assert_eq!(manifest.bootstrap_script(), Some("/static/main.abc123.js"));
    }

    #[tokio::test]
    async fn manifest_without_bootstrap_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"main.css": "/main.css"}}"#).expect("write manifest");

        let err = load_manifest(Some(file.path()))
            .await
            .expect_err("bootstrap entry is required");
        assert!(matches!(err, InfraError::Manifest { .. }));
    }
}
