//! Embedded static asset serving.

use axum::{
    body::Body,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, include_dir};
use mime_guess::Mime;

use crate::application::error::ErrorReport;

static STATIC_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

const SOURCE: &str = "infra::assets::serve_static";

/// Serve a file from the embedded `static/` directory.
pub async fn serve_static(path: Option<Path<String>>) -> Response {
    let captured = path.map(|Path(value)| value).unwrap_or_default();
    match resolve_asset(&captured) {
        Some(asset) => asset.into_response(),
        None => not_found_response(),
    }
}

fn not_found_response() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

struct Asset {
    contents: &'static [u8],
    mime: Mime,
}

fn resolve_asset(path: &str) -> Option<Asset> {
    let candidate = path.trim_start_matches('/');

    if candidate.is_empty() || candidate.ends_with('/') || candidate.contains("..") {
        // No traversal, no directory listings.
        return None;
    }

    let file = STATIC_ASSETS.get_file(candidate)?;
    Some(Asset {
        contents: file.contents(),
        mime: mime_guess::from_path(candidate).first_or_octet_stream(),
    })
}

impl IntoResponse for Asset {
    fn into_response(self) -> Response {
        let bytes = Bytes::from_static(self.contents);
        let len = bytes.len();
        let mut response = Response::new(Body::from(bytes));

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(self.mime.as_ref()) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
            headers.insert(header::CONTENT_LENGTH, value);
        }
        // Assets are not fingerprinted.
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=3600"),
        );

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stylesheet_is_served_with_css_mime() {
        let response = serve_static(Some(Path("site.css".to_string()))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/css"
        );
    }

    #[tokio::test]
    async fn traversal_and_missing_files_are_not_found() {
        for path in ["../Cargo.toml", "", "missing.js", "nested/"] {
            let response = serve_static(Some(Path(path.to_string()))).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
            assert!(response.extensions().get::<ErrorReport>().is_some());
        }
    }
}
