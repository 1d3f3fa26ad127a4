use axum::{
    http::{header, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use rust_embed::Embed;

/// Browser UI bundled into the binary
#[derive(Embed)]
#[folder = "web/dist"]
pub struct StaticAssets;

/// Serve an embedded UI file, falling back to `index.html` for page routes.
pub async fn static_handler(method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };

    if let Some(response) = serve_asset(path) {
        return response;
    }

    // Page routes without an extension belong to the UI
    if !path.contains('.') {
        if let Some(response) = serve_asset("index.html") {
            return response;
        }
        return Html(placeholder_html()).into_response();
    }

    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

fn serve_asset(path: &str) -> Option<Response> {
    let asset = StaticAssets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Some(
        (
            [
                (header::CONTENT_TYPE, mime.to_string()),
                (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
            ],
            asset.data.into_owned(),
        )
            .into_response(),
    )
}

/// Shown when the binary was built without a UI bundle
pub fn placeholder_html() -> &'static str {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>kindavm</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
            margin: 0;
            background: #16213e;
            color: #fff;
        }
        p { color: #888; }
    </style>
</head>
<body>
    <div>
        <h1>kindavm</h1>
        <p>No web UI was bundled with this build.</p>
        <p>The control WebSocket is at <code>/ws</code>.</p>
    </div>
</body>
</html>"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_page_gets_ui() {
        let response = static_handler(Method::GET, Uri::from_static("/some/page")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_asset_is_404() {
        let response = static_handler(Method::GET, Uri::from_static("/missing.js")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_rejected() {
        let response = static_handler(Method::POST, Uri::from_static("/")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
