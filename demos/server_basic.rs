//! Basic content negotiation server example
//!
//! Serves one article as HTML, JSON or plain text depending on the request.
//!
//! Run with: cargo run --example server_basic
//!
//! Then try:
//!
//! ```text
//! curl -H 'Accept: application/json' http://localhost:3000/article
//! curl -H 'Accept: text/plain;q=0.9, text/html;q=0.5' http://localhost:3000/article
//! curl 'http://localhost:3000/article?format=txt'
//! curl http://localhost:3000/article.json
//! curl -H 'Accept: image/png' http://localhost:3000/article
//! ```

use axum::{
    extract::{Path, Request},
    middleware::from_fn,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use conneg_axum_http::{ConnegLayer, Negotiated, NegotiationConfig, RenderContext, Renderer};
use http::{header, HeaderValue};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct Article {
    title: String,
    body: String,
}

impl Negotiated for Article {
    fn renderers() -> Vec<Renderer<Self>> {
        vec![
            Renderer::new("html", |article: &Article, _, context: &RenderContext, _| {
                let alternates = context
                    .get("renderers")
                    .and_then(|value| value.as_array())
                    .map(|renderers| {
                        renderers
                            .iter()
                            .filter_map(|r| {
                                let url = r["url"].as_str()?;
                                let name = r["name"].as_str()?;
                                Some(format!("<a href=\"{}\">{}</a>", url, name))
                            })
                            .collect::<Vec<_>>()
                            .join(" | ")
                    })
                    .unwrap_or_default();
                Some(
                    Html(format!(
                        "<h1>{}</h1><p>{}</p><footer>Also available as: {}</footer>",
                        article.title, article.body, alternates
                    ))
                    .into_response(),
                )
            })
            .with_media_types(["text/html", "application/xhtml+xml"])
            .with_priority(1)
            .with_name("HTML"),
            Renderer::new("json", |article: &Article, _, _, _| {
                Some(Json(article).into_response())
            })
            .with_media_types(["application/json"])
            .with_name("JSON"),
            Renderer::new("txt", |article: &Article, _, _, _| {
                Some(format!("{}\n\n{}\n", article.title, article.body).into_response())
            })
            .with_media_types(["text/plain"])
            .with_name("Plain text"),
        ]
    }

    fn default_format() -> Option<&'static str> {
        Some("html")
    }
}

fn article() -> Article {
    Article {
        title: "Hello from conneg".to_string(),
        body: "The same resource, in whichever representation you prefer.".to_string(),
    }
}

async fn handle_article(Extension(conneg): Extension<ConnegLayer>, request: Request) -> Response {
    let (parts, _) = request.into_parts();
    let state = conneg.state_for(&parts);
    tracing::info!(accept = ?state.accept, format = ?state.format_override, "GET /article");

    let context = RenderContext::new()
        .with_header(header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
    conneg.render(&article(), &parts, context, Some("article"))
}

/// `/article.json` style URLs: the extension overrides everything else.
async fn handle_article_with_extension(
    Extension(conneg): Extension<ConnegLayer>,
    Path(file): Path<String>,
    request: Request,
) -> Response {
    let (mut parts, _) = request.into_parts();
    let Some((_, format)) = file.rsplit_once('.') else {
        return http::StatusCode::NOT_FOUND.into_response();
    };

    let state = conneg.state_for(&parts).with_format_override(format);
    parts.extensions.insert(Arc::new(state));
    conneg.render(&article(), &parts, RenderContext::new(), Some("article"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // `.with_priority("json", 2)` would serve JSON to `*/*` clients instead of HTML.
    let conneg = ConnegLayer::with_config(NegotiationConfig::default());

    let app = Router::new()
        .route("/article", get(handle_article))
        .route("/{file}", get(handle_article_with_extension))
        .layer(from_fn(conneg.middleware()));

    tracing::info!("Starting server on http://localhost:3000");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    axum::serve(listener, app).await?;

    Ok(())
}
