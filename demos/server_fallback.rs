//! Error pages with fallback formats
//!
//! Error responses must always produce something, even for clients whose
//! `Accept` header matches nothing. The error view declares HTML and JSON as
//! fallbacks; the JSON renderer only applies to API routes.
//!
//! Run with: cargo run --example server_fallback
//!
//! Then try:
//!
//! ```text
//! curl -i -H 'Accept: image/png' http://localhost:3001/missing
//! curl -i -H 'Accept: application/json' http://localhost:3001/api/missing
//! curl -i 'http://localhost:3001/report?format=csv'
//! ```

use axum::{
    extract::Request,
    middleware::from_fn,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use conneg_axum_http::{ConnegLayer, Negotiated, RenderContext, Renderer};
use http::StatusCode;

struct ErrorPage {
    status: StatusCode,
    message: String,
}

impl Negotiated for ErrorPage {
    fn renderers() -> Vec<Renderer<Self>> {
        vec![
            Renderer::new("html", |page: &ErrorPage, _, _, _| {
                Some(Html(format!("<h1>{}</h1><p>{}</p>", page.status, page.message)).into_response())
            })
            .with_media_types(["text/html"])
            .with_priority(1),
            Renderer::new("json", |page: &ErrorPage, _, _, _| {
                let body = serde_json::json!({
                    "status": page.status.as_u16(),
                    "error": page.message,
                });
                Some(Json(body).into_response())
            })
            .with_media_types(["application/json"])
            // JSON errors only for API routes
            .with_test(|_, _, target| target == "api"),
        ]
    }

    fn fallback_formats() -> &'static [&'static str] {
        &["html", "json"]
    }
}

/// A report offered only as CSV; anything else gets a 406.
struct Report;

impl Negotiated for Report {
    fn renderers() -> Vec<Renderer<Self>> {
        vec![Renderer::new("csv", |_: &Report, _, _, _| {
            Some("month,visits\n2024-01,42\n".into_response())
        })
        .with_media_types(["text/csv"])]
    }
}

async fn report(Extension(conneg): Extension<ConnegLayer>, request: Request) -> Response {
    let (parts, _) = request.into_parts();
    conneg.render(&Report, &parts, RenderContext::new(), Some("report"))
}

async fn not_found(Extension(conneg): Extension<ConnegLayer>, request: Request) -> Response {
    let (parts, _) = request.into_parts();
    let target = if parts.uri.path().starts_with("/api/") {
        "api"
    } else {
        "site"
    };
    tracing::warn!(path = parts.uri.path(), target, "Not found");

    let page = ErrorPage {
        status: StatusCode::NOT_FOUND,
        message: format!("{} does not exist", parts.uri.path()),
    };
    let context = RenderContext::new().with_status(page.status);
    conneg.render(&page, &parts, context, Some(target))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let conneg = ConnegLayer::new();
    let app = Router::new()
        .route("/report", get(report))
        .fallback(not_found)
        .layer(from_fn(conneg.middleware()));

    tracing::info!("Starting server on http://localhost:3001");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3001").await?;
    axum::serve(listener, app).await?;

    Ok(())
}
