//! End-to-end negotiation scenarios through `ConnegLayer` and an axum router.

use crate::{ConnegLayer, Negotiated, NegotiationConfig, NegotiationState, RenderContext, Renderer};
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use http::request::Parts;
use std::collections::BTreeMap;
use tower::ServiceExt;

struct Article {
    title: &'static str,
}

impl Negotiated for Article {
    fn renderers() -> Vec<Renderer<Self>> {
        vec![
            Renderer::new("html", |a: &Article, _, _, _| {
                Some(format!("<h1>{}</h1>", a.title).into_response())
            })
            .with_media_types(["text/html", "application/xhtml+xml"])
            .with_priority(1)
            .with_name("HTML"),
            Renderer::new("json", |a: &Article, _, _, _| {
                Some(Json(serde_json::json!({ "title": a.title })).into_response())
            })
            .with_media_types(["application/json"])
            .with_name("JSON"),
            Renderer::new("txt", |a: &Article, _, _, _| Some(a.title.into_response()))
                .with_media_types(["text/plain"])
                .with_name("Plain text"),
        ]
    }
}

/// Same media types as `Article`, all at one priority.
struct Flat;

impl Negotiated for Flat {
    fn renderers() -> Vec<Renderer<Self>> {
        ["html:text/html", "json:application/json", "xml:application/xml", "txt:text/plain"]
            .into_iter()
            .map(|entry| {
                let (format, media_type) = entry.split_once(':').unwrap();
                let body = format.to_string();
                Renderer::new(format, move |_: &Flat, _, _, _| Some(body.clone().into_response()))
                    .with_media_types([media_type])
                    .with_priority(1)
            })
            .collect()
    }
}

struct Homepage;

impl Negotiated for Homepage {
    fn renderers() -> Vec<Renderer<Self>> {
        vec![
            Renderer::new("html", |_: &Homepage, _, _, _| Some("home".into_response()))
                .with_media_types(["text/html"]),
        ]
    }

    fn default_format() -> Option<&'static str> {
        Some("html")
    }
}

struct Failure;

impl Negotiated for Failure {
    fn renderers() -> Vec<Renderer<Self>> {
        vec![
            Renderer::new("html", |_: &Failure, _, _, _| Some("<p>failed</p>".into_response()))
                .with_media_types(["text/html"]),
            Renderer::new("json", |_: &Failure, _, _, _| Some("{\"error\":true}".into_response()))
                .with_media_types(["application/json"]),
        ]
    }

    fn fallback_formats() -> &'static [&'static str] {
        &["json"]
    }
}

/// Reports how many alternates the render context carried.
struct Introspect;

impl Negotiated for Introspect {
    fn renderers() -> Vec<Renderer<Self>> {
        vec![
            Renderer::new("txt", |_: &Introspect, _, context: &RenderContext, _| {
                let count = context
                    .get("renderers")
                    .and_then(|value| value.as_array())
                    .map_or(0, Vec::len);
                Some(count.to_string().into_response())
            })
            .with_media_types(["text/plain"]),
            Renderer::new("csv", |_: &Introspect, _, _, _| None).with_media_types(["text/csv"]),
        ]
    }
}

/// JSON and JSONP share `application/json`; nothing ever renders.
struct Unavailable;

impl Negotiated for Unavailable {
    fn renderers() -> Vec<Renderer<Self>> {
        vec![
            Renderer::new("json", |_: &Unavailable, _, _, _| None)
                .with_media_types(["application/json"])
                .with_name("JSON"),
            Renderer::new("json", |_: &Unavailable, _, _, _| None).with_name("JSONP"),
            Renderer::new("csv", |_: &Unavailable, _, _, _| None)
                .with_media_types(["text/csv"])
                .with_name("CSV"),
        ]
    }
}

/// Declares its own priorities, replacing the process-level ones.
struct Pinned;

impl Negotiated for Pinned {
    fn renderers() -> Vec<Renderer<Self>> {
        vec![
            Renderer::new("html", |_: &Pinned, _, _, _| Some("html".into_response()))
                .with_media_types(["text/html"]),
            Renderer::new("json", |_: &Pinned, _, _, _| Some("json".into_response()))
                .with_media_types(["application/json"]),
        ]
    }

    fn priority_overrides() -> Option<BTreeMap<String, i32>> {
        Some(BTreeMap::from([("html".to_string(), 20)]))
    }
}

fn parts(uri: &str, accept: Option<&str>) -> Parts {
    let mut builder = http::Request::builder().uri(uri);
    if let Some(accept) = accept {
        builder = builder.header(header::ACCEPT, accept);
    }
    builder.body(()).unwrap().into_parts().0
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_accept_selects_representation() {
    let conneg = ConnegLayer::new();

    let response = conneg.render(
        &Article { title: "Hi" },
        &parts("/", Some("application/json")),
        RenderContext::new(),
        None,
    );
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::VARY], "Accept");
    assert_eq!(body_string(response).await, r#"{"title":"Hi"}"#);

    let response = conneg.render(
        &Article { title: "Hi" },
        &parts("/", Some("*/*")),
        RenderContext::new(),
        None,
    );
    assert_eq!(body_string(response).await, "<h1>Hi</h1>");
}

#[tokio::test]
async fn test_equal_priority_follows_accept_order() {
    let conneg = ConnegLayer::new();
    let request = parts(
        "/",
        Some("text/plain, application/xml, text/html, application/json"),
    );

    let state = conneg.state_for(&request);
    let formats: Vec<String> = conneg
        .renderers(&state, &Flat, None, None, true)
        .iter()
        .map(|renderer| renderer.format().to_string())
        .collect();
    assert_eq!(formats, vec!["txt", "xml", "html", "json"]);

    let response = conneg.render(&Flat, &request, RenderContext::new(), None);
    assert_eq!(body_string(response).await, "txt");
}

#[tokio::test]
async fn test_not_acceptable() {
    let conneg = ConnegLayer::new();
    let context = RenderContext::new()
        .with_header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    let response = conneg.render(
        &Article { title: "Hi" },
        &parts("/", Some("image/png")),
        context,
        None,
    );
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(response.headers()[header::VARY], "Accept");
    assert_eq!(
        body_string(response).await,
        "Your Accept header didn't contain any supported media ranges.\n\n\
         Supported ranges are:\n\n \
         * HTML (text/html, application/xhtml+xml; html)\n \
         * JSON (application/json; json)\n \
         * Plain text (text/plain; txt)\n"
    );
}

#[tokio::test]
async fn test_not_acceptable_lists_untried_renderers() {
    let conneg = ConnegLayer::new();
    let request = parts("/", Some("application/json"));

    let err = conneg
        .try_render(&Unavailable, &request, RenderContext::new(), None)
        .unwrap_err();
    match err {
        crate::NegotiationError::NotAcceptable { tried } => {
            let tried: Vec<String> = tried.iter().map(|m| m.to_string()).collect();
            assert_eq!(tried, vec!["application/json"]);
        }
        other => panic!("unexpected error: {}", other),
    }

    let response = conneg.render(&Unavailable, &request, RenderContext::new(), None);
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(
        body_string(response).await,
        "Your Accept header didn't contain any supported media ranges.\n\n\
         Supported ranges are:\n\n \
         * CSV (text/csv; csv)\n"
    );
}

#[tokio::test]
async fn test_default_format_without_accept() {
    let conneg = ConnegLayer::new();

    let response = conneg.render(&Homepage, &parts("/", None), RenderContext::new(), None);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "home");

    // Without a default, a request with no preferences has no candidates.
    let response = conneg.render(&Article { title: "Hi" }, &parts("/", None), RenderContext::new(), None);
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_fallback_after_unmatched_accept() {
    let conneg = ConnegLayer::new();
    let response = conneg.render(
        &Failure,
        &parts("/", Some("image/png")),
        RenderContext::new().with_status(StatusCode::INTERNAL_SERVER_ERROR),
        None,
    );
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "{\"error\":true}");
}

#[tokio::test]
async fn test_query_override_beats_accept() {
    let conneg = ConnegLayer::new();
    let response = conneg.render(
        &Article { title: "Hi" },
        &parts("/?format=txt", Some("text/html")),
        RenderContext::new(),
        None,
    );
    assert_eq!(body_string(response).await, "Hi");

    // An unknown override yields nothing, even though Accept would match.
    let response = conneg.render(
        &Article { title: "Hi" },
        &parts("/?format=pdf", Some("text/html")),
        RenderContext::new(),
        None,
    );
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_render_to_format() {
    let conneg = ConnegLayer::new();
    let request = parts("/", Some("text/html"));

    let response = conneg.render_to_format(
        &Article { title: "Hi" },
        &request,
        RenderContext::new().with_status(StatusCode::CREATED),
        None,
        "txt",
    );
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_string(response).await, "Hi");

    let err = conneg
        .try_render_to_format(&Article { title: "Hi" }, &request, RenderContext::new(), None, "pdf")
        .unwrap_err();
    assert!(err.is_not_acceptable());

    let response =
        conneg.render_to_format(&Introspect, &request, RenderContext::new(), None, "csv");
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_renderer_details_in_context() {
    let conneg = ConnegLayer::new();
    let response = conneg.render(&Introspect, &parts("/", Some("text/plain")), RenderContext::new(), None);
    assert_eq!(body_string(response).await, "2");

    let conneg = ConnegLayer::with_config(NegotiationConfig {
        include_renderer_details: false,
        ..Default::default()
    });
    let response = conneg.render(&Introspect, &parts("/", Some("text/plain")), RenderContext::new(), None);
    assert_eq!(body_string(response).await, "0");
}

#[tokio::test]
async fn test_priority_overrides() {
    let conneg = ConnegLayer::with_config(NegotiationConfig::default().with_priority("json", 10));

    let response = conneg.render(&Article { title: "Hi" }, &parts("/", Some("*/*")), RenderContext::new(), None);
    assert_eq!(body_string(response).await, r#"{"title":"Hi"}"#);

    // Type-level overrides replace the process-level ones.
    let response = conneg.render(&Pinned, &parts("/", Some("*/*")), RenderContext::new(), None);
    assert_eq!(body_string(response).await, "html");
}

async fn article(Extension(conneg): Extension<ConnegLayer>, request: Request) -> Response {
    let (parts, _) = request.into_parts();
    conneg.render(&Article { title: "Routed" }, &parts, RenderContext::new(), Some("article"))
}

async fn echo_state(state: NegotiationState) -> String {
    format!("{:?}|{:?}", state.accept, state.format_override)
}

fn app(conneg: &ConnegLayer) -> Router {
    Router::new()
        .route("/article", get(article))
        .route("/state", get(echo_state))
        .layer(from_fn(conneg.middleware()))
}

#[tokio::test]
async fn test_middleware_routes() {
    let conneg = ConnegLayer::new();

    let request = http::Request::builder()
        .uri("/article?format=json")
        .header(header::ACCEPT, "text/html")
        .body(Body::empty())
        .unwrap();
    let response = app(&conneg).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::VARY], "Accept");
    assert_eq!(body_string(response).await, r#"{"title":"Routed"}"#);

    let request = http::Request::builder()
        .uri("/article")
        .header(header::ACCEPT, "application/pdf")
        .body(Body::empty())
        .unwrap();
    let response = app(&conneg).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

    assert!(conneg.cache().get::<Article>().is_some());
}

#[tokio::test]
async fn test_middleware_state_extractor() {
    let conneg = ConnegLayer::new();
    let request = http::Request::builder()
        .uri("/state?format=txt,html")
        .header(header::ACCEPT, "text/plain")
        .body(Body::empty())
        .unwrap();

    let response = app(&conneg).oneshot(request).await.unwrap();
    assert_eq!(
        body_string(response).await,
        r#"Some("text/plain")|Some(["txt", "html"])"#
    );
}
