//! Dispatching a request to the first renderer that accepts it.
//!
//! The resolver only orders candidates. Dispatch tries them in that order,
//! skips any that return `None` ("not applicable"), and decorates the winning
//! response with the context's status and headers plus `Vary: Accept`. When
//! every candidate declines, it reports the media types it tried so the
//! caller can answer `406 Not Acceptable`.

use super::alternates::RendererInfo;
use crate::error::{NegotiationError, Result};
use crate::protocol::MediaType;
use crate::renderer::{RenderContext, Renderer};
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use http::request::Parts;
use std::collections::HashSet;
use std::sync::Arc;

/// Try `renderers` in order and return the first response.
///
/// The response gets `context.status`, the context's headers and
/// `Vary: Accept`.
///
/// # Errors
///
/// [`NegotiationError::NotAcceptable`] carrying the media types of the
/// attempted renderers, without repeats and in the order first seen, when
/// none produced a response.
pub fn dispatch<V>(
    renderers: &[Arc<Renderer<V>>],
    view: &V,
    request: &Parts,
    context: &RenderContext,
    target: Option<&str>,
) -> Result<Response> {
    for renderer in renderers {
        if let Some(mut response) = renderer.render(view, request, context, target) {
            *response.status_mut() = context.status;
            apply_headers(response.headers_mut(), &context.headers);
            add_vary_accept(response.headers_mut());
            return Ok(response);
        }
    }

    let mut seen = HashSet::new();
    let tried: Vec<MediaType> = renderers
        .iter()
        .flat_map(|renderer| renderer.media_types().iter())
        .filter(|media_type| seen.insert(*media_type))
        .cloned()
        .collect();
    tracing::debug!(
        "No renderer accepted the request ({} candidates, {} media types)",
        renderers.len(),
        tried.len()
    );

    Err(NegotiationError::NotAcceptable { tried })
}

/// Copy additional headers onto a response, replacing existing values of
/// the same name.
pub fn apply_headers(headers: &mut HeaderMap, extra: &HeaderMap) {
    for name in extra.keys() {
        headers.remove(name);
        for value in extra.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
}

/// Add `Accept` to the `Vary` header unless it is already covered.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::server::add_vary_accept;
/// use http::{header::VARY, HeaderMap, HeaderValue};
///
/// let mut headers = HeaderMap::new();
/// headers.insert(VARY, HeaderValue::from_static("Cookie"));
/// add_vary_accept(&mut headers);
/// assert_eq!(headers[VARY], "Cookie, Accept");
/// ```
pub fn add_vary_accept(headers: &mut HeaderMap) {
    let existing: Vec<String> = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|field| field.trim().to_string())
        .filter(|field| !field.is_empty())
        .collect();

    if existing
        .iter()
        .any(|field| field == "*" || field.eq_ignore_ascii_case("accept"))
    {
        return;
    }

    let mut fields = existing;
    fields.push("Accept".to_string());
    if let Ok(value) = HeaderValue::from_str(&fields.join(", ")) {
        headers.insert(header::VARY, value);
    }
}

/// A `406 Not Acceptable` answer listing what the resource can produce.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::server::NotAcceptable;
/// use axum::response::IntoResponse;
/// use http::StatusCode;
///
/// let response = NotAcceptable::new(Vec::new(), Vec::new()).into_response();
/// assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
/// ```
#[derive(Debug, Clone)]
pub struct NotAcceptable {
    /// Media types of the renderers that were attempted
    pub tried: Vec<MediaType>,
    /// Every renderer of the resource
    pub available: Vec<RendererInfo>,
}

impl NotAcceptable {
    /// Create a 406 answer.
    pub fn new(tried: Vec<MediaType>, available: Vec<RendererInfo>) -> Self {
        Self { tried, available }
    }

    /// The plain-text body.
    ///
    /// Lists the renderers that were not attempted: any renderer declaring
    /// one of the `tried` media types is left out.
    pub fn body(&self) -> String {
        let mut supported: Vec<String> = self
            .available
            .iter()
            .filter(|info| !self.was_tried(info))
            .map(RendererInfo::summary)
            .collect();
        supported.sort();

        format!(
            "Your Accept header didn't contain any supported media ranges.\n\n\
             Supported ranges are:\n\n * {}\n",
            supported.join("\n * ")
        )
    }

    fn was_tried(&self, info: &RendererInfo) -> bool {
        info.media_types
            .iter()
            .filter_map(|value| MediaType::parse(value).ok())
            .any(|media_type| self.tried.contains(&media_type))
    }
}

impl IntoResponse for NotAcceptable {
    fn into_response(self) -> Response {
        Response::builder()
            .status(StatusCode::NOT_ACCEPTABLE)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(self.body()))
            .unwrap_or_else(|_| StatusCode::NOT_ACCEPTABLE.into_response())
    }
}
