//! Axum integration: request-side negotiation state and the negotiation
//! layer.
//!
//! # Usage
//!
//! ```ignore
//! use axum::{middleware::from_fn, routing::get, Extension, Router};
//! use conneg_axum_http::ConnegLayer;
//!
//! let conneg = ConnegLayer::new();
//! let app = Router::new()
//!     .route("/article", get(handler))
//!     .layer(from_fn(conneg.middleware()));
//! ```
//!
//! # How It Works
//!
//! The middleware:
//! 1. Reads the `Accept` header and the format override query parameter
//! 2. Stores them as an `Arc<NegotiationState>` in the request extensions
//! 3. Stores the `ConnegLayer` itself, so handlers can render through it
//!
//! Handlers then call [`ConnegLayer::render`] with their view instance.

use super::alternates::RendererInfo;
use super::dispatch::{self, add_vary_accept, apply_headers, NotAcceptable};
use crate::config::NegotiationConfig;
use crate::error::{NegotiationError, Result};
use crate::negotiation::{resolve, Applicability, Preferences};
use crate::protocol::{
    format_accept_header, parse_accept_header, parse_format_override, sort_media_ranges,
};
use crate::renderer::{Negotiated, RegistryCache, RenderContext, Renderer, RendererRegistry};
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::request::Parts;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Negotiation inputs extracted from a request.
///
/// Extracted by the middleware, or on demand as an axum extractor.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::{NegotiationConfig, NegotiationState};
///
/// let request = http::Request::builder()
///     .uri("/article?format=json,html")
///     .header("accept", "text/html")
///     .body(())
///     .unwrap();
/// let (parts, _) = request.into_parts();
///
/// let state = NegotiationState::from_parts(&parts, &NegotiationConfig::default());
/// assert_eq!(state.accept.as_deref(), Some("text/html"));
/// assert_eq!(state.format_override, Some(vec!["json".to_string(), "html".to_string()]));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NegotiationState {
    /// `Accept` header; several header lines are joined with `, `
    pub accept: Option<String>,

    /// Format tags from the override parameter, or from a path segment
    pub format_override: Option<Vec<String>>,

    /// Raw query string, used to build per-format URLs
    pub query: Option<String>,
}

impl NegotiationState {
    /// Extract negotiation state from request parts.
    #[must_use]
    pub fn from_parts(parts: &Parts, config: &NegotiationConfig) -> Self {
        Self::from_head(&parts.headers, &parts.uri, config)
    }

    /// Extract negotiation state from request headers and URI.
    #[must_use]
    pub fn from_head(headers: &HeaderMap, uri: &Uri, config: &NegotiationConfig) -> Self {
        let accept: Vec<&str> = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        let accept = (!accept.is_empty()).then(|| accept.join(", "));

        let format_override = uri.query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .filter(|(key, _)| key == config.format_override_parameter.as_str())
                .map(|(_, value)| parse_format_override(&value))
                .filter(|formats| !formats.is_empty())
                .last()
        });

        NegotiationState {
            accept,
            format_override,
            query: uri.query().map(str::to_string),
        }
    }

    /// Force a single format, as captured from a path segment such as
    /// `/article.json`. Takes precedence over the query parameter.
    #[must_use]
    pub fn with_format_override(mut self, format: impl Into<String>) -> Self {
        self.format_override = Some(vec![format.into()]);
        self
    }

    /// Combine the request's inputs with the resource's default and
    /// fallback formats.
    pub fn preferences<V: Negotiated>(&self) -> Preferences {
        Preferences {
            formats: self.format_override.clone(),
            accept: self.accept.clone(),
            default_format: V::default_format().map(str::to_string),
            fallback_formats: V::fallback_formats().iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl<S> FromRequestParts<S> for NegotiationState
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(state) = parts.extensions.get::<Arc<NegotiationState>>() {
            return Ok(NegotiationState::clone(state));
        }
        let config = parts
            .extensions
            .get::<ConnegLayer>()
            .map(|layer| layer.config().clone())
            .unwrap_or_default();
        Ok(NegotiationState::from_parts(parts, &config))
    }
}

/// Content negotiation for a set of resources.
///
/// Holds the configuration and the registry cache. Cloning is cheap and
/// shares both.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::{ConnegLayer, Negotiated, RenderContext, Renderer};
/// use axum::response::IntoResponse;
/// use http::StatusCode;
///
/// struct Greeting;
///
/// impl Negotiated for Greeting {
///     fn renderers() -> Vec<Renderer<Self>> {
///         vec![Renderer::new("txt", |_: &Greeting, _, _, _| Some("hello".into_response()))
///             .with_media_types(["text/plain"])]
///     }
/// }
///
/// let conneg = ConnegLayer::new();
/// let (parts, _) = http::Request::builder()
///     .header("accept", "text/*")
///     .body(())
///     .unwrap()
///     .into_parts();
///
/// let response = conneg.render(&Greeting, &parts, RenderContext::new(), None);
/// assert_eq!(response.status(), StatusCode::OK);
///
/// let (parts, _) = http::Request::builder()
///     .header("accept", "application/json")
///     .body(())
///     .unwrap()
///     .into_parts();
/// let response = conneg.render(&Greeting, &parts, RenderContext::new(), None);
/// assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
/// ```
#[derive(Clone)]
pub struct ConnegLayer {
    config: Arc<NegotiationConfig>,
    cache: RegistryCache,
}

impl ConnegLayer {
    /// Create a layer with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(NegotiationConfig::default())
    }

    /// Create a layer with a custom configuration.
    ///
    /// The configuration's priority overrides apply to every registry this
    /// layer builds, except for resources declaring their own.
    #[must_use]
    pub fn with_config(config: NegotiationConfig) -> Self {
        Self {
            cache: RegistryCache::with_priority_overrides(config.priority_overrides.clone()),
            config: Arc::new(config),
        }
    }

    /// The configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// The registry cache.
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &RegistryCache {
        &self.cache
    }

    /// The registry of `V`, built on first use.
    pub fn registry<V: Negotiated>(&self) -> Arc<RendererRegistry<V>> {
        self.cache.get_or_build::<V>()
    }

    /// Negotiation state of a request: the one stored by the middleware if
    /// present, otherwise extracted now.
    pub fn state_for(&self, request: &Parts) -> NegotiationState {
        match request.extensions.get::<Arc<NegotiationState>>() {
            Some(state) => NegotiationState::clone(state),
            None => NegotiationState::from_parts(request, &self.config),
        }
    }

    /// Candidate renderers for `view`, in the order they should be tried.
    ///
    /// With `early` set the applicability tests are not consulted.
    pub fn renderers<V: Negotiated>(
        &self,
        state: &NegotiationState,
        view: &V,
        context: Option<&RenderContext>,
        target: Option<&str>,
        early: bool,
    ) -> Vec<Arc<Renderer<V>>> {
        let registry = self.registry::<V>();
        let applicability = Applicability {
            view,
            context,
            target,
        };
        resolve(&registry, &state.preferences::<V>(), Some(applicability), early)
    }

    /// Every renderer of `V`, described for templates and 406 pages.
    pub fn alternates<V: Negotiated>(&self, state: &NegotiationState) -> Vec<RendererInfo> {
        let registry = self.registry::<V>();
        registry
            .all()
            .iter()
            .map(|renderer| {
                RendererInfo::new(
                    renderer,
                    state.query.as_deref(),
                    &self.config.format_override_parameter,
                )
            })
            .collect()
    }

    /// Render `view` in the most preferred acceptable representation.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::NotAcceptable`] when no renderer produced a
    /// response.
    pub fn try_render<V: Negotiated>(
        &self,
        view: &V,
        request: &Parts,
        mut context: RenderContext,
        target: Option<&str>,
    ) -> Result<Response> {
        let state = self.state_for(request);
        self.add_renderer_details::<V>(&state, &mut context);

        let renderers = self.renderers(&state, view, Some(&context), target, false);
        dispatch::dispatch(&renderers, view, request, &context, target)
    }

    /// Render `view`, answering `406 Not Acceptable` when nothing fits.
    ///
    /// The 406 response still carries the context's headers and
    /// `Vary: Accept`.
    pub fn render<V: Negotiated>(
        &self,
        view: &V,
        request: &Parts,
        context: RenderContext,
        target: Option<&str>,
    ) -> Response {
        let extra_headers = context.headers.clone();
        match self.try_render(view, request, context, target) {
            Ok(response) => response,
            Err(e) => {
                let mut response = self.not_acceptable::<V>(request, e);
                apply_headers(response.headers_mut(), &extra_headers);
                add_vary_accept(response.headers_mut());
                response
            }
        }
    }

    /// Render `view` with the renderers of one format, ignoring client
    /// preferences.
    ///
    /// # Errors
    ///
    /// [`NegotiationError::UnknownFormat`] when `V` has no renderer for
    /// `format`; [`NegotiationError::NotAcceptable`] (with nothing tried)
    /// when all of them decline.
    pub fn try_render_to_format<V: Negotiated>(
        &self,
        view: &V,
        request: &Parts,
        mut context: RenderContext,
        target: Option<&str>,
        format: &str,
    ) -> Result<Response> {
        let registry = self.registry::<V>();
        if !registry.has_format(format) {
            return Err(NegotiationError::UnknownFormat(format.to_string()));
        }

        let state = self.state_for(request);
        self.add_renderer_details::<V>(&state, &mut context);

        for renderer in registry.for_format(format) {
            if let Some(mut response) = renderer.render(view, request, &context, target) {
                *response.status_mut() = context.status;
                apply_headers(response.headers_mut(), &context.headers);
                return Ok(response);
            }
        }
        Err(NegotiationError::NotAcceptable { tried: Vec::new() })
    }

    /// Render `view` in `format`, answering 406 when that fails.
    pub fn render_to_format<V: Negotiated>(
        &self,
        view: &V,
        request: &Parts,
        context: RenderContext,
        target: Option<&str>,
        format: &str,
    ) -> Response {
        self.try_render_to_format(view, request, context, target, format)
            .unwrap_or_else(|e| self.not_acceptable::<V>(request, e))
    }

    fn not_acceptable<V: Negotiated>(&self, request: &Parts, error: NegotiationError) -> Response {
        let tried = match error {
            NegotiationError::NotAcceptable { tried } => tried,
            other => {
                tracing::debug!("Answering 406: {}", other);
                Vec::new()
            }
        };
        let state = self.state_for(request);
        if let Some(accept) = state.accept.as_deref() {
            tracing::debug!("Answering 406 for Accept: {}", preferred_ranges(accept));
        }
        NotAcceptable::new(tried, self.alternates::<V>(&state)).into_response()
    }

    fn add_renderer_details<V: Negotiated>(&self, state: &NegotiationState, context: &mut RenderContext) {
        if !self.config.include_renderer_details {
            return;
        }
        match serde_json::to_value(self.alternates::<V>(state)) {
            Ok(value) => {
                context.data.insert("renderers".to_string(), value);
            }
            Err(e) => tracing::warn!("Failed to serialize renderer details: {}", e),
        }
    }

    /// Create the middleware function for use with
    /// `axum::middleware::from_fn`.
    ///
    /// Attaches an `Arc<NegotiationState>` and this layer to the request
    /// extensions.
    #[must_use]
    pub fn middleware(
        &self,
    ) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>>
           + Send
           + Sync
           + Clone {
        let layer = self.clone();

        move |mut req: Request, next: Next| {
            let layer = layer.clone();
            Box::pin(async move {
                let state = NegotiationState::from_head(req.headers(), req.uri(), layer.config());
                req.extensions_mut().insert(Arc::new(state));
                req.extensions_mut().insert(layer);
                next.run(req).await
            })
        }
    }
}

/// The ranges of an `Accept` header, most preferred first.
fn preferred_ranges(accept: &str) -> String {
    let mut ranges = parse_accept_header(accept);
    sort_media_ranges(&mut ranges);
    format_accept_header(&ranges)
}

impl Default for ConnegLayer {
    fn default() -> Self {
        Self::new()
    }
}
