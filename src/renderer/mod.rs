//! Renderer descriptors, registries and the per-type registry cache.
//!
//! A [`Renderer`] is one representation a resource can produce: a format tag
//! such as `"html"`, the media types it emits, a priority, and the function
//! that turns a request into a response. Renderers are declared statically
//! per resource type through [`Negotiated::renderers`], collected into a
//! [`RendererRegistry`], and cached per type by [`RegistryCache`].
//!
//! # Examples
//!
//! ```
//! use conneg_axum_http::{Renderer, RendererRegistry};
//! use axum::response::IntoResponse;
//!
//! struct Page;
//!
//! let html = Renderer::new("html", |_: &Page, _, _, _| Some("<p>hi</p>".into_response()))
//!     .with_media_types(["text/html", "application/xhtml+xml"])
//!     .with_priority(1)
//!     .with_name("HTML");
//! let json = Renderer::new("json", |_: &Page, _, _, _| Some("{}".into_response()))
//!     .with_media_types(["application/json"]);
//!
//! let registry = RendererRegistry::build(vec![json, html]);
//! assert_eq!(registry.all()[0].format(), "html");
//! ```

mod cache;
mod registry;

pub use cache::{Negotiated, RegistryCache};
pub use registry::RendererRegistry;

use crate::protocol::MediaType;
use axum::response::Response;
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Render operation: `(view, request, context, target)` to a response, or
/// `None` when this renderer cannot handle the request after all.
pub type RenderFn<V> =
    Arc<dyn Fn(&V, &Parts, &RenderContext, Option<&str>) -> Option<Response> + Send + Sync>;

/// Applicability test: `(view, context, target)`.
pub type TestFn<V> = Arc<dyn Fn(&V, &RenderContext, &str) -> bool + Send + Sync>;

/// Data handed to renderers, plus the status and extra headers the
/// dispatcher applies to whichever response wins.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Template or serialization data
    pub data: Map<String, Value>,

    /// Status code of the final response
    pub status: StatusCode,

    /// Headers copied onto the final response
    pub headers: HeaderMap,
}

impl RenderContext {
    /// Empty context with status `200 OK`.
    pub fn new() -> Self {
        Self {
            data: Map::new(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }

    /// Insert a data entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Set the response status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a response header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Look up a data entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// One representation a resource of type `V` can produce.
///
/// Immutable once it is part of a [`RendererRegistry`]. The view instance is
/// passed explicitly to both the applicability test and the render
/// operation.
pub struct Renderer<V> {
    format: String,
    media_types: Vec<MediaType>,
    priority: i32,
    name: String,
    test: Option<TestFn<V>>,
    render: RenderFn<V>,
}

impl<V> Renderer<V> {
    /// Create a renderer for `format` with priority 0, no media types and
    /// the format tag as display name.
    ///
    /// A renderer declared without media types inherits those of the
    /// previous renderer with the same format tag when the registry is
    /// built.
    pub fn new<F>(format: impl Into<String>, render: F) -> Self
    where
        F: Fn(&V, &Parts, &RenderContext, Option<&str>) -> Option<Response> + Send + Sync + 'static,
    {
        let format = format.into();
        Self {
            name: format.clone(),
            format,
            media_types: Vec::new(),
            priority: 0,
            test: None,
            render: Arc::new(render),
        }
    }

    /// Declare the media types this renderer produces.
    ///
    /// Values that fail to parse are skipped with a warning.
    #[must_use]
    pub fn with_media_types<I, S>(mut self, media_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for value in media_types {
            match MediaType::parse(value.as_ref()) {
                Ok(media_type) => self.media_types.push(media_type),
                Err(e) => tracing::warn!("Renderer {:?}: {}", self.format, e),
            }
        }
        self
    }

    /// Declare one already parsed media type.
    #[must_use]
    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_types.push(media_type);
        self
    }

    /// Set the priority; higher is preferred.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the applicability test consulted before dispatch.
    #[must_use]
    pub fn with_test<F>(mut self, test: F) -> Self
    where
        F: Fn(&V, &RenderContext, &str) -> bool + Send + Sync + 'static,
    {
        self.test = Some(Arc::new(test));
        self
    }

    /// Format tag.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Media types produced.
    pub fn media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    /// Priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether any produced media type satisfies `range`.
    pub fn provides(&self, range: &MediaType) -> bool {
        self.media_types.iter().any(|mt| mt.provides(range))
    }

    /// Run the applicability test; `true` when none is set.
    pub fn is_applicable(&self, view: &V, context: &RenderContext, target: &str) -> bool {
        self.test
            .as_ref()
            .map_or(true, |test| test(view, context, target))
    }

    /// Run the render operation.
    pub fn render(
        &self,
        view: &V,
        request: &Parts,
        context: &RenderContext,
        target: Option<&str>,
    ) -> Option<Response> {
        (self.render)(view, request, context, target)
    }
}

impl<V> Clone for Renderer<V> {
    fn clone(&self) -> Self {
        Self {
            format: self.format.clone(),
            media_types: self.media_types.clone(),
            priority: self.priority,
            name: self.name.clone(),
            test: self.test.clone(),
            render: Arc::clone(&self.render),
        }
    }
}

impl<V> fmt::Debug for Renderer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("format", &self.format)
            .field("media_types", &self.media_types)
            .field("priority", &self.priority)
            .field("name", &self.name)
            .field("has_test", &self.test.is_some())
            .finish()
    }
}
