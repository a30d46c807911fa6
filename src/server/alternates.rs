//! Descriptions of available renderers, for templates and 406 pages.

use crate::renderer::Renderer;
use serde::Serialize;
use url::form_urlencoded;

/// A renderer as shown to clients: what it is called, what it produces and
/// the URL that selects it explicitly.
///
/// Serialized into the render context under `renderers` so templates can
/// offer "also available as" links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RendererInfo {
    /// Display name
    pub name: String,
    /// Priority after overrides
    pub priority: i32,
    /// Declared media types as written
    pub media_types: Vec<String>,
    /// Format tag
    pub format: String,
    /// Relative URL (query string only) selecting this format
    pub url: String,
}

impl RendererInfo {
    /// Describe `renderer`, deriving its URL from the current query string.
    pub fn new<V>(renderer: &Renderer<V>, query: Option<&str>, parameter: &str) -> Self {
        Self {
            name: renderer.name().to_string(),
            priority: renderer.priority(),
            media_types: renderer
                .media_types()
                .iter()
                .map(|mt| mt.to_string())
                .collect(),
            format: renderer.format().to_string(),
            url: url_for_format(query, parameter, renderer.format()),
        }
    }

    /// One-line summary: `name (type, type; format)`.
    pub fn summary(&self) -> String {
        format!(
            "{} ({}; {})",
            self.name,
            self.media_types.join(", "),
            self.format
        )
    }
}

/// Rewrite a query string so that `parameter` selects `format`.
///
/// Other parameters are kept in order. The first occurrence of `parameter`
/// is replaced in place, later ones are dropped; without one, it is
/// appended.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::server::url_for_format;
///
/// assert_eq!(url_for_format(Some("page=2&format=html"), "format", "json"), "?page=2&format=json");
/// assert_eq!(url_for_format(None, "format", "json"), "?format=json");
/// ```
pub fn url_for_format(query: Option<&str>, parameter: &str, format: &str) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut replaced = false;

    for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        if key == parameter {
            if !replaced {
                serializer.append_pair(parameter, format);
                replaced = true;
            }
        } else {
            serializer.append_pair(&key, &value);
        }
    }

    if !replaced {
        serializer.append_pair(parameter, format);
    }

    format!("?{}", serializer.finish())
}
