//! The renderer registry of one resource type.
//!
//! Built once from the resource's declared renderers and read-only
//! afterwards. Three indices are kept:
//!
//! | Index | Order | Used for |
//! |-------|-------|----------|
//! | `all` | priority descending, ties in declaration order | Accept-header resolution |
//! | `by_format` | declaration order | format overrides, defaults, fallbacks |
//! | `by_media_type` | priority descending | lookups by exact media type |

use super::Renderer;
use crate::protocol::MediaType;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Indexed, priority-sorted renderers of one resource type.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::{Renderer, RendererRegistry};
///
/// struct View;
///
/// let registry = RendererRegistry::build(vec![
///     Renderer::new("json", |_: &View, _, _, _| None).with_media_types(["application/json"]),
///     // JSONP variant: no media types, inherits application/json
///     Renderer::new("json", |_: &View, _, _, _| None).with_priority(-1),
/// ]);
///
/// assert_eq!(registry.for_format("json").len(), 2);
/// assert_eq!(registry.for_format("json")[1].media_types().len(), 1);
/// ```
pub struct RendererRegistry<V> {
    all: Vec<Arc<Renderer<V>>>,
    by_format: HashMap<String, Vec<Arc<Renderer<V>>>>,
    by_media_type: HashMap<MediaType, Vec<Arc<Renderer<V>>>>,
}

impl<V> RendererRegistry<V> {
    /// Build a registry from renderers in declaration order.
    pub fn build(renderers: Vec<Renderer<V>>) -> Self {
        Self::build_with_overrides(renderers, &BTreeMap::new())
    }

    /// Build a registry, replacing the priority of every renderer whose
    /// format tag appears in `overrides`.
    ///
    /// A renderer without media types takes those of the most recent
    /// renderer already seen with the same format tag.
    pub fn build_with_overrides(
        renderers: Vec<Renderer<V>>,
        overrides: &BTreeMap<String, i32>,
    ) -> Self {
        let mut all: Vec<Arc<Renderer<V>>> = Vec::with_capacity(renderers.len());
        let mut by_format: HashMap<String, Vec<Arc<Renderer<V>>>> = HashMap::new();

        for mut renderer in renderers {
            if renderer.media_types.is_empty() {
                if let Some(previous) = by_format
                    .get(&renderer.format)
                    .and_then(|bucket| bucket.last())
                {
                    renderer.media_types = previous.media_types.clone();
                }
            }

            if let Some(&priority) = overrides.get(&renderer.format) {
                renderer.priority = priority;
            }
            let priority = renderer.priority;
            for media_type in &mut renderer.media_types {
                *media_type = media_type.clone().with_priority(priority);
            }

            let renderer = Arc::new(renderer);
            by_format
                .entry(renderer.format.clone())
                .or_default()
                .push(Arc::clone(&renderer));
            all.push(renderer);
        }

        // stable: declaration order breaks ties
        all.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut by_media_type: HashMap<MediaType, Vec<Arc<Renderer<V>>>> = HashMap::new();
        for renderer in &all {
            for media_type in &renderer.media_types {
                by_media_type
                    .entry(media_type.clone())
                    .or_default()
                    .push(Arc::clone(renderer));
            }
        }

        tracing::debug!(
            "Built renderer registry: {} renderers, {} formats",
            all.len(),
            by_format.len()
        );

        Self {
            all,
            by_format,
            by_media_type,
        }
    }

    /// Combine two registries: every renderer of `self`, then every renderer
    /// of `other`, rebuilt into a new registry.
    #[must_use]
    pub fn merge(&self, other: &RendererRegistry<V>) -> RendererRegistry<V> {
        let renderers = self
            .all
            .iter()
            .chain(other.all.iter())
            .map(|renderer| Renderer::clone(renderer))
            .collect();
        Self::build(renderers)
    }

    /// All renderers, highest priority first.
    pub fn all(&self) -> &[Arc<Renderer<V>>] {
        &self.all
    }

    /// Renderers with the given format tag, in declaration order. Empty for
    /// an unknown tag.
    pub fn for_format(&self, format: &str) -> &[Arc<Renderer<V>>] {
        self.by_format.get(format).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Renderers declaring exactly this media type, highest priority first.
    pub fn for_media_type(&self, media_type: &MediaType) -> &[Arc<Renderer<V>>] {
        self.by_media_type.get(media_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any renderer has the given format tag.
    pub fn has_format(&self, format: &str) -> bool {
        self.by_format.contains_key(format)
    }

    /// Known format tags, sorted.
    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.by_format.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }

    /// Number of renderers.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Whether the registry has no renderers.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

impl<V> fmt::Debug for RendererRegistry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("all", &self.all)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct View;

    fn renderer(format: &str, media_types: &[&str], priority: i32) -> Renderer<View> {
        Renderer::new(format, |_: &View, _, _, _| None)
            .with_media_types(media_types)
            .with_priority(priority)
    }

    fn formats(renderers: &[Arc<Renderer<View>>]) -> Vec<&str> {
        renderers.iter().map(|r| r.format()).collect()
    }

    #[test]
    fn test_priority_sorting() {
        let registry = RendererRegistry::build(vec![
            renderer("a", &["text/a"], 1),
            renderer("b", &["text/b"], 3),
            renderer("c", &["text/c"], 2),
        ]);
        assert_eq!(formats(registry.all()), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let registry = RendererRegistry::build(vec![
            renderer("x", &["text/x"], 0),
            renderer("y", &["text/y"], 1),
            renderer("z", &["text/z"], 0),
        ]);
        assert_eq!(formats(registry.all()), vec!["y", "x", "z"]);
    }

    #[test]
    fn test_by_format_keeps_declaration_order() {
        let registry = RendererRegistry::build(vec![
            renderer("json", &["application/json"], 0).with_name("JSON"),
            renderer("json", &["application/json"], 5).with_name("JSONP"),
        ]);
        let names: Vec<&str> = registry.for_format("json").iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["JSON", "JSONP"]);
        assert_eq!(registry.all()[0].name(), "JSONP");
    }

    #[test]
    fn test_inherits_media_types() {
        let registry = RendererRegistry::build(vec![
            renderer("html", &["text/html"], 0),
            renderer("html", &["application/xhtml+xml"], 0),
            renderer("html", &[], 0),
            renderer("csv", &[], 0),
        ]);
        let html = registry.for_format("html");
        assert_eq!(html[2].media_types()[0].as_str(), "application/xhtml+xml");
        assert!(registry.for_format("csv")[0].media_types().is_empty());
    }

    #[test]
    fn test_by_media_type() {
        let registry = RendererRegistry::build(vec![
            renderer("json", &["application/json"], 0),
            renderer("js", &["application/javascript", "application/json"], 2),
        ]);
        let json = MediaType::parse("application/json").unwrap();
        assert_eq!(formats(registry.for_media_type(&json)), vec!["js", "json"]);
        assert!(registry
            .for_media_type(&MediaType::parse("text/html").unwrap())
            .is_empty());
    }

    #[test]
    fn test_priority_overrides() {
        let overrides = BTreeMap::from([("html".to_string(), 10)]);
        let registry = RendererRegistry::build_with_overrides(
            vec![
                renderer("json", &["application/json"], 5),
                renderer("html", &["text/html"], 0),
            ],
            &overrides,
        );
        assert_eq!(formats(registry.all()), vec!["html", "json"]);
        assert_eq!(registry.all()[0].priority(), 10);
        assert_eq!(registry.all()[0].media_types()[0].priority(), 10);
    }

    #[test]
    fn test_merge() {
        let first = RendererRegistry::build(vec![renderer("html", &["text/html"], 1)]);
        let second = RendererRegistry::build(vec![
            renderer("json", &["application/json"], 2),
            renderer("html", &["application/xhtml+xml"], 0),
        ]);
        let merged = first.merge(&second);

        assert_eq!(merged.len(), 3);
        assert_eq!(formats(merged.all()), vec!["json", "html", "html"]);
        assert_eq!(merged.for_format("html").len(), 2);
        assert_eq!(merged.formats(), vec!["html", "json"]);
    }

    #[test]
    fn test_unknown_format_and_empty() {
        let registry: RendererRegistry<View> = RendererRegistry::build(Vec::new());
        assert!(registry.is_empty());
        assert!(registry.for_format("html").is_empty());
        assert!(!registry.has_format("html"));
    }
}
