//! Resolution of client preferences against a renderer registry.
//!
//! [`resolve`] merges the four signals a request can carry into one ordered
//! candidate list:
//!
//! 1. **Format override** (`?format=json,html`): every renderer of each named
//!    format, in the order given. Unknown tags are skipped.
//! 2. **Accept header**, when there is no override: ranges are sorted by
//!    preference and grouped into equivalence groups; each group selects the
//!    not-yet-selected renderers producing a media type within it.
//! 3. **Default format**, when the request carries neither of the above.
//! 4. **Fallback formats**, always appended, skipping renderers already
//!    present.
//!
//! Finally, unless resolving early, renderers whose applicability test
//! rejects the view, context and target are dropped.
//!
//! Resolution is pure: it reads an immutable registry and never fails. An
//! empty list means nothing is acceptable.

use crate::protocol::{group_media_ranges, parse_accept_header, sort_media_ranges};
use crate::renderer::{RenderContext, Renderer, RendererRegistry};
use std::cmp::Reverse;
use std::sync::Arc;

/// What the client and the resource ask for.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::Preferences;
///
/// let prefs = Preferences::new()
///     .with_accept("text/html, application/json;q=0.9")
///     .with_default_format("html")
///     .with_fallback_formats(["txt"]);
/// assert!(prefs.formats.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    /// Explicit format override, highest precedence
    pub formats: Option<Vec<String>>,

    /// Raw `Accept` header value. An empty string counts as absent; a
    /// blank one does not.
    pub accept: Option<String>,

    /// Format used when neither override nor Accept header is present
    pub default_format: Option<String>,

    /// Formats appended to every result
    pub fallback_formats: Vec<String>,
}

impl Preferences {
    /// No preferences at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the format override.
    #[must_use]
    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    /// Set the raw Accept header.
    #[must_use]
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Set the default format.
    #[must_use]
    pub fn with_default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = Some(format.into());
        self
    }

    /// Set the fallback formats.
    #[must_use]
    pub fn with_fallback_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    fn override_formats(&self) -> Option<&[String]> {
        self.formats.as_deref().filter(|formats| !formats.is_empty())
    }

    // Only an empty value counts as absent. A blank but non-empty header is
    // a preference that matches nothing, so the default format is skipped.
    fn accept_header(&self) -> Option<&str> {
        self.accept.as_deref().filter(|accept| !accept.is_empty())
    }
}

/// Inputs of the applicability filter.
///
/// The filter only runs when both `context` and `target` are present.
#[derive(Debug)]
pub struct Applicability<'a, V> {
    /// The instance the renderers operate on
    pub view: &'a V,
    /// Render context
    pub context: Option<&'a RenderContext>,
    /// Render target (e.g. a template base name)
    pub target: Option<&'a str>,
}

impl<V> Clone for Applicability<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Applicability<'_, V> {}

/// Order the renderers of `registry` by preference.
///
/// With `early` set, or without an [`Applicability`], the applicability
/// filter is skipped; this is how candidate lists are computed before a
/// render context exists (for instance to advertise alternate formats).
///
/// # Examples
///
/// ```
/// use conneg_axum_http::{resolve, Preferences, Renderer, RendererRegistry};
///
/// struct View;
///
/// let registry = RendererRegistry::build(vec![
///     Renderer::new("html", |_: &View, _, _, _| None).with_media_types(["text/html"]),
///     Renderer::new("json", |_: &View, _, _, _| None).with_media_types(["application/json"]),
/// ]);
///
/// let prefs = Preferences::new().with_accept("application/json, text/html;q=0.5");
/// let renderers = resolve(&registry, &prefs, None, false);
/// let formats: Vec<&str> = renderers.iter().map(|r| r.format()).collect();
/// assert_eq!(formats, vec!["json", "html"]);
///
/// let nothing = resolve(&registry, &Preferences::new(), None, false);
/// assert!(nothing.is_empty());
/// ```
pub fn resolve<V>(
    registry: &RendererRegistry<V>,
    prefs: &Preferences,
    applicability: Option<Applicability<'_, V>>,
    early: bool,
) -> Vec<Arc<Renderer<V>>> {
    let mut renderers = if let Some(formats) = prefs.override_formats() {
        resolve_formats(registry, formats)
    } else if let Some(accept) = prefs.accept_header() {
        resolve_accept(registry, accept)
    } else if let Some(format) = prefs.default_format.as_deref() {
        registry.for_format(format).to_vec()
    } else {
        Vec::new()
    };

    for format in &prefs.fallback_formats {
        for renderer in registry.for_format(format) {
            if !renderers.iter().any(|r| Arc::ptr_eq(r, renderer)) {
                renderers.push(Arc::clone(renderer));
            }
        }
    }

    if !early {
        if let Some(Applicability {
            view,
            context: Some(context),
            target: Some(target),
        }) = applicability
        {
            renderers.retain(|renderer| renderer.is_applicable(view, context, target));
        }
    }

    tracing::debug!(
        "Resolved {} renderer(s): [{}]",
        renderers.len(),
        renderers
            .iter()
            .map(|r| r.format())
            .collect::<Vec<_>>()
            .join(", ")
    );

    renderers
}

fn resolve_formats<V>(registry: &RendererRegistry<V>, formats: &[String]) -> Vec<Arc<Renderer<V>>> {
    let mut renderers = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    for format in formats {
        if seen.contains(&format.as_str()) {
            continue;
        }
        seen.push(format);
        renderers.extend(registry.for_format(format).iter().cloned());
    }

    renderers
}

/// Accept-header resolution.
///
/// Within one equivalence group, candidates are ordered by priority, then by
/// the position of the first range of the group they satisfy (the header's
/// left-to-right order), then by declaration order.
fn resolve_accept<V>(registry: &RendererRegistry<V>, accept: &str) -> Vec<Arc<Renderer<V>>> {
    let mut ranges = parse_accept_header(accept);
    sort_media_ranges(&mut ranges);

    let all = registry.all();
    let mut selected = vec![false; all.len()];
    let mut renderers = Vec::new();

    for group in group_media_ranges(&ranges) {
        let mut matches: Vec<(usize, usize)> = all
            .iter()
            .enumerate()
            .filter(|(index, _)| !selected[*index])
            .filter_map(|(index, renderer)| {
                group
                    .iter()
                    .position(|range| renderer.provides(range))
                    .map(|position| (index, position))
            })
            .collect();

        // `all` is already priority-descending with ties in declaration order
        matches.sort_by_key(|&(index, position)| (Reverse(all[index].priority()), position));

        for (index, _) in matches {
            selected[index] = true;
            renderers.push(Arc::clone(&all[index]));
        }
    }

    renderers
}
