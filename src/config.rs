//! Negotiation configuration.
//!
//! Process-level settings shared by every negotiated resource served through
//! one [`ConnegLayer`](crate::ConnegLayer). Settings that belong to a single
//! resource (default format, fallback formats, its own priority overrides)
//! live on [`Negotiated`](crate::Negotiated) instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Content negotiation settings.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::NegotiationConfig;
///
/// let config = NegotiationConfig {
///     format_override_parameter: "fmt".to_string(),
///     ..Default::default()
/// }
/// .with_priority("json", 10);
///
/// assert_eq!(config.priority_overrides["json"], 10);
/// assert!(config.include_renderer_details);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Query parameter carrying a comma-separated format override
    pub format_override_parameter: String,

    /// Format tag -> priority, replacing the priorities renderers declare.
    /// A resource's own overrides take precedence over these.
    pub priority_overrides: BTreeMap<String, i32>,

    /// Insert a `renderers` array describing every available renderer into
    /// the render context before dispatching
    pub include_renderer_details: bool,
}

impl NegotiationConfig {
    /// Override the priority of every renderer with the given format tag.
    #[must_use]
    pub fn with_priority(mut self, format: impl Into<String>, priority: i32) -> Self {
        self.priority_overrides.insert(format.into(), priority);
        self
    }
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            format_override_parameter: "format".to_string(),
            priority_overrides: BTreeMap::new(),
            include_renderer_details: true,
        }
    }
}
