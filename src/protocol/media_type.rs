//! Parsed internet media types and media ranges.
//!
//! A [`MediaType`] is either an entry of an `Accept` header or a content type a
//! renderer declares it can produce. Both share one representation so that
//! matching is a plain comparison of type triples.
//!
//! # Type triple
//!
//! | Input | type | subtype | subsubtype | specificity |
//! |-------|------|---------|------------|-------------|
//! | `*/*` | - | - | - | 0 |
//! | `text/*` | `text` | - | - | 1 |
//! | `text/html` | `text` | `html` | - | 2 |
//! | `application/xhtml+xml` | `application` | `xml` | `xhtml` | 3 |
//!
//! The structured suffix after `+` is stored as the subtype, so that
//! `application/xhtml+xml` truncated to two elements reads `application/xml`.
//!
//! # Examples
//!
//! ```
//! use conneg_axum_http::protocol::MediaType;
//!
//! let xhtml: MediaType = "application/xhtml+xml".parse().unwrap();
//! assert_eq!(xhtml.specificity(), 3);
//! assert!(xhtml.provides(&"application/xml".parse().unwrap()));
//! assert!(xhtml.provides(&"*/*".parse().unwrap()));
//!
//! let json = MediaType::parse("application/json; q=0.5").unwrap();
//! assert_eq!(json.quality(), 0.5);
//! ```

use crate::error::{NegotiationError, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

fn media_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:\*/\*|(?P<type>[^/]+)/(?:\*|(?:(?P<subsubtype>[^+]+)\+)?(?P<subtype>.+)))",
        )
        .expect("media type pattern is valid")
    })
}

/// One parsed media range.
///
/// Immutable after construction. Equality and hashing cover quality, the
/// type triple and the parameters; the original text and the priority tag
/// are carried along but ignored.
#[derive(Debug, Clone)]
pub struct MediaType {
    type_: Option<String>,
    subtype: Option<String>,
    subsubtype: Option<String>,
    quality: f64,
    params: BTreeMap<String, String>,
    specificity: usize,
    priority: i32,
    value: String,
}

impl MediaType {
    /// Parse a media range such as `text/html`, `application/*;q=0.8` or
    /// `application/xhtml+xml;level=1`.
    ///
    /// The `q` parameter becomes [`quality`](Self::quality) and is removed
    /// from the parameter map. A `q` that is not a finite number falls back
    /// to `1.0`; any other value is taken as given.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiationError::InvalidMediaType`] when the value does not
    /// match `*/*` or `type/(*|[subsubtype+]subtype)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use conneg_axum_http::protocol::MediaType;
    ///
    /// assert_eq!(MediaType::parse("*/*").unwrap().specificity(), 0);
    /// assert_eq!(MediaType::parse("text/html").unwrap().specificity(), 2);
    /// assert!(MediaType::parse("html").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let mut segments = value.split(';');
        let essence = segments.next().unwrap_or_default().trim();

        let mut params: BTreeMap<String, String> = segments
            .filter_map(|segment| segment.split_once('='))
            .map(|(key, val)| (key.trim().to_string(), val.trim().to_string()))
            .collect();

        let captures = media_type_regex()
            .captures(essence)
            .ok_or_else(|| NegotiationError::InvalidMediaType(essence.to_string()))?;
        let group = |name: &str| captures.name(name).map(|m| m.as_str().to_string());

        let type_ = group("type");
        let subtype = group("subtype");
        let subsubtype = group("subsubtype");

        let quality = params
            .remove("q")
            .and_then(|q| q.parse::<f64>().ok())
            .filter(|q| q.is_finite())
            // -0.0 and 0.0 must hash alike
            .map(|q| if q == 0.0 { 0.0 } else { q })
            .unwrap_or(1.0);

        let specificity = [&type_, &subtype, &subsubtype]
            .iter()
            .filter(|part| part.is_some())
            .count();

        Ok(MediaType {
            type_,
            subtype,
            subsubtype,
            quality,
            params,
            specificity,
            priority: 0,
            value: value.to_string(),
        })
    }

    /// Attach a priority tag. Used for tie-breaking by callers; it takes no
    /// part in equality or ordering.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Top-level type, `None` for `*/*`.
    pub fn type_(&self) -> Option<&str> {
        self.type_.as_deref()
    }

    /// Subtype, or the structured suffix when the subtype contains `+`.
    /// `None` for wildcards.
    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    /// The part of the subtype before `+`, if any.
    pub fn subsubtype(&self) -> Option<&str> {
        self.subsubtype.as_deref()
    }

    /// Quality from the `q` parameter (default `1.0`).
    pub fn quality(&self) -> f64 {
        self.quality
    }

    /// Parameters other than `q`.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Number of non-wildcard elements in the type triple.
    pub fn specificity(&self) -> usize {
        self.specificity
    }

    /// The priority tag.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// The trimmed text this media type was parsed from.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    fn triple(&self) -> [Option<&str>; 3] {
        [self.type_(), self.subtype(), self.subsubtype()]
    }

    /// Three-way preference comparison.
    ///
    /// Higher quality wins; on equal quality, higher specificity wins. On a
    /// tie in both, `self` wins only if it repeats every parameter of `other`
    /// with the same value and has strictly more parameters (and vice versa).
    /// Anything else is `Equal` at this tier.
    ///
    /// # Examples
    ///
    /// ```
    /// use conneg_axum_http::protocol::MediaType;
    /// use std::cmp::Ordering;
    ///
    /// let html = MediaType::parse("text/html").unwrap();
    /// let any = MediaType::parse("*/*").unwrap();
    /// let level = MediaType::parse("text/html;level=1").unwrap();
    ///
    /// assert_eq!(html.compare(&any), Ordering::Greater);
    /// assert_eq!(html.compare(&level), Ordering::Less);
    /// ```
    pub fn compare(&self, other: &MediaType) -> Ordering {
        if self.quality != other.quality {
            return self.quality.total_cmp(&other.quality);
        }
        if self.specificity != other.specificity {
            return self.specificity.cmp(&other.specificity);
        }
        if self.dominates_params(other) {
            Ordering::Greater
        } else if other.dominates_params(self) {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }

    fn dominates_params(&self, other: &MediaType) -> bool {
        other
            .params
            .iter()
            .all(|(key, val)| self.params.get(key) == Some(val))
            && self.params.len() > other.params.len()
    }

    /// Whether neither media type is preferred over the other.
    ///
    /// Looser than `==`: `text/html` and `application/json` are equivalent.
    pub fn equivalent(&self, other: &MediaType) -> bool {
        self.compare(other) == Ordering::Equal
    }

    /// Whether content of type `self` satisfies the range `other`.
    ///
    /// `self`'s triple, truncated to `other`'s specificity, must equal
    /// `other`'s triple.
    ///
    /// # Examples
    ///
    /// ```
    /// use conneg_axum_http::protocol::MediaType;
    ///
    /// let html = MediaType::parse("text/html").unwrap();
    /// assert!(html.provides(&MediaType::parse("text/*").unwrap()));
    /// assert!(!html.provides(&MediaType::parse("application/xhtml+xml").unwrap()));
    /// ```
    pub fn provides(&self, other: &MediaType) -> bool {
        let n = other.specificity;
        self.triple()[..n] == other.triple()[..n]
    }
}

impl PartialEq for MediaType {
    fn eq(&self, other: &Self) -> bool {
        self.quality == other.quality
            && self.triple() == other.triple()
            && self.params == other.params
    }
}

// quality is always finite, so equality is reflexive
impl Eq for MediaType {}

impl Hash for MediaType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.quality.to_bits().hash(state);
        self.triple().hash(state);
        self.params.hash(state);
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for MediaType {
    type Err = NegotiationError;

    fn from_str(s: &str) -> Result<Self> {
        MediaType::parse(s)
    }
}

impl TryFrom<&str> for MediaType {
    type Error = NegotiationError;

    fn try_from(value: &str) -> Result<Self> {
        MediaType::parse(value)
    }
}
