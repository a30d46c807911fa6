//! Parsing and formatting of negotiation-related header values.
//!
//! # Header Formats
//!
//! | Input | Format | Example |
//! |-------|--------|---------|
//! | Accept | Comma-separated media ranges | `text/html, application/json;q=0.9` |
//! | Format override | Comma-separated format tags | `json,html` |
//!
//! # Examples
//!
//! ```
//! use conneg_axum_http::protocol::{
//!     parse_accept_header, sort_media_ranges, group_media_ranges,
//!     parse_format_override,
//! };
//!
//! let mut ranges = parse_accept_header("text/*;q=0.5, text/html, application/json");
//! sort_media_ranges(&mut ranges);
//! let groups = group_media_ranges(&ranges);
//! assert_eq!(groups.len(), 2);
//! assert_eq!(groups[0].len(), 2);
//!
//! let formats = parse_format_override("json, html");
//! assert_eq!(formats, vec!["json", "html"]);
//! ```

use super::MediaType;
use std::cmp::Ordering;

/// Parse an `Accept` header value into media ranges.
///
/// Entries that fail to parse are dropped; the rest keep their header order.
/// An empty header gives an empty list.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::protocol::parse_accept_header;
///
/// let ranges = parse_accept_header("text/html, nonsense, */*;q=0.1");
/// assert_eq!(ranges.len(), 2);
/// assert_eq!(ranges[1].quality(), 0.1);
/// ```
pub fn parse_accept_header(value: &str) -> Vec<MediaType> {
    value
        .split(',')
        .filter_map(|part| match MediaType::parse(part) {
            Ok(media_type) => Some(media_type),
            Err(e) => {
                tracing::trace!("Dropping Accept entry: {}", e);
                None
            }
        })
        .collect()
}

/// Format media ranges back into an `Accept`-style value.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::protocol::{format_accept_header, parse_accept_header};
///
/// let ranges = parse_accept_header("text/html,application/json;q=0.5");
/// assert_eq!(format_accept_header(&ranges), "text/html, application/json;q=0.5");
/// ```
pub fn format_accept_header(ranges: &[MediaType]) -> String {
    ranges
        .iter()
        .map(MediaType::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sort media ranges from most to least preferred.
///
/// Stable: ranges that compare equal keep their relative order, so ties
/// preserve the header's left-to-right order. [`MediaType::compare`] is only
/// a partial order on parameters, hence insertion sort rather than
/// `sort_by`; Accept headers are short.
pub fn sort_media_ranges(ranges: &mut [MediaType]) {
    for i in 1..ranges.len() {
        let mut j = i;
        while j > 0 && ranges[j].compare(&ranges[j - 1]) == Ordering::Greater {
            ranges.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// Partition sorted media ranges into equivalence groups.
///
/// Each group is a maximal run of adjacent ranges [`equivalent`] to the
/// run's first member. Relative order inside a group is kept.
///
/// [`equivalent`]: MediaType::equivalent
pub fn group_media_ranges(sorted: &[MediaType]) -> Vec<Vec<MediaType>> {
    let mut groups: Vec<Vec<MediaType>> = Vec::new();

    for range in sorted {
        match groups.last_mut() {
            Some(group) if group[0].equivalent(range) => group.push(range.clone()),
            _ => groups.push(vec![range.clone()]),
        }
    }

    groups
}

/// Parse a format override value (comma-separated format tags).
///
/// Tags are trimmed and empty entries dropped.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::protocol::parse_format_override;
///
/// assert_eq!(parse_format_override("json"), vec!["json"]);
/// assert_eq!(parse_format_override(" json ,,html"), vec!["json", "html"]);
/// assert!(parse_format_override("").is_empty());
/// ```
pub fn parse_format_override(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
