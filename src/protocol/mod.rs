//! Media types and header values used by content negotiation.
//!
//! - [`MediaType`] parses and orders a single media range
//! - [`parse_accept_header`] and friends handle whole header values

mod headers;
mod media_type;

pub use headers::{
    format_accept_header, group_media_ranges, parse_accept_header, parse_format_override,
    sort_media_ranges,
};
pub use media_type::MediaType;
