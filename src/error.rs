//! Error types for content negotiation.
//!
//! Negotiation itself never fails: an empty candidate list is the only
//! "nothing acceptable" signal the resolver produces. Errors appear at the
//! edges, when a media range cannot be parsed or when the dispatcher runs out
//! of renderers and has to report what it tried.

use crate::protocol::MediaType;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NegotiationError>;

/// Errors raised at the boundaries of content negotiation.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// A value did not match `type/subtype[+suffix]` or `*/*`.
    #[error("Not a correctly formatted internet media type: {0:?}")]
    InvalidMediaType(String),

    /// Every candidate renderer declined, or there were none.
    ///
    /// `tried` is the union of the media types of the renderers that were
    /// attempted, in the order they were attempted.
    #[error("No acceptable renderer (tried {} media types)", tried.len())]
    NotAcceptable {
        /// Media types of the attempted renderers
        tried: Vec<MediaType>,
    },

    /// A format tag that no renderer of the resource declares.
    #[error("Unknown format: {0}")]
    UnknownFormat(String),
}

impl NegotiationError {
    /// Whether this error should surface as `406 Not Acceptable`.
    pub fn is_not_acceptable(&self) -> bool {
        matches!(
            self,
            NegotiationError::NotAcceptable { .. } | NegotiationError::UnknownFormat(_)
        )
    }
}
