//! Axum server integration.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnegLayer`] | Configuration + registry cache; renders negotiated views |
//! | [`NegotiationState`] | Accept header and format override of one request |
//! | [`NotAcceptable`] | `406` response listing the available representations |
//! | [`RendererInfo`] | Serializable description of a renderer |

mod alternates;
mod dispatch;
mod middleware;

pub use alternates::{url_for_format, RendererInfo};
pub use dispatch::{add_vary_accept, apply_headers, dispatch, NotAcceptable};
pub use middleware::{ConnegLayer, NegotiationState};
