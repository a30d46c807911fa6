#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! Resolution is a pure function over an immutable, per-type cached
//! registry. An empty result is the only "nothing acceptable" signal; the
//! dispatcher turns it into `406 Not Acceptable`.
//!
//! ## Declaring renderers
//!
//! ```
//! use axum::response::IntoResponse;
//! use conneg_axum_http::{Negotiated, Renderer};
//!
//! struct Article {
//!     title: String,
//! }
//!
//! impl Negotiated for Article {
//!     fn renderers() -> Vec<Renderer<Self>> {
//!         vec![
//!             Renderer::new("html", |a: &Article, _, _, _| {
//!                 Some(format!("<h1>{}</h1>", a.title).into_response())
//!             })
//!             .with_media_types(["text/html", "application/xhtml+xml"])
//!             .with_priority(1)
//!             .with_name("HTML"),
//!             Renderer::new("txt", |a: &Article, _, _, _| Some(a.title.clone().into_response()))
//!                 .with_media_types(["text/plain"])
//!                 .with_name("Plain text"),
//!         ]
//!     }
//!
//!     fn default_format() -> Option<&'static str> {
//!         Some("html")
//!     }
//! }
//! ```
//!
//! ## Server Usage
//!
//! ```ignore
//! use axum::{extract::Request, middleware::from_fn, response::Response, routing::get, Extension, Router};
//! use conneg_axum_http::{ConnegLayer, RenderContext};
//!
//! async fn article(Extension(conneg): Extension<ConnegLayer>, request: Request) -> Response {
//!     let (parts, _) = request.into_parts();
//!     let article = Article { title: "Hello".into() };
//!     conneg.render(&article, &parts, RenderContext::new(), Some("article"))
//! }
//!
//! let conneg = ConnegLayer::new();
//! let app = Router::new()
//!     .route("/article", get(article))
//!     .layer(from_fn(conneg.middleware()));
//! ```
//!
//! ## Module Structure
//!
//! - **[protocol]** - Media types, Accept header parsing and ordering
//! - **[renderer]** - Renderer descriptors, registries and the registry cache
//! - **[negotiation]** - The resolution algorithm
//! - **[server]** - Axum middleware, extractor and dispatcher
//! - **[config]** - Negotiation settings
//! - **[error]** - Error types and result handling

pub mod config;
pub mod error;
pub mod negotiation;
pub mod protocol;
pub mod renderer;
pub mod server;

pub use config::NegotiationConfig;
pub use error::{NegotiationError, Result};
pub use negotiation::{resolve, Applicability, Preferences};
pub use protocol::{parse_accept_header, MediaType};
pub use renderer::{Negotiated, RegistryCache, RenderContext, Renderer, RendererRegistry};
pub use server::{ConnegLayer, NegotiationState, NotAcceptable, RendererInfo};

#[cfg(test)]
mod tests;
