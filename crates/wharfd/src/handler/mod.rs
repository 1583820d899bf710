//! HTTP handler chain.
//!
//! Requests are routed to the deployed context with the longest matching
//! path prefix. Requests no context claims fall through to a diagnostic
//! handler that lists the deployed contexts on `GET /` and answers every
//! other request with 404. The chain is exposed to connectors as an axum
//! [`axum::Router`] whose fallback service does the routing.

use std::sync::Arc;

mod chain;
mod context;
mod fallback;
mod registry;

pub(crate) use self::chain::HandlerChain;
pub use self::context::{ContextSettings, WebContext};
pub(crate) use self::fallback::LocalEndpoint;
pub use self::registry::ContextRegistry;

pub(crate) const HTTP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::http");

/// Builds the handler chain around `registry`; requests no context claims
/// fall through to the diagnostic handler.
pub(crate) fn build_handler_chain(registry: &Arc<ContextRegistry>) -> Arc<HandlerChain> {
    Arc::new(HandlerChain::new(Arc::clone(registry)))
}
