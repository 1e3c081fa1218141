//! HTTP surface of the relay.
//!
//! Every path and method lands on the webhook handler; the sender decides the
//! URL, and only the headers, query string and body matter.

pub mod webhook;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::dispatch::DownstreamClient;
use crate::relay::Relay;

pub use webhook::handle_webhook;

pub fn router<C: DownstreamClient + 'static>(relay: Arc<Relay<C>>) -> Router {
    Router::new()
        .fallback(handle_webhook::<C>)
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}
