pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod relay;
pub mod signature;
pub mod webhook;

use std::sync::Arc;

pub use config::RelayConfig;
pub use dispatch::ReqwestClient;
pub use relay::{Outcome, Relay};

/// Relay shared across request handlers. Immutable after startup.
pub type SharedRelay<C = ReqwestClient> = Arc<Relay<C>>;

#[cfg(test)]
mod test_fixtures;
