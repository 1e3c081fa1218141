//! Per-request pipeline: event filter, signature check, decode, match,
//! dispatch.
//!
//! [`Relay::handle`] is a function of the notification and the immutable
//! configuration only, so it can be exercised without a listener by plugging
//! in a fake [`DownstreamClient`].

use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::dispatch::{Dispatcher, DownstreamClient};
use crate::matcher::{RequestParams, TargetMatcher};
use crate::signature::{self, Secret, SignatureScheme};
use crate::webhook;

/// One inbound delivery, before its body has been read.
#[derive(Debug)]
pub struct IncomingNotification {
    pub event: Option<String>,
    pub signature: Option<String>,
    /// Sender-assigned delivery id, only used for logging.
    pub delivery: Option<String>,
    pub params: RequestParams,
    pub body: Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Ping,
    Push,
    Unsupported,
}

impl EventKind {
    pub fn classify(event: Option<&str>) -> Self {
        match event {
            Some("ping") => Self::Ping,
            Some("push") => Self::Push,
            _ => Self::Unsupported,
        }
    }
}

/// Terminal state of a delivery. Each maps to a distinct status code so the
/// sender can tell rejections apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pong,
    UnsupportedEvent,
    BodyUnreadable,
    SignatureRejected,
    PayloadRejected,
    NoMatch,
    Dispatched,
    DispatchFailed,
}

impl Outcome {
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Pong | Self::NoMatch | Self::Dispatched => StatusCode::NO_CONTENT,
            Self::UnsupportedEvent => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BodyUnreadable | Self::PayloadRejected => StatusCode::BAD_REQUEST,
            Self::SignatureRejected => StatusCode::IM_A_TEAPOT,
            Self::DispatchFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}

/// Header names a deployment reads the event type and signature from.
#[derive(Debug, Clone)]
pub struct HeaderNames {
    pub event: HeaderName,
    pub signature: HeaderName,
}

pub struct Relay<C> {
    secret: Secret,
    scheme: SignatureScheme,
    headers: HeaderNames,
    max_body_bytes: usize,
    body_read_timeout: Duration,
    matcher: TargetMatcher,
    dispatcher: Dispatcher<C>,
}

impl<C: DownstreamClient> Relay<C> {
    pub fn new(config: &RelayConfig, client: C) -> Self {
        Self {
            secret: config.secret.clone(),
            scheme: config.signature_scheme,
            headers: HeaderNames {
                event: config.event_header.clone(),
                signature: config.signature_header.clone(),
            },
            max_body_bytes: config.max_body_bytes,
            body_read_timeout: config.body_read_timeout,
            matcher: config.matcher(),
            dispatcher: Dispatcher::new(
                config.portainer_url.clone(),
                client,
                config.dispatch_timeout,
            ),
        }
    }

    pub fn header_names(&self) -> &HeaderNames {
        &self.headers
    }

    #[tracing::instrument(
        name = "delivery",
        skip_all,
        fields(
            id = notification.delivery.as_deref().unwrap_or("-"),
            event = notification.event.as_deref().unwrap_or("-"),
        )
    )]
    pub async fn handle(&self, notification: IncomingNotification) -> Outcome {
        match EventKind::classify(notification.event.as_deref()) {
            EventKind::Ping => {
                info!("Ping received");
                return Outcome::Pong;
            }
            EventKind::Unsupported => {
                info!("Unsupported event type");
                return Outcome::UnsupportedEvent;
            }
            EventKind::Push => {}
        }

        let read = to_bytes(notification.body, self.max_body_bytes);
        let body = match tokio::time::timeout(self.body_read_timeout, read).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                warn!("Error reading request body: {e}");
                return Outcome::BodyUnreadable;
            }
            Err(_) => {
                warn!(
                    "Request body not received within {:?}",
                    self.body_read_timeout
                );
                return Outcome::BodyUnreadable;
            }
        };

        let claimed = notification.signature.as_deref();
        if !signature::verify(&self.secret, &body, claimed, self.scheme) {
            warn!(
                signature_len = claimed.map_or(0, str::len),
                scheme = ?self.scheme,
                "Invalid signature"
            );
            return Outcome::SignatureRejected;
        }

        let event = match webhook::decode(&body) {
            Ok(event) => event,
            Err(e) => {
                warn!("{e}");
                return Outcome::PayloadRejected;
            }
        };

        let targets = self.matcher.resolve(&event, &notification.params);
        if targets.is_empty() {
            info!(
                git_ref = %event.git_ref,
                repository = %event.repository_full_name,
                "No target for this push"
            );
            return Outcome::NoMatch;
        }

        debug!(count = targets.len(), "Dispatching to matched targets");
        let outcomes = self.dispatcher.dispatch_all(&targets).await;

        let mut failed = 0;
        for outcome in &outcomes {
            match &outcome.result {
                Ok(status) => info!(
                    trigger_id = %outcome.trigger_id,
                    %status,
                    "Redeploy triggered"
                ),
                Err(e) => {
                    failed += 1;
                    error!(trigger_id = %outcome.trigger_id, "Redeploy trigger failed: {e}");
                }
            }
        }

        if failed == 0 {
            Outcome::Dispatched
        } else {
            warn!(failed, total = outcomes.len(), "Some triggers failed");
            Outcome::DispatchFailed
        }
    }
}
