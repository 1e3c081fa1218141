//! Downstream redeploy triggers.
//!
//! A matched [`WebhookTarget`] becomes one `POST {base}/api/stacks/webhooks/{trigger_id}`
//! with an empty body. There are no retries: each target is tried once and its
//! [`DispatchOutcome`] is reported back to the caller.

use std::future::Future;
use std::time::Duration;

use axum::http::StatusCode;
use futures::future::join_all;
use url::Url;

use crate::matcher::WebhookTarget;

/// Transport-level failure of a downstream call.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// DNS failure, refused connection, reset, TLS error and the like.
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Request timed out")]
    Timeout,
}

/// The HTTP client the dispatcher posts through.
///
/// Production code uses [`ReqwestClient`]; tests substitute a fake transport
/// and assert on the URLs it was asked to post to.
pub trait DownstreamClient: Send + Sync {
    /// Sends `POST url` with an empty body and returns the response status.
    fn post(&self, url: Url) -> impl Future<Output = Result<StatusCode, HttpError>> + Send;
}

/// [`DownstreamClient`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { inner })
    }
}

impl DownstreamClient for ReqwestClient {
    async fn post(&self, url: Url) -> Result<StatusCode, HttpError> {
        let response = self.inner.post(url).send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout
            } else {
                HttpError::Connection(Box::new(e))
            }
        })?;

        Ok(response.status())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No trigger id to dispatch to")]
    MissingTriggerId,

    #[error("Cannot append a path to downstream URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("Downstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Transport(HttpError),

    #[error("Downstream answered {0}")]
    UnexpectedStatus(StatusCode),
}

/// Result of triggering one target.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub trigger_id: String,
    pub result: Result<StatusCode, DispatchError>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Both codes are returned for an accepted trigger, depending on the
/// downstream API version.
const fn is_accepted(status: StatusCode) -> bool {
    matches!(status, StatusCode::OK | StatusCode::NO_CONTENT)
}

pub struct Dispatcher<C> {
    base_url: Url,
    client: C,
    timeout: Duration,
}

impl<C: DownstreamClient> Dispatcher<C> {
    /// `timeout` bounds every call regardless of the client's own settings.
    pub fn new(base_url: Url, client: C, timeout: Duration) -> Self {
        Self {
            base_url,
            client,
            timeout,
        }
    }

    /// `{base}/api/stacks/webhooks/{trigger_id}`, keeping any base path and
    /// encoding `trigger_id` as a single segment.
    pub fn trigger_url(&self, trigger_id: &str) -> Result<Url, DispatchError> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| DispatchError::InvalidBaseUrl(self.base_url.to_string()))?;
            segments
                .pop_if_empty()
                .extend(["api", "stacks", "webhooks", trigger_id]);
        }
        Ok(url)
    }

    /// Triggers one target. Never retries.
    pub async fn dispatch(&self, target: &WebhookTarget) -> DispatchOutcome {
        DispatchOutcome {
            trigger_id: target.trigger_id.clone(),
            result: self.send(&target.trigger_id).await,
        }
    }

    /// Triggers every target concurrently; a failure for one target does not
    /// stop the others. Outcomes are in the order of `targets`.
    pub async fn dispatch_all(&self, targets: &[WebhookTarget]) -> Vec<DispatchOutcome> {
        join_all(targets.iter().map(|target| self.dispatch(target))).await
    }

    async fn send(&self, trigger_id: &str) -> Result<StatusCode, DispatchError> {
        if trigger_id.is_empty() {
            return Err(DispatchError::MissingTriggerId);
        }
        let url = self.trigger_url(trigger_id)?;

        let status = match tokio::time::timeout(self.timeout, self.client.post(url)).await {
            Ok(Ok(status)) => status,
            Ok(Err(HttpError::Timeout)) | Err(_) => {
                return Err(DispatchError::Timeout(self.timeout));
            }
            Ok(Err(e)) => return Err(DispatchError::Transport(e)),
        };

        if is_accepted(status) {
            Ok(status)
        } else {
            Err(DispatchError::UnexpectedStatus(status))
        }
    }
}
