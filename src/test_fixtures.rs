//! Shared fixtures for unit tests: a scripted downstream client and config
//! builders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{HeaderName, StatusCode};
use url::Url;

use crate::config::RelayConfig;
use crate::dispatch::{DownstreamClient, HttpError};
use crate::matcher::WebhookTarget;
use crate::signature::{Secret, SignatureScheme};

pub const SECRET: &str = "test-secret";

/// What the fake downstream does with a request.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Status(StatusCode),
    Refused,
    Hang,
}

/// Downstream client that records every URL it is asked to post to and
/// answers according to a script keyed by trigger id.
#[derive(Debug, Clone)]
pub struct FakeClient {
    default: Reply,
    per_trigger: HashMap<String, Reply>,
    calls: Arc<Mutex<Vec<Url>>>,
}

impl FakeClient {
    pub fn replying(default: Reply) -> Self {
        Self {
            default,
            per_trigger: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_reply(mut self, trigger_id: &str, reply: Reply) -> Self {
        self.per_trigger.insert(trigger_id.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(Url::to_string)
            .collect()
    }
}

impl DownstreamClient for FakeClient {
    async fn post(&self, url: Url) -> Result<StatusCode, HttpError> {
        let trigger_id = url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .unwrap_or_default()
            .to_string();
        self.calls.lock().unwrap().push(url);

        match self.per_trigger.get(&trigger_id).copied().unwrap_or(self.default) {
            Reply::Status(status) => Ok(status),
            Reply::Refused => Err(HttpError::Connection("connection refused".into())),
            Reply::Hang => std::future::pending().await,
        }
    }
}

pub fn target(repository: &str, branch: &str, trigger_id: &str) -> WebhookTarget {
    WebhookTarget {
        trigger_id: trigger_id.to_string(),
        repository: Some(repository.to_string()),
        branch: branch.to_string(),
    }
}

/// A valid config pointing at `http://portainer.test:9000`.
pub fn config(scheme: SignatureScheme, targets: Vec<WebhookTarget>) -> RelayConfig {
    RelayConfig {
        secret: Secret::new(SECRET),
        portainer_url: Url::parse("http://portainer.test:9000").unwrap(),
        bind_address: "127.0.0.1:0".to_string(),
        signature_scheme: scheme,
        signature_header: HeaderName::from_static(match scheme {
            SignatureScheme::Prefixed => "x-hub-signature-256",
            SignatureScheme::Bare => "x-hub-signature",
        }),
        event_header: HeaderName::from_static("x-github-event"),
        dispatch_timeout: Duration::from_secs(5),
        body_read_timeout: Duration::from_secs(5),
        max_body_bytes: 1024 * 1024,
        log_dir: None,
        targets,
    }
}
