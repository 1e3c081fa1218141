//! Resolves which downstream triggers a push event applies to.

use serde::Deserialize;

use crate::webhook::PushEvent;

/// A configured `[[webhook]]` entry, or the ad-hoc target built from query
/// parameters in single-target mode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookTarget {
    pub trigger_id: String,
    #[serde(default)]
    pub repository: Option<String>,
    pub branch: String,
}

impl WebhookTarget {
    fn from_request(trigger_id: String, branch: String) -> Self {
        Self {
            trigger_id,
            repository: None,
            branch,
        }
    }

    fn matches(&self, repository: &str, branch: &str) -> bool {
        self.repository
            .as_deref()
            .is_some_and(|r| eq_fold(r, repository))
            && eq_fold(&self.branch, branch)
    }
}

/// `branch` and `uuid` query parameters of the inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pub branch: Option<String>,
    pub uuid: Option<String>,
}

/// How the trigger for a push is resolved, fixed at startup.
#[derive(Debug, Clone)]
pub enum TargetMatcher {
    /// Branch and trigger id come from each request's query string.
    Single,
    /// Targets come from configuration and are matched on repository and
    /// branch.
    Multi(Vec<WebhookTarget>),
}

impl TargetMatcher {
    /// Picks the mode from the configured target list: none means single.
    pub fn from_targets(targets: Vec<WebhookTarget>) -> Self {
        if targets.is_empty() {
            Self::Single
        } else {
            Self::Multi(targets)
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Single => "single-target",
            Self::Multi(_) => "multi-target",
        }
    }

    /// Returns every target the event applies to, in configuration order.
    /// An empty result is not an error.
    pub fn resolve(&self, event: &PushEvent, params: &RequestParams) -> Vec<WebhookTarget> {
        let branch = event.branch();
        match self {
            Self::Single => {
                let wanted = params.branch.as_deref().unwrap_or_default();
                if !eq_fold(wanted, branch) {
                    return Vec::new();
                }
                let trigger_id = params.uuid.clone().unwrap_or_default();
                vec![WebhookTarget::from_request(trigger_id, wanted.to_string())]
            }
            Self::Multi(targets) => targets
                .iter()
                .filter(|t| t.matches(&event.repository_full_name, branch))
                .cloned()
                .collect(),
        }
    }
}

/// Case-insensitive equality using Unicode lower-case folding.
fn eq_fold(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
