//! Push event payload decoding

use serde::Deserialize;

const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// The fields of a push payload the relay routes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub git_ref: String,
    /// `owner/repo`, or empty when the payload carries no repository.
    pub repository_full_name: String,
}

impl PushEvent {
    /// Branch name: `ref` without a leading `refs/heads/`. Other refs (tags)
    /// are returned verbatim.
    pub fn branch(&self) -> &str {
        self.git_ref
            .strip_prefix(BRANCH_REF_PREFIX)
            .unwrap_or(&self.git_ref)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid push payload: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

#[derive(Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(default)]
    repository: Option<Repository>,
}

#[derive(Deserialize)]
struct Repository {
    #[serde(default)]
    full_name: Option<String>,
}

/// Decodes the raw body of a push delivery.
///
/// `ref` is required. A missing or `null` `repository.full_name` decodes to
/// an empty string.
pub fn decode(body: &[u8]) -> Result<PushEvent, DecodeError> {
    let payload: PushPayload = serde_json::from_slice(body)?;

    let repository_full_name = payload
        .repository
        .and_then(|r| r.full_name)
        .unwrap_or_default();

    Ok(PushEvent {
        git_ref: payload.git_ref,
        repository_full_name,
    })
}
