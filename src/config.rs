//! Startup configuration.
//!
//! Settings come from an optional TOML file, overlaid by environment variables
//! (a `.env` file is loaded by the binary before this runs). The merged result
//! is validated once into a [`RelayConfig`] and never changes afterwards.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::http::HeaderName;
use serde::Deserialize;
use url::Url;

use crate::error::{ConfigError, Result};
use crate::matcher::{TargetMatcher, WebhookTarget};
use crate::signature::{Secret, SignatureScheme};

pub const CONFIG_PATH_ENV: &str = "RELAY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "relay.toml";

const DEFAULT_BIND_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3473;
const DEFAULT_EVENT_HEADER: &str = "X-GitHub-Event";
const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BODY_READ_TIMEOUT_SECS: u64 = 10;
/// GitHub caps webhook payloads at 25 MiB.
const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

mod vars {
    pub const SECRET_KEY: &str = "SECRET_KEY";
    pub const PORTAINER_URL: &str = "PORTAINER_URL";
    pub const PORT: &str = "PORT";
    pub const BIND_ADDRESS: &str = "BIND_ADDRESS";
    pub const SIGNATURE_SCHEME: &str = "SIGNATURE_SCHEME";
    pub const LOG_DIR: &str = "LOG_DIR";
}

/// The config file as written. Every setting is optional here; requirements
/// are enforced by [`RelayConfig::from_sources`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub secret_key: Option<String>,
    pub portainer_url: Option<String>,
    pub bind_address: Option<String>,
    pub signature_scheme: Option<SignatureScheme>,
    pub signature_header: Option<String>,
    pub event_header: Option<String>,
    pub dispatch_timeout_secs: Option<u64>,
    pub body_read_timeout_secs: Option<u64>,
    pub max_body_bytes: Option<usize>,
    pub log_dir: Option<PathBuf>,
    #[serde(default, rename = "webhook")]
    pub webhooks: Vec<WebhookTarget>,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }
}

/// Validated, immutable relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub secret: Secret,
    /// Base URL of the deployment API, e.g. `https://portainer:9443`.
    pub portainer_url: Url,
    pub bind_address: String,
    pub signature_scheme: SignatureScheme,
    pub signature_header: HeaderName,
    pub event_header: HeaderName,
    pub dispatch_timeout: Duration,
    pub body_read_timeout: Duration,
    pub max_body_bytes: usize,
    pub log_dir: Option<PathBuf>,
    /// Empty in single-target mode.
    pub targets: Vec<WebhookTarget>,
}

impl RelayConfig {
    /// Loads the config file named by `RELAY_CONFIG` (or `relay.toml` when it
    /// exists) and overlays the process environment.
    pub fn load() -> Result<Self> {
        let file = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => FileConfig::read(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                FileConfig::read(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => FileConfig::default(),
        };

        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Merges `file` with values from `lookup` (environment wins) and
    /// validates the result. Blank environment values count as unset.
    pub fn from_sources(file: FileConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret = env(vars::SECRET_KEY)
            .or(file.secret_key)
            .map(Secret::from)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::missing("secret_key", vars::SECRET_KEY))?;

        let portainer_url = env(vars::PORTAINER_URL)
            .or(file.portainer_url)
            .ok_or(ConfigError::missing("portainer_url", vars::PORTAINER_URL))
            .and_then(|raw| parse_base_url(&raw))?;

        let bind_address = match (env(vars::BIND_ADDRESS), env(vars::PORT)) {
            (Some(address), _) => address,
            (None, Some(port)) => {
                let port: u16 = port
                    .trim()
                    .parse::<u16>()
                    .map_err(|e| ConfigError::invalid("PORT", format!("'{port}': {e}")))?;
                format!("{DEFAULT_BIND_HOST}:{port}")
            }
            (None, None) => file
                .bind_address
                .unwrap_or_else(|| format!("{DEFAULT_BIND_HOST}:{DEFAULT_PORT}")),
        };

        let signature_scheme = match env(vars::SIGNATURE_SCHEME) {
            Some(raw) => raw
                .parse::<SignatureScheme>()
                .map_err(|e| ConfigError::invalid("signature_scheme", e))?,
            None => file.signature_scheme.unwrap_or_default(),
        };

        let signature_header = parse_header_name(
            "signature_header",
            file.signature_header
                .as_deref()
                .unwrap_or(signature_scheme.default_header()),
        )?;
        let event_header = parse_header_name(
            "event_header",
            file.event_header.as_deref().unwrap_or(DEFAULT_EVENT_HEADER),
        )?;

        let dispatch_timeout = non_zero_secs(
            "dispatch_timeout_secs",
            file.dispatch_timeout_secs
                .unwrap_or(DEFAULT_DISPATCH_TIMEOUT_SECS),
        )?;
        let body_read_timeout = non_zero_secs(
            "body_read_timeout_secs",
            file.body_read_timeout_secs
                .unwrap_or(DEFAULT_BODY_READ_TIMEOUT_SECS),
        )?;

        let max_body_bytes = file.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES);
        if max_body_bytes == 0 {
            return Err(ConfigError::invalid("max_body_bytes", "must be greater than zero"));
        }

        let log_dir = env(vars::LOG_DIR).map(PathBuf::from).or(file.log_dir);

        validate_targets(&file.webhooks)?;

        Ok(Self {
            secret,
            portainer_url,
            bind_address,
            signature_scheme,
            signature_header,
            event_header,
            dispatch_timeout,
            body_read_timeout,
            max_body_bytes,
            log_dir,
            targets: file.webhooks,
        })
    }

    pub fn matcher(&self) -> TargetMatcher {
        TargetMatcher::from_targets(self.targets.clone())
    }
}

impl fmt::Display for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Config {{ portainer_url: {}, bind: {}, scheme: {:?}, signature_header: {}, \
             event_header: {}, mode: {}, targets: {}, dispatch_timeout: {}s, log_dir: {} }}",
            self.portainer_url,
            self.bind_address,
            self.signature_scheme,
            self.signature_header,
            self.event_header,
            self.matcher().mode(),
            self.targets.len(),
            self.dispatch_timeout.as_secs(),
            self.log_dir
                .as_ref()
                .map_or_else(|| "none".to_string(), |p| p.display().to_string()),
        )
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("scheme must be http or https, got '{}'", url.scheme()),
        });
    }
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: "URL cannot carry a path".to_string(),
        });
    }
    Ok(url)
}

fn parse_header_name(field: &'static str, raw: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(raw.trim().as_bytes())
        .map_err(|e| ConfigError::invalid(field, format!("'{raw}': {e}")))
}

fn non_zero_secs(field: &'static str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// Every configured target needs all three fields. Duplicate
/// `(repository, branch)` pairs are allowed.
fn validate_targets(targets: &[WebhookTarget]) -> Result<()> {
    for (i, target) in targets.iter().enumerate() {
        let reason = if target.trigger_id.trim().is_empty() {
            "trigger_id is empty"
        } else if target.repository.as_deref().is_none_or(|r| r.trim().is_empty()) {
            "repository is required when targets are configured"
        } else if target.branch.trim().is_empty() {
            "branch is empty"
        } else {
            continue;
        };
        return Err(ConfigError::InvalidTarget {
            index: i + 1,
            reason: reason.to_string(),
        });
    }
    Ok(())
}
