use std::io;
use std::path::PathBuf;

/// Startup errors: anything that stops the relay from being configured.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Missing required setting: {field} (set it in the config file or via {env})")]
    MissingRequired {
        field: &'static str,
        env: &'static str,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Webhook target #{index} is invalid: {reason}")]
    InvalidTarget { index: usize, reason: String },
}

impl ConfigError {
    pub const fn missing(field: &'static str, env: &'static str) -> Self {
        Self::MissingRequired { field, env }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Helper type for Results that use ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;
