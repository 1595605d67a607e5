//! Client configuration.
//!
//! Secrets come from the process environment once, at startup, and travel in
//! an explicit [`Config`] handed to the client at construction; nothing in
//! the engine reads the environment behind the caller's back.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::client::NOTION_API_BASE;

/// Environment variable holding the integration token.
pub const ENV_API_KEY: &str = "NOTION_API_KEY";
/// Environment variable holding the default parent page id.
pub const ENV_PARENT_ID: &str = "NOTION_PARENT_ID";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Startup-fatal configuration failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
}

/// Connection settings for [`crate::NotionClient`].
#[derive(Clone)]
pub struct Config {
    /// Integration token, sent as a bearer credential.
    pub api_key: String,
    /// Default parent page for newly created pages.
    pub parent_page_id: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// API base URL. Overridable for tests; defaults to the hosted service.
    pub base_url: String,
}

impl Config {
    pub fn new(api_key: impl Into<String>, parent_page_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            parent_page_id: parent_page_id.into(),
            timeout: DEFAULT_TIMEOUT,
            base_url: NOTION_API_BASE.to_string(),
        }
    }

    /// Load from the process environment. Both variables are required; an
    /// unset or empty value is fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = require_env(ENV_API_KEY)?;
        let parent_page_id = require_env(ENV_PARENT_ID)?;
        Ok(Self::new(api_key, parent_page_id))
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

impl fmt::Debug for Config {
    // The token never lands in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("parent_page_id", &self.parent_page_id)
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url)
            .finish()
    }
}
