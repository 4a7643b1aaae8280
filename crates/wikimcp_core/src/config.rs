use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Error, Result};

pub const DEFAULT_USER_AGENT: &str = "MediaWiki-MCP-Bot/1.0";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub const ENV_API_URL: &str = "MEDIAWIKI_API_URL";
pub const ENV_USERNAME: &str = "MEDIAWIKI_API_BOT_USERNAME";
pub const ENV_PASSWORD: &str = "MEDIAWIKI_API_BOT_PASSWORD";
pub const ENV_USER_AGENT: &str = "MEDIAWIKI_API_BOT_USER_AGENT";
pub const ENV_TIMEOUT_MS: &str = "MEDIAWIKI_HTTP_TIMEOUT_MS";

/// Optional on-disk settings. Credentials are never read from this file.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiConfig {
    #[serde(default)]
    pub wiki: WikiSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Load and parse a WikiConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<WikiConfig> {
    if !config_path.exists() {
        return Ok(WikiConfig::default());
    }
    let content = fs::read_to_string(config_path).map_err(|error| {
        Error::Config(format!("failed to read {}: {error}", config_path.display()))
    })?;
    toml::from_str(&content).map_err(|error| {
        Error::Config(format!("failed to parse {}: {error}", config_path.display()))
    })
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fully resolved connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub credentials: Credentials,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::resolve(&WikiConfig::default())
    }

    /// Resolve every setting: env > config file > default. Fails before any
    /// network activity when a required value is missing.
    pub fn resolve(config: &WikiConfig) -> Result<Self> {
        Self::resolve_with(config, |name| env::var(name).ok())
    }

    pub fn resolve_with<F>(config: &WikiConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_url = lookup(ENV_API_URL)
            .or_else(|| config.wiki.api_url.clone())
            .ok_or_else(|| Error::Config(format!("{ENV_API_URL} is required")))?;
        validate_api_url(&api_url)?;

        let username = lookup(ENV_USERNAME)
            .ok_or_else(|| AuthError::MissingCredentials(ENV_USERNAME.to_string()))?;
        let password = lookup(ENV_PASSWORD)
            .ok_or_else(|| AuthError::MissingCredentials(ENV_PASSWORD.to_string()))?;

        let user_agent = lookup(ENV_USER_AGENT)
            .or_else(|| config.wiki.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let timeout_ms = match lookup(ENV_TIMEOUT_MS) {
            Some(value) => value.parse::<u64>().map_err(|_| {
                Error::Config(format!("{ENV_TIMEOUT_MS} must be a whole number of milliseconds"))
            })?,
            None => config.wiki.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        };
        if timeout_ms == 0 {
            return Err(Error::Config(format!("{ENV_TIMEOUT_MS} must be positive")));
        }

        Ok(Self {
            api_url,
            user_agent,
            timeout_ms,
            credentials: Credentials { username, password },
        })
    }

    /// index.php lives beside api.php; `action=raw` is only served there.
    pub fn index_url(&self) -> String {
        derive_index_url(&self.api_url)
    }
}

fn validate_api_url(api_url: &str) -> Result<()> {
    let parsed = Url::parse(api_url)
        .map_err(|error| Error::Config(format!("invalid {ENV_API_URL} {api_url:?}: {error}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "{ENV_API_URL} must be an http(s) URL, got {api_url:?}"
        )));
    }
    Ok(())
}

/// Derive the index.php URL from an API URL by swapping the trailing `api.php`.
pub fn derive_index_url(api_url: &str) -> String {
    let trimmed = api_url.trim().trim_end_matches('/');
    match trimmed.strip_suffix("api.php") {
        Some(stem) => format!("{stem}index.php"),
        None => format!("{trimmed}/index.php"),
    }
}
