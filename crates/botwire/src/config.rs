//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. environment variables
//! 2. `botwire.toml` in the working directory
//! 3. defaults
//!
//! `${VAR_NAME}` references inside the config file are expanded from the
//! environment before parsing.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BotError, Result};
use crate::types::{AuthRecord, BotAuth};

/// Default config file name
pub const CONFIG_FILE: &str = "botwire.toml";

/// Slack Web API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL that method names are resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Tokens used when the caller has no OAuth record of its own (CLI use)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// User or workspace token (xoxp-...)
    pub access_token: Option<String>,

    /// Bot token (xoxb-...), preferred when set
    pub bot_access_token: Option<String>,
}

/// Main configuration for botwire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl BotConfig {
    /// Expand `${VAR_NAME}` references from the environment.
    /// Unset variables expand to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| BotError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml_str(&toml_content)?;
        config.apply_env_overrides();

        Ok(config)
    }

    fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);

        let toml: TomlConfig = toml::from_str(&expanded)
            .map_err(|e| BotError::Config(format!("Failed to parse TOML: {}", e)))?;

        let api = toml.api.unwrap_or_default();
        let auth = toml.auth.unwrap_or_default();

        Ok(Self {
            api: ApiConfig {
                base_url: api.base_url.unwrap_or_else(default_base_url),
                timeout_secs: api.timeout_secs.unwrap_or_else(default_timeout_secs),
            },
            auth: AuthConfig {
                access_token: auth.access_token.filter(|t| !t.is_empty()),
                bot_access_token: auth.bot_access_token.filter(|t| !t.is_empty()),
            },
        })
    }

    /// Load from `botwire.toml` when present, otherwise from the environment
    pub fn load() -> Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }

        Ok(Self::from_env())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("SLACK_API_BASE_URL") {
            if !base_url.is_empty() {
                self.api.base_url = base_url;
            }
        }
        if let Ok(timeout) = std::env::var("SLACK_HTTP_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.api.timeout_secs = secs;
            }
        }
        if let Ok(token) = std::env::var("SLACK_ACCESS_TOKEN") {
            if !token.is_empty() {
                self.auth.access_token = Some(token);
            }
        }
        if let Ok(token) = std::env::var("SLACK_BOT_TOKEN") {
            if !token.is_empty() {
                self.auth.bot_access_token = Some(token);
            }
        }
    }

    /// OAuth record built from the configured tokens
    pub fn auth_record(&self) -> Result<AuthRecord> {
        match (&self.auth.bot_access_token, &self.auth.access_token) {
            (None, None) => Err(BotError::TokenNotConfigured),
            (bot, access) => Ok(AuthRecord {
                access_token: access.clone().unwrap_or_default(),
                bot: bot.clone().map(|bot_access_token| BotAuth {
                    bot_access_token,
                    bot_user_id: None,
                }),
            }),
        }
    }
}

// TOML file layout

#[derive(Debug, Deserialize)]
struct TomlConfig {
    api: Option<TomlApiConfig>,
    auth: Option<TomlAuthConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlApiConfig {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlAuthConfig {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    bot_access_token: Option<String>,
}
