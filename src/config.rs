//! Configuration management for the map agent.
//!
//! Configuration can be set via environment variables:
//! - `LLM_API_KEY` - Required. API key for the chat-completion provider.
//!   `DASHSCOPE_API_KEY` is accepted as a fallback.
//! - `LLM_BASE_URL` - Optional. OpenAI-compatible base URL. Defaults to the
//!   DashScope compatible-mode endpoint. `DASHSCOPE_BASE_URL` is accepted as a fallback.
//! - `DEFAULT_MODEL` - Optional. Model used when a request names none. Defaults to `qwen-max`.
//! - `DEFAULT_TEMPERATURE` - Optional. Defaults to `0.7`.
//! - `MAX_TOKENS` - Optional. Completion token cap per model call. Defaults to `3000`.
//! - `LLM_TIMEOUT_SECS` - Optional. HTTP timeout for one model call. Defaults to `60`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8089`.
//! - `CORS_ORIGINS` - Optional. Comma-separated origins or `*`. Defaults to `*`.
//! - `HISTORY_MAX_CONVERSATIONS` - Optional. Conversations kept in memory, at least `1`. Defaults to `1024`.
//! - `HISTORY_TTL_SECS` - Optional. Idle time before a conversation is dropped. Defaults to `86400`.
//! - `HISTORY_SWEEP_SECS` - Optional. Interval of the idle sweep, at least `1`. Defaults to `300`.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Conversation history limits.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Maximum number of conversations held at once
    pub max_conversations: usize,

    /// Idle time after which a conversation is swept
    pub ttl: Duration,

    /// How often the idle sweep runs
    pub sweep_interval: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_conversations: 1024,
            ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl HistoryConfig {
    /// Reject limits the store cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_conversations == 0 {
            return Err(ConfigError::InvalidValue(
                "HISTORY_MAX_CONVERSATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "HISTORY_SWEEP_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider API key
    pub api_key: String,

    /// OpenAI-compatible base URL (normalized by the client)
    pub base_url: String,

    /// Model used when the request leaves `model` empty
    pub default_model: String,

    /// Temperature used when the request carries a non-finite value
    pub default_temperature: f64,

    /// `max_tokens` sent with every completion request
    pub max_tokens: u32,

    /// Timeout for one model call
    pub llm_timeout: Duration,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    /// History store limits
    pub history: HistoryConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if neither `LLM_API_KEY` nor
    /// `DASHSCOPE_API_KEY` is set, and `ConfigError::InvalidValue` for
    /// numeric variables that fail to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("DASHSCOPE_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("LLM_API_KEY".to_string()))?;

        let base_url = std::env::var("LLM_BASE_URL")
            .or_else(|_| std::env::var("DASHSCOPE_BASE_URL"))
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let default_model = std::env::var("DEFAULT_MODEL")
            .unwrap_or_else(|_| "qwen-max".to_string());

        let default_temperature = parse_env("DEFAULT_TEMPERATURE", 0.7)?;
        let max_tokens = parse_env("MAX_TOKENS", 3000)?;
        let llm_timeout = Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 60)?);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_env("PORT", 8089)?;

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()),
        );

        let defaults = HistoryConfig::default();
        let history = HistoryConfig {
            max_conversations: parse_env("HISTORY_MAX_CONVERSATIONS", defaults.max_conversations)?,
            ttl: Duration::from_secs(parse_env("HISTORY_TTL_SECS", defaults.ttl.as_secs())?),
            sweep_interval: Duration::from_secs(parse_env(
                "HISTORY_SWEEP_SECS",
                defaults.sweep_interval.as_secs(),
            )?),
        };
        history.validate()?;

        Ok(Self {
            api_key,
            base_url,
            default_model,
            default_temperature,
            max_tokens,
            llm_timeout,
            host,
            port,
            cors_origins,
            history,
        })
    }

    /// Whether any origin is allowed.
    pub fn cors_allows_any(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Split a `CORS_ORIGINS` value into its origins.
fn parse_origins(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "*" {
        return vec!["*".to_string()];
    }
    raw.split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}
