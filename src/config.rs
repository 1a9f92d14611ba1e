use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chatbot::ModelSelection;

const DEFAULT_SIGNAL_SERVICE: &str = "localhost:8080";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the env file.
    ReadFile { path: PathBuf, source: dotenvy::Error },
    /// A required variable is unset or empty.
    Missing(&'static str),
    /// A variable is set to something unusable.
    Invalid { var: &'static str, value: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read env file '{}': {}", path.display(), source)
            }
            Self::Missing(var) => write!(f, "{} environment variable is required", var),
            Self::Invalid { var, value, reason } => {
                write!(f, "invalid value '{}' for {}: {}", value, var, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::Missing(_) | Self::Invalid { .. } => None,
        }
    }
}

pub struct Config {
    /// signal-cli REST gateway address (`host:port` or a full URL).
    pub signal_service: String,
    /// The Signal account the bot runs as.
    pub phone_number: String,
    /// Base URL of the chat-completion API.
    pub api_base_url: String,
    pub model: ModelSelection,
    /// Timeout applied to every outbound HTTP request.
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    /// Also write logs to a file in this directory.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an env file. Variables already set in the process win.
    pub fn from_env_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let read_err = |source| ConfigError::ReadFile { path: path.to_path_buf(), source };

        let file_vars = dotenvy::from_path_iter(path)
            .map_err(read_err)?
            .collect::<Result<HashMap<String, String>, _>>()
            .map_err(read_err)?;

        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let phone_number = get("SIGNAL_PHONE_NUMBER").ok_or(ConfigError::Missing("SIGNAL_PHONE_NUMBER"))?;
        let signal_service = get("SIGNAL_SERVICE").unwrap_or_else(|| DEFAULT_SIGNAL_SERVICE.to_string());

        let api_base_url = get("PRIVATEMODE_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        validate_url("PRIVATEMODE_BASE_URL", &api_base_url)?;

        let model = ModelSelection::from_setting(get("PRIVATEMODE_MODEL"));

        let timeout_secs = parse_positive("PRIVATEMODE_TIMEOUT_SECS", get("PRIVATEMODE_TIMEOUT_SECS"))?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let poll_ms = parse_positive("SIGNAL_POLL_INTERVAL_MS", get("SIGNAL_POLL_INTERVAL_MS"))?
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        Ok(Self {
            signal_service,
            phone_number,
            api_base_url,
            model,
            request_timeout: Duration::from_secs(timeout_secs),
            poll_interval: Duration::from_millis(poll_ms),
            log_dir: get("BOT_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn validate_url(var: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid { var, value: value.to_string(), reason };
    let url = reqwest::Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

fn parse_positive(var: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected a positive integer".into(),
        }),
    }
}
