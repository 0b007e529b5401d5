//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::endpoint::LIVE_VIEW_PATH;
use crate::error::{LiveViewError, Result};
use crate::protocol::{REGION_ATTRIBUTE, TRIGGER_ATTRIBUTE};

/// Top-level Live View configuration.
///
/// Every field is optional; an empty file or no file at all yields the
/// defaults the wire protocol expects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Names the document contract and the reserved endpoint path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_region_attribute")]
    pub region_attribute: String,

    #[serde(default = "default_trigger_attribute")]
    pub trigger_attribute: String,

    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            region_attribute: default_region_attribute(),
            trigger_attribute: default_trigger_attribute(),
            endpoint_path: default_endpoint_path(),
        }
    }
}

fn default_region_attribute() -> String {
    REGION_ATTRIBUTE.into()
}

fn default_trigger_attribute() -> String {
    TRIGGER_ATTRIBUTE.into()
}

fn default_endpoint_path() -> String {
    LIVE_VIEW_PATH.into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "live_view_client=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config =
            json5::from_str(&substituted).map_err(|e| LiveViewError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Logging settings, falling back to defaults.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Validate config, returning a list of errors.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let p = &self.protocol;

        if p.region_attribute.trim().is_empty() {
            errors.push("protocol.region_attribute cannot be empty".to_string());
        }
        if p.trigger_attribute.trim().is_empty() {
            errors.push("protocol.trigger_attribute cannot be empty".to_string());
        }
        if !p.endpoint_path.starts_with('/') {
            errors.push(format!(
                "protocol.endpoint_path must start with '/': {}",
                p.endpoint_path
            ));
        }

        if let Some(logging) = &self.logging {
            if !matches!(logging.format.as_str(), "plain" | "json") {
                errors.push(format!("Unknown log format: {}", logging.format));
            }
            if !matches!(logging.output.as_str(), "stderr" | "stdout") {
                errors.push(format!("Unknown log output: {}", logging.output));
            }
        }

        errors
    }
}

/// Base directory for Live View data: `~/.live_view/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".live_view")
}
