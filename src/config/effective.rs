//! Effective configuration with provenance
//!
//! Records the merged configuration together with the sources that
//! contributed to it, and extracts the typed settings the client needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::time::Duration;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::host::EndpointConfig;
use crate::poll::PollDefaults;

/// Schema identifier
pub const SCHEMA_ID: &str = "gradx/effective_config@1";

/// Upper bound on the poll step.
const MAX_STEP_MS: u64 = 3_600_000;

/// Upper bound on attempt budgets.
const MAX_BUDGET: u64 = 10_000;

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    Project,
    Cli,
}

/// A contributing config source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_id: String,

    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    /// Redacted key paths
    pub redactions: Vec<String>,
}

/// Keys whose values must never be echoed back
const SECRET_KEYS: &[&str] = &["password", "token", "secret", "cookie", "credential"];

impl EffectiveConfig {
    /// Build the effective config; absent files are skipped.
    pub fn build(
        user_config_path: Option<&Path>,
        project_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        let files = [
            (ConfigOrigin::User, user_config_path),
            (ConfigOrigin::Project, project_config_path),
        ];
        for (origin, path) in files {
            let Some(path) = path.filter(|p| p.exists()) else {
                continue;
            };
            let (value, digest) = load_toml_file(path)?;
            tracing::debug!(path = %path.display(), %digest, "loaded config layer");
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let mut merged = merge_layers(layers);
        validate(&merged)?;

        let mut redactions = Vec::new();
        redact(&mut merged, String::new(), &mut redactions);

        Ok(Self {
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config: merged,
            sources,
            redactions,
        })
    }

    /// Get a config value by dot-separated path
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.config, |node, part| node.get(part))
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(Value::as_u64)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Poll budgets and step, falling back to the built-in values.
    pub fn poll_defaults(&self) -> PollDefaults {
        let fallback = PollDefaults::default();
        PollDefaults {
            step: self
                .get_u64("poll.step_ms")
                .map(Duration::from_millis)
                .unwrap_or(fallback.step),
            attempts: self
                .get_u64("poll.attempts")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(fallback.attempts),
            retry: self
                .get_u64("poll.retry")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(fallback.retry),
        }
    }

    /// Base URLs of every server family.
    pub fn endpoints(&self) -> EndpointConfig {
        let servers = |family: &str| -> Vec<String> {
            self.get(&format!("endpoints.{}", family))
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(|s| s.trim_end_matches('/').to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        };

        EndpointConfig {
            acceptance: servers("a"),
            exercise: servers("e"),
            extra: servers("x"),
            storage: servers("s"),
            timeout: Duration::from_secs(self.get_u64("http.timeout_seconds").unwrap_or(30)),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Read and parse a TOML file, returning the value and its digest
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("{}: invalid UTF-8: {}", path.display(), e)))?;
    let table: toml::Table = toml::from_str(&contents)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

    let value = serde_json::to_value(table)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
    Ok((value, digest))
}

fn redact(value: &mut Value, path: String, redactions: &mut Vec<String>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, val) in map.iter_mut() {
        let current = if path.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", path, key)
        };
        let lower = key.to_lowercase();
        if SECRET_KEYS.iter().any(|s| lower.contains(s)) && !val.is_object() {
            *val = Value::String("[REDACTED]".to_string());
            redactions.push(current);
        } else {
            redact(val, current, redactions);
        }
    }
}

fn validate(config: &Value) -> Result<(), ConfigError> {
    let poll = &config["poll"];

    match &poll["step_ms"] {
        Value::Null => {}
        v => match v.as_u64() {
            Some(step) if step <= MAX_STEP_MS => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "poll.step_ms must be an integer in [0, {}]",
                    MAX_STEP_MS
                )))
            }
        },
    }

    for key in ["attempts", "retry"] {
        match &poll[key] {
            Value::Null => {}
            v => match v.as_u64() {
                Some(n) if n <= MAX_BUDGET => {}
                _ => {
                    return Err(ConfigError::ValidationError(format!(
                        "poll.{} must be an integer in [0, {}]",
                        key, MAX_BUDGET
                    )))
                }
            },
        }
    }

    if let Some(timeout) = config["http"]["timeout_seconds"].as_u64() {
        if timeout == 0 || timeout > 300 {
            return Err(ConfigError::ValidationError(
                "http.timeout_seconds must be in (0, 300]".to_string(),
            ));
        }
    }

    for family in ["a", "e", "x", "s"] {
        match &config["endpoints"][family] {
            Value::Null | Value::Array(_) => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "endpoints.{} must be a list of base URLs",
                    family
                )))
            }
        }
    }

    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
