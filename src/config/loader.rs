// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_HISTORY_CAPACITY, DEFAULT_LOG_FILTER, DEFAULT_LRU_CAPACITY, DEFAULT_RAM_CEILING_BYTES,
};
use crate::errors::ConfigError;
use crate::graph::{Prompt, Submission};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Engine configuration.
///
/// Every section is optional; an empty file yields the defaults (classic cache,
/// 10,000 history records).
///
/// # Example
/// ```yaml
/// cache:
///   policy: ram_pressure
///   ceiling_bytes: 536870912
///   order: lru
/// queue:
///   history_capacity: 500
/// log_filter: promptwood=debug
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl EngineConfig {
    pub fn get_log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// Which output cache the engine runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    None,
    #[default]
    Classic,
    Lru,
    RamPressure,
}

/// Victim order for the RAM-pressure cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionOrder {
    /// Oldest inserted entry goes first
    #[default]
    Insertion,
    /// Least recently read or written entry goes first
    Lru,
}

/// Cache policy and its bounds.
///
/// # Fields
/// * `policy` - cache implementation to use
/// * `capacity` - entry ceiling for `lru`
/// * `ceiling_bytes` - footprint ceiling for `ram_pressure`
/// * `order` - victim order for `ram_pressure`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub policy: CachePolicy,
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub ceiling_bytes: Option<usize>,
    #[serde(default)]
    pub order: EvictionOrder,
}

impl CacheConfig {
    pub fn get_capacity(&self) -> usize {
        self.capacity.unwrap_or(DEFAULT_LRU_CAPACITY)
    }

    pub fn get_ceiling_bytes(&self) -> usize {
        self.ceiling_bytes.unwrap_or(DEFAULT_RAM_CEILING_BYTES)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub history_capacity: Option<usize>,
}

impl QueueConfig {
    pub fn get_history_capacity(&self) -> usize {
        self.history_capacity.unwrap_or(DEFAULT_HISTORY_CAPACITY)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load an engine config from a `.yaml`, `.yml` or `.toml` file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let content = read(path)?;
    let cfg: EngineConfig = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        "toml" => toml::from_str(&content)?,
        _ => return Err(ConfigError::UnsupportedFormat { extension }),
    };
    Ok(cfg)
}

/// Parse a submission from JSON text.
///
/// Accepts either the full envelope (`{"prompt": {...}, "client_id": ...}`) or a
/// bare prompt object.
pub fn parse_submission(content: &str) -> Result<Submission, ConfigError> {
    let value: Value = serde_json::from_str(content)?;
    let is_envelope = value
        .as_object()
        .and_then(|object| object.get("prompt"))
        .is_some_and(Value::is_object);

    if is_envelope {
        Ok(serde_json::from_value(value)?)
    } else {
        let prompt: Prompt = serde_json::from_value(value)?;
        Ok(Submission::new(prompt))
    }
}

/// Load a submission from a JSON workflow file.
pub fn load_submission<P: AsRef<Path>>(path: P) -> Result<Submission, ConfigError> {
    parse_submission(&read(path.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_yaml_config() {
        let file = write_temp(
            ".yaml",
            r#"
cache:
  policy: ram_pressure
  ceiling_bytes: 4096
  order: lru
queue:
  history_capacity: 50
"#,
        );

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.cache.policy, CachePolicy::RamPressure);
        assert_eq!(cfg.cache.get_ceiling_bytes(), 4096);
        assert_eq!(cfg.cache.order, EvictionOrder::Lru);
        assert_eq!(cfg.queue.get_history_capacity(), 50);
        assert_eq!(cfg.get_log_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn parse_toml_config() {
        let file = write_temp(
            ".toml",
            r#"
log_filter = "promptwood=debug"

[cache]
policy = "lru"
capacity = 8
"#,
        );

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.cache.policy, CachePolicy::Lru);
        assert_eq!(cfg.cache.get_capacity(), 8);
        assert_eq!(cfg.queue.get_history_capacity(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(cfg.get_log_filter(), "promptwood=debug");
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        let file = write_temp(".yml", "{}");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.cache.policy, CachePolicy::Classic);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = write_temp(".ini", "x=1");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::UnsupportedFormat { extension }) if extension == "ini"
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }

    #[test]
    fn submission_accepts_bare_prompt_and_envelope() {
        let bare = parse_submission(r#"{"1": {"class_type": "Int", "inputs": {"value": 1}}}"#)
            .unwrap();
        assert_eq!(bare.prompt.len(), 1);
        assert!(bare.client_id.is_none());

        let envelope = parse_submission(
            r#"{"prompt": {"1": {"class_type": "Int", "inputs": {"value": 1}}}, "client_id": "cli"}"#,
        )
        .unwrap();
        assert_eq!(envelope.prompt.len(), 1);
        assert_eq!(envelope.client_id.as_deref(), Some("cli"));
    }
}
