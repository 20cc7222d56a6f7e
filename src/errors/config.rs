// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for loading engine configuration and prompt files.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid prompt JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The file extension does not name a supported format
    #[error("unsupported config format '{extension}' (expected yaml, yml or toml)")]
    UnsupportedFormat { extension: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
