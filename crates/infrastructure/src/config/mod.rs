//! Controller configuration: structs, parsing, and validation.
//!
//! Split across sub-modules:
//! - `common`: shared helpers and `ConfigError`
//! - `load_balancer`: the VIP instance grammar

mod common;
mod load_balancer;

pub use common::ConfigError;
pub use load_balancer::LoadBalancerConfig;

use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    #[serde(default)]
    pub controller: ControllerInfo,

    pub routing: RoutingConfig,

    pub load_balancer: LoadBalancerConfig,
}

impl ControllerConfig {
    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    ///
    /// A missing `table` key in either section fails the parse; that is
    /// the only fatal configuration condition.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.routing.table == self.load_balancer.table {
            return Err(ConfigError::Validation {
                field: "routing.table".to_string(),
                message: format!(
                    "routing and load_balancer must use distinct flow tables (both are {})",
                    self.routing.table
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerInfo {
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub log_format: LogFormat,
}

/// Shortest-path switching section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Flow table holding per-host forwarding entries.
    pub table: u8,
}

// ── Logging enums ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Flattened JSON for log aggregators.
    Json,
    /// Human-readable colored output.
    #[default]
    Text,
}
