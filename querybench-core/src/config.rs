// SPDX-License-Identifier: Apache-2.0

//! YAML configuration with fail-fast validation.
//!
//! Settings are read once at startup and treated as read-only for the rest
//! of the process; any invalid field prevents startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Raw configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawConfig {
    database: RawDatabaseConfig,
    #[serde(default)]
    benchmark: RawBenchmarkConfig,
}

#[derive(Debug, Deserialize)]
struct RawDatabaseConfig {
    path: String,
    #[serde(default = "default_fetch_size")]
    fetch_size: i64,
    #[serde(default = "default_pool_size")]
    pool_size: u32,
}

#[derive(Debug, Deserialize)]
struct RawBenchmarkConfig {
    #[serde(default = "default_times")]
    times: u32,
    #[serde(default = "default_delay_ms")]
    delay_ms: u64,
    #[serde(default = "default_loops")]
    loops: u32,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default = "default_prepare_retries")]
    prepare_retries: u32,
    #[serde(default)]
    report_dir: Option<String>,
}

fn default_fetch_size() -> i64 {
    10
}

fn default_pool_size() -> u32 {
    5
}

fn default_times() -> u32 {
    5
}

fn default_delay_ms() -> u64 {
    5000
}

fn default_loops() -> u32 {
    20
}

fn default_batch_size() -> usize {
    1000
}

fn default_prepare_retries() -> u32 {
    2
}

impl Default for RawBenchmarkConfig {
    fn default() -> Self {
        Self {
            times: default_times(),
            delay_ms: default_delay_ms(),
            loops: default_loops(),
            batch_size: default_batch_size(),
            prepare_retries: default_prepare_retries(),
            report_dir: None,
        }
    }
}

/// Validated database settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub fetch_size: i64,
    pub pool_size: u32,
}

/// Validated benchmark settings.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub times: u32,
    pub delay: Duration,
    pub loops: u32,
    pub batch_size: usize,
    pub prepare_retries: u32,
    pub report_dir: Option<PathBuf>,
}

/// Validated root configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub benchmark: BenchmarkConfig,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound {
            path: path.to_path_buf(),
        })?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Config, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Config, ConfigError> {
        if raw.database.path.is_empty() {
            return Err(ConfigError::InvalidFieldValue {
                field: "database.path",
                value: raw.database.path,
                reason: "must not be empty",
            });
        }
        if raw.database.fetch_size < 1 {
            return Err(ConfigError::InvalidFieldValue {
                field: "database.fetch_size",
                value: raw.database.fetch_size.to_string(),
                reason: "must be at least 1",
            });
        }
        if raw.database.pool_size < 1 || raw.database.pool_size > 64 {
            return Err(ConfigError::InvalidFieldValue {
                field: "database.pool_size",
                value: raw.database.pool_size.to_string(),
                reason: "must be between 1 and 64",
            });
        }
        if raw.benchmark.times < 1 {
            return Err(ConfigError::InvalidFieldValue {
                field: "benchmark.times",
                value: raw.benchmark.times.to_string(),
                reason: "must be at least 1",
            });
        }
        if raw.benchmark.loops < 1 {
            return Err(ConfigError::InvalidFieldValue {
                field: "benchmark.loops",
                value: raw.benchmark.loops.to_string(),
                reason: "must be at least 1",
            });
        }
        if raw.benchmark.batch_size < 1 {
            return Err(ConfigError::InvalidFieldValue {
                field: "benchmark.batch_size",
                value: raw.benchmark.batch_size.to_string(),
                reason: "must be at least 1",
            });
        }

        Ok(Config {
            database: DatabaseConfig {
                path: PathBuf::from(raw.database.path),
                fetch_size: raw.database.fetch_size,
                pool_size: raw.database.pool_size,
            },
            benchmark: BenchmarkConfig {
                times: raw.benchmark.times,
                delay: Duration::from_millis(raw.benchmark.delay_ms),
                loops: raw.benchmark.loops,
                batch_size: raw.benchmark.batch_size,
                prepare_retries: raw.benchmark.prepare_retries,
                report_dir: raw.benchmark.report_dir.map(PathBuf::from),
            },
        })
    }
}
