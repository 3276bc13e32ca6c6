//! Runtime configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) yields a working
//! configuration. Values are validated once at load time; components receive
//! typed settings through [`ScrapeyardConfig::watchdog_policy`],
//! [`ScrapeyardConfig::query_limits`] and
//! [`ScrapeyardConfig::process_worker`].
//!
//! ```toml
//! [watchdog]
//! running_timeout_secs = 1800
//! queued_timeout_secs = 600
//!
//! [scheduler]
//! tick_interval_secs = 15
//!
//! [worker]
//! program = "/usr/local/bin/scrapeyard-worker"
//! args = ["--headless"]
//! ```

use crate::execution::{
    adapters::ProcessWorkerConfig,
    services::{QueryLimits, WatchdogPolicy},
};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        /// Path that was read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[source] Box<toml::de::Error>),

    /// A value is out of range.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Dotted field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Watchdog thresholds, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchdogConfig {
    /// Running executions older than this are failed.
    pub running_timeout_secs: u64,
    /// Queued executions older than this are failed. Covers workers that
    /// die before reporting that they started.
    pub queued_timeout_secs: u64,
    /// Delay between sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            running_timeout_secs: 3_600,
            queued_timeout_secs: 900,
            sweep_interval_secs: 60,
        }
    }
}

/// Schedule driver cadence, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Delay between schedule ticks.
    pub tick_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
        }
    }
}

/// Query paging limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Page size when the caller gives none.
    pub default_page_size: u32,
    /// Largest page size honoured.
    pub max_page_size: u32,
    /// Recent log entries shown with execution detail.
    pub detail_log_limit: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let limits = QueryLimits::default();
        Self {
            default_page_size: limits.default_page_size,
            max_page_size: limits.max_page_size,
            detail_log_limit: limits.detail_log_limit,
        }
    }
}

/// Worker process launch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Worker executable.
    pub program: Utf8PathBuf,
    /// Fixed arguments.
    pub args: Vec<String>,
    /// Seconds a cancelled worker may keep running before it is killed.
    pub cancel_grace_secs: u64,
    /// Upper bound on concurrently running workers.
    pub max_concurrent: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: Utf8PathBuf::from("scrapeyard-worker"),
            args: Vec::new(),
            cancel_grace_secs: 30,
            max_concurrent: 4,
        }
    }
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            json: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeyardConfig {
    /// Watchdog thresholds.
    pub watchdog: WatchdogConfig,
    /// Schedule driver cadence.
    pub scheduler: SchedulerConfig,
    /// Query limits.
    pub query: QueryConfig,
    /// Worker launch settings.
    pub worker: WorkerConfig,
    /// Logging settings.
    pub telemetry: TelemetryConfig,
}

impl ScrapeyardConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(document).map_err(|err| ConfigError::Parse(Box::new(err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// the errors of [`Self::from_toml_str`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_owned(),
            source,
        };
        let file_name = path
            .file_name()
            .ok_or_else(|| io_error(std::io::Error::other("path must name a file")))?;
        let parent = path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(io_error)?;
        let document = dir.read_to_string(file_name).map_err(io_error)?;
        Self::from_toml_str(&document)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("watchdog.running_timeout_secs", self.watchdog.running_timeout_secs)?;
        positive("watchdog.sweep_interval_secs", self.watchdog.sweep_interval_secs)?;
        positive("watchdog.queued_timeout_secs", self.watchdog.queued_timeout_secs)?;
        positive("scheduler.tick_interval_secs", self.scheduler.tick_interval_secs)?;
        positive("query.default_page_size", u64::from(self.query.default_page_size))?;
        positive("query.max_page_size", u64::from(self.query.max_page_size))?;
        positive("query.detail_log_limit", u64::from(self.query.detail_log_limit))?;
        if self.query.default_page_size > self.query.max_page_size {
            return Err(ConfigError::Invalid {
                field: "query.default_page_size",
                reason: format!(
                    "{} exceeds max_page_size {}",
                    self.query.default_page_size, self.query.max_page_size
                ),
            });
        }
        if self.worker.program.as_str().trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "worker.program",
                reason: "must not be empty".to_owned(),
            });
        }
        if self.worker.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                field: "worker.max_concurrent",
                reason: "must be greater than zero".to_owned(),
            });
        }
        Ok(())
    }

    /// Returns the watchdog policy.
    #[must_use]
    pub const fn watchdog_policy(&self) -> WatchdogPolicy {
        WatchdogPolicy {
            running_timeout: Duration::from_secs(self.watchdog.running_timeout_secs),
            queued_timeout: Some(Duration::from_secs(self.watchdog.queued_timeout_secs)),
            sweep_interval: Duration::from_secs(self.watchdog.sweep_interval_secs),
        }
    }

    /// Returns the delay between schedule ticks.
    #[must_use]
    pub const fn schedule_tick(&self) -> Duration {
        Duration::from_secs(self.scheduler.tick_interval_secs)
    }

    /// Returns the query limits.
    #[must_use]
    pub const fn query_limits(&self) -> QueryLimits {
        QueryLimits {
            default_page_size: self.query.default_page_size,
            max_page_size: self.query.max_page_size,
            detail_log_limit: self.query.detail_log_limit,
        }
    }

    /// Returns the worker process launch settings.
    #[must_use]
    pub fn process_worker(&self) -> ProcessWorkerConfig {
        ProcessWorkerConfig {
            program: self.worker.program.clone(),
            args: self.worker.args.clone(),
            cancel_grace: Duration::from_secs(self.worker.cancel_grace_secs),
            max_concurrent: self.worker.max_concurrent,
        }
    }
}

fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_owned(),
        });
    }
    Ok(())
}
