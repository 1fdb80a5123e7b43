//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Capacity of the bounded result channel handed to consumers.
    pub result_buffer: usize,
    /// Log the s-expression of every executed plan at debug level.
    pub log_plan: bool,
    /// Leaves running longer than this are logged as slow.
    pub slow_job_threshold: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            result_buffer: 256,
            log_plan: true,
            slow_job_threshold: Duration::from_secs(5),
        }
    }
}

impl ExecutorConfig {
    /// Build a config from `SEARCH_JOB_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("SEARCH_JOB_RESULT_BUFFER") {
            let buffer: usize = parse_value("SEARCH_JOB_RESULT_BUFFER", &raw)?;
            if buffer == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "SEARCH_JOB_RESULT_BUFFER".to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
            config.result_buffer = buffer;
        }

        if let Some(raw) = lookup("SEARCH_JOB_LOG_PLAN") {
            config.log_plan = parse_value("SEARCH_JOB_LOG_PLAN", &raw)?;
        }

        if let Some(raw) = lookup("SEARCH_JOB_SLOW_MS") {
            let millis: u64 = parse_value("SEARCH_JOB_SLOW_MS", &raw)?;
            config.slow_job_threshold = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        })
}
