//! Error types for search job execution.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Hard failures raised by a leaf job while executing.
///
/// These are never produced for cancellation; a cancelled leaf simply stops.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("Job {name} backend error: {reason}")]
    Backend { name: String, reason: String },

    #[error("Job {name} backend unavailable")]
    Unavailable { name: String },
}

/// Invalid job tree construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("{name} requires at least one child")]
    EmptyCombinator { name: &'static str },

    #[error("LIMIT requires a positive count")]
    ZeroLimit,
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
