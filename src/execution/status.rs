//! Execution status and alerts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::printer::format_duration;

/// Outcome of a job or of a whole tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Everything requested ran to completion.
    Success,
    /// Some results were produced but the search was cut short or lost a
    /// branch along the way.
    PartialSuccess,
    /// The search failed.
    Failure,
}

impl Status {
    /// Success or partial success.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Failure)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Failure => "failure",
        };
        write!(f, "{s}")
    }
}

/// Category of a non-fatal alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A `TIMEOUT` deadline fired.
    Timeout,
    /// A `LIMIT` cap was reached.
    LimitHit,
    /// A branch failed without failing the search.
    BranchFailed,
    /// The caller cancelled the search.
    Cancelled,
}

/// Human-readable annotation attached to an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    /// Name of the job the alert is about.
    pub job: String,
    pub message: String,
}

impl Alert {
    pub fn timeout(job: &str, after: Duration) -> Self {
        Self {
            kind: AlertKind::Timeout,
            job: job.to_string(),
            message: format!(
                "{job} timed out after {}; results may be incomplete",
                format_duration(after)
            ),
        }
    }

    pub fn limit_hit(job: &str, limit: usize) -> Self {
        Self {
            kind: AlertKind::LimitHit,
            job: job.to_string(),
            message: format!("result limit of {limit} reached; more results may exist"),
        }
    }

    pub fn branch_failed(job: &str, reason: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::BranchFailed,
            job: job.to_string(),
            message: reason.into(),
        }
    }

    pub fn cancelled(job: &str) -> Self {
        Self {
            kind: AlertKind::Cancelled,
            job: job.to_string(),
            message: "search was cancelled before it finished".to_string(),
        }
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Final status of a run plus every alert raised along the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub status: Status,
    pub alerts: Vec<Alert>,
}

impl Execution {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            alerts: Vec::new(),
        }
    }

    pub fn with_alerts(status: Status, alerts: Vec<Alert>) -> Self {
        Self { status, alerts }
    }

    /// Whether any alert of `kind` was raised.
    pub fn has_alert(&self, kind: AlertKind) -> bool {
        self.alerts.iter().any(|a| a.kind == kind)
    }
}

/// Result of running one node.
///
/// `Cancelled` means the node stopped because its token fired. The node that
/// fired the token decides what that means; it never counts as a failure.
#[derive(Debug)]
pub(crate) enum Outcome {
    Done(Execution),
    Cancelled(Vec<Alert>),
}

impl Outcome {
    pub(crate) fn into_alerts(self) -> Vec<Alert> {
        match self {
            Self::Done(execution) => execution.alerts,
            Self::Cancelled(alerts) => alerts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&Status::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial_success\"");
        assert_eq!(Status::PartialSuccess.to_string(), "partial_success");
    }

    #[test]
    fn timeout_alert_uses_go_durations() {
        let alert = Alert::timeout("symbolsearch", Duration::from_millis(1500));
        assert_eq!(alert.kind, AlertKind::Timeout);
        assert!(alert.message.contains("1.5s"), "{}", alert.message);
    }

    #[test]
    fn failure_is_not_ok() {
        assert!(Status::Success.is_ok());
        assert!(Status::PartialSuccess.is_ok());
        assert!(!Status::Failure.is_ok());
    }
}
