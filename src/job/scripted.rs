//! A leaf that replays a fixed script of sleeps and match batches.
//!
//! Used to drive plans without a real backend: in tests, in the demo binary,
//! and anywhere a deterministic stand-in for a search is needed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::execution::Status;
use crate::job::leaf::SearchJob;
use crate::result::{SearchEvent, SearchMatch};
use crate::sink::ResultSink;

#[derive(Debug, Clone)]
enum Step {
    Sleep(Duration),
    Emit(Vec<SearchMatch>),
}

/// Shared view of what a [`ScriptedJob`] did, readable after the job has been
/// moved into a tree.
#[derive(Debug, Clone, Default)]
pub struct ScriptProbe {
    runs: Arc<AtomicUsize>,
    emitted: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

impl ScriptProbe {
    /// How many times the job was started.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Total matches sent to the sink across all runs.
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    /// Whether a run stopped early because its token fired.
    pub fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scripted in-memory search.
#[derive(Debug, Clone)]
pub struct ScriptedJob {
    name: String,
    steps: Vec<Step>,
    failure: Option<JobError>,
    status: Status,
    probe: ScriptProbe,
}

impl ScriptedJob {
    /// An empty script that succeeds immediately.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            failure: None,
            status: Status::Success,
            probe: ScriptProbe::default(),
        }
    }

    /// Wait before the next step. Cancellation interrupts the wait.
    pub fn sleep(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Sleep(duration));
        self
    }

    /// Send one batch to the sink.
    pub fn emit(mut self, matches: Vec<SearchMatch>) -> Self {
        self.steps.push(Step::Emit(matches));
        self
    }

    /// Send `count` single-match batches of path matches in `repo`.
    pub fn emit_paths(mut self, repo: &str, count: usize) -> Self {
        for i in 0..count {
            let path = format!("{}/{i}.rs", self.name);
            self.steps
                .push(Step::Emit(vec![SearchMatch::path(repo, path)]));
        }
        self
    }

    /// End the script with a hard failure.
    pub fn fail(mut self, error: JobError) -> Self {
        self.failure = Some(error);
        self
    }

    /// End the script reporting `status` instead of success.
    pub fn finish_with(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn probe(&self) -> ScriptProbe {
        self.probe.clone()
    }

    fn stopped(&self) -> Result<Status, JobError> {
        self.probe.cancelled.store(true, Ordering::SeqCst);
        tracing::trace!(job = %self.name, "Scripted job observed cancellation");
        Ok(Status::PartialSuccess)
    }
}

#[async_trait]
impl SearchJob for ScriptedJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        cancel: CancellationToken,
        sink: &dyn ResultSink,
    ) -> Result<Status, JobError> {
        self.probe.runs.fetch_add(1, Ordering::SeqCst);

        for step in &self.steps {
            if cancel.is_cancelled() {
                return self.stopped();
            }
            match step {
                Step::Sleep(duration) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return self.stopped(),
                        _ = tokio::time::sleep(*duration) => {}
                    }
                }
                Step::Emit(matches) => {
                    let count = matches.len();
                    sink.send(SearchEvent::new(matches.clone())).await;
                    self.probe.emitted.fetch_add(count, Ordering::SeqCst);
                }
            }
        }

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectSink;

    #[tokio::test]
    async fn replays_batches_in_order() {
        let job = ScriptedJob::new("text").emit_paths("acme/api", 3);
        let probe = job.probe();
        let sink = CollectSink::new();

        let status = job.run(CancellationToken::new(), &sink).await.unwrap();

        assert_eq!(status, Status::Success);
        assert_eq!(probe.runs(), 1);
        assert_eq!(probe.emitted(), 3);
        let paths: Vec<_> = sink.matches().await.into_iter().filter_map(|m| m.path).collect();
        assert_eq!(paths, vec!["text/0.rs", "text/1.rs", "text/2.rs"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_cancelled_mid_sleep() {
        let job = ScriptedJob::new("slow")
            .sleep(Duration::from_secs(60))
            .emit_paths("acme/api", 1);
        let probe = job.probe();
        let sink = CollectSink::new();
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        job.run(token, &sink).await.unwrap();
        assert!(probe.cancelled());
        assert!(sink.is_empty().await);
    }

    #[tokio::test]
    async fn reports_configured_failure() {
        let job = ScriptedJob::new("broken").fail(JobError::Unavailable {
            name: "broken".to_string(),
        });
        let err = job
            .run(CancellationToken::new(), &CollectSink::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Job broken backend unavailable");
    }
}
