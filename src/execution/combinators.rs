//! Per-node execution policies.
//!
//! Every combinator runs its branches concurrently on a child token of its own
//! token. When it decides early (a failed `AND` branch, a successful `OR`
//! branch, a finished `PRIORITY` requirement, an expired `TIMEOUT`), it cancels
//! that child token and waits for the remaining branches to wind down before
//! returning, so no branch outlives the node that launched it.
//!
//! A branch reports `Outcome::Cancelled` only when its token fired before it
//! finished. If this node fired it, the cancellation is intentional and is
//! dropped; otherwise it is passed up unchanged. Alerts raised by a cancelled
//! branch are always kept.
//!
//! Branches are futures polled on the caller's task, not spawned tasks. A
//! leaf that blocks its thread stalls its siblings and every deadline above
//! it.

use std::time::Instant;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::execution::Executor;
use crate::execution::status::{Alert, Execution, Outcome, Status};
use crate::job::{
    AndJob, FilterJob, Job, LimitJob, OrJob, ParallelJob, PriorityJob, SearchJob, TimeoutJob,
};
use crate::sink::{FilterSink, LimitSink, ResultSink};

type Branches<'a> = FuturesUnordered<BoxFuture<'a, Outcome>>;

impl Executor {
    /// Run one node of the tree.
    pub(crate) fn run_node<'a>(
        &'a self,
        job: &'a Job,
        cancel: CancellationToken,
        sink: &'a dyn ResultSink,
    ) -> BoxFuture<'a, Outcome> {
        async move {
            match job {
                Job::Leaf(leaf) => self.run_leaf(leaf.as_ref(), cancel, sink).await,
                Job::NoOp => Outcome::Done(Execution::new(Status::Success)),
                Job::And(and) => self.run_and(and, cancel, sink).await,
                Job::Or(or) => self.run_or(or, cancel, sink).await,
                Job::Priority(priority) => self.run_priority(priority, cancel, sink).await,
                Job::Parallel(parallel) => self.run_parallel(parallel, cancel, sink).await,
                Job::Timeout(timeout) => self.run_timeout(timeout, cancel, sink).await,
                Job::Limit(limit) => self.run_limit(limit, cancel, sink).await,
                Job::Filter(filter) => self.run_filter(filter, cancel, sink).await,
            }
        }
        .boxed()
    }

    fn launch<'a>(
        &'a self,
        children: &'a [Job],
        scope: &CancellationToken,
        sink: &'a dyn ResultSink,
    ) -> Branches<'a> {
        children
            .iter()
            .map(|child| self.run_node(child, scope.child_token(), sink))
            .collect()
    }

    async fn run_leaf(
        &self,
        leaf: &dyn SearchJob,
        cancel: CancellationToken,
        sink: &dyn ResultSink,
    ) -> Outcome {
        let name = leaf.name();
        if cancel.is_cancelled() {
            return Outcome::Cancelled(Vec::new());
        }

        let started = Instant::now();
        let result = leaf.run(cancel.clone(), sink).await;
        let elapsed = started.elapsed();

        if elapsed > self.config.slow_job_threshold {
            tracing::warn!(
                job = %name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow search job"
            );
        }

        // A leaf that reports full success ran to completion, even if the
        // token fired after its last send.
        if cancel.is_cancelled() && !matches!(result, Ok(Status::Success)) {
            if let Err(e) = &result {
                tracing::debug!(job = %name, error = %e, "Ignoring error from cancelled job");
            }
            return Outcome::Cancelled(Vec::new());
        }

        match result {
            Ok(Status::Failure) => Outcome::Done(Execution::with_alerts(
                Status::Failure,
                vec![Alert::branch_failed(name, format!("{name} reported failure"))],
            )),
            Ok(status) => {
                tracing::debug!(job = %name, %status, elapsed_ms = elapsed.as_millis() as u64, "Job finished");
                Outcome::Done(Execution::new(status))
            }
            Err(e) => {
                tracing::debug!(job = %name, error = %e, "Job failed");
                Outcome::Done(Execution::with_alerts(
                    Status::Failure,
                    vec![Alert::branch_failed(name, e.to_string())],
                ))
            }
        }
    }

    async fn run_and(
        &self,
        job: &AndJob,
        cancel: CancellationToken,
        sink: &dyn ResultSink,
    ) -> Outcome {
        let scope = cancel.child_token();
        let mut branches = self.launch(job.children(), &scope, sink);
        let mut alerts = Vec::new();
        let mut status = Status::Success;
        let mut interrupted = false;

        while let Some(outcome) = branches.next().await {
            match outcome {
                Outcome::Done(execution) => {
                    alerts.extend(execution.alerts);
                    match execution.status {
                        Status::Success => {}
                        Status::PartialSuccess => status = Status::PartialSuccess,
                        Status::Failure => {
                            tracing::debug!(
                                remaining = branches.len(),
                                "AND branch failed, cancelling siblings"
                            );
                            alerts.extend(wind_down(&scope, branches).await);
                            return Outcome::Done(Execution::with_alerts(Status::Failure, alerts));
                        }
                    }
                }
                Outcome::Cancelled(cancelled) => {
                    interrupted = true;
                    alerts.extend(cancelled);
                }
            }
        }

        if interrupted {
            return Outcome::Cancelled(alerts);
        }
        Outcome::Done(Execution::with_alerts(status, alerts))
    }

    async fn run_or(&self, job: &OrJob, cancel: CancellationToken, sink: &dyn ResultSink) -> Outcome {
        let scope = cancel.child_token();
        let mut branches = self.launch(job.children(), &scope, sink);
        let mut alerts = Vec::new();
        let mut partial = false;
        let mut interrupted = false;

        while let Some(outcome) = branches.next().await {
            match outcome {
                Outcome::Done(execution) => {
                    alerts.extend(execution.alerts);
                    match execution.status {
                        Status::Success => {
                            tracing::debug!(
                                remaining = branches.len(),
                                "OR branch succeeded, cancelling siblings"
                            );
                            alerts.extend(wind_down(&scope, branches).await);
                            return Outcome::Done(Execution::with_alerts(Status::Success, alerts));
                        }
                        Status::PartialSuccess => partial = true,
                        Status::Failure => {}
                    }
                }
                Outcome::Cancelled(cancelled) => {
                    interrupted = true;
                    alerts.extend(cancelled);
                }
            }
        }

        if interrupted {
            return Outcome::Cancelled(alerts);
        }
        let status = if partial {
            Status::PartialSuccess
        } else {
            Status::Failure
        };
        Outcome::Done(Execution::with_alerts(status, alerts))
    }

    async fn run_priority(
        &self,
        job: &PriorityJob,
        cancel: CancellationToken,
        sink: &dyn ResultSink,
    ) -> Outcome {
        let optional_token = cancel.child_token();
        let mut required = self.run_node(job.required(), cancel.child_token(), sink);
        let mut optional = self.run_node(job.optional(), optional_token.clone(), sink);

        let mut optional_outcome = None;
        let required_outcome = loop {
            tokio::select! {
                outcome = &mut required => break outcome,
                outcome = &mut optional, if optional_outcome.is_none() => {
                    optional_outcome = Some(outcome);
                }
            }
        };

        let (optional_outcome, drained) = match optional_outcome {
            Some(outcome) => (Some(outcome), Vec::new()),
            None => {
                tracing::debug!(
                    optional = %job.optional().name(),
                    "Required branch finished first, cancelling optional branch"
                );
                optional_token.cancel();
                (None, optional.await.into_alerts())
            }
        };

        let mut execution = match required_outcome {
            Outcome::Done(execution) => execution,
            Outcome::Cancelled(mut alerts) => {
                if let Some(outcome) = optional_outcome {
                    alerts.extend(outcome.into_alerts());
                }
                alerts.extend(drained);
                return Outcome::Cancelled(alerts);
            }
        };
        execution.alerts.extend(drained);

        if let Some(Outcome::Done(best_effort)) = optional_outcome {
            if best_effort.status == Status::Failure {
                tracing::warn!(
                    optional = %job.optional().name(),
                    "Optional branch failed, reporting as alert"
                );
                if best_effort.alerts.is_empty() {
                    execution.alerts.push(Alert::branch_failed(
                        job.optional().name(),
                        "optional branch failed",
                    ));
                }
            }
            execution.alerts.extend(best_effort.alerts);
        }

        Outcome::Done(execution)
    }

    async fn run_parallel(
        &self,
        job: &ParallelJob,
        cancel: CancellationToken,
        sink: &dyn ResultSink,
    ) -> Outcome {
        let mut branches = self.launch(job.children(), &cancel, sink);
        let mut alerts = Vec::new();
        let (mut succeeded, mut partial, mut failed) = (0usize, 0usize, 0usize);
        let mut interrupted = false;

        while let Some(outcome) = branches.next().await {
            match outcome {
                Outcome::Done(execution) => {
                    match execution.status {
                        Status::Success => succeeded += 1,
                        Status::PartialSuccess => partial += 1,
                        Status::Failure => {
                            failed += 1;
                            tracing::warn!("PARALLEL branch failed, continuing with siblings");
                        }
                    }
                    alerts.extend(execution.alerts);
                }
                Outcome::Cancelled(cancelled) => {
                    interrupted = true;
                    alerts.extend(cancelled);
                }
            }
        }

        if interrupted {
            return Outcome::Cancelled(alerts);
        }

        let status = if partial == 0 && failed == 0 {
            Status::Success
        } else if succeeded + partial > 0 {
            Status::PartialSuccess
        } else {
            Status::Failure
        };
        Outcome::Done(Execution::with_alerts(status, alerts))
    }

    async fn run_timeout(
        &self,
        job: &TimeoutJob,
        cancel: CancellationToken,
        sink: &dyn ResultSink,
    ) -> Outcome {
        let scope = cancel.child_token();
        let mut child = self.run_node(job.child(), scope.clone(), sink);

        match tokio::time::timeout(job.duration(), &mut child).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::debug!(
                    job = %job.child().name(),
                    timeout_ms = job.duration().as_millis() as u64,
                    "Deadline reached, cancelling"
                );
                scope.cancel();
                let mut alerts = child.await.into_alerts();
                if cancel.is_cancelled() {
                    return Outcome::Cancelled(alerts);
                }
                alerts.push(Alert::timeout(job.child().name(), job.duration()));
                Outcome::Done(Execution::with_alerts(Status::PartialSuccess, alerts))
            }
        }
    }

    async fn run_limit(
        &self,
        job: &LimitJob,
        cancel: CancellationToken,
        sink: &dyn ResultSink,
    ) -> Outcome {
        let scope = cancel.child_token();
        let limited = LimitSink::new(sink, job.limit(), scope.clone());
        let outcome = self.run_node(job.child(), scope, &limited).await;

        if !limited.limit_hit() || cancel.is_cancelled() {
            return outcome;
        }

        tracing::debug!(
            limit = job.limit(),
            truncated = limited.truncated(),
            "Result limit reached"
        );
        // Reaching the cap exactly as the child completes keeps its status.
        let (status, mut alerts) = match outcome {
            Outcome::Done(execution)
                if limited.truncated() && execution.status == Status::Success =>
            {
                (Status::PartialSuccess, execution.alerts)
            }
            Outcome::Done(execution) => (execution.status, execution.alerts),
            Outcome::Cancelled(alerts) => (Status::PartialSuccess, alerts),
        };
        alerts.push(Alert::limit_hit(job.child().name(), job.limit()));
        Outcome::Done(Execution::with_alerts(status, alerts))
    }

    async fn run_filter(
        &self,
        job: &FilterJob,
        cancel: CancellationToken,
        sink: &dyn ResultSink,
    ) -> Outcome {
        let filtered = FilterSink::new(sink, job.checker());
        self.run_node(job.child(), cancel, &filtered).await
    }
}

/// Cancel the remaining branches and wait for them to stop. Their statuses
/// no longer matter, but alerts they raised are kept.
async fn wind_down(scope: &CancellationToken, mut branches: Branches<'_>) -> Vec<Alert> {
    scope.cancel();
    let mut alerts = Vec::new();
    while let Some(outcome) = branches.next().await {
        alerts.extend(outcome.into_alerts());
    }
    alerts
}
