//! Search plan execution.
//!
//! Core components:
//! - `status`: Status, alerts, and the per-run `Execution` summary
//! - `combinators`: how each node kind runs its branches
//!
//! [`Executor::run`] walks a [`Job`] tree, streaming matches into a sink and
//! returning the aggregate status. Cancelling the token handed to `run` stops
//! the whole tree; matches already streamed stay with the caller.

mod combinators;
pub mod status;

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::job::Job;
use crate::printer;
use crate::result::SearchEvent;
use crate::sink::{ChannelSink, ResultSink};

pub use status::{Alert, AlertKind, Execution, Status};
use status::Outcome;

/// Runs search plans.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `job`, streaming matches into `sink`.
    ///
    /// Each call is an independent execution; the same tree may be run any
    /// number of times.
    pub async fn run(
        &self,
        job: &Job,
        cancel: CancellationToken,
        sink: &dyn ResultSink,
    ) -> Execution {
        let execution_id = Uuid::new_v4();
        let span = tracing::info_span!("search_plan", %execution_id, root = %job.name());

        async move {
            if self.config.log_plan {
                tracing::debug!(plan = %printer::sexp(job), "Executing search plan");
            }
            tracing::info!(
                nodes = job.node_count(),
                leaves = job.leaf_count(),
                "Search plan started"
            );

            let started = Instant::now();
            let execution = match self.run_node(job, cancel, sink).await {
                Outcome::Done(execution) => execution,
                Outcome::Cancelled(mut alerts) => {
                    tracing::info!("Search plan cancelled by caller");
                    alerts.push(Alert::cancelled(job.name()));
                    Execution::with_alerts(Status::PartialSuccess, alerts)
                }
            };

            tracing::info!(
                status = %execution.status,
                alerts = execution.alerts.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Search plan finished"
            );
            execution
        }
        .instrument(span)
        .await
    }

    /// Execute `job` on a background task, streaming batches through a
    /// bounded channel sized by `result_buffer`.
    ///
    /// Dropping the stream does not stop the search; cancel the token for
    /// that.
    pub fn spawn(
        &self,
        job: Arc<Job>,
        cancel: CancellationToken,
    ) -> (ReceiverStream<SearchEvent>, JoinHandle<Execution>) {
        let (sink, stream) = ChannelSink::new(self.config.result_buffer);
        let executor = self.clone();
        let handle = tokio::spawn(async move { executor.run(&job, cancel, &sink).await });
        (stream, handle)
    }
}
