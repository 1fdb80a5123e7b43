//! The leaf search capability.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::execution::Status;
use crate::sink::ResultSink;

/// A terminal unit of search work (text, symbol, structural, commit...).
///
/// Implementations stream matches into `sink` as they are found and must
/// check `cancel` between units of work, returning promptly once it fires.
/// Returning an error is a hard failure; stopping because of cancellation is
/// not an error. Return `Status::Success` only when the search ran to
/// completion.
///
/// `run` is polled on the same task as its sibling branches, so it must never
/// block the thread. Wrap blocking work in `tokio::task::spawn_blocking`,
/// otherwise siblings and `TIMEOUT` deadlines stall until it returns.
#[async_trait]
pub trait SearchJob: Send + Sync {
    /// Stable name used in logs and plan renderings.
    fn name(&self) -> &str;

    async fn run(
        &self,
        cancel: CancellationToken,
        sink: &dyn ResultSink,
    ) -> Result<Status, JobError>;
}
