use std::sync::Arc;
use std::time::Duration;

use search_job::config::ExecutorConfig;
use search_job::error::Result;
use search_job::execution::Executor;
use search_job::job::{Job, ScriptedJob};
use search_job::permissions::SubRepoPermissions;
use search_job::printer::Explain;
use search_job::result::SearchMatch;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

const REPO: &str = "github.com/acme/api";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ExecutorConfig::from_env()?;
    let plan = Arc::new(demo_plan()?);

    let explain = Explain::new(&plan);
    eprintln!("🔎 search-job v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Plan: {}", explain.sexp);
    eprintln!("\n{}\n", explain.pretty_sexp);
    eprintln!("{}", explain.mermaid);

    let executor = Executor::new(config);
    let cancel = CancellationToken::new();

    // Ctrl-C cancels the search; results streamed so far are still printed.
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, cancelling search");
            ctrl_c.cancel();
        }
    });

    let (mut stream, handle) = executor.spawn(Arc::clone(&plan), cancel);
    let mut total = 0usize;
    while let Some(event) = stream.next().await {
        for m in &event.matches {
            total += 1;
            println!("{}", serde_json::to_string(m)?);
        }
    }

    let execution = handle.await?;
    eprintln!("\n   {total} matches");
    println!("{}", serde_json::to_string_pretty(&execution)?);
    Ok(())
}

/// Text search is required; symbol search is best-effort under a deadline,
/// everything capped and filtered by the viewer's sub-repo permissions.
fn demo_plan() -> Result<Job> {
    let text = ScriptedJob::new("textsearch")
        .sleep(Duration::from_millis(20))
        .emit(vec![
            SearchMatch::content(REPO, "src/server.rs", 42, "fn serve(addr: SocketAddr)"),
            SearchMatch::content(REPO, "secrets/tls.rs", 7, "const KEY: &str = ..."),
        ])
        .sleep(Duration::from_millis(20))
        .emit(vec![SearchMatch::content(REPO, "src/client.rs", 9, "serve(addr)")]);

    let symbols = ScriptedJob::new("symbolsearch")
        .sleep(Duration::from_millis(10))
        .emit(vec![SearchMatch::symbol(REPO, "src/server.rs", 42, "serve")])
        .sleep(Duration::from_secs(5))
        .emit(vec![SearchMatch::symbol(REPO, "src/late.rs", 1, "late")]);

    let repos = ScriptedJob::new("repos").emit(vec![SearchMatch::repo(REPO)]);

    let permissions = SubRepoPermissions::builder()
        .deny(REPO, r"^secrets/")
        .build()?;

    let plan = Job::filter(
        Arc::new(permissions),
        Job::limit(
            10,
            Job::parallel([
                Job::priority(
                    Job::leaf(text),
                    Job::timeout(Duration::from_millis(50), Job::leaf(symbols)),
                ),
                Job::leaf(repos),
            ]),
        )?,
    );
    Ok(plan)
}
