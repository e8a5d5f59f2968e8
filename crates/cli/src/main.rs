//! `issue-graph` entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse arguments** into a [`traversal::TraversalConfig`].
//! 2. **Wire logging**: `tracing-subscriber` on stderr, filtered by
//!    `RUST_LOG`, optionally as JSON lines.
//! 3. **Construct infrastructure**: a retrying [`github::HttpTransport`]
//!    behind [`github::GitHubIssueSource`], injected into the
//!    [`traversal::TraversalEngine`].
//! 4. **Run and render**: Ctrl-C cancels the run; the finished graph goes to
//!    stdout in the requested format and advisories go to stderr.

mod args;
mod logging;
mod render;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use github::{GitHubIssueSource, HttpTransport, Retrying};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use traversal::TraversalEngine;

use crate::args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_json);
    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let transport = HttpTransport::new(args.api_url.as_str(), args.token())
        .context("failed to build the GitHub HTTP client")?;
    let source = Arc::new(GitHubIssueSource::new(Retrying::new(transport)));
    let engine = TraversalEngine::new(source);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling traversal");
                cancel.cancel();
            }
        }
    });

    let outcome = engine
        .run_until_cancelled(args.traversal_config(), cancel)
        .await
        .context("traversal failed")?;

    for advisory in &outcome.advisories {
        eprintln!("warning: {advisory}");
    }
    for node in &outcome.failed_nodes {
        eprintln!("warning: {node} could not be fetched");
    }
    info!(
        run_id = %outcome.run_id,
        nodes = outcome.graph.node_count(),
        edges = outcome.graph.edge_count(),
        timeline_fetches = outcome.stats.timeline_fetches,
        timeline_cache_hits = outcome.stats.timeline_cache_hits,
        "Rendering graph"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render::render(&outcome.graph, args.format, &mut out).context("failed to write output")?;
    out.flush().context("failed to write output")?;
    Ok(())
}
