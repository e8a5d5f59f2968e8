//! Subscriber setup. Everything goes to stderr; stdout carries only the graph.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "issue_graph=info,traversal=info,github=info";

pub fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    // try_init so a second call is a no-op
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
