//! Command-line arguments.

use clap::{Parser, ValueEnum};
use github::DEFAULT_API_URL;
use graph::NodeKey;
use traversal::{TraversalConfig, DEFAULT_MAX_DEPTH, DEFAULT_NODE_BUDGET};

/// Output format for the reference graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented adjacency list.
    Text,
    /// JSON object keyed by issue.
    Json,
    /// Graphviz digraph.
    Dot,
}

#[derive(Debug, Parser)]
#[command(name = "issue-graph", version)]
#[command(about = "Map how GitHub issues reference each other", long_about = None)]
pub struct Args {
    /// Seed issues, as owner/repo#N or issue URLs
    #[arg(required = true)]
    pub seeds: Vec<NodeKey>,

    /// Maximum distance from the seeds to expand
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub depth: u32,

    /// Also expand issues outside the seeds' repositories
    #[arg(long)]
    pub cross_repo: bool,

    /// Maximum number of distinct issues to discover (0 = unlimited)
    #[arg(long, default_value_t = DEFAULT_NODE_BUDGET)]
    pub max_nodes: usize,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// GitHub API root
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// GitHub token; GH_TOKEN is used when GITHUB_TOKEN is unset
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    pub fn traversal_config(&self) -> TraversalConfig {
        TraversalConfig::new(self.seeds.iter().cloned())
            .with_max_depth(self.depth)
            .with_cross_repository(self.cross_repo)
            .with_node_budget(self.max_nodes)
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("GH_TOKEN").ok())
            .filter(|t| !t.is_empty())
    }
}
