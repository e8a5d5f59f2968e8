//! Graph renderers: plain text, JSON and Graphviz DOT.
//!
//! All three walk [`ReferenceGraph`] in key order, so output is stable for a
//! given graph. Only expanded nodes get a header (text), a key (JSON) or a
//! vertex statement (DOT); edge targets that were never expanded appear only
//! as destinations.

use std::collections::BTreeMap;
use std::io::{self, Write};

use graph::Edge;
use serde::Serialize;
use traversal::ReferenceGraph;

use crate::args::OutputFormat;

pub fn render(
    graph: &ReferenceGraph,
    format: OutputFormat,
    out: &mut impl Write,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => write_text(graph, out),
        OutputFormat::Json => write_json(graph, out),
        OutputFormat::Dot => write_dot(graph, out),
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn write_text(graph: &ReferenceGraph, out: &mut impl Write) -> io::Result<()> {
    for (source, edges) in graph.iter() {
        writeln!(out, "{source}")?;
        for edge in edges {
            let mut meta = vec![format!("source={}", edge.provenance)];
            if let Some(actor) = &edge.actor {
                meta.push(format!("actor={actor}"));
            }
            if let Some(at) = edge.timestamp {
                meta.push(format!("at={at}"));
            }
            if let Some(action) = &edge.action {
                meta.push(format!("action={action}"));
            }
            if !edge.comment_id.is_zero() {
                meta.push(format!("comment_id={}", edge.comment_id));
            }
            writeln!(out, "  -> {}  ({})", edge.destination, meta.join(", "))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EdgeRecord<'a> {
    dest: String,
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment_id: Option<u64>,
}

impl<'a> From<&'a Edge> for EdgeRecord<'a> {
    fn from(edge: &'a Edge) -> Self {
        Self {
            dest: edge.destination.to_string(),
            source: edge.provenance.as_str(),
            actor: edge.actor.as_deref(),
            timestamp: edge.timestamp.map(|t| t.to_string()),
            action: edge.action.as_deref(),
            comment_id: (!edge.comment_id.is_zero()).then(|| edge.comment_id.as_u64()),
        }
    }
}

fn write_json(graph: &ReferenceGraph, out: &mut impl Write) -> io::Result<()> {
    let document: BTreeMap<String, Vec<EdgeRecord<'_>>> = graph
        .iter()
        .map(|(source, edges)| (source.to_string(), edges.iter().map(EdgeRecord::from).collect()))
        .collect();
    serde_json::to_writer_pretty(&mut *out, &document)?;
    writeln!(out)
}

// ---------------------------------------------------------------------------
// DOT
// ---------------------------------------------------------------------------

fn write_dot(graph: &ReferenceGraph, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "digraph G {{")?;
    for (source, edges) in graph.iter() {
        let source = escape(&source.to_string());
        if edges.is_empty() {
            writeln!(out, "  \"{source}\";")?;
        }
        for edge in edges {
            writeln!(
                out,
                "  \"{source}\" -> \"{}\" [label=\"{}\"];",
                escape(&edge.destination.to_string()),
                escape(&dot_label(edge))
            )?;
        }
    }
    writeln!(out, "}}")
}

fn dot_label(edge: &Edge) -> String {
    let mut parts = vec![format!("source={}", edge.provenance)];
    if let Some(actor) = &edge.actor {
        parts.push(format!("actor={actor}"));
    }
    if let Some(action) = &edge.action {
        parts.push(format!("action={action}"));
    }
    if let Some(at) = edge.timestamp {
        parts.push(format!("at={at}"));
    }
    parts.join(", ")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
