//! df-project: graph documents on disk.
//!
//! JSON and YAML encodings of the df-graph document model, chosen by file
//! extension, plus a structural validation pass usable without registries.

pub mod validate;

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use df_graph::{Graph, GraphDoc, GraphError, LoadCtx, SaveCtx};

pub use validate::{validate_doc, ValidationError};

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unsupported document extension '{ext}' (expected json, yaml or yml)")]
    UnsupportedFormat { ext: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

fn format_of(path: &Path) -> Result<Format, ProjectError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "json" => Ok(Format::Json),
        "yaml" | "yml" => Ok(Format::Yaml),
        _ => Err(ProjectError::UnsupportedFormat { ext }),
    }
}

/// Read and validate a graph document, without instantiating nodes.
pub fn read_doc(path: impl AsRef<Path>) -> Result<GraphDoc, ProjectError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let doc: GraphDoc = match format_of(path)? {
        Format::Json => serde_json::from_str(&text)?,
        Format::Yaml => serde_yaml::from_str(&text)?,
    };
    validate_doc(&doc)?;
    Ok(doc)
}

/// Write a graph document, encoding by file extension.
pub fn write_doc(path: impl AsRef<Path>, doc: &GraphDoc) -> Result<(), ProjectError> {
    let path = path.as_ref();
    let text = match format_of(path)? {
        Format::Json => serde_json::to_string_pretty(doc)?,
        Format::Yaml => serde_yaml::to_string(doc)?,
    };
    fs::write(path, text)?;
    Ok(())
}

/// Load a graph from a document file, instantiating nodes through the
/// registries in `ctx`. The graph is returned uncompiled.
pub fn load_graph(path: impl AsRef<Path>, ctx: &LoadCtx) -> Result<Graph, ProjectError> {
    let path = path.as_ref();
    let doc = read_doc(path)?;
    let graph = Graph::from_doc(&doc, ctx)?;
    info!(path = %path.display(), nodes = graph.node_count(), "graph loaded");
    Ok(graph)
}

/// Save a graph to a document file.
pub fn save_graph(
    path: impl AsRef<Path>,
    graph: &Graph,
    ctx: &SaveCtx,
) -> Result<(), ProjectError> {
    let path = path.as_ref();
    write_doc(path, &graph.to_doc(ctx))?;
    info!(path = %path.display(), nodes = graph.node_count(), "graph saved");
    Ok(())
}
