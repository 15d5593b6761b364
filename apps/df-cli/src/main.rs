use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use df_graph::{LoadCtx, NodeRegistry, TypeRegistry};
use df_project::{load_graph, read_doc, write_doc, ProjectError};

#[derive(Parser)]
#[command(name = "df-cli")]
#[command(about = "dagflow CLI - node graph inspection and execution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a graph document's structure
    Validate {
        /// Path to the graph file (json, yaml or yml)
        path: PathBuf,
    },
    /// List the nodes and connections of a graph document
    Show {
        /// Path to the graph file
        path: PathBuf,
    },
    /// Re-encode a graph document (format chosen by extension)
    Convert {
        /// Input graph file
        input: PathBuf,
        /// Output graph file
        output: PathBuf,
    },
    /// Load, compile and execute a graph built from standard models
    Run {
        /// Path to the graph file
        path: PathBuf,
    },
}

fn main() -> Result<(), ProjectError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => cmd_validate(&path),
        Commands::Show { path } => cmd_show(&path),
        Commands::Convert { input, output } => cmd_convert(&input, &output),
        Commands::Run { path } => cmd_run(&path),
    }
}

fn cmd_validate(path: &Path) -> Result<(), ProjectError> {
    println!("Validating graph: {}", path.display());
    read_doc(path)?;
    println!("✓ Document is valid");
    Ok(())
}

fn cmd_show(path: &Path) -> Result<(), ProjectError> {
    let doc = read_doc(path)?;
    println!("Graph '{}'", doc.model.instance);
    if doc.body.nodes.is_empty() {
        println!("  (no nodes)");
    } else {
        println!("  Nodes:");
        for node in &doc.body.nodes {
            println!("    {} [{}]", node.model.instance, node.model.kind);
        }
    }
    if !doc.body.connections.is_empty() {
        println!("  Connections:");
        for link in &doc.body.connections {
            println!(
                "    {}.{} -> {}.{}",
                link.from_node, link.from_port, link.to_node, link.to_port
            );
        }
    }
    if !doc.body.metadata.is_null() {
        println!("  Metadata: {}", doc.body.metadata);
    }
    Ok(())
}

fn cmd_convert(input: &Path, output: &Path) -> Result<(), ProjectError> {
    let doc = read_doc(input)?;
    write_doc(output, &doc)?;
    println!("✓ Wrote {}", output.display());
    Ok(())
}

fn cmd_run(path: &Path) -> Result<(), ProjectError> {
    df_nodes::install_global();
    let types = TypeRegistry::global()
        .read()
        .unwrap_or_else(|e| e.into_inner());
    let nodes = NodeRegistry::global()
        .read()
        .unwrap_or_else(|e| e.into_inner());

    let mut graph = load_graph(
        path,
        &LoadCtx {
            types: &types,
            nodes: &nodes,
        },
    )?;
    graph.compile()?;

    println!("Schedule for '{}':", path.display());
    for (depth, level) in graph.nodes_by_level().iter().enumerate() {
        println!("  level {depth}: {}", level.join(", "));
    }

    let report = graph.execute()?;
    if report.success() {
        println!("✓ Execution completed");
    } else {
        println!("✗ {} node(s) failed:", report.failures.len());
        for failure in &report.failures {
            println!("    {}: {}", failure.node, failure.error);
        }
    }

    for getter in graph.output_getters(&types) {
        if let Some(value) = types.get_output(getter.port.as_ref()) {
            println!(
                "  {} ({}) = {}",
                getter.path,
                getter.type_name,
                render(value.as_ref())
            );
        }
    }
    Ok(())
}

/// Best-effort rendering of an erased value for terminal output.
fn render(value: &dyn std::any::Any) -> String {
    if let Some(v) = value.downcast_ref::<f64>() {
        return v.to_string();
    }
    if let Some(v) = value.downcast_ref::<f32>() {
        return v.to_string();
    }
    if let Some(v) = value.downcast_ref::<i64>() {
        return v.to_string();
    }
    if let Some(v) = value.downcast_ref::<u32>() {
        return v.to_string();
    }
    if let Some(v) = value.downcast_ref::<bool>() {
        return v.to_string();
    }
    if let Some(v) = value.downcast_ref::<String>() {
        return v.clone();
    }
    "<opaque>".to_owned()
}
