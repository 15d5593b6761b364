//! The graph document model: the serde schema graphs are saved to and
//! restored from, independent of concrete encoding (JSON, YAML).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GraphError;
use crate::graph::{Graph, GRAPH_MODEL};
use crate::io_node::{GRAPH_INPUT_MODEL, GRAPH_OUTPUT_MODEL};
use crate::node::{LoadCtx, Node, SaveCtx};

/// Top-level graph document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDoc {
    pub model: ModelRef,
    #[serde(flatten)]
    pub body: GraphBody,
}

/// Model and instance identification shared by graphs and nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub instance: String,
}

/// The structural content of a graph: also the `data` payload of an
/// embedded graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphBody {
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    #[serde(default)]
    pub connections: Vec<LinkDoc>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDoc {
    pub model: ModelRef,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDoc {
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
    pub to_port: String,
}

impl Graph {
    /// Serialize this graph into a document.
    pub fn to_doc(&self, ctx: &SaveCtx) -> GraphDoc {
        GraphDoc {
            model: ModelRef {
                kind: GRAPH_MODEL.to_owned(),
                instance: self.instance_name().to_owned(),
            },
            body: body_of(self, ctx),
        }
    }

    /// Rebuild a graph from a document. The result is left uncompiled.
    pub fn from_doc(doc: &GraphDoc, ctx: &LoadCtx) -> Result<Graph, GraphError> {
        if doc.model.kind != GRAPH_MODEL {
            return Err(GraphError::Doc {
                what: format!("expected a '{GRAPH_MODEL}' document, got '{}'", doc.model.kind),
            });
        }
        let mut graph = Graph::new(doc.model.instance.as_str());
        apply_body(&mut graph, &doc.body, ctx)?;
        Ok(graph)
    }
}

fn body_of(graph: &Graph, ctx: &SaveCtx) -> GraphBody {
    let mut nodes = Vec::with_capacity(graph.nodes.len());
    for entry in &graph.nodes {
        let node = entry.node.borrow();
        nodes.push(NodeDoc {
            model: ModelRef {
                kind: node.model_name().to_owned(),
                instance: node.instance_name().to_owned(),
            },
            data: node.to_params(ctx),
        });
    }
    let mut connections = Vec::with_capacity(graph.links.len());
    for link in &graph.links {
        let (Some(from_node), Some(to_node)) =
            (graph.instance_of(link.from), graph.instance_of(link.to))
        else {
            continue;
        };
        connections.push(LinkDoc {
            from_node,
            from_port: link.from_port.clone(),
            to_node,
            to_port: link.to_port.clone(),
        });
    }
    GraphBody {
        nodes,
        connections,
        metadata: graph.metadata.clone(),
    }
}

fn apply_body(graph: &mut Graph, body: &GraphBody, ctx: &LoadCtx) -> Result<(), GraphError> {
    for node_doc in &body.nodes {
        let instance = node_doc.model.instance.as_str();
        match node_doc.model.kind.as_str() {
            GRAPH_INPUT_MODEL => {
                let (id, sentinel) = graph.input_sentinel()?;
                let old = sentinel.borrow().instance_name().to_owned();
                if old != instance {
                    graph.rename_node(&old, instance)?;
                }
                sentinel
                    .borrow_mut()
                    .apply_params(&node_doc.data, ctx)
                    .map_err(|err| GraphError::Doc {
                        what: format!("boundary node '{instance}': {err}"),
                    })?;
                graph.restamp_node(id);
            }
            GRAPH_OUTPUT_MODEL => {
                let (id, sentinel) = graph.output_sentinel()?;
                let old = sentinel.borrow().instance_name().to_owned();
                if old != instance {
                    graph.rename_node(&old, instance)?;
                }
                sentinel
                    .borrow_mut()
                    .apply_params(&node_doc.data, ctx)
                    .map_err(|err| GraphError::Doc {
                        what: format!("boundary node '{instance}': {err}"),
                    })?;
                graph.restamp_node(id);
            }
            model => {
                let node = ctx.nodes.create(model, instance, &node_doc.data, ctx)?;
                graph.add_node(node)?;
            }
        }
    }
    for link in &body.connections {
        graph.add_link_by_name(&link.from_node, &link.from_port, &link.to_node, &link.to_port)?;
    }
    graph.metadata = body.metadata.clone();
    graph.generate_ports();
    Ok(())
}

/// The `data` payload of a graph when embedded as a node.
pub(crate) fn graph_body(graph: &Graph, ctx: &SaveCtx) -> Value {
    match serde_json::to_value(body_of(graph, ctx)) {
        Ok(value) => value,
        Err(_) => Value::Null,
    }
}

/// Restore an embedded graph node from its `data` payload.
pub(crate) fn apply_graph_body(
    graph: &mut Graph,
    params: &Value,
    ctx: &LoadCtx,
) -> Result<(), GraphError> {
    let body: GraphBody =
        serde_json::from_value(params.clone()).map_err(|err| GraphError::Doc {
            what: format!("malformed embedded graph: {err}"),
        })?;
    apply_body(graph, &body, ctx)
}
