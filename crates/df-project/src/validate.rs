//! Structural document validation, independent of any registry.

use thiserror::Error;

use df_graph::{GraphBody, GraphDoc, GRAPH_MODEL};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("document root must be a 'Graph', got '{kind}'")]
    NotAGraph { kind: String },

    #[error("graph '{graph}': empty node instance name")]
    EmptyInstance { graph: String },

    #[error("graph '{graph}': duplicate node instance '{instance}'")]
    DuplicateInstance { graph: String, instance: String },

    #[error("graph '{graph}': connection references unknown node '{node}'")]
    DanglingEndpoint { graph: String, node: String },

    #[error("graph '{graph}': embedded graph '{instance}' has a malformed body: {why}")]
    MalformedEmbedded {
        graph: String,
        instance: String,
        why: String,
    },
}

/// Check a document for structural problems a loader would trip on:
/// duplicate or empty instance names and links to unknown nodes, at every
/// nesting level.
pub fn validate_doc(doc: &GraphDoc) -> Result<(), ValidationError> {
    if doc.model.kind != GRAPH_MODEL {
        return Err(ValidationError::NotAGraph {
            kind: doc.model.kind.clone(),
        });
    }
    validate_body(&doc.model.instance, &doc.body)
}

fn validate_body(graph: &str, body: &GraphBody) -> Result<(), ValidationError> {
    let mut seen: Vec<&str> = Vec::new();
    for node in &body.nodes {
        let instance = node.model.instance.as_str();
        if instance.is_empty() {
            return Err(ValidationError::EmptyInstance {
                graph: graph.to_owned(),
            });
        }
        if seen.contains(&instance) {
            return Err(ValidationError::DuplicateInstance {
                graph: graph.to_owned(),
                instance: instance.to_owned(),
            });
        }
        seen.push(instance);
    }
    for link in &body.connections {
        for node in [&link.from_node, &link.to_node] {
            if !seen.contains(&node.as_str()) {
                return Err(ValidationError::DanglingEndpoint {
                    graph: graph.to_owned(),
                    node: node.clone(),
                });
            }
        }
    }
    // Recurse into embedded graphs.
    for node in &body.nodes {
        if node.model.kind == GRAPH_MODEL && !node.data.is_null() {
            let body: GraphBody =
                serde_json::from_value(node.data.clone()).map_err(|err| {
                    ValidationError::MalformedEmbedded {
                        graph: graph.to_owned(),
                        instance: node.model.instance.clone(),
                        why: err.to_string(),
                    }
                })?;
            validate_body(&node.model.instance, &body)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_graph::GraphDoc;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> GraphDoc {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepts_a_well_formed_document() {
        let doc = doc(json!({
            "model": { "type": "Graph", "instance": "g" },
            "nodes": [
                { "model": { "type": "Source<f64>", "instance": "a" } },
                { "model": { "type": "Sink<f64>", "instance": "s" } }
            ],
            "connections": [
                { "from_node": "a", "from_port": "out", "to_node": "s", "to_port": "in" }
            ]
        }));
        validate_doc(&doc).unwrap();
    }

    #[test]
    fn rejects_duplicate_instances() {
        let doc = doc(json!({
            "model": { "type": "Graph", "instance": "g" },
            "nodes": [
                { "model": { "type": "Source<f64>", "instance": "a" } },
                { "model": { "type": "Sink<f64>", "instance": "a" } }
            ],
            "connections": []
        }));
        assert!(matches!(
            validate_doc(&doc),
            Err(ValidationError::DuplicateInstance { .. })
        ));
    }

    #[test]
    fn rejects_dangling_connections() {
        let doc = doc(json!({
            "model": { "type": "Graph", "instance": "g" },
            "nodes": [
                { "model": { "type": "Source<f64>", "instance": "a" } }
            ],
            "connections": [
                { "from_node": "a", "from_port": "out", "to_node": "ghost", "to_port": "in" }
            ]
        }));
        assert!(matches!(
            validate_doc(&doc),
            Err(ValidationError::DanglingEndpoint { .. })
        ));
    }

    #[test]
    fn recurses_into_embedded_graphs() {
        let doc = doc(json!({
            "model": { "type": "Graph", "instance": "outer" },
            "nodes": [
                {
                    "model": { "type": "Graph", "instance": "inner" },
                    "data": {
                        "nodes": [
                            { "model": { "type": "Source<f64>", "instance": "x" } },
                            { "model": { "type": "Source<f64>", "instance": "x" } }
                        ],
                        "connections": []
                    }
                }
            ],
            "connections": []
        }));
        assert!(matches!(
            validate_doc(&doc),
            Err(ValidationError::DuplicateInstance { ref graph, .. }) if graph == "inner"
        ));
    }
}
