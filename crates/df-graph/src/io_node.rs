//! Boundary nodes that carry values across a graph's interface.
//!
//! A graph exposes an input by adding a port pair to its input sentinel: the
//! pair's input side becomes a boundary port of the graph, and its output
//! side is linkable by member nodes. The sentinel's `execute()` relays each
//! input to its paired output. Output exposure mirrors this.

use std::any::Any;

use serde_json::{json, Value};

use crate::error::{GraphError, NodeError};
use crate::node::{LoadCtx, Node, NodeBase, SaveCtx};
use crate::port::{Input, Output, PortData};
use crate::registry::{Forwarder, TypeRegistry};

pub const GRAPH_INPUT_MODEL: &str = "GraphInput";
pub const GRAPH_OUTPUT_MODEL: &str = "GraphOutput";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoRole {
    Input,
    Output,
}

/// Sentinel node holding a graph's boundary port pairs.
pub struct GraphIoNode {
    base: NodeBase,
    role: IoRole,
    forwarders: Vec<Forwarder>,
}

impl GraphIoNode {
    pub fn new(instance_name: &str, role: IoRole) -> Self {
        let model = match role {
            IoRole::Input => GRAPH_INPUT_MODEL,
            IoRole::Output => GRAPH_OUTPUT_MODEL,
        };
        GraphIoNode {
            base: NodeBase::new(instance_name, model),
            role,
            forwarders: Vec::new(),
        }
    }

    pub fn role(&self) -> IoRole {
        self.role
    }

    /// Add a typed boundary pair. The returned `Input` faces the outside of
    /// the graph, the `Output` faces its members.
    pub fn add_pair<T: PortData>(
        &mut self,
        name: &str,
        types: &TypeRegistry,
    ) -> Result<(Input<T>, Output<T>), GraphError> {
        self.check_name(name)?;
        let input = Input::<T>::new(name);
        let out = Output::<T>::new(name);
        let fwd = types
            .forwarder(std::any::TypeId::of::<T>())
            .ok_or_else(|| GraphError::UnregisteredType {
                type_name: std::any::type_name::<T>().to_owned(),
            })?;
        self.base.add_input(&input);
        self.base.add_output(&out);
        self.forwarders.push(fwd);
        Ok((input, out))
    }

    /// Add a boundary pair from a document type name.
    pub fn add_pair_erased(
        &mut self,
        name: &str,
        type_name: &str,
        types: &TypeRegistry,
    ) -> Result<(), GraphError> {
        self.check_name(name)?;
        let input = types.make_input_port(name, type_name)?;
        let out = types.make_output_port(name, type_name)?;
        let fwd = types
            .forwarder(input.data_type())
            .ok_or_else(|| GraphError::UnregisteredType {
                type_name: type_name.to_owned(),
            })?;
        self.base.add_input_erased(input);
        self.base.add_output_erased(out);
        self.forwarders.push(fwd);
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<(), GraphError> {
        if self.base.input_by_name(name).is_some() {
            return Err(GraphError::DuplicatePort {
                node: self.base.instance_name().to_owned(),
                port: name.to_owned(),
            });
        }
        Ok(())
    }
}

impl Node for GraphIoNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn execute(&mut self) -> Result<(), NodeError> {
        for (i, fwd) in self.forwarders.iter().enumerate() {
            let input = self.base.inputs()[i].as_ref();
            let out = self.base.outputs()[i].as_ref();
            fwd(input, out)?;
        }
        Ok(())
    }

    fn to_params(&self, ctx: &SaveCtx) -> Value {
        let ports: Vec<Value> = self
            .base
            .inputs()
            .iter()
            .map(|p| {
                let type_name = ctx
                    .types
                    .name_of(p.data_type())
                    .unwrap_or_else(|| p.data_type_name());
                json!({ "name": p.name(), "type": type_name })
            })
            .collect();
        json!({ "ports": ports })
    }

    fn apply_params(&mut self, params: &Value, ctx: &LoadCtx) -> Result<(), NodeError> {
        self.base.clear_ports();
        self.forwarders.clear();
        let Some(ports) = params.get("ports").and_then(Value::as_array) else {
            return Ok(());
        };
        for port in ports {
            let name = port
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| NodeError::Other("boundary port entry has no name".into()))?;
            let type_name = port
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| NodeError::Other("boundary port entry has no type".into()))?;
            self.add_pair_erased(name, type_name, ctx.types)
                .map_err(|err| NodeError::Other(err.to_string()))?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types.register::<f64>();
        types
    }

    #[test]
    fn pairs_forward_on_execute() {
        let types = registry();
        let mut sentinel = GraphIoNode::new("input", IoRole::Input);
        let (outer, inner) = sentinel.add_pair::<f64>("speed", &types).unwrap();
        outer.set_default(3.5);
        sentinel.execute().unwrap();
        assert_eq!(inner.data(), Some(3.5));
    }

    #[test]
    fn duplicate_pair_name_rejected() {
        let types = registry();
        let mut sentinel = GraphIoNode::new("input", IoRole::Input);
        sentinel.add_pair::<f64>("speed", &types).unwrap();
        assert!(matches!(
            sentinel.add_pair::<f64>("speed", &types),
            Err(GraphError::DuplicatePort { .. })
        ));
    }

    #[test]
    fn params_round_trip_rebuilds_pairs() {
        let types = registry();
        let nodes = crate::node::NodeRegistry::new();
        let mut sentinel = GraphIoNode::new("output", IoRole::Output);
        sentinel.add_pair::<f64>("result", &types).unwrap();

        let params = sentinel.to_params(&SaveCtx { types: &types });
        let mut restored = GraphIoNode::new("output", IoRole::Output);
        restored
            .apply_params(
                &params,
                &LoadCtx {
                    types: &types,
                    nodes: &nodes,
                },
            )
            .unwrap();
        assert!(restored.base().input_by_name("result").is_some());
        assert!(restored.base().output_by_name("result").is_some());
    }

    #[test]
    fn unknown_type_fails_restore() {
        let types = registry();
        let nodes = crate::node::NodeRegistry::new();
        let mut sentinel = GraphIoNode::new("input", IoRole::Input);
        let params = json!({ "ports": [{ "name": "x", "type": "Quaternion" }] });
        assert!(sentinel
            .apply_params(
                &params,
                &LoadCtx {
                    types: &types,
                    nodes: &nodes,
                }
            )
            .is_err());
    }
}
