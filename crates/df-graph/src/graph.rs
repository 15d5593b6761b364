//! The graph: a container of nodes and typed links, itself usable as a node.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use df_core::NodeId;

use crate::error::{GraphError, NodeError};
use crate::io_node::{GraphIoNode, IoRole};
use crate::node::{LoadCtx, Node, NodeBase, NodeHandle, SaveCtx};
use crate::port::{
    GraphUid, Input, InputPortAny, Output, OutputPortAny, PortAny, PortData, PortOwner,
};
use crate::registry::TypeRegistry;

pub const GRAPH_MODEL: &str = "Graph";
const INPUT_SENTINEL: &str = "input";
const OUTPUT_SENTINEL: &str = "output";

pub(crate) struct NodeEntry {
    pub id: NodeId,
    pub node: NodeHandle,
}

/// An unlinked member input, addressable from outside the graph.
pub struct PortSetter {
    pub path: String,
    pub type_name: String,
    pub port: Box<dyn InputPortAny>,
}

/// An unlinked member output, readable from outside the graph.
pub struct PortGetter {
    pub path: String,
    pub type_name: String,
    pub port: Box<dyn OutputPortAny>,
}

fn doc_type_name(types: &TypeRegistry, port: &dyn PortAny) -> String {
    types
        .name_of(port.data_type())
        .map(str::to_owned)
        .unwrap_or_else(|| port.data_type_name().to_owned())
}

/// A directed link between two member ports, by node id and port name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Link {
    pub from: NodeId,
    pub from_port: String,
    pub to: NodeId,
    pub to_port: String,
}

/// An editable dataflow graph.
///
/// Nodes are added, linked, compiled and executed in place. The graph
/// implements [`Node`] itself, so a compiled graph can be embedded as a
/// member of another graph through its exposed boundary ports.
pub struct Graph {
    base: NodeBase,
    uid: GraphUid,
    pub(crate) nodes: Vec<NodeEntry>,
    pub(crate) links: Vec<Link>,
    io_in: Option<(NodeId, Rc<RefCell<GraphIoNode>>)>,
    io_out: Option<(NodeId, Rc<RefCell<GraphIoNode>>)>,
    pub(crate) schedule: Vec<Vec<NodeId>>,
    compiled: bool,
    protected: bool,
    pub(crate) metadata: Value,
    next_node_id: u32,
}

impl Graph {
    pub fn new(instance_name: impl Into<String>) -> Self {
        Graph {
            base: NodeBase::new(instance_name, GRAPH_MODEL),
            uid: GraphUid::fresh(),
            nodes: Vec::new(),
            links: Vec::new(),
            io_in: None,
            io_out: None,
            schedule: Vec::new(),
            compiled: false,
            protected: false,
            metadata: Value::Null,
            next_node_id: 0,
        }
    }

    // -- membership ---------------------------------------------------------

    /// Add an owned node, returning a typed handle to it.
    pub fn add<N: Node + 'static>(&mut self, node: N) -> Result<Rc<RefCell<N>>, GraphError> {
        let handle = Rc::new(RefCell::new(node));
        self.add_node(handle.clone())?;
        Ok(handle)
    }

    /// Add a node handle. Instance names must be unique within the graph.
    pub fn add_node(&mut self, node: NodeHandle) -> Result<NodeId, GraphError> {
        let name = node.borrow().instance_name().to_owned();
        if self.node_id(&name).is_some() {
            return Err(GraphError::DuplicateInstance { instance: name });
        }
        let id = self.fresh_node_id();
        node.borrow()
            .base()
            .stamp_ports(Some(PortOwner {
                graph: self.uid,
                node: id,
            }));
        debug!(graph = self.base.instance_name(), node = %name, "node added");
        self.nodes.push(NodeEntry { id, node });
        self.needs_recompile();
        Ok(id)
    }

    /// Remove a node and every link touching it.
    pub fn remove_node(&mut self, instance_name: &str) -> Result<(), GraphError> {
        if self.protected {
            return Err(GraphError::Protected);
        }
        let id = self
            .node_id(instance_name)
            .ok_or_else(|| GraphError::UnknownNode {
                instance: instance_name.to_owned(),
            })?;
        if self.is_sentinel(id) {
            return Err(GraphError::BoundaryNode {
                instance: instance_name.to_owned(),
            });
        }
        // Disconnect every input fed by or belonging to the node.
        let stale: Vec<Link> = self
            .links
            .iter()
            .filter(|l| l.from == id || l.to == id)
            .cloned()
            .collect();
        for link in &stale {
            if let Some(entry) = self.entry(link.to) {
                let node = entry.node.borrow();
                if let Some(port) = node.base().input_by_name(&link.to_port) {
                    port.disconnect();
                }
            }
        }
        self.links.retain(|l| l.from != id && l.to != id);
        let pos = self.nodes.iter().position(|e| e.id == id);
        if let Some(pos) = pos {
            let entry = self.nodes.remove(pos);
            entry.node.borrow().base().stamp_ports(None);
        }
        self.needs_recompile();
        Ok(())
    }

    /// Rename a member node, keeping instance names unique.
    pub fn rename_node(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        if from == to {
            return Ok(());
        }
        if self.node_id(to).is_some() {
            return Err(GraphError::DuplicateInstance {
                instance: to.to_owned(),
            });
        }
        let handle = self.node(from)?;
        handle.borrow_mut().base_mut().set_instance_name(to);
        Ok(())
    }

    pub fn node(&self, instance_name: &str) -> Result<NodeHandle, GraphError> {
        self.nodes
            .iter()
            .find(|e| e.node.borrow().instance_name() == instance_name)
            .map(|e| e.node.clone())
            .ok_or_else(|| GraphError::UnknownNode {
                instance: instance_name.to_owned(),
            })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node_id(&self, instance_name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|e| e.node.borrow().instance_name() == instance_name)
            .map(|e| e.id)
    }

    pub(crate) fn instance_of(&self, id: NodeId) -> Option<String> {
        self.entry(id)
            .map(|e| e.node.borrow().instance_name().to_owned())
    }

    pub(crate) fn entry(&self, id: NodeId) -> Option<&NodeEntry> {
        self.nodes.iter().find(|e| e.id == id)
    }

    fn fresh_node_id(&mut self) -> NodeId {
        let id = NodeId::from_index(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    /// Re-stamp a member's ports, for nodes whose ports were rebuilt after
    /// being added.
    pub(crate) fn restamp_node(&self, id: NodeId) {
        if let Some(entry) = self.entry(id) {
            entry.node.borrow().base().stamp_ports(Some(PortOwner {
                graph: self.uid,
                node: id,
            }));
        }
    }

    fn is_sentinel(&self, id: NodeId) -> bool {
        self.io_in.as_ref().map(|(i, _)| *i == id).unwrap_or(false)
            || self.io_out.as_ref().map(|(i, _)| *i == id).unwrap_or(false)
    }

    pub(crate) fn input_sentinel_id(&self) -> Option<NodeId> {
        self.io_in.as_ref().map(|(id, _)| *id)
    }

    // -- links --------------------------------------------------------------

    /// Link an output of `from` to an input of `to`, both member nodes.
    pub fn add_link(
        &mut self,
        from: &NodeHandle,
        from_port: &str,
        to: &NodeHandle,
        to_port: &str,
    ) -> Result<(), GraphError> {
        let from_name = from.borrow().instance_name().to_owned();
        let to_name = to.borrow().instance_name().to_owned();
        self.add_link_by_name(&from_name, from_port, &to_name, to_port)
    }

    /// Link by instance and port names, as graph documents do.
    pub fn add_link_by_name(
        &mut self,
        from_node: &str,
        from_port: &str,
        to_node: &str,
        to_port: &str,
    ) -> Result<(), GraphError> {
        let from_id = self
            .node_id(from_node)
            .ok_or_else(|| GraphError::UnknownNode {
                instance: from_node.to_owned(),
            })?;
        let to_id = self.node_id(to_node).ok_or_else(|| GraphError::UnknownNode {
            instance: to_node.to_owned(),
        })?;
        self.link_ids(from_id, from_port, to_id, to_port)
    }

    /// Link two bare port handles, resolving their member nodes through the
    /// ownership stamps set by `add_node`.
    pub fn add_link_ports(
        &mut self,
        from: &dyn OutputPortAny,
        to: &dyn InputPortAny,
    ) -> Result<(), GraphError> {
        let from_owner = self.member_owner(from)?;
        let to_owner = self.member_owner(to)?;
        self.link_ids(from_owner.node, from.name(), to_owner.node, to.name())
    }

    fn member_owner(&self, port: &dyn PortAny) -> Result<PortOwner, GraphError> {
        match port.owner() {
            Some(owner) if owner.graph == self.uid => Ok(owner),
            _ => Err(GraphError::NotAMember {
                instance: port.name().to_owned(),
            }),
        }
    }

    fn link_ids(
        &mut self,
        from_id: NodeId,
        from_port: &str,
        to_id: NodeId,
        to_port: &str,
    ) -> Result<(), GraphError> {
        if self.input_sentinel_id() == Some(from_id)
            && self.io_out.as_ref().map(|(i, _)| *i) == Some(to_id)
        {
            return Err(GraphError::InvalidLink {
                what: "cannot link a graph input directly to a graph output".into(),
            });
        }
        let from_entry = self.entry(from_id).ok_or(GraphError::NotAMember {
            instance: from_port.to_owned(),
        })?;
        let to_entry = self.entry(to_id).ok_or(GraphError::NotAMember {
            instance: to_port.to_owned(),
        })?;
        let from_node = from_entry.node.borrow();
        let to_node = to_entry.node.borrow();
        let out = from_node
            .base()
            .output_by_name(from_port)
            .ok_or_else(|| GraphError::UnknownPort {
                node: from_node.instance_name().to_owned(),
                port: from_port.to_owned(),
                dir: "output",
            })?;
        let input = to_node
            .base()
            .input_by_name(to_port)
            .ok_or_else(|| GraphError::UnknownPort {
                node: to_node.instance_name().to_owned(),
                port: to_port.to_owned(),
                dir: "input",
            })?;
        input.connect_erased(out)?;
        drop(from_node);
        drop(to_node);
        self.links.push(Link {
            from: from_id,
            from_port: from_port.to_owned(),
            to: to_id,
            to_port: to_port.to_owned(),
        });
        self.needs_recompile();
        Ok(())
    }

    /// Remove the incoming link of a member input port. Returns whether a
    /// link existed.
    pub fn remove_link(&mut self, node: &str, in_port: &str) -> Result<bool, GraphError> {
        if self.protected {
            return Err(GraphError::Protected);
        }
        let id = self.node_id(node).ok_or_else(|| GraphError::UnknownNode {
            instance: node.to_owned(),
        })?;
        let handle = self.node(node)?;
        let removed = {
            let node_ref = handle.borrow();
            let port = node_ref
                .base()
                .input_by_name(in_port)
                .ok_or_else(|| GraphError::UnknownPort {
                    node: node.to_owned(),
                    port: in_port.to_owned(),
                    dir: "input",
                })?;
            port.disconnect()
        };
        if removed {
            self.links.retain(|l| !(l.to == id && l.to_port == in_port));
            self.needs_recompile();
        }
        Ok(removed)
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    // -- boundary -----------------------------------------------------------

    /// Expose a typed graph input. Returns the inner output port member
    /// nodes link from.
    pub fn expose_input<T: PortData>(
        &mut self,
        name: &str,
        types: &TypeRegistry,
    ) -> Result<Output<T>, GraphError> {
        let (id, sentinel) = self.input_sentinel()?;
        let (outer, inner) = sentinel.borrow_mut().add_pair::<T>(name, types)?;
        self.stamp_sentinel_pair(&outer, &inner, id);
        self.generate_ports();
        self.needs_recompile();
        Ok(inner)
    }

    /// Expose a typed graph output. Returns the inner input port member
    /// nodes link into.
    pub fn expose_output<T: PortData>(
        &mut self,
        name: &str,
        types: &TypeRegistry,
    ) -> Result<Input<T>, GraphError> {
        let (id, sentinel) = self.output_sentinel()?;
        let (inner, outer) = sentinel.borrow_mut().add_pair::<T>(name, types)?;
        self.stamp_sentinel_pair(&inner, &outer, id);
        self.generate_ports();
        self.needs_recompile();
        Ok(inner)
    }

    fn stamp_sentinel_pair<A: PortData, B: PortData>(
        &self,
        input: &Input<A>,
        out: &Output<B>,
        id: NodeId,
    ) {
        let owner = Some(PortOwner {
            graph: self.uid,
            node: id,
        });
        PortAny::set_owner(input, owner);
        PortAny::set_owner(out, owner);
    }

    pub(crate) fn input_sentinel(
        &mut self,
    ) -> Result<(NodeId, Rc<RefCell<GraphIoNode>>), GraphError> {
        if let Some((id, sentinel)) = &self.io_in {
            return Ok((*id, sentinel.clone()));
        }
        let sentinel = Rc::new(RefCell::new(GraphIoNode::new(INPUT_SENTINEL, IoRole::Input)));
        let id = self.add_node(sentinel.clone())?;
        self.io_in = Some((id, sentinel.clone()));
        Ok((id, sentinel))
    }

    pub(crate) fn output_sentinel(
        &mut self,
    ) -> Result<(NodeId, Rc<RefCell<GraphIoNode>>), GraphError> {
        if let Some((id, sentinel)) = &self.io_out {
            return Ok((*id, sentinel.clone()));
        }
        let sentinel = Rc::new(RefCell::new(GraphIoNode::new(
            OUTPUT_SENTINEL,
            IoRole::Output,
        )));
        let id = self.add_node(sentinel.clone())?;
        self.io_out = Some((id, sentinel.clone()));
        Ok((id, sentinel))
    }

    /// Mirror the sentinels' boundary ports onto the graph's own node base,
    /// so an embedding graph sees them as ordinary ports.
    pub(crate) fn generate_ports(&mut self) {
        self.base.clear_ports();
        let (outer_inputs, outer_outputs) = {
            let mut ins = Vec::new();
            let mut outs = Vec::new();
            if let Some((_, sentinel)) = &self.io_in {
                for port in sentinel.borrow().base().inputs() {
                    ins.push(port.clone_handle());
                }
            }
            if let Some((_, sentinel)) = &self.io_out {
                for port in sentinel.borrow().base().outputs() {
                    outs.push(port.clone_handle());
                }
            }
            (ins, outs)
        };
        for port in outer_inputs {
            self.base.add_input_erased(port);
        }
        for port in outer_outputs {
            self.base.add_output_erased(port);
        }
    }

    /// Set the default of an exposed graph input.
    pub fn set_input_default<T: PortData>(&self, name: &str, value: T) -> Result<(), GraphError> {
        let port = self
            .base
            .input_by_name(name)
            .ok_or_else(|| GraphError::UnknownPort {
                node: self.base.instance_name().to_owned(),
                port: name.to_owned(),
                dir: "input",
            })?;
        let typed = port
            .as_any()
            .downcast_ref::<Input<T>>()
            .ok_or_else(|| GraphError::TypeMismatch {
                from_port: name.to_owned(),
                from_type: std::any::type_name::<T>().to_owned(),
                to_port: name.to_owned(),
                to_type: port.data_type_name().to_owned(),
            })?;
        typed.set_default(value);
        Ok(())
    }

    /// Read the value of an exposed graph output after execution.
    pub fn output_data<T: PortData>(&self, name: &str) -> Result<T, GraphError> {
        let port = self
            .base
            .output_by_name(name)
            .ok_or_else(|| GraphError::UnknownPort {
                node: self.base.instance_name().to_owned(),
                port: name.to_owned(),
                dir: "output",
            })?;
        let typed = port
            .as_any()
            .downcast_ref::<Output<T>>()
            .ok_or_else(|| GraphError::TypeMismatch {
                from_port: name.to_owned(),
                from_type: port.data_type_name().to_owned(),
                to_port: name.to_owned(),
                to_type: std::any::type_name::<T>().to_owned(),
            })?;
        typed.data().ok_or_else(|| GraphError::NoData {
            port: name.to_owned(),
        })
    }

    // -- dangling ports -----------------------------------------------------

    /// Unlinked member inputs: the graph's effective free parameters.
    /// Each entry carries an `instance.port` path, the document type name
    /// and a cloned handle usable with [`TypeRegistry::set_input`].
    pub fn input_setters(&self, types: &TypeRegistry) -> Vec<PortSetter> {
        let mut setters = Vec::new();
        for entry in &self.nodes {
            let node = entry.node.borrow();
            for port in node.base().inputs() {
                if !port.is_linked() {
                    setters.push(PortSetter {
                        path: format!("{}.{}", node.instance_name(), port.name()),
                        type_name: doc_type_name(types, port.as_ref()),
                        port: port.clone_handle(),
                    });
                }
            }
        }
        setters
    }

    /// Unlinked member outputs, mirroring [`Self::input_setters`]; handles
    /// are usable with [`TypeRegistry::get_output`].
    pub fn output_getters(&self, types: &TypeRegistry) -> Vec<PortGetter> {
        let mut getters = Vec::new();
        for entry in &self.nodes {
            let node = entry.node.borrow();
            for port in node.base().outputs() {
                if !port.is_linked() {
                    getters.push(PortGetter {
                        path: format!("{}.{}", node.instance_name(), port.name()),
                        type_name: doc_type_name(types, port.as_ref()),
                        port: port.clone_handle(),
                    });
                }
            }
        }
        getters
    }

    // -- state --------------------------------------------------------------

    pub(crate) fn needs_recompile(&mut self) {
        self.compiled = false;
        self.schedule.clear();
    }

    pub(crate) fn mark_compiled(&mut self) {
        self.compiled = true;
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// The compiled schedule as instance names, level by level.
    pub fn nodes_by_level(&self) -> Vec<Vec<String>> {
        self.schedule
            .iter()
            .map(|level| {
                level
                    .iter()
                    .filter_map(|id| self.instance_of(*id))
                    .collect()
            })
            .collect()
    }

    /// Protect the graph's structure against node and link removal.
    pub fn set_protected(&mut self, protected: bool) {
        self.protected = protected;
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: Value) {
        self.metadata = metadata;
    }
}

impl Node for Graph {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn compile(&mut self) -> Result<(), GraphError> {
        Graph::compile(self)
    }

    fn execute(&mut self) -> Result<(), NodeError> {
        let report = Graph::execute(self).map_err(|err| NodeError::Other(err.to_string()))?;
        if report.success() {
            Ok(())
        } else {
            Err(NodeError::Subgraph {
                node: self.base.instance_name().to_owned(),
                failed: report.failures.len(),
            })
        }
    }

    fn to_params(&self, ctx: &SaveCtx) -> Value {
        crate::doc::graph_body(self, ctx)
    }

    fn apply_params(&mut self, params: &Value, ctx: &LoadCtx) -> Result<(), NodeError> {
        crate::doc::apply_graph_body(self, params, ctx)
            .map_err(|err| NodeError::Other(err.to_string()))
    }

    fn interfaces(&self) -> Vec<&dyn PortAny> {
        let mut ports: Vec<&dyn PortAny> = Vec::new();
        for port in self.base.inputs() {
            ports.push(port.as_ref() as &dyn PortAny);
        }
        for port in self.base.outputs() {
            ports.push(port.as_ref() as &dyn PortAny);
        }
        ports
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
