//! The node abstraction and the model registry used to instantiate nodes
//! from documents.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, OnceLock, RwLock};

use serde_json::Value;

use crate::error::{GraphError, NodeError};
use crate::port::{Input, InputPortAny, Output, OutputPortAny, PortAny, PortData, PortOwner};
use crate::registry::TypeRegistry;

/// Shared handle to a node. Graphs, links and callers all hold these.
pub type NodeHandle = Rc<RefCell<dyn Node>>;

/// Common state embedded in every node: its names and its port lists.
pub struct NodeBase {
    instance_name: String,
    model_name: String,
    inputs: Vec<Box<dyn InputPortAny>>,
    outputs: Vec<Box<dyn OutputPortAny>>,
}

impl NodeBase {
    pub fn new(instance_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        NodeBase {
            instance_name: instance_name.into(),
            model_name: model_name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub(crate) fn set_instance_name(&mut self, name: impl Into<String>) {
        self.instance_name = name.into();
    }

    /// Expose a typed input on this node's erased interface.
    pub fn add_input<T: PortData>(&mut self, port: &Input<T>) {
        self.inputs.push(Box::new(port.clone()));
    }

    /// Expose a typed output on this node's erased interface.
    pub fn add_output<T: PortData>(&mut self, port: &Output<T>) {
        self.outputs.push(Box::new(port.clone()));
    }

    pub fn add_input_erased(&mut self, port: Box<dyn InputPortAny>) {
        self.inputs.push(port);
    }

    pub fn add_output_erased(&mut self, port: Box<dyn OutputPortAny>) {
        self.outputs.push(port);
    }

    pub fn inputs(&self) -> &[Box<dyn InputPortAny>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Box<dyn OutputPortAny>] {
        &self.outputs
    }

    pub fn input_by_name(&self, name: &str) -> Option<&dyn InputPortAny> {
        self.inputs
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub fn output_by_name(&self, name: &str) -> Option<&dyn OutputPortAny> {
        self.outputs
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub(crate) fn clear_ports(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }

    pub(crate) fn stamp_ports(&self, owner: Option<PortOwner>) {
        for port in &self.inputs {
            port.set_owner(owner);
        }
        for port in &self.outputs {
            port.set_owner(owner);
        }
    }
}

/// Context handed to nodes when serializing their parameters.
pub struct SaveCtx<'a> {
    pub types: &'a TypeRegistry,
}

/// Context handed to nodes when restoring from a document.
pub struct LoadCtx<'a> {
    pub types: &'a TypeRegistry,
    pub nodes: &'a NodeRegistry,
}

/// A computation unit of a graph.
///
/// Implementors embed a [`NodeBase`] and register their typed ports on it;
/// everything else has a default. `execute()` reads inputs, computes, and
/// publishes outputs.
pub trait Node {
    fn base(&self) -> &NodeBase;
    fn base_mut(&mut self) -> &mut NodeBase;

    /// One-time setup after a successful compile. Reset transient state here.
    fn init(&mut self) {}

    /// Per-node structural validation, run at the start of graph compilation.
    fn compile(&mut self) -> Result<(), GraphError> {
        Ok(())
    }

    /// Run the node once. Inputs are guaranteed linked when mandatory.
    fn execute(&mut self) -> Result<(), NodeError>;

    /// Node-specific parameters for the document `data` field.
    fn to_params(&self, _ctx: &SaveCtx) -> Value {
        Value::Null
    }

    /// Restore node-specific parameters from a document.
    fn apply_params(&mut self, _params: &Value, _ctx: &LoadCtx) -> Result<(), NodeError> {
        Ok(())
    }

    /// Boundary ports, for nodes that are themselves graphs.
    fn interfaces(&self) -> Vec<&dyn PortAny> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn instance_name(&self) -> &str {
        self.base().instance_name()
    }

    fn model_name(&self) -> &str {
        self.base().model_name()
    }
}

/// Builds a node instance from a document entry.
pub type NodeCreator =
    Arc<dyn Fn(&str, &Value, &LoadCtx) -> Result<NodeHandle, GraphError> + Send + Sync>;

/// Registry of node models, keyed by model name.
#[derive(Default)]
pub struct NodeRegistry {
    creators: HashMap<String, NodeCreator>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a creator under a model name, replacing any previous one.
    pub fn register(&mut self, model_name: &str, creator: NodeCreator) {
        self.creators.insert(model_name.to_owned(), creator);
    }

    pub fn is_registered(&self, model_name: &str) -> bool {
        self.creators.contains_key(model_name)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.creators.keys().map(String::as_str)
    }

    /// Instantiate a model. Fails when the model is unknown or its
    /// parameters cannot be applied.
    pub fn create(
        &self,
        model_name: &str,
        instance_name: &str,
        params: &Value,
        ctx: &LoadCtx,
    ) -> Result<NodeHandle, GraphError> {
        let creator = self.creators.get(model_name).ok_or_else(|| GraphError::Doc {
            what: format!("unknown node model '{model_name}'"),
        })?;
        creator(instance_name, params, ctx)
    }

    /// Process-wide default registry.
    pub fn global() -> &'static RwLock<NodeRegistry> {
        static GLOBAL: OnceLock<RwLock<NodeRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| RwLock::new(NodeRegistry::new()))
    }
}

/// Wrap a plain constructor into a [`NodeCreator`] that also applies the
/// document parameters.
pub fn creator_of<N, F>(ctor: F) -> NodeCreator
where
    N: Node + 'static,
    F: Fn(&str) -> N + Send + Sync + 'static,
{
    Arc::new(move |instance_name, params, ctx| {
        let mut node = ctor(instance_name);
        node.apply_params(params, ctx).map_err(|err| GraphError::Doc {
            what: format!("node '{instance_name}': {err}"),
        })?;
        let handle: NodeHandle = Rc::new(RefCell::new(node));
        Ok(handle)
    })
}
