//! Single-value consumers.

use std::any::Any;

use df_graph::{short_type_name, Input, Node, NodeBase, NodeError, PortData};

/// Stores the value observed on its mandatory input during a pass.
pub struct Sink<T: PortData> {
    base: NodeBase,
    input: Input<T>,
    observed: Option<T>,
}

impl<T: PortData> Sink<T> {
    pub const IN: &'static str = "in";

    pub fn model() -> String {
        format!("Sink<{}>", short_type_name::<T>())
    }

    pub fn new(instance_name: &str) -> Self {
        let input = Input::new(Self::IN);
        let mut base = NodeBase::new(instance_name, Self::model());
        base.add_input(&input);
        Sink {
            base,
            input,
            observed: None,
        }
    }

    pub fn input(&self) -> &Input<T> {
        &self.input
    }

    /// The value seen during the last pass, if any.
    pub fn data(&self) -> Option<&T> {
        self.observed.as_ref()
    }

    pub fn take(&mut self) -> Option<T> {
        self.observed.take()
    }
}

impl<T: PortData> Node for Sink<T> {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn init(&mut self) {
        self.observed = None;
    }

    fn execute(&mut self) -> Result<(), NodeError> {
        self.observed = Some(self.input.data()?);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
