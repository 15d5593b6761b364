//! Single-value producers.

use std::any::Any;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use df_graph::{
    short_type_name, LoadCtx, Node, NodeBase, NodeError, Output, PortData, SaveCtx,
};

/// Publishes one settable value per pass.
///
/// The value is part of the node's document parameters; `T` must therefore
/// be serde-capable.
pub struct Source<T: PortData + Serialize + DeserializeOwned> {
    base: NodeBase,
    out: Output<T>,
    value: Option<T>,
}

impl<T: PortData + Serialize + DeserializeOwned> Source<T> {
    pub const OUT: &'static str = "out";

    pub fn model() -> String {
        format!("Source<{}>", short_type_name::<T>())
    }

    pub fn new(instance_name: &str) -> Self {
        let out = Output::new(Self::OUT);
        let mut base = NodeBase::new(instance_name, Self::model());
        base.add_output(&out);
        Source {
            base,
            out,
            value: None,
        }
    }

    pub fn with_value(instance_name: &str, value: T) -> Self {
        let mut source = Self::new(instance_name);
        source.value = Some(value);
        source
    }

    pub fn set_value(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn out(&self) -> &Output<T> {
        &self.out
    }
}

impl<T: PortData + Serialize + DeserializeOwned> Node for Source<T> {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn execute(&mut self) -> Result<(), NodeError> {
        let value = self.value.clone().ok_or_else(|| NodeError::Unbound {
            node: self.base.instance_name().to_owned(),
            what: "value",
        })?;
        self.out.set(value);
        Ok(())
    }

    fn to_params(&self, _ctx: &SaveCtx) -> Value {
        match &self.value {
            Some(value) => match serde_json::to_value(value) {
                Ok(value) => json!({ "value": value }),
                Err(_) => Value::Null,
            },
            None => Value::Null,
        }
    }

    fn apply_params(&mut self, params: &Value, _ctx: &LoadCtx) -> Result<(), NodeError> {
        if let Some(value) = params.get("value") {
            self.value = Some(serde_json::from_value(value.clone()).map_err(|err| {
                NodeError::Other(format!(
                    "bad value for source '{}': {err}",
                    self.base.instance_name()
                ))
            })?);
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
    use df_graph::{NodeRegistry, TypeRegistry};

    #[test]
    fn publishes_its_value() {
        let mut source = Source::with_value("a", 3.5_f64);
        source.execute().unwrap();
        assert_eq!(source.out().data(), Some(3.5));
    }

    #[test]
    fn unbound_source_fails() {
        let mut source = Source::<f64>::new("a");
        assert!(matches!(
            source.execute(),
            Err(NodeError::Unbound { .. })
        ));
    }

    #[test]
    fn params_round_trip() {
        let types = TypeRegistry::new();
        let nodes = NodeRegistry::new();
        let source = Source::with_value("a", 7_i64);
        let params = source.to_params(&SaveCtx { types: &types });

        let mut restored = Source::<i64>::new("a");
        restored
            .apply_params(
                &params,
                &LoadCtx {
                    types: &types,
                    nodes: &nodes,
                },
            )
            .unwrap();
        assert_eq!(restored.value(), Some(&7));
        assert_eq!(restored.model_name(), "Source<i64>");
    }
}
