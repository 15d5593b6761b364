//! Type registry: the bridge between erased port handles and concrete types.
//!
//! Loading a graph document, building boundary ports and editing unlinked
//! defaults all happen without compile-time knowledge of the value types
//! involved. The registry stores, per registered type, the closures needed to
//! construct ports and to move values through erased handles.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::error;

use crate::error::{GraphError, NodeError};
use crate::port::{Input, InputPortAny, Output, OutputPortAny, PortData};

/// Copies the value of an erased output into an erased input's default slot.
/// Used by boundary nodes to relay values across a graph's interface.
pub type Forwarder =
    Arc<dyn Fn(&dyn InputPortAny, &dyn OutputPortAny) -> Result<(), NodeError> + Send + Sync>;

struct TypeEntry {
    name: String,
    input_ctor: Arc<dyn Fn(&str) -> Box<dyn InputPortAny> + Send + Sync>,
    output_ctor: Arc<dyn Fn(&str) -> Box<dyn OutputPortAny> + Send + Sync>,
    getter: Arc<dyn Fn(&dyn OutputPortAny) -> Option<Box<dyn Any>> + Send + Sync>,
    setter: Arc<dyn Fn(&dyn InputPortAny, Box<dyn Any>) -> Result<(), NodeError> + Send + Sync>,
    forwarder: Forwarder,
}

/// Registry of port-capable types, keyed both by `TypeId` and by a stable
/// registration name used in graph documents.
#[derive(Default)]
pub struct TypeRegistry {
    entries: HashMap<TypeId, TypeEntry>,
    by_name: HashMap<String, TypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its short type name. Idempotent.
    pub fn register<T: PortData>(&mut self) {
        self.register_as::<T>(&short_type_name::<T>());
    }

    /// Register `T` under an explicit name. Idempotent for the same pair;
    /// re-registering an existing type updates its name mapping.
    pub fn register_as<T: PortData>(&mut self, name: &str) {
        let id = TypeId::of::<T>();
        if let Some(existing) = self.entries.get(&id) {
            if existing.name == name {
                return;
            }
            let stale = existing.name.clone();
            self.by_name.remove(&stale);
        }
        let entry = TypeEntry {
            name: name.to_owned(),
            input_ctor: Arc::new(|port_name: &str| {
                Box::new(Input::<T>::new(port_name)) as Box<dyn InputPortAny>
            }),
            output_ctor: Arc::new(|port_name: &str| {
                Box::new(Output::<T>::new(port_name)) as Box<dyn OutputPortAny>
            }),
            getter: Arc::new(|out: &dyn OutputPortAny| {
                let out = out.as_any().downcast_ref::<Output<T>>()?;
                out.data().map(|v| Box::new(v) as Box<dyn Any>)
            }),
            setter: Arc::new(|input: &dyn InputPortAny, value: Box<dyn Any>| {
                let input = input
                    .as_any()
                    .downcast_ref::<Input<T>>()
                    .ok_or_else(|| NodeError::PortType {
                        port: input.name().to_owned(),
                    })?;
                let value = value.downcast::<T>().map_err(|_| NodeError::PortType {
                    port: input.name().to_owned(),
                })?;
                input.set_default(*value);
                Ok(())
            }),
            forwarder: Arc::new(|input: &dyn InputPortAny, out: &dyn OutputPortAny| {
                let input = input
                    .as_any()
                    .downcast_ref::<Input<T>>()
                    .ok_or_else(|| NodeError::PortType {
                        port: input.name().to_owned(),
                    })?;
                let out = out
                    .as_any()
                    .downcast_ref::<Output<T>>()
                    .ok_or_else(|| NodeError::PortType {
                        port: out.name().to_owned(),
                    })?;
                out.set(input.data()?);
                Ok(())
            }),
        };
        self.by_name.insert(name.to_owned(), id);
        self.entries.insert(id, entry);
    }

    pub fn is_registered(&self, id: TypeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Canonical document name for a registered type.
    pub fn name_of(&self, id: TypeId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.name.as_str())
    }

    pub fn type_of(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Build an erased input port for a registered type name.
    pub fn make_input_port(
        &self,
        port_name: &str,
        type_name: &str,
    ) -> Result<Box<dyn InputPortAny>, GraphError> {
        let entry = self.entry_by_name(type_name)?;
        Ok((entry.input_ctor)(port_name))
    }

    /// Build an erased output port for a registered type name.
    pub fn make_output_port(
        &self,
        port_name: &str,
        type_name: &str,
    ) -> Result<Box<dyn OutputPortAny>, GraphError> {
        let entry = self.entry_by_name(type_name)?;
        Ok((entry.output_ctor)(port_name))
    }

    /// The input-to-output forwarding closure for a registered type.
    pub fn forwarder(&self, id: TypeId) -> Option<Forwarder> {
        self.entries.get(&id).map(|e| Arc::clone(&e.forwarder))
    }

    /// Set the default of an erased input from a boxed value.
    pub fn set_input(
        &self,
        input: &dyn InputPortAny,
        value: Box<dyn Any>,
    ) -> Result<(), NodeError> {
        match self.entries.get(&input.data_type()) {
            Some(entry) => (entry.setter)(input, value),
            None => Err(NodeError::PortType {
                port: input.name().to_owned(),
            }),
        }
    }

    /// Clone the current value out of an erased output, boxed.
    pub fn get_output(&self, out: &dyn OutputPortAny) -> Option<Box<dyn Any>> {
        let entry = self.entries.get(&out.data_type())?;
        (entry.getter)(out)
    }

    fn entry_by_name(&self, type_name: &str) -> Result<&TypeEntry, GraphError> {
        self.by_name
            .get(type_name)
            .and_then(|id| self.entries.get(id))
            .ok_or_else(|| {
                error!(type_name, "port type is not registered");
                GraphError::UnregisteredType {
                    type_name: type_name.to_owned(),
                }
            })
    }

    /// Process-wide default registry.
    pub fn global() -> &'static RwLock<TypeRegistry> {
        static GLOBAL: OnceLock<RwLock<TypeRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| RwLock::new(TypeRegistry::new()))
    }
}

/// Last path segments of a type name, with module prefixes stripped from
/// every generic argument: `alloc::vec::Vec<core::f32>` becomes `Vec<f32>`.
pub fn short_type_name<T: 'static>() -> String {
    let full = std::any::type_name::<T>();
    let mut short = String::with_capacity(full.len());
    let mut segment_start = 0;
    for (i, c) in full.char_indices() {
        match c {
            ':' | '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                short.push_str(&full[segment_start..i]);
                if c == ':' {
                    // Drop everything accumulated for this path segment.
                    while let Some(last) = short.pop() {
                        if matches!(last, '<' | ',' | ' ' | '(' | '[' | ';' | '&') {
                            short.push(last);
                            break;
                        }
                    }
                } else {
                    short.push(c);
                }
                segment_start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    short.push_str(&full[segment_start..]);
    short
}
