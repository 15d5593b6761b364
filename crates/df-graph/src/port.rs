//! Typed data ports and their type-erased views.
//!
//! Ports are cheap `Rc` handles: cloning a port clones the handle, and a link
//! is simply the receiving [`Input`] holding a handle to the producing
//! [`Output`]. Type erasure ([`InputPortAny`], [`OutputPortAny`]) is what the
//! graph stores; typed access goes through `Any` downcasts.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use df_core::NodeId;

use crate::error::{GraphError, NodeError};

/// Marker for types that can travel through ports.
///
/// Blanket-implemented: any `Clone + 'static` type qualifies. Wrap heavy
/// payloads in `Rc` to keep `data()` cheap.
pub trait PortData: Clone + 'static {}

impl<T: Clone + 'static> PortData for T {}

/// Process-unique identity of a graph, used to stamp port ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphUid(pub(crate) u64);

impl GraphUid {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        GraphUid(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which graph and node a port currently belongs to.
///
/// Stamped when the node is added to a graph; lets the graph resolve a bare
/// port handle back to its member node when building links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortOwner {
    pub graph: GraphUid,
    pub node: NodeId,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

struct OutputInner<T> {
    name: String,
    value: RefCell<Option<T>>,
    fan_out: Cell<usize>,
    owner: Cell<Option<PortOwner>>,
}

/// A typed producer port. Holds the last value set by its node.
pub struct Output<T: PortData>(Rc<OutputInner<T>>);

impl<T: PortData> Clone for Output<T> {
    fn clone(&self) -> Self {
        Output(Rc::clone(&self.0))
    }
}

impl<T: PortData> Output<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Output(Rc::new(OutputInner {
            name: name.into(),
            value: RefCell::new(None),
            fan_out: Cell::new(0),
            owner: Cell::new(None),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Publish a value, replacing any previous one.
    pub fn set(&self, value: T) {
        *self.0.value.borrow_mut() = Some(value);
    }

    /// Clone out the current value, if any.
    pub fn data(&self) -> Option<T> {
        self.0.value.borrow().clone()
    }

    pub fn clear(&self) {
        *self.0.value.borrow_mut() = None;
    }
}

impl<T: PortData> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("name", &self.0.name)
            .field("fan_out", &self.0.fan_out.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

struct InputInner<T: PortData> {
    name: String,
    default: RefCell<Option<T>>,
    must_be_linked: Cell<bool>,
    source: RefCell<Option<Output<T>>>,
    owner: Cell<Option<PortOwner>>,
}

/// A typed consumer port. Reads from its linked upstream [`Output`], falling
/// back to a default value when unlinked.
pub struct Input<T: PortData>(Rc<InputInner<T>>);

impl<T: PortData> Clone for Input<T> {
    fn clone(&self) -> Self {
        Input(Rc::clone(&self.0))
    }
}

impl<T: PortData> Input<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Input(Rc::new(InputInner {
            name: name.into(),
            default: RefCell::new(None),
            must_be_linked: Cell::new(false),
            source: RefCell::new(None),
            owner: Cell::new(None),
        }))
    }

    pub fn with_default(name: impl Into<String>, default: T) -> Self {
        let port = Self::new(name);
        port.set_default(default);
        port
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn set_default(&self, value: T) {
        *self.0.default.borrow_mut() = Some(value);
    }

    pub fn clear_default(&self) {
        *self.0.default.borrow_mut() = None;
    }

    pub fn default_value(&self) -> Option<T> {
        self.0.default.borrow().clone()
    }

    /// Force this port to require a link even when a default is set.
    pub fn set_must_be_linked(&self, mandatory: bool) {
        self.0.must_be_linked.set(mandatory);
    }

    pub fn is_linked(&self) -> bool {
        self.0.source.borrow().is_some()
    }

    /// A port must be linked when explicitly flagged, or when it has no
    /// default to fall back on.
    pub fn is_link_mandatory(&self) -> bool {
        self.0.must_be_linked.get() || self.0.default.borrow().is_none()
    }

    /// Link this input to `from`. Fails if already linked.
    pub fn connect(&self, from: &Output<T>) -> Result<(), GraphError> {
        let mut source = self.0.source.borrow_mut();
        if source.is_some() {
            return Err(GraphError::AlreadyLinked {
                port: self.0.name.clone(),
            });
        }
        from.0.fan_out.set(from.0.fan_out.get() + 1);
        *source = Some(from.clone());
        Ok(())
    }

    /// Drop the incoming link, if any. Returns whether a link was removed.
    pub fn disconnect(&self) -> bool {
        match self.0.source.borrow_mut().take() {
            Some(from) => {
                from.0.fan_out.set(from.0.fan_out.get().saturating_sub(1));
                true
            }
            None => false,
        }
    }

    /// Read the port: upstream value when linked, else the default.
    pub fn data(&self) -> Result<T, NodeError> {
        if let Some(from) = self.0.source.borrow().as_ref() {
            if let Some(value) = from.data() {
                return Ok(value);
            }
        } else if let Some(value) = self.0.default.borrow().clone() {
            return Ok(value);
        }
        Err(NodeError::MissingInput {
            port: self.0.name.clone(),
        })
    }

    /// The upstream port, if linked.
    pub fn source(&self) -> Option<Output<T>> {
        self.0.source.borrow().clone()
    }
}

impl<T: PortData> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("name", &self.0.name)
            .field("linked", &self.is_linked())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Erased views
// ---------------------------------------------------------------------------

/// Common erased surface of any port.
pub trait PortAny {
    fn name(&self) -> &str;
    fn data_type(&self) -> TypeId;
    fn data_type_name(&self) -> &'static str;
    fn is_linked(&self) -> bool;
    fn owner(&self) -> Option<PortOwner>;
    fn set_owner(&self, owner: Option<PortOwner>);
    fn as_any(&self) -> &dyn Any;
}

/// Erased consumer port, as stored by nodes and graphs.
pub trait InputPortAny: PortAny {
    fn is_link_mandatory(&self) -> bool;
    fn has_default(&self) -> bool;
    fn set_must_be_linked(&self, mandatory: bool);
    /// Link from an erased output; fails on type mismatch or double link.
    fn connect_erased(&self, from: &dyn OutputPortAny) -> Result<(), GraphError>;
    fn disconnect(&self) -> bool;
    fn clone_handle(&self) -> Box<dyn InputPortAny>;
}

/// Erased producer port.
pub trait OutputPortAny: PortAny {
    fn fan_out(&self) -> usize;
    fn has_data(&self) -> bool;
    fn clone_handle(&self) -> Box<dyn OutputPortAny>;
}

impl<T: PortData> PortAny for Output<T> {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn data_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn data_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn is_linked(&self) -> bool {
        self.0.fan_out.get() > 0
    }

    fn owner(&self) -> Option<PortOwner> {
        self.0.owner.get()
    }

    fn set_owner(&self, owner: Option<PortOwner>) {
        self.0.owner.set(owner);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: PortData> OutputPortAny for Output<T> {
    fn fan_out(&self) -> usize {
        self.0.fan_out.get()
    }

    fn has_data(&self) -> bool {
        self.0.value.borrow().is_some()
    }

    fn clone_handle(&self) -> Box<dyn OutputPortAny> {
        Box::new(self.clone())
    }
}

impl<T: PortData> PortAny for Input<T> {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn data_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn data_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn is_linked(&self) -> bool {
        Input::is_linked(self)
    }

    fn owner(&self) -> Option<PortOwner> {
        self.0.owner.get()
    }

    fn set_owner(&self, owner: Option<PortOwner>) {
        self.0.owner.set(owner);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: PortData> InputPortAny for Input<T> {
    fn is_link_mandatory(&self) -> bool {
        Input::is_link_mandatory(self)
    }

    fn has_default(&self) -> bool {
        self.0.default.borrow().is_some()
    }

    fn set_must_be_linked(&self, mandatory: bool) {
        Input::set_must_be_linked(self, mandatory);
    }

    fn connect_erased(&self, from: &dyn OutputPortAny) -> Result<(), GraphError> {
        match from.as_any().downcast_ref::<Output<T>>() {
            Some(from) => self.connect(from),
            None => Err(GraphError::TypeMismatch {
                from_port: from.name().to_owned(),
                from_type: from.data_type_name().to_owned(),
                to_port: self.name().to_owned(),
                to_type: self.data_type_name().to_owned(),
            }),
        }
    }

    fn disconnect(&self) -> bool {
        Input::disconnect(self)
    }

    fn clone_handle(&self) -> Box<dyn InputPortAny> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlinked_input_reads_default() {
        let input = Input::with_default("x", 7_i64);
        assert!(!input.is_linked());
        assert!(!input.is_link_mandatory());
        assert_eq!(input.data().unwrap(), 7);
    }

    #[test]
    fn linked_input_shadows_default() {
        let out = Output::new("y");
        let input = Input::with_default("x", 1_i64);
        input.connect(&out).unwrap();
        out.set(42);
        assert_eq!(input.data().unwrap(), 42);
        // Default is untouched underneath.
        assert_eq!(input.default_value(), Some(1));
    }

    #[test]
    fn missing_data_is_an_error() {
        let input = Input::<f64>::new("x");
        assert!(matches!(
            input.data(),
            Err(NodeError::MissingInput { .. })
        ));
        let out = Output::<f64>::new("y");
        input.connect(&out).unwrap();
        // Linked but nothing produced yet.
        assert!(input.data().is_err());
    }

    #[test]
    fn double_link_rejected() {
        let a = Output::new("a");
        let b = Output::new("b");
        let input = Input::<i64>::new("x");
        input.connect(&a).unwrap();
        assert!(matches!(
            input.connect(&b),
            Err(GraphError::AlreadyLinked { .. })
        ));
    }

    #[test]
    fn disconnect_restores_fan_out() {
        let out = Output::<i64>::new("y");
        let p = Input::new("p");
        let q = Input::new("q");
        p.connect(&out).unwrap();
        q.connect(&out).unwrap();
        assert_eq!(out.fan_out(), 2);
        assert!(p.disconnect());
        assert_eq!(out.fan_out(), 1);
        assert!(!p.disconnect());
    }

    #[test]
    fn erased_link_checks_types() {
        let out = Output::<f64>::new("y");
        let input = Input::<i64>::new("x");
        let err = InputPortAny::connect_erased(&input, &out).unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));

        let ok = Output::<i64>::new("z");
        InputPortAny::connect_erased(&input, &ok).unwrap();
        ok.set(5);
        assert_eq!(input.data().unwrap(), 5);
    }

    #[test]
    fn mandatory_flag_overrides_default() {
        let input = Input::with_default("x", 0_i64);
        assert!(!input.is_link_mandatory());
        input.set_must_be_linked(true);
        assert!(input.is_link_mandatory());
    }
}
