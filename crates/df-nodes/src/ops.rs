//! Function-style nodes wrapping caller-supplied operators.
//!
//! The bound operators are not serializable: a loaded document restores the
//! node shells and the caller reattaches the functions before compiling.

use std::any::Any;

use df_graph::{short_type_name, Input, Node, NodeBase, NodeError, Output, PortData};

fn unbound(base: &NodeBase, what: &'static str) -> NodeError {
    NodeError::Unbound {
        node: base.instance_name().to_owned(),
        what,
    }
}

/// `result = op(a, b)`.
pub struct BinaryOp<A: PortData, B: PortData, R: PortData> {
    base: NodeBase,
    a: Input<A>,
    b: Input<B>,
    result: Output<R>,
    op: Option<Box<dyn Fn(&A, &B) -> R>>,
}

impl<A: PortData, B: PortData, R: PortData> BinaryOp<A, B, R> {
    pub fn model() -> String {
        format!(
            "BinaryOp<{}, {}, {}>",
            short_type_name::<A>(),
            short_type_name::<B>(),
            short_type_name::<R>()
        )
    }

    pub fn new(instance_name: &str) -> Self {
        let a = Input::new("a");
        let b = Input::new("b");
        let result = Output::new("result");
        let mut base = NodeBase::new(instance_name, Self::model());
        base.add_input(&a);
        base.add_input(&b);
        base.add_output(&result);
        BinaryOp {
            base,
            a,
            b,
            result,
            op: None,
        }
    }

    pub fn with_op(instance_name: &str, op: impl Fn(&A, &B) -> R + 'static) -> Self {
        let mut node = Self::new(instance_name);
        node.set_op(op);
        node
    }

    pub fn set_op(&mut self, op: impl Fn(&A, &B) -> R + 'static) {
        self.op = Some(Box::new(op));
    }

    pub fn a(&self) -> &Input<A> {
        &self.a
    }

    pub fn b(&self) -> &Input<B> {
        &self.b
    }

    pub fn result(&self) -> &Output<R> {
        &self.result
    }
}

impl<A: PortData, B: PortData, R: PortData> Node for BinaryOp<A, B, R> {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn execute(&mut self) -> Result<(), NodeError> {
        let op = self.op.as_ref().ok_or_else(|| unbound(&self.base, "operator"))?;
        let a = self.a.data()?;
        let b = self.b.data()?;
        self.result.set(op(&a, &b));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Element-wise `out[i] = op(in[i])` over `Vec<T>`.
pub struct Transform<T: PortData> {
    base: NodeBase,
    input: Input<Vec<T>>,
    out: Output<Vec<T>>,
    op: Option<Box<dyn Fn(&T) -> T>>,
}

impl<T: PortData> Transform<T> {
    pub fn model() -> String {
        format!("Transform<{}>", short_type_name::<T>())
    }

    pub fn new(instance_name: &str) -> Self {
        let input = Input::new("in");
        let out = Output::new("out");
        let mut base = NodeBase::new(instance_name, Self::model());
        base.add_input(&input);
        base.add_output(&out);
        Transform {
            base,
            input,
            out,
            op: None,
        }
    }

    pub fn with_op(instance_name: &str, op: impl Fn(&T) -> T + 'static) -> Self {
        let mut node = Self::new(instance_name);
        node.set_op(op);
        node
    }

    pub fn set_op(&mut self, op: impl Fn(&T) -> T + 'static) {
        self.op = Some(Box::new(op));
    }

    pub fn input(&self) -> &Input<Vec<T>> {
        &self.input
    }

    pub fn out(&self) -> &Output<Vec<T>> {
        &self.out
    }
}

impl<T: PortData> Node for Transform<T> {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn execute(&mut self) -> Result<(), NodeError> {
        let op = self.op.as_ref().ok_or_else(|| unbound(&self.base, "operator"))?;
        let values = self.input.data()?;
        self.out.set(values.iter().map(|v| op(v)).collect());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Keeps the elements of a `Vec<T>` matching a predicate.
pub struct Filter<T: PortData> {
    base: NodeBase,
    input: Input<Vec<T>>,
    out: Output<Vec<T>>,
    predicate: Option<Box<dyn Fn(&T) -> bool>>,
}

impl<T: PortData> Filter<T> {
    pub fn model() -> String {
        format!("Filter<{}>", short_type_name::<T>())
    }

    pub fn new(instance_name: &str) -> Self {
        let input = Input::new("in");
        let out = Output::new("out");
        let mut base = NodeBase::new(instance_name, Self::model());
        base.add_input(&input);
        base.add_output(&out);
        Filter {
            base,
            input,
            out,
            predicate: None,
        }
    }

    pub fn with_predicate(instance_name: &str, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        let mut node = Self::new(instance_name);
        node.set_predicate(predicate);
        node
    }

    pub fn set_predicate(&mut self, predicate: impl Fn(&T) -> bool + 'static) {
        self.predicate = Some(Box::new(predicate));
    }

    pub fn input(&self) -> &Input<Vec<T>> {
        &self.input
    }

    pub fn out(&self) -> &Output<Vec<T>> {
        &self.out
    }
}

impl<T: PortData> Node for Filter<T> {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn execute(&mut self) -> Result<(), NodeError> {
        let predicate = self
            .predicate
            .as_ref()
            .ok_or_else(|| unbound(&self.base, "predicate"))?;
        let values = self.input.data()?;
        self.out
            .set(values.into_iter().filter(|v| predicate(v)).collect());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Folds a `Vec<T>` into a single value, starting from a seed.
pub struct Reduce<T: PortData> {
    base: NodeBase,
    input: Input<Vec<T>>,
    out: Output<T>,
    seed: Option<T>,
    op: Option<Box<dyn Fn(T, &T) -> T>>,
}

impl<T: PortData> Reduce<T> {
    pub fn model() -> String {
        format!("Reduce<{}>", short_type_name::<T>())
    }

    pub fn new(instance_name: &str) -> Self {
        let input = Input::new("in");
        let out = Output::new("out");
        let mut base = NodeBase::new(instance_name, Self::model());
        base.add_input(&input);
        base.add_output(&out);
        Reduce {
            base,
            input,
            out,
            seed: None,
            op: None,
        }
    }

    pub fn with_op(instance_name: &str, seed: T, op: impl Fn(T, &T) -> T + 'static) -> Self {
        let mut node = Self::new(instance_name);
        node.seed = Some(seed);
        node.set_op(op);
        node
    }

    pub fn set_op(&mut self, op: impl Fn(T, &T) -> T + 'static) {
        self.op = Some(Box::new(op));
    }

    pub fn set_seed(&mut self, seed: T) {
        self.seed = Some(seed);
    }

    pub fn input(&self) -> &Input<Vec<T>> {
        &self.input
    }

    pub fn out(&self) -> &Output<T> {
        &self.out
    }
}

impl<T: PortData> Node for Reduce<T> {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn execute(&mut self) -> Result<(), NodeError> {
        let op = self.op.as_ref().ok_or_else(|| unbound(&self.base, "operator"))?;
        let seed = self
            .seed
            .clone()
            .ok_or_else(|| unbound(&self.base, "seed"))?;
        let values = self.input.data()?;
        self.out.set(values.iter().fold(seed, |acc, v| op(acc, v)));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
