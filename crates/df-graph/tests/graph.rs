//! End-to-end graph tests: wiring, compilation, execution, embedding.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use df_graph::{
    Graph, GraphError, Input, Node, NodeBase, NodeError, Output, TypeRegistry,
};

fn types() -> TypeRegistry {
    let mut reg = TypeRegistry::new();
    reg.register::<f64>();
    reg.register::<i64>();
    reg
}

struct Constant {
    base: NodeBase,
    value: f64,
    out: Output<f64>,
}

impl Constant {
    fn new(name: &str, value: f64) -> Self {
        let out = Output::new("out");
        let mut base = NodeBase::new(name, "Constant");
        base.add_output(&out);
        Constant { base, value, out }
    }
}

impl Node for Constant {
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }
    fn execute(&mut self) -> Result<(), NodeError> {
        self.out.set(self.value);
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Add {
    base: NodeBase,
    a: Input<f64>,
    b: Input<f64>,
    result: Output<f64>,
}

impl Add {
    fn new(name: &str) -> Self {
        let a = Input::new("a");
        let b = Input::new("b");
        let result = Output::new("result");
        let mut base = NodeBase::new(name, "Add");
        base.add_input(&a);
        base.add_input(&b);
        base.add_output(&result);
        Add { base, a, b, result }
    }
}

impl Node for Add {
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }
    fn execute(&mut self) -> Result<(), NodeError> {
        self.result.set(self.a.data()? + self.b.data()?);
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Failing {
    base: NodeBase,
}

impl Failing {
    fn new(name: &str) -> Self {
        Failing {
            base: NodeBase::new(name, "Failing"),
        }
    }
}

impl Node for Failing {
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }
    fn execute(&mut self) -> Result<(), NodeError> {
        Err(NodeError::Other("boom".into()))
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Probe {
    base: NodeBase,
    input: Input<f64>,
    seen: Option<f64>,
}

impl Probe {
    fn new(name: &str) -> Self {
        let input = Input::new("in");
        let mut base = NodeBase::new(name, "Probe");
        base.add_input(&input);
        Probe {
            base,
            input,
            seen: None,
        }
    }
}

impl Node for Probe {
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }
    fn init(&mut self) {
        self.seen = None;
    }
    fn execute(&mut self) -> Result<(), NodeError> {
        self.seen = Some(self.input.data()?);
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Tracer {
    base: NodeBase,
    input: Input<f64>,
    out: Output<f64>,
    log: Rc<RefCell<Vec<String>>>,
}

impl Tracer {
    fn new(name: &str, log: Rc<RefCell<Vec<String>>>) -> Self {
        let input = Input::with_default("in", 0.0);
        let out = Output::new("out");
        let mut base = NodeBase::new(name, "Tracer");
        base.add_input(&input);
        base.add_output(&out);
        Tracer {
            base,
            input,
            out,
            log,
        }
    }
}

impl Node for Tracer {
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }
    fn init(&mut self) {
        self.log.borrow_mut().push(self.base.instance_name().to_owned());
    }
    fn execute(&mut self) -> Result<(), NodeError> {
        self.out.set(self.input.data()?);
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Flaky {
    base: NodeBase,
    out: Output<f64>,
    fail_compile: bool,
}

impl Flaky {
    fn new(name: &str) -> Self {
        let out = Output::new("out");
        let mut base = NodeBase::new(name, "Flaky");
        base.add_output(&out);
        Flaky {
            base,
            out,
            fail_compile: false,
        }
    }
}

impl Node for Flaky {
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }
    fn compile(&mut self) -> Result<(), GraphError> {
        if self.fail_compile {
            return Err(GraphError::InvalidLink {
                what: "flaky refused to compile".into(),
            });
        }
        Ok(())
    }
    fn execute(&mut self) -> Result<(), NodeError> {
        self.out.set(1.0);
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn add_compile_execute() {
    let mut graph = Graph::new("sum");
    let a = graph.add(Constant::new("a", 3.0)).unwrap();
    let b = graph.add(Constant::new("b", 4.0)).unwrap();
    let add = graph.add(Add::new("add")).unwrap();
    let probe = graph.add(Probe::new("probe")).unwrap();

    graph
        .add_link_ports(&a.borrow().out, &add.borrow().a)
        .unwrap();
    graph
        .add_link_ports(&b.borrow().out, &add.borrow().b)
        .unwrap();
    graph
        .add_link_ports(&add.borrow().result, &probe.borrow().input)
        .unwrap();

    graph.compile().unwrap();
    let report = graph.execute().unwrap();
    assert!(report.success());
    assert_eq!(probe.borrow().seen, Some(7.0));
}

#[test]
fn execute_before_compile_fails() {
    let mut graph = Graph::new("g");
    graph.add(Constant::new("a", 1.0)).unwrap();
    assert!(matches!(graph.execute(), Err(GraphError::NotCompiled)));
}

#[test]
fn edits_invalidate_the_schedule() {
    let mut graph = Graph::new("g");
    graph.add(Constant::new("a", 1.0)).unwrap();
    graph.compile().unwrap();
    assert!(graph.is_compiled());
    graph.add(Constant::new("b", 2.0)).unwrap();
    assert!(!graph.is_compiled());
    assert!(matches!(graph.execute(), Err(GraphError::NotCompiled)));
}

#[test]
fn duplicate_instance_names_rejected() {
    let mut graph = Graph::new("g");
    graph.add(Constant::new("a", 1.0)).unwrap();
    assert!(matches!(
        graph.add(Constant::new("a", 2.0)),
        Err(GraphError::DuplicateInstance { .. })
    ));
}

#[test]
fn unlinked_mandatory_input_fails_compile() {
    let mut graph = Graph::new("g");
    let a = graph.add(Constant::new("a", 1.0)).unwrap();
    let add = graph.add(Add::new("add")).unwrap();
    graph
        .add_link_ports(&a.borrow().out, &add.borrow().a)
        .unwrap();

    let err = graph.compile().unwrap_err();
    assert!(matches!(
        err,
        GraphError::UnlinkedMandatoryInput { ref node, ref port }
            if node == "add" && port == "b"
    ));
    assert!(!graph.is_compiled());
}

#[test]
fn default_makes_an_input_optional() {
    let mut graph = Graph::new("g");
    let a = graph.add(Constant::new("a", 1.0)).unwrap();
    let add = graph.add(Add::new("add")).unwrap();
    add.borrow().b.set_default(10.0);
    let probe = graph.add(Probe::new("probe")).unwrap();
    graph
        .add_link_ports(&a.borrow().out, &add.borrow().a)
        .unwrap();
    graph
        .add_link_ports(&add.borrow().result, &probe.borrow().input)
        .unwrap();

    graph.compile().unwrap();
    graph.execute().unwrap();
    assert_eq!(probe.borrow().seen, Some(11.0));
}

#[test]
fn cycle_is_detected_and_nothing_is_committed() {
    let mut graph = Graph::new("g");
    let x = graph.add(Add::new("x")).unwrap();
    let y = graph.add(Add::new("y")).unwrap();
    x.borrow().b.set_default(0.0);
    y.borrow().b.set_default(0.0);
    graph
        .add_link_ports(&x.borrow().result, &y.borrow().a)
        .unwrap();
    graph
        .add_link_ports(&y.borrow().result, &x.borrow().a)
        .unwrap();

    let err = graph.compile().unwrap_err();
    match err {
        GraphError::Cycle { nodes } => {
            assert!(nodes.contains(&"x".to_owned()));
            assert!(nodes.contains(&"y".to_owned()));
        }
        other => panic!("expected a cycle error, got {other}"),
    }
    assert!(!graph.is_compiled());
    assert!(graph.nodes_by_level().is_empty());
}

#[test]
fn levels_respect_dependencies_and_insertion_order() {
    let mut graph = Graph::new("g");
    let a = graph.add(Constant::new("a", 1.0)).unwrap();
    let b = graph.add(Constant::new("b", 2.0)).unwrap();
    let add = graph.add(Add::new("add")).unwrap();
    graph
        .add_link_ports(&a.borrow().out, &add.borrow().a)
        .unwrap();
    graph
        .add_link_ports(&b.borrow().out, &add.borrow().b)
        .unwrap();

    graph.compile().unwrap();
    let levels = graph.nodes_by_level();
    assert_eq!(levels, vec![vec!["a".to_owned(), "b".to_owned()], vec!["add".to_owned()]]);
}

#[test]
fn compile_is_idempotent() {
    let mut graph = Graph::new("g");
    let a = graph.add(Constant::new("a", 1.0)).unwrap();
    let add = graph.add(Add::new("add")).unwrap();
    add.borrow().b.set_default(0.0);
    graph
        .add_link_ports(&a.borrow().out, &add.borrow().a)
        .unwrap();

    graph.compile().unwrap();
    let first = graph.nodes_by_level();
    graph.compile().unwrap();
    assert_eq!(graph.nodes_by_level(), first);
}

#[test]
fn init_runs_in_level_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut graph = Graph::new("g");
    // The downstream node joins the graph first.
    let late = graph.add(Tracer::new("late", log.clone())).unwrap();
    let early = graph.add(Tracer::new("early", log.clone())).unwrap();
    graph
        .add_link_ports(&early.borrow().out, &late.borrow().input)
        .unwrap();

    graph.compile().unwrap();
    assert_eq!(
        graph.nodes_by_level(),
        vec![vec!["early".to_owned()], vec!["late".to_owned()]]
    );
    assert_eq!(*log.borrow(), vec!["early".to_owned(), "late".to_owned()]);
}

#[test]
fn failed_recompile_keeps_the_last_schedule() {
    let mut graph = Graph::new("g");
    let flaky = graph.add(Flaky::new("a")).unwrap();
    graph.compile().unwrap();
    let first = graph.nodes_by_level();

    flaky.borrow_mut().fail_compile = true;
    assert!(graph.compile().is_err());
    assert!(graph.is_compiled());
    assert_eq!(graph.nodes_by_level(), first);
    let report = graph.execute().unwrap();
    assert!(report.success());
}

#[test]
fn dangling_ports_drive_the_graph_erased() {
    let reg = types();
    let mut graph = Graph::new("g");
    graph.add(Add::new("add")).unwrap();

    let setters = graph.input_setters(&reg);
    assert_eq!(setters.len(), 2);
    for setter in &setters {
        assert_eq!(setter.type_name, "f64");
        reg.set_input(setter.port.as_ref(), Box::new(2.5_f64))
            .unwrap();
    }
    assert_eq!(setters[0].path, "add.a");
    assert_eq!(setters[1].path, "add.b");

    graph.compile().unwrap();
    graph.execute().unwrap();

    let getters = graph.output_getters(&reg);
    assert_eq!(getters.len(), 1);
    assert_eq!(getters[0].path, "add.result");
    let value = reg.get_output(getters[0].port.as_ref()).unwrap();
    assert_eq!(*value.downcast::<f64>().unwrap(), 5.0);
}

#[test]
fn node_failures_are_soft_and_aggregated() {
    let mut graph = Graph::new("g");
    let a = graph.add(Constant::new("a", 5.0)).unwrap();
    graph.add(Failing::new("bad")).unwrap();
    let probe = graph.add(Probe::new("probe")).unwrap();
    graph
        .add_link_ports(&a.borrow().out, &probe.borrow().input)
        .unwrap();

    graph.compile().unwrap();
    let report = graph.execute().unwrap();
    assert!(!report.success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].node, "bad");
    // Healthy part of the graph still ran.
    assert_eq!(probe.borrow().seen, Some(5.0));
}

#[test]
fn remove_node_drops_its_links() {
    let mut graph = Graph::new("g");
    let a = graph.add(Constant::new("a", 1.0)).unwrap();
    let add = graph.add(Add::new("add")).unwrap();
    graph
        .add_link_ports(&a.borrow().out, &add.borrow().a)
        .unwrap();
    assert_eq!(graph.link_count(), 1);

    graph.remove_node("a").unwrap();
    assert_eq!(graph.link_count(), 0);
    assert!(!add.borrow().a.is_linked());
    assert!(graph.node("a").is_err());

    // Gone from the schedule after the next compile.
    add.borrow().a.set_default(0.0);
    add.borrow().b.set_default(0.0);
    graph.compile().unwrap();
    assert_eq!(graph.nodes_by_level(), vec![vec!["add".to_owned()]]);
}

#[test]
fn protected_graph_rejects_removal() {
    let mut graph = Graph::new("g");
    let a = graph.add(Constant::new("a", 1.0)).unwrap();
    let probe = graph.add(Probe::new("probe")).unwrap();
    graph
        .add_link_ports(&a.borrow().out, &probe.borrow().input)
        .unwrap();
    graph.set_protected(true);
    assert!(matches!(graph.remove_node("a"), Err(GraphError::Protected)));
    assert!(matches!(
        graph.remove_link("probe", "in"),
        Err(GraphError::Protected)
    ));
    graph.set_protected(false);
    assert!(graph.remove_link("probe", "in").unwrap());
}

#[test]
fn rebinding_an_input_uses_the_new_source() {
    let mut graph = Graph::new("g");
    let a = graph.add(Constant::new("a", 3.0)).unwrap();
    let b = graph.add(Constant::new("b", 5.0)).unwrap();
    let probe = graph.add(Probe::new("probe")).unwrap();
    graph
        .add_link_ports(&a.borrow().out, &probe.borrow().input)
        .unwrap();
    graph.compile().unwrap();
    graph.execute().unwrap();
    assert_eq!(probe.borrow().seen, Some(3.0));

    assert!(graph.remove_link("probe", "in").unwrap());
    graph
        .add_link_ports(&b.borrow().out, &probe.borrow().input)
        .unwrap();
    graph.compile().unwrap();
    graph.execute().unwrap();
    assert_eq!(probe.borrow().seen, Some(5.0));
}

#[test]
fn foreign_ports_are_rejected() {
    let mut graph = Graph::new("g");
    let other = Constant::new("stray", 0.0);
    let probe = graph.add(Probe::new("probe")).unwrap();
    assert!(matches!(
        graph.add_link_ports(&other.out, &probe.borrow().input),
        Err(GraphError::NotAMember { .. })
    ));
}

#[test]
fn embedded_graph_runs_as_a_node() {
    let reg = types();

    // Inner graph: result = x + 1.
    let mut inner = Graph::new("inc");
    let x_src = inner.expose_input::<f64>("x", &reg).unwrap();
    let result_sink = inner.expose_output::<f64>("result", &reg).unwrap();
    let add = inner.add(Add::new("add")).unwrap();
    add.borrow().b.set_default(1.0);
    inner
        .add_link_ports(&x_src, &add.borrow().a)
        .unwrap();
    inner
        .add_link_ports(&add.borrow().result, &result_sink)
        .unwrap();

    // Outer graph feeds the inner graph and probes its result.
    let mut outer = Graph::new("outer");
    let a = outer.add(Constant::new("a", 41.0)).unwrap();
    let inner = outer.add(inner).unwrap();
    let probe = outer.add(Probe::new("probe")).unwrap();
    let inner_in = inner
        .borrow()
        .base()
        .input_by_name("x")
        .unwrap()
        .clone_handle();
    let inner_out = inner
        .borrow()
        .base()
        .output_by_name("result")
        .unwrap()
        .clone_handle();
    outer
        .add_link_ports(&a.borrow().out, inner_in.as_ref())
        .unwrap();
    outer
        .add_link_ports(inner_out.as_ref(), &probe.borrow().input)
        .unwrap();

    outer.compile().unwrap();
    let report = outer.execute().unwrap();
    assert!(report.success());
    assert_eq!(probe.borrow().seen, Some(42.0));
}

#[test]
fn top_level_boundary_defaults_feed_the_graph() {
    let reg = types();
    let mut graph = Graph::new("inc");
    let x_src = graph.expose_input::<f64>("x", &reg).unwrap();
    let result_sink = graph.expose_output::<f64>("result", &reg).unwrap();
    let add = graph.add(Add::new("add")).unwrap();
    add.borrow().b.set_default(1.0);
    graph.add_link_ports(&x_src, &add.borrow().a).unwrap();
    graph
        .add_link_ports(&add.borrow().result, &result_sink)
        .unwrap();

    graph.set_input_default("x", 9.0_f64).unwrap();
    graph.compile().unwrap();
    graph.execute().unwrap();
    assert_eq!(graph.output_data::<f64>("result").unwrap(), 10.0);

    // Rebind through the boundary: new default, same schedule.
    graph.set_input_default("x", 20.0_f64).unwrap();
    graph.execute().unwrap();
    assert_eq!(graph.output_data::<f64>("result").unwrap(), 21.0);
}

#[test]
fn direct_input_to_output_sentinel_link_rejected() {
    let reg = types();
    let mut graph = Graph::new("g");
    graph.expose_input::<f64>("x", &reg).unwrap();
    graph.expose_output::<f64>("y", &reg).unwrap();
    assert!(matches!(
        graph.add_link_by_name("input", "x", "output", "y"),
        Err(GraphError::InvalidLink { .. })
    ));
}

#[test]
fn mismatched_link_types_rejected() {
    let mut graph = Graph::new("g");
    let a = graph.add(Constant::new("a", 1.0)).unwrap();
    let probe = graph.add(IntProbe::new("probe")).unwrap();
    assert!(matches!(
        graph.add_link_ports(&a.borrow().out, &probe.borrow().input),
        Err(GraphError::TypeMismatch { .. })
    ));
}

struct IntProbe {
    base: NodeBase,
    input: Input<i64>,
}

impl IntProbe {
    fn new(name: &str) -> Self {
        let input = Input::new("in");
        let mut base = NodeBase::new(name, "IntProbe");
        base.add_input(&input);
        IntProbe { base, input }
    }
}

impl Node for IntProbe {
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }
    fn execute(&mut self) -> Result<(), NodeError> {
        self.input.data()?;
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
