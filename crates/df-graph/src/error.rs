//! Graph-specific error types.

use df_core::DfError;
use thiserror::Error;

/// Structural, registration and compilation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A port was requested for a type name the registry does not know.
    #[error("type '{type_name}' is not registered")]
    UnregisteredType { type_name: String },

    /// Link endpoints carry different value types.
    #[error(
        "link type mismatch: output '{from_port}' ({from_type}) vs input '{to_port}' ({to_type})"
    )]
    TypeMismatch {
        from_port: String,
        from_type: String,
        to_port: String,
        to_type: String,
    },

    /// The input port already has an incoming link.
    #[error("input port '{port}' is already linked")]
    AlreadyLinked { port: String },

    /// A node with this instance name already exists in the graph.
    #[error("duplicate node instance name '{instance}'")]
    DuplicateInstance { instance: String },

    /// The node or io port with this name already exists.
    #[error("node '{node}' already has a port named '{port}'")]
    DuplicatePort { node: String, port: String },

    /// No node with this instance name exists in the graph.
    #[error("node '{instance}' not found in graph")]
    UnknownNode { instance: String },

    /// The named port does not exist on the node.
    #[error("no {dir} port '{port}' on node '{node}'")]
    UnknownPort {
        node: String,
        port: String,
        dir: &'static str,
    },

    /// The node is not a member of this graph.
    #[error("node '{instance}' is not a member of this graph")]
    NotAMember { instance: String },

    /// A link that is not allowed regardless of types.
    #[error("invalid link: {what}")]
    InvalidLink { what: String },

    /// Structural mutation rejected because the graph is protected.
    #[error("graph nodes and links are protected against removal")]
    Protected,

    /// Sentinel boundary nodes live and die with their graph.
    #[error("boundary node '{instance}' cannot be removed")]
    BoundaryNode { instance: String },

    /// A mandatory input port was left unlinked at compile time.
    #[error("node '{node}' is not ready: mandatory input '{port}' is not linked")]
    UnlinkedMandatoryInput { node: String, port: String },

    /// The link set contains a cycle; the named nodes could not be ordered.
    #[error("graph contains a cycle involving: {}", nodes.join(", "))]
    Cycle { nodes: Vec<String> },

    /// `execute()` was called before a successful `compile()`.
    #[error("graph is not compiled")]
    NotCompiled,

    /// An output port holds no value (nothing produced yet).
    #[error("output port '{port}' has no data")]
    NoData { port: String },

    /// Malformed or inconsistent graph document.
    #[error("invalid graph document: {what}")]
    Doc { what: String },
}

impl From<GraphError> for DfError {
    fn from(err: GraphError) -> Self {
        DfError::Invariant {
            what: err.to_string(),
        }
    }
}

/// Node-local execution failures. Soft: the executor aggregates these
/// into an [`ExecutionReport`](crate::ExecutionReport) and keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// `Input::data()` found neither an upstream value nor a default.
    #[error("missing data on input port '{port}'")]
    MissingInput { port: String },

    /// The node needs caller-supplied state before it can run.
    #[error("node '{node}' has no {what} bound")]
    Unbound { node: String, what: &'static str },

    /// An erased access downcast to the wrong port type. Programmer error.
    #[error("port '{port}' accessed as the wrong type")]
    PortType { port: String },

    /// One or more nodes of an embedded subgraph failed.
    #[error("{failed} node(s) failed inside subgraph '{node}'")]
    Subgraph { node: String, failed: usize },

    /// Free-form node-specific failure.
    #[error("{0}")]
    Other(String),
}
