//! df-graph: typed dataflow graphs.
//!
//! Nodes exchange values through typed ports, graphs wire nodes together
//! with type-checked links, compilation derives a level-ordered schedule,
//! and a compiled graph can itself be embedded as a node of a larger graph.

pub mod doc;
pub mod error;
pub mod graph;
pub mod io_node;
pub mod node;
pub mod port;
pub mod registry;
pub mod schedule;

pub use doc::{GraphBody, GraphDoc, LinkDoc, ModelRef, NodeDoc};
pub use error::{GraphError, NodeError};
pub use graph::{Graph, PortGetter, PortSetter, GRAPH_MODEL};
pub use io_node::{GraphIoNode, IoRole, GRAPH_INPUT_MODEL, GRAPH_OUTPUT_MODEL};
pub use node::{creator_of, LoadCtx, Node, NodeBase, NodeCreator, NodeHandle, NodeRegistry, SaveCtx};
pub use port::{Input, InputPortAny, Output, OutputPortAny, PortAny, PortData, PortOwner};
pub use registry::{short_type_name, Forwarder, TypeRegistry};
pub use schedule::{ExecutionReport, NodeFailure};
