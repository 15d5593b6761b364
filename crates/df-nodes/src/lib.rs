//! df-nodes: built-in node library and standard registrations.

pub mod ops;
pub mod sink;
pub mod source;

pub use ops::{BinaryOp, Filter, Reduce, Transform};
pub use sink::Sink;
pub use source::Source;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use df_graph::{creator_of, Graph, NodeRegistry, PortData, TypeRegistry, GRAPH_MODEL};

/// Register the stock value types graph documents may reference.
pub fn register_std_types(types: &mut TypeRegistry) {
    types.register::<bool>();
    types.register::<i64>();
    types.register::<u32>();
    types.register::<f32>();
    types.register::<f64>();
    types.register::<String>();
    types.register::<Vec<i64>>();
    types.register::<Vec<f32>>();
    types.register::<Vec<f64>>();
}

/// Register the `Source<T>` and `Sink<T>` models for one value type.
pub fn register_source_sink<T>(nodes: &mut NodeRegistry)
where
    T: PortData + Serialize + DeserializeOwned,
{
    nodes.register(&Source::<T>::model(), creator_of(Source::<T>::new));
    nodes.register(&Sink::<T>::model(), creator_of(Sink::<T>::new));
}

/// Install the standard types and node models into a registry pair.
pub fn install(types: &mut TypeRegistry, nodes: &mut NodeRegistry) {
    register_std_types(types);

    register_source_sink::<bool>(nodes);
    register_source_sink::<i64>(nodes);
    register_source_sink::<u32>(nodes);
    register_source_sink::<f32>(nodes);
    register_source_sink::<f64>(nodes);
    register_source_sink::<String>(nodes);
    register_source_sink::<Vec<i64>>(nodes);
    register_source_sink::<Vec<f32>>(nodes);
    register_source_sink::<Vec<f64>>(nodes);

    // Operator shells: the bound functions are reattached after loading.
    nodes.register(
        &BinaryOp::<f64, f64, f64>::model(),
        creator_of(BinaryOp::<f64, f64, f64>::new),
    );
    nodes.register(
        &BinaryOp::<i64, i64, i64>::model(),
        creator_of(BinaryOp::<i64, i64, i64>::new),
    );
    nodes.register(&Transform::<f64>::model(), creator_of(Transform::<f64>::new));
    nodes.register(&Filter::<f64>::model(), creator_of(Filter::<f64>::new));
    nodes.register(&Reduce::<f64>::model(), creator_of(Reduce::<f64>::new));

    nodes.register(GRAPH_MODEL, creator_of(|name: &str| Graph::new(name)));

    debug!("standard types and node models installed");
}

/// Install into the process-default registries.
pub fn install_global() {
    let mut types = TypeRegistry::global().write().unwrap_or_else(|e| e.into_inner());
    let mut nodes = NodeRegistry::global().write().unwrap_or_else(|e| e.into_inner());
    install(&mut types, &mut nodes);
}
