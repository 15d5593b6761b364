//! Compilation (validation + level-ordered scheduling) and execution.

use std::collections::{HashMap, HashSet};

use tracing::{debug, error, warn};

use df_core::NodeId;

use crate::error::{GraphError, NodeError};
use crate::graph::Graph;
use crate::node::Node;

/// Outcome of one execution pass. Node failures are soft: the pass runs to
/// completion and failures are collected here.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub failures: Vec<NodeFailure>,
}

#[derive(Debug)]
pub struct NodeFailure {
    pub node: String,
    pub error: NodeError,
}

impl ExecutionReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Graph {
    /// Validate the graph and derive its execution schedule.
    ///
    /// Runs in three stages: per-node `compile()` hooks, mandatory-input
    /// validation, then a level-ordered topological sort of the link set.
    /// The new schedule is committed only after every stage succeeds; a
    /// failed compile leaves the last committed schedule in place.
    pub fn compile(&mut self) -> Result<(), GraphError> {
        for entry in &self.nodes {
            entry.node.borrow_mut().compile()?;
        }
        self.check_mandatory_inputs()?;
        let schedule = self.level_order()?;

        debug!(
            graph = self.base().instance_name(),
            levels = schedule.len(),
            nodes = self.nodes.len(),
            "graph compiled"
        );
        self.schedule = schedule;
        self.mark_compiled();

        // Nodes are initialized in schedule order, producers first.
        for level in &self.schedule {
            for id in level {
                if let Some(entry) = self.entry(*id) {
                    entry.node.borrow_mut().init();
                }
            }
        }
        Ok(())
    }

    /// Run one execution pass over the compiled schedule.
    ///
    /// Fails fast with [`GraphError::NotCompiled`] when no valid schedule
    /// exists; otherwise every node runs and per-node failures are
    /// aggregated into the returned report.
    pub fn execute(&mut self) -> Result<ExecutionReport, GraphError> {
        if !self.is_compiled() {
            return Err(GraphError::NotCompiled);
        }
        let mut report = ExecutionReport::default();
        for level in &self.schedule {
            for id in level {
                let Some(entry) = self.entry(*id) else {
                    continue;
                };
                let name = entry.node.borrow().instance_name().to_owned();
                if let Err(err) = entry.node.borrow_mut().execute() {
                    error!(node = %name, %err, "node execution failed");
                    report.failures.push(NodeFailure {
                        node: name,
                        error: err,
                    });
                }
            }
        }
        if !report.success() {
            warn!(
                graph = self.base().instance_name(),
                failed = report.failures.len(),
                "execution pass finished with failures"
            );
        }
        Ok(report)
    }

    /// Every mandatory input of every member must be linked. The input
    /// sentinel is exempt: its ports face the embedding scope.
    fn check_mandatory_inputs(&self) -> Result<(), GraphError> {
        let input_sentinel = self.input_sentinel_id();
        for entry in &self.nodes {
            if Some(entry.id) == input_sentinel {
                continue;
            }
            let node = entry.node.borrow();
            for port in node.base().inputs() {
                if port.is_link_mandatory() && !port.is_linked() {
                    return Err(GraphError::UnlinkedMandatoryInput {
                        node: node.instance_name().to_owned(),
                        port: port.name().to_owned(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Kahn's algorithm over the deduplicated link set, grouping nodes into
    /// levels. Within a level, nodes keep their insertion order.
    fn level_order(&self) -> Result<Vec<Vec<NodeId>>, GraphError> {
        let ids: Vec<NodeId> = self.nodes.iter().map(|e| e.id).collect();
        let index_of: HashMap<NodeId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        // Parallel links between the same pair count as one edge.
        let mut edges: HashSet<(usize, usize)> = HashSet::new();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
        let mut indegree = vec![0_usize; ids.len()];
        for link in &self.links {
            if let (Some(&from), Some(&to)) = (index_of.get(&link.from), index_of.get(&link.to)) {
                if edges.insert((from, to)) {
                    successors[from].push(to);
                    indegree[to] += 1;
                }
            }
        }

        let mut placed = vec![false; ids.len()];
        let mut levels: Vec<Vec<NodeId>> = Vec::new();
        let mut ready: Vec<usize> = (0..ids.len()).filter(|i| indegree[*i] == 0).collect();
        while !ready.is_empty() {
            let mut next: Vec<usize> = Vec::new();
            for i in &ready {
                placed[*i] = true;
                for to in &successors[*i] {
                    indegree[*to] -= 1;
                    if indegree[*to] == 0 {
                        next.push(*to);
                    }
                }
            }
            // Indices follow insertion order within a level.
            next.sort_unstable();
            levels.push(ready.into_iter().map(|i| ids[i]).collect());
            ready = next;
        }
        if placed.iter().any(|done| !done) {
            let stuck: Vec<String> = (0..ids.len())
                .filter(|i| !placed[*i])
                .filter_map(|i| self.instance_of(ids[i]))
                .collect();
            error!(nodes = ?stuck, "cycle detected during compilation");
            return Err(GraphError::Cycle { nodes: stuck });
        }
        Ok(levels)
    }
}
