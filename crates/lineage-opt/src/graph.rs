//! Bipartite dataflow graph over datasets and operations.
//!
//! Nodes live in an arena and are addressed by index; edges run
//! dataset -> operation for every declared input and operation -> dataset
//! for every declared output. All traversals use explicit stacks so that
//! very long traces cannot exhaust the call stack.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use lineage_ir::Pipeline;

const UNVISITED: usize = usize::MAX;

/// Identity of a graph node.
///
/// Datasets and operations live in separate namespaces, so an operation
/// and a dataset sharing an id string are still distinct nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Dataset(String),
    Operation(String),
}

impl NodeKey {
    pub fn id(&self) -> &str {
        match self {
            NodeKey::Dataset(id) | NodeKey::Operation(id) => id,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Directed graph with arena-indexed nodes.
#[derive(Debug, Clone, Default)]
pub struct DataflowGraph {
    nodes: Vec<NodeKey>,
    index: HashMap<NodeKey, usize>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl DataflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of a pipeline.
    ///
    /// Nodes are inserted in operation order (the operation, then its
    /// inputs, then its outputs), followed by registered datasets that no
    /// operation references.
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        let mut graph = Self::new();
        for op in pipeline.operations() {
            let op_node = graph.add_node(NodeKey::Operation(op.id.clone()));
            for input in &op.inputs {
                let ds = graph.add_node(NodeKey::Dataset(input.clone()));
                graph.add_edge(ds, op_node);
            }
            for output in &op.outputs {
                let ds = graph.add_node(NodeKey::Dataset(output.clone()));
                graph.add_edge(op_node, ds);
            }
        }
        for ds in pipeline.datasets() {
            graph.add_node(NodeKey::Dataset(ds.id.clone()));
        }
        graph
    }

    /// Insert a node, returning its index. Existing nodes are reused.
    pub fn add_node(&mut self, key: NodeKey) -> usize {
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.nodes.len();
        self.index.insert(key.clone(), idx);
        self.nodes.push(key);
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        idx
    }

    /// Insert an edge. Parallel edges are collapsed.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        if !self.successors[from].contains(&to) {
            self.successors[from].push(to);
            self.predecessors[to].push(from);
        }
    }

    pub fn node(&self, idx: usize) -> &NodeKey {
        &self.nodes[idx]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    /// Weakly connected components, each listed in discovery order.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.nodes.len()];
        let mut components = Vec::new();

        for root in 0..self.nodes.len() {
            if seen[root] {
                continue;
            }
            seen[root] = true;
            let mut component = Vec::new();
            let mut queue = VecDeque::from([root]);
            while let Some(v) = queue.pop_front() {
                component.push(v);
                for &w in self.successors[v].iter().chain(&self.predecessors[v]) {
                    if !seen[w] {
                        seen[w] = true;
                        queue.push_back(w);
                    }
                }
            }
            components.push(component);
        }

        components
    }

    /// Every elementary cycle of the graph, as node paths.
    ///
    /// Johnson's algorithm: each strongly connected component is searched
    /// from its lowest-index node, which is then removed before the
    /// remainder is split again.
    pub fn simple_cycles(&self) -> Vec<Vec<usize>> {
        let n = self.nodes.len();
        let mut cycles = Vec::new();
        let mut pending: Vec<Vec<usize>> = self
            .strongly_connected(&vec![true; n])
            .into_iter()
            .filter(|c| self.has_cycle(c))
            .collect();

        while let Some(component) = pending.pop() {
            let Some(&start) = component.iter().min() else {
                continue;
            };
            let mut active = vec![false; n];
            for &v in &component {
                active[v] = true;
            }

            self.circuits_from(start, &active, &mut cycles);

            active[start] = false;
            pending.extend(
                self.strongly_connected(&active)
                    .into_iter()
                    .filter(|c| self.has_cycle(c)),
            );
        }

        cycles
    }

    fn has_cycle(&self, component: &[usize]) -> bool {
        match component {
            [] => false,
            [v] => self.successors[*v].contains(v),
            _ => true,
        }
    }

    /// Tarjan's algorithm restricted to `active` nodes.
    fn strongly_connected(&self, active: &[bool]) -> Vec<Vec<usize>> {
        let n = self.nodes.len();
        let mut index = vec![UNVISITED; n];
        let mut lowlink = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut next_index = 0;
        let mut components = Vec::new();
        // (node, position of the next successor to visit)
        let mut frames: Vec<(usize, usize)> = Vec::new();

        for root in 0..n {
            if !active[root] || index[root] != UNVISITED {
                continue;
            }
            index[root] = next_index;
            lowlink[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;
            frames.push((root, 0));

            while let Some(frame) = frames.last_mut() {
                let v = frame.0;
                if let Some(&w) = self.successors[v].get(frame.1) {
                    frame.1 += 1;
                    if !active[w] {
                        continue;
                    }
                    if index[w] == UNVISITED {
                        index[w] = next_index;
                        lowlink[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        frames.push((w, 0));
                    } else if on_stack[w] {
                        lowlink[v] = lowlink[v].min(index[w]);
                    }
                } else {
                    frames.pop();
                    if let Some(&(parent, _)) = frames.last() {
                        lowlink[parent] = lowlink[parent].min(lowlink[v]);
                    }
                    if lowlink[v] == index[v] {
                        let mut component = Vec::new();
                        while let Some(w) = stack.pop() {
                            on_stack[w] = false;
                            component.push(w);
                            if w == v {
                                break;
                            }
                        }
                        components.push(component);
                    }
                }
            }
        }

        components
    }

    /// Enumerate the circuits through `start` within `active`.
    fn circuits_from(&self, start: usize, active: &[bool], cycles: &mut Vec<Vec<usize>>) {
        let n = self.nodes.len();
        let mut blocked = vec![false; n];
        let mut blocked_by: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut path = vec![start];
        let mut closed = vec![false];
        let mut frames = vec![(start, 0usize)];
        blocked[start] = true;

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if let Some(&w) = self.successors[v].get(frame.1) {
                frame.1 += 1;
                if !active[w] {
                    continue;
                }
                if w == start {
                    cycles.push(path.clone());
                    if let Some(c) = closed.last_mut() {
                        *c = true;
                    }
                } else if !blocked[w] {
                    blocked[w] = true;
                    path.push(w);
                    closed.push(false);
                    frames.push((w, 0));
                }
            } else {
                frames.pop();
                path.pop();
                if closed.pop().unwrap_or(false) {
                    if let Some(c) = closed.last_mut() {
                        *c = true;
                    }
                    let mut unblock = vec![v];
                    while let Some(u) = unblock.pop() {
                        if blocked[u] {
                            blocked[u] = false;
                            unblock.append(&mut blocked_by[u]);
                        }
                    }
                } else {
                    for &w in &self.successors[v] {
                        if active[w] && !blocked_by[w].contains(&v) {
                            blocked_by[w].push(v);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_ir::{Dataset, Operation, PipelineBuilder};

    fn ids(graph: &DataflowGraph, path: &[usize]) -> Vec<String> {
        path.iter().map(|&i| graph.node(i).id().to_string()).collect()
    }

    #[test]
    fn test_two_operation_cycle() {
        let pipeline = PipelineBuilder::new()
            .operation(Operation::compute("op_1", "ds_a", "ds_b", "x", "1"))
            .operation(Operation::compute("op_2", "ds_b", "ds_a", "y", "1"))
            .build()
            .unwrap();
        let graph = DataflowGraph::from_pipeline(&pipeline);
        let cycles = graph.simple_cycles();

        assert_eq!(cycles.len(), 1);
        assert_eq!(ids(&graph, &cycles[0]), vec!["op_1", "ds_b", "op_2", "ds_a"]);
    }

    #[test]
    fn test_shared_node_cycles_enumerated_separately() {
        // x -> op1 -> y, and y flows back to x through either op2 or op3.
        let pipeline = PipelineBuilder::new()
            .operation(Operation::compute("op1", "x", "y", "a", "1"))
            .operation(Operation::compute("op2", "y", "x", "b", "1"))
            .operation(Operation::compute("op3", "y", "x", "c", "1"))
            .build()
            .unwrap();
        let graph = DataflowGraph::from_pipeline(&pipeline);
        let mut cycles: Vec<_> = graph.simple_cycles().iter().map(|c| ids(&graph, c)).collect();
        cycles.sort();

        assert_eq!(
            cycles,
            vec![
                vec!["op1", "y", "op2", "x"],
                vec!["op1", "y", "op3", "x"],
            ]
        );
    }

    #[test]
    fn test_nested_cycles_found_after_start_removed() {
        // a -> o1 -> b -> o2 -> a, and b -> o3 -> c -> o4 -> b.
        let pipeline = PipelineBuilder::new()
            .operation(Operation::compute("o1", "a", "b", "x", "1"))
            .operation(Operation::compute("o2", "b", "a", "x", "1"))
            .operation(Operation::compute("o3", "b", "c", "x", "1"))
            .operation(Operation::compute("o4", "c", "b", "x", "1"))
            .build()
            .unwrap();
        let graph = DataflowGraph::from_pipeline(&pipeline);
        assert_eq!(graph.simple_cycles().len(), 2);
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let pipeline = PipelineBuilder::new()
            .operation(Operation::load("l1", "a"))
            .operation(Operation::load("l2", "b"))
            .operation(
                Operation::new("join", lineage_ir::OpKind::Join(Default::default()))
                    .with_inputs(["a", "b"])
                    .with_outputs(["c"]),
            )
            .build()
            .unwrap();
        let graph = DataflowGraph::from_pipeline(&pipeline);
        assert!(graph.simple_cycles().is_empty());
        assert_eq!(graph.connected_components().len(), 1);
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.edge_count(), 5);
    }

    #[test]
    fn test_dataset_and_operation_namespaces_are_distinct() {
        let pipeline = PipelineBuilder::new()
            .operation(Operation::compute("shared", "shared", "out", "x", "1"))
            .build()
            .unwrap();
        let graph = DataflowGraph::from_pipeline(&pipeline);
        assert_eq!(graph.node_count(), 3);
        assert!(graph.simple_cycles().is_empty());
    }

    #[test]
    fn test_unreferenced_registry_dataset_is_an_island() {
        let pipeline = PipelineBuilder::new()
            .dataset(Dataset::new("a", "f"))
            .dataset(Dataset::new("orphan", "f"))
            .operation(Operation::load("load", "a"))
            .build()
            .unwrap();
        let graph = DataflowGraph::from_pipeline(&pipeline);
        assert_eq!(graph.connected_components().len(), 2);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let mut builder = PipelineBuilder::new();
        for i in 0..50_000 {
            builder = builder.operation(Operation::compute(
                format!("op{}", i),
                format!("ds{}", i),
                format!("ds{}", i + 1),
                "x",
                "1",
            ));
        }
        builder = builder.operation(Operation::compute("back", "ds50000", "ds0", "x", "1"));
        let graph = DataflowGraph::from_pipeline(&builder.build().unwrap());

        assert_eq!(graph.connected_components().len(), 1);
        let cycles = graph.simple_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 100_002);
    }
}
