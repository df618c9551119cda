use crate::registry::OperatorRegistry;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use pipecore::{GraphError, OperatorDescriptor, PipelineDefinition};
use std::collections::HashMap;

/// Validated adjacency structure of one pipeline.
///
/// An edge `a -> b` means `a` must complete before `b` may run.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pipeline: String,
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
    descriptors: HashMap<String, OperatorDescriptor>,
}

impl DependencyGraph {
    /// Build a dependency graph from a pipeline definition.
    ///
    /// Every node (dependency keys, targets and declared operators) must
    /// resolve in `registry`. Blank dependency entries are skipped. Cycle
    /// detection is left to the leveler.
    pub fn build(
        definition: &PipelineDefinition,
        registry: &OperatorRegistry,
    ) -> Result<Self, GraphError> {
        let pipeline = definition.name.clone();
        let names = definition.operator_names();
        if names.is_empty() {
            return Err(GraphError::EmptyPipeline { pipeline });
        }

        let mut descriptors = HashMap::with_capacity(names.len());
        for name in &names {
            let descriptor = definition.descriptor(name);
            if !registry.contains(&descriptor.operator_type) {
                return Err(GraphError::UnknownOperator {
                    pipeline,
                    name: name.clone(),
                });
            }
            descriptors.insert(name.clone(), descriptor);
        }

        let edges = definition.edges();
        if let Some(edge) = edges.iter().find(|edge| edge.from == edge.to) {
            return Err(GraphError::SelfDependency {
                pipeline,
                name: edge.from.clone(),
            });
        }

        let mut graph = DiGraph::with_capacity(names.len(), edges.len());
        let mut index = HashMap::with_capacity(names.len());
        for name in names {
            let idx = graph.add_node(name.clone());
            index.insert(name, idx);
        }

        for edge in &edges {
            // Both endpoints were collected from the same definition above.
            let (Some(&from), Some(&to)) = (index.get(&edge.from), index.get(&edge.to)) else {
                continue;
            };
            graph.update_edge(from, to, ());
        }

        tracing::debug!(
            pipeline = %pipeline,
            operators = graph.node_count(),
            edges = graph.edge_count(),
            "Built dependency graph"
        );

        Ok(Self {
            pipeline,
            graph,
            index,
            descriptors,
        })
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Operators that must complete before `name`.
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Operators waiting on `name`.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    pub fn descriptor(&self, name: &str) -> Option<&OperatorDescriptor> {
        self.descriptors.get(name)
    }

    pub(crate) fn inner(&self) -> &DiGraph<String, ()> {
        &self.graph
    }

    pub(crate) fn into_descriptors(self) -> HashMap<String, OperatorDescriptor> {
        self.descriptors
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        names.sort_unstable();
        names
    }
}
