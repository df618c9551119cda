use crate::graph::DependencyGraph;
use crate::registry::OperatorRegistry;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use pipecore::{GraphError, OperatorDescriptor, PipelineDefinition};
use std::collections::HashMap;

/// Levelled execution order of one pipeline, computed once and shared
/// read-only by every request.
///
/// Operators within a level have no ordering between them. The order they
/// are listed in is stable for a given plan but carries no meaning.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pipeline: String,
    levels: Vec<Vec<String>>,
    descriptors: HashMap<String, OperatorDescriptor>,
}

impl ExecutionPlan {
    /// Validate a definition against the registry and level it.
    pub fn build(
        definition: &PipelineDefinition,
        registry: &OperatorRegistry,
    ) -> Result<Self, GraphError> {
        let graph = DependencyGraph::build(definition, registry)?;
        Self::from_graph(graph)
    }

    /// Kahn's algorithm, one frontier at a time.
    ///
    /// Each frontier becomes a level; draining it releases the dependents
    /// whose in-degree drops to zero into the next frontier. If fewer nodes
    /// are emitted than the graph holds, the remainder sits on a cycle.
    pub fn from_graph(graph: DependencyGraph) -> Result<Self, GraphError> {
        let inner = graph.inner();
        let mut in_degree: HashMap<NodeIndex, usize> = inner
            .node_indices()
            .map(|idx| (idx, inner.neighbors_directed(idx, Direction::Incoming).count()))
            .collect();

        let mut frontier: Vec<NodeIndex> = inner
            .node_indices()
            .filter(|idx| in_degree[idx] == 0)
            .collect();

        let mut levels = Vec::new();
        let mut emitted = 0;
        while !frontier.is_empty() {
            emitted += frontier.len();

            let mut next = Vec::new();
            for &node in &frontier {
                for dependent in inner.neighbors_directed(node, Direction::Outgoing) {
                    if let Some(degree) = in_degree.get_mut(&dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(dependent);
                        }
                    }
                }
            }
            next.sort_unstable();

            levels.push(frontier.iter().map(|idx| inner[*idx].clone()).collect());
            frontier = next;
        }

        if emitted != inner.node_count() {
            let mut unresolved: Vec<String> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(idx, _)| inner[*idx].clone())
                .collect();
            unresolved.sort();

            return Err(GraphError::CyclicDependency {
                pipeline: graph.pipeline().to_string(),
                unresolved,
            });
        }

        Ok(Self {
            pipeline: graph.pipeline().to_string(),
            levels,
            descriptors: graph.into_descriptors(),
        })
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    pub fn operator_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Index of the level holding `name`.
    pub fn level_of(&self, name: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|op| op == name))
    }

    pub fn descriptor(&self, name: &str) -> Option<&OperatorDescriptor> {
        self.descriptors.get(name)
    }
}
