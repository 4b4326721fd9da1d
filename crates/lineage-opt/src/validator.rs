//! Topology and column provenance checks.

use std::collections::{HashMap, HashSet};

use lineage_ir::{ComputeParams, Dataset, OpKind, Operation, Pipeline};

use crate::error::ValidationError;
use crate::graph::DataflowGraph;
use crate::lexer::identifiers;

/// Function and keyword names that never denote a column.
pub const KNOWN_FUNCTIONS: [&str; 17] = [
    "NUMBER", "DATE", "MDY", "TRUNC", "MOD", "SUM", "MEAN", "MAX", "MIN", "SYSMIS", "AND", "OR",
    "NOT", "IF", "THRU", "LOWEST", "HIGHEST",
];

/// Validator over one pipeline snapshot.
///
/// Findings are returned as data; an empty list means the check passed.
pub struct GraphValidator<'a> {
    pipeline: &'a Pipeline,
    datasets: HashMap<&'a str, &'a Dataset>,
    graph: DataflowGraph,
}

impl<'a> GraphValidator<'a> {
    pub fn new(pipeline: &'a Pipeline) -> Self {
        let datasets = pipeline
            .datasets()
            .iter()
            .map(|ds| (ds.id.as_str(), ds))
            .collect();
        Self {
            pipeline,
            datasets,
            graph: DataflowGraph::from_pipeline(pipeline),
        }
    }

    /// Check operation id uniqueness, acyclicity, connectivity and that
    /// every input is declared.
    ///
    /// Operations sharing an id share one graph node, so the graph findings
    /// that follow a duplicate report describe the merged node.
    pub fn validate_topology(&self) -> Vec<ValidationError> {
        let mut seen = HashSet::new();
        let mut errors: Vec<ValidationError> = self
            .pipeline
            .operations()
            .iter()
            .filter(|op| !seen.insert(op.id.as_str()))
            .map(|op| ValidationError::DuplicateOperation {
                operation: op.id.clone(),
            })
            .collect();

        errors.extend(self.graph.simple_cycles().into_iter().map(|cycle| {
            ValidationError::Cycle {
                path: cycle
                    .into_iter()
                    .map(|idx| self.graph.node(idx).id().to_string())
                    .collect(),
            }
        }));

        let islands = self.graph.connected_components().len();
        if islands > 1 {
            errors.push(ValidationError::Disconnected { islands });
        }

        for op in self.pipeline.operations() {
            for input in &op.inputs {
                if !self.datasets.contains_key(input.as_str()) {
                    errors.push(ValidationError::MissingInput {
                        operation: op.id.clone(),
                        dataset: input.clone(),
                    });
                }
            }
        }

        errors
    }

    /// Check that compute expressions only use columns of their inputs.
    pub fn run(&self) -> Vec<ValidationError> {
        self.pipeline
            .operations()
            .iter()
            .flat_map(|op| match &op.kind {
                OpKind::Compute(params) => self.validate_compute(op, params),
                _ => Vec::new(),
            })
            .collect()
    }

    /// Both checks, topology findings first.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = self.validate_topology();
        errors.extend(self.run());
        errors
    }

    fn validate_compute(&self, op: &Operation, params: &ComputeParams) -> Vec<ValidationError> {
        let expression = params.expression();
        if expression.is_empty() {
            return Vec::new();
        }

        let columns: HashSet<String> = op
            .inputs
            .iter()
            .filter_map(|id| self.datasets.get(id.as_str()))
            .flat_map(|ds| ds.columns.iter())
            .map(|col| col.name.to_uppercase())
            .collect();

        identifiers(&expression)
            .into_iter()
            .filter(|token| {
                let upper = token.to_uppercase();
                !KNOWN_FUNCTIONS.contains(&upper.as_str()) && !columns.contains(&upper)
            })
            .map(|token| ValidationError::GhostColumn {
                operation: op.id.clone(),
                token,
                inputs: op.inputs.clone(),
            })
            .collect()
    }
}
