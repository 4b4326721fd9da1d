//! Programmatic pipeline construction.
//!
//! Ingestion normally produces pipelines from YAML; the builder covers
//! callers that assemble one in code.

use indexmap::IndexMap;

use crate::error::IrError;
use crate::model::{
    ComputeParams, Dataset, FilterParams, GenericParams, OpKind, Operation, Params, Pipeline,
    SortParams,
};

/// Pipeline builder state.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    metadata: IndexMap<String, String>,
    datasets: Vec<Dataset>,
    operations: Vec<Operation>,
}

impl PipelineBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Register a dataset.
    pub fn dataset(mut self, dataset: Dataset) -> Self {
        self.datasets.push(dataset);
        self
    }

    /// Append an operation; order of calls is execution order.
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Build the pipeline, checking id uniqueness.
    pub fn build(self) -> Result<Pipeline, IrError> {
        Pipeline::new(self.metadata, self.datasets, self.operations)
    }
}

impl Operation {
    /// Create an operation with no inputs or outputs.
    pub fn new(id: impl Into<String>, kind: OpKind) -> Self {
        Self {
            id: id.into(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    /// A load producing a single dataset.
    pub fn load(id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(id, OpKind::Load(Params::new())).with_outputs([output])
    }

    /// A save consuming a single dataset.
    pub fn save(id: impl Into<String>, input: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(id, OpKind::Save(Params::new()))
            .with_inputs([input])
            .with_outputs([output])
    }

    /// A single-input compute writing `target` from `expression`.
    pub fn compute(
        id: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        target: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self::new(id, OpKind::Compute(ComputeParams::new(target, expression)))
            .with_inputs([input])
            .with_outputs([output])
    }

    pub fn filter(
        id: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self::new(id, OpKind::Filter(FilterParams::new(condition)))
            .with_inputs([input])
            .with_outputs([output])
    }

    pub fn sort(
        id: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        keys: impl Into<String>,
    ) -> Self {
        Self::new(id, OpKind::Sort(SortParams::new(keys)))
            .with_inputs([input])
            .with_outputs([output])
    }

    /// An un-promoted trace command.
    pub fn generic(id: impl Into<String>, params: GenericParams) -> Self {
        Self::new(id, OpKind::Generic(params))
    }
}
