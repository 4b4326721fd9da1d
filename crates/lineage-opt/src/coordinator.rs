//! The optimization sequence: promote, collapse, then validate.

use lineage_ir::Pipeline;
use tracing::{info, warn};

use crate::collapser::VerticalCollapser;
use crate::error::OptimizeError;
use crate::pass::Pass;
use crate::promoter::SemanticPromoter;
use crate::validator::GraphValidator;

/// Sizes of a pipeline before and after optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptimizationSummary {
    pub operations_before: usize,
    pub operations_after: usize,
    pub datasets_before: usize,
    pub datasets_after: usize,
}

impl OptimizationSummary {
    /// Percentage of operations removed.
    pub fn reduction_percent(&self) -> f64 {
        if self.operations_before == 0 {
            return 0.0;
        }
        let removed = self.operations_before.saturating_sub(self.operations_after);
        removed as f64 / self.operations_before as f64 * 100.0
    }
}

/// Runs the passes in order and gates the result on validation.
pub struct OptimizationCoordinator {
    validate: bool,
}

impl OptimizationCoordinator {
    pub fn new() -> Self {
        Self { validate: true }
    }

    /// Disable the validation gate, e.g. to inspect a partially specified
    /// trace that is known to contain islands.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Optimize a pipeline, failing with every validation finding if the
    /// result is not a single well-formed DAG.
    pub fn optimize(&self, pipeline: Pipeline) -> Result<Pipeline, OptimizeError> {
        self.optimize_with_summary(pipeline).map(|(pipeline, _)| pipeline)
    }

    pub fn optimize_with_summary(
        &self,
        pipeline: Pipeline,
    ) -> Result<(Pipeline, OptimizationSummary), OptimizeError> {
        let mut summary = OptimizationSummary {
            operations_before: pipeline.operations().len(),
            datasets_before: pipeline.datasets().len(),
            ..OptimizationSummary::default()
        };

        let passes: Vec<Box<dyn Pass>> = vec![Box::new(SemanticPromoter), Box::new(VerticalCollapser)];

        let mut result = pipeline;
        for pass in passes {
            info!(pass = pass.name(), "running pass");
            result = pass.run(result);
        }

        summary.operations_after = result.operations().len();
        summary.datasets_after = result.datasets().len();

        if self.validate {
            let errors = GraphValidator::new(&result).validate();
            if !errors.is_empty() {
                for error in &errors {
                    warn!(%error, "validation failed");
                }
                return Err(OptimizeError::Rejected { errors });
            }
        }

        info!(
            operations_before = summary.operations_before,
            operations_after = summary.operations_after,
            "optimization complete"
        );
        Ok((result, summary))
    }
}

impl Default for OptimizationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_ir::{Dataset, GenericParams, Operation, PipelineBuilder};

    #[test]
    fn test_coordinator_runs_full_chain() {
        let pipeline = PipelineBuilder::new()
            .metadata("id", "test_coord")
            .dataset(Dataset::new("ds1", "file"))
            .operation(Operation::compute("op1", "ds1", "ds2", "x", "1"))
            .build()
            .unwrap();

        let result = OptimizationCoordinator::new().optimize(pipeline).unwrap();
        assert_eq!(result.metadata().get("id").map(String::as_str), Some("test_coord"));
        assert_eq!(result.operations().len(), 1);
    }

    #[test]
    fn test_reports_every_finding() {
        let pipeline = PipelineBuilder::new()
            .dataset(Dataset::new("ds2", "derived"))
            .operation(Operation::compute("op1", "ds1", "ds2", "x", "salary + bonus"))
            .operation(Operation::load("island", "ds9"))
            .build()
            .unwrap();

        let err = OptimizationCoordinator::new().optimize(pipeline).unwrap_err();
        let messages: Vec<String> = err.errors().iter().map(ToString::to_string).collect();
        assert_eq!(messages.len(), 4, "{:?}", messages);
        assert!(messages[0].contains("found 2 islands"));
        assert!(messages[1].contains("missing input dataset 'ds1'"));
        assert!(messages[2].contains("'salary'"));
        assert!(messages[3].contains("'bonus'"));
    }

    #[test]
    fn test_validation_can_be_disabled() {
        let pipeline = PipelineBuilder::new()
            .operation(Operation::load("l1", "a"))
            .operation(Operation::load("l2", "b"))
            .build()
            .unwrap();
        let result = OptimizationCoordinator::new()
            .with_validation(false)
            .optimize(pipeline);
        assert!(result.is_ok());
    }

    #[test]
    fn test_summary_counts_reduction() {
        let pipeline = PipelineBuilder::new()
            .dataset(Dataset::new("a", "f"))
            .dataset(Dataset::new("b", "f"))
            .dataset(Dataset::new("c", "f"))
            .dataset(Dataset::new("d", "f"))
            .operation(Operation::load("load", "a"))
            .operation(
                Operation::generic("noise", GenericParams::new("EXECUTE"))
                    .with_inputs(["a"])
                    .with_outputs(["b"]),
            )
            .operation(Operation::compute("c1", "b", "c", "x", "1"))
            .operation(Operation::compute("c2", "c", "d", "y", "x"))
            .build()
            .unwrap();

        let (result, summary) = OptimizationCoordinator::new()
            .with_validation(false)
            .optimize_with_summary(pipeline)
            .unwrap();

        assert_eq!(result.operations().len(), 2);
        assert_eq!(summary.operations_before, 4);
        assert_eq!(summary.operations_after, 2);
        assert_eq!(summary.datasets_before, 4);
        assert_eq!(summary.datasets_after, 2);
        assert!((summary.reduction_percent() - 50.0).abs() < f64::EPSILON);
    }
}
