//! Validation findings and optimization failures.

use miette::Diagnostic;
use thiserror::Error;

/// A structural or semantic problem found by the validator.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("duplicate operation id: {operation}")]
    #[diagnostic(
        code(lineage::topology::duplicate_operation),
        help("a batch operation is named after its first member; rename the clashing operation")
    )]
    DuplicateOperation { operation: String },

    #[error("cycle detected in pipeline: {}", .path.join(" -> "))]
    #[diagnostic(code(lineage::topology::cycle))]
    Cycle { path: Vec<String> },

    #[error("disconnected component detected: found {islands} islands")]
    #[diagnostic(
        code(lineage::topology::islands),
        help("every dataset and operation should eventually feed a single sink")
    )]
    Disconnected { islands: usize },

    #[error("missing input dataset '{dataset}' for operation '{operation}'")]
    #[diagnostic(code(lineage::topology::missing_input))]
    MissingInput { operation: String, dataset: String },

    #[error(
        "ghost column detected: operation '{operation}' uses variable '{token}' \
         which does not exist in input datasets [{}]",
        .inputs.join(", ")
    )]
    #[diagnostic(code(lineage::semantic::ghost_column))]
    GhostColumn {
        operation: String,
        token: String,
        inputs: Vec<String>,
    },
}

impl ValidationError {
    /// Whether this finding concerns graph structure rather than expressions.
    pub fn is_structural(&self) -> bool {
        !matches!(self, ValidationError::GhostColumn { .. })
    }
}

/// Failure of a full optimization run.
#[derive(Error, Diagnostic, Debug)]
pub enum OptimizeError {
    #[error("pipeline rejected by validation with {} error(s)", .errors.len())]
    #[diagnostic(code(lineage::optimize::rejected))]
    Rejected {
        #[related]
        errors: Vec<ValidationError>,
    },
}

impl OptimizeError {
    /// Every validation finding, in report order.
    pub fn errors(&self) -> &[ValidationError] {
        match self {
            OptimizeError::Rejected { errors } => errors,
        }
    }
}
