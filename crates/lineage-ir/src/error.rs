//! IR construction errors.

use thiserror::Error;

/// Errors raised while constructing an IR value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("unknown operation type: {0}")]
    UnknownOpType(String),

    #[error("unknown column type: {0}")]
    UnknownColumnType(String),

    #[error("duplicate operation id: {0}")]
    DuplicateOperation(String),

    #[error("duplicate dataset id: {0}")]
    DuplicateDataset(String),
}
