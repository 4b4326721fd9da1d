//! YAML form of the IR.

use thiserror::Error;

use crate::model::Pipeline;

/// Errors reading or writing the persisted IR.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("invalid pipeline document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Parse a pipeline from its YAML form.
///
/// Unknown operation or column types, non-list `inputs`/`outputs` and
/// duplicate ids are rejected here, before any pass runs.
pub fn from_yaml_str(source: &str) -> Result<Pipeline, PersistError> {
    Ok(serde_yaml::from_str(source)?)
}

/// Render a pipeline in its YAML form.
pub fn to_yaml_string(pipeline: &Pipeline) -> Result<String, PersistError> {
    Ok(serde_yaml::to_string(pipeline)?)
}
