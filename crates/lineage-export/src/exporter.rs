//! Exporter trait.

use lineage_ir::Pipeline;

/// Renders a pipeline into a textual artifact.
pub trait Exporter {
    fn export(&self, pipeline: &Pipeline) -> Result<String, ExportError>;
}

/// Export error.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("pipeline has no operations to export")]
    EmptyPipeline,
}
