//! Mermaid flowchart exporter.

use lineage_ir::{OpKind, Operation, Pipeline};
use tracing::debug;

use crate::exporter::{ExportError, Exporter};

const CLASS_DEFS: [&str; 4] = [
    "classDef dataset fill:#e1f5fe,stroke:#01579b,stroke-width:2px,rx:5,ry:5;",
    "classDef op fill:#fff9c4,stroke:#fbc02d,stroke-width:2px;",
    "classDef batch fill:#c8e6c9,stroke:#2e7d32,stroke-width:4px;",
    "classDef barrier fill:#ffccbc,stroke:#d84315,stroke-width:2px;",
];

/// Renders a pipeline as a top-down Mermaid graph.
///
/// Batch nodes are highlighted to show how many computes they absorbed, and
/// joins, aggregates and saves are drawn as barriers.
#[derive(Debug, Default)]
pub struct MermaidExporter {
    fenced: bool,
}

impl MermaidExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the diagram in a fenced code block for Markdown files.
    pub fn fenced(mut self, fenced: bool) -> Self {
        self.fenced = fenced;
        self
    }
}

impl Exporter for MermaidExporter {
    fn export(&self, pipeline: &Pipeline) -> Result<String, ExportError> {
        if pipeline.operations().is_empty() {
            return Err(ExportError::EmptyPipeline);
        }

        let mut lines = vec!["graph TD".to_string()];
        lines.extend(CLASS_DEFS.iter().map(|def| format!("    {}", def)));

        for ds in pipeline.datasets() {
            lines.push(format!("    {id}[(\"{id}\")]:::dataset", id = ds.id));
        }

        for op in pipeline.operations() {
            let (label, class) = node_style(op);
            lines.push(format!("    {}[\"{}\"]:::{}", op.id, label, class));
            for input in &op.inputs {
                lines.push(format!("    {} --> {}", input, op.id));
            }
            for output in &op.outputs {
                lines.push(format!("    {} --> {}", op.id, output));
            }
        }

        debug!(
            operations = pipeline.operations().len(),
            datasets = pipeline.datasets().len(),
            "rendered mermaid diagram"
        );

        let diagram = lines.join("\n");
        if self.fenced {
            Ok(format!("```mermaid\n{}\n```", diagram))
        } else {
            Ok(diagram)
        }
    }
}

fn node_style(op: &Operation) -> (String, &'static str) {
    match &op.kind {
        OpKind::BatchCompute(params) => (
            format!("BATCH COMPUTE<br/>(Merged {} steps)", params.computes.len()),
            "batch",
        ),
        OpKind::Join(_) | OpKind::Aggregate(_) | OpKind::Save(_) => {
            (format!("{}<br/>{}", op.op_type().label(), op.id), "barrier")
        }
        _ => (format!("{}<br/>{}", op.op_type().label(), op.id), "op"),
    }
}
