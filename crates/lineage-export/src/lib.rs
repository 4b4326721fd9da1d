//! Lineage Export
//!
//! Renderers for optimized pipelines.

pub mod exporter;
pub mod mermaid;

pub use exporter::*;
pub use mermaid::MermaidExporter;
