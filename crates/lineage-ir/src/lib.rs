//! Lineage Intermediate Representation
//!
//! Typed dataflow IR for ETL pipelines recovered from execution traces.

pub mod model;
pub mod error;
pub mod builder;
pub mod persist;

pub use model::*;
pub use error::IrError;
pub use builder::PipelineBuilder;
pub use persist::{from_yaml_str, to_yaml_string, PersistError};
