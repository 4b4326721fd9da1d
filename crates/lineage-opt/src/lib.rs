//! Lineage Optimizer
//!
//! Passes over the lineage IR:
//! - Semantic promotion of trace commands (`promoter`)
//! - Vertical collapse of compute runs (`collapser`)
//! - Topology and column provenance validation (`validator`)
//! - The pass sequence with its validation gate (`coordinator`)

pub mod pass;
pub mod promoter;
pub mod collapser;
pub mod graph;
pub mod lexer;
pub mod error;
pub mod validator;
pub mod coordinator;

pub use pass::Pass;
pub use promoter::SemanticPromoter;
pub use collapser::{collect_garbage, VerticalCollapser};
pub use graph::{DataflowGraph, NodeKey};
pub use error::{OptimizeError, ValidationError};
pub use validator::GraphValidator;
pub use coordinator::{OptimizationCoordinator, OptimizationSummary};
