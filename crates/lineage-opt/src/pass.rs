//! The pass interface shared by the IR-to-IR transformations.

use lineage_ir::Pipeline;

/// A trait for optimization passes.
pub trait Pass {
    /// Returns the name of this pass.
    fn name(&self) -> &str;

    /// Run the pass on a pipeline snapshot, returning the transformed one.
    fn run(&self, pipeline: Pipeline) -> Pipeline;
}
