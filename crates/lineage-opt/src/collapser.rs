//! Vertical collapse of compute runs.
//!
//! Consecutive compute operations where each one consumes an output of the
//! previous one are merged into a single `batch_compute` operation. Any
//! other operation kind is a barrier. Datasets that end up referenced by no
//! surviving operation are garbage collected.

use std::collections::HashSet;

use lineage_ir::{BatchParams, ComputeParams, Dataset, OpKind, Operation, Pipeline};
use tracing::{debug, info, warn};

use crate::pass::Pass;

/// Vertical collapse pass.
pub struct VerticalCollapser;

impl Pass for VerticalCollapser {
    fn name(&self) -> &str {
        "vertical-collapse"
    }

    fn run(&self, pipeline: Pipeline) -> Pipeline {
        let (metadata, datasets, operations) = pipeline.into_parts();
        let ops_before = operations.len();
        let datasets_before = datasets.len();

        let mut run = ComputeRun::default();
        let mut emitted = Vec::with_capacity(ops_before);

        for op in operations {
            if op.is_compute() {
                if !run.continues_with(&op) {
                    run.flush_into(&mut emitted);
                }
                run.push(op);
            } else {
                run.flush_into(&mut emitted);
                emitted.push(op);
            }
        }
        run.flush_into(&mut emitted);

        let mut seen = HashSet::new();
        for op in &emitted {
            if !seen.insert(op.id.as_str()) {
                warn!(op = %op.id, "batch id clashes with an existing operation");
            }
        }

        let datasets = collect_garbage(&emitted, datasets);

        info!(
            ops_before,
            ops_after = emitted.len(),
            datasets_before,
            datasets_after = datasets.len(),
            "vertical collapse complete"
        );
        Pipeline::from_parts(metadata, datasets, emitted)
    }
}

/// Compute operations believed to form one merge run.
#[derive(Debug, Default)]
struct ComputeRun {
    ops: Vec<Operation>,
}

impl ComputeRun {
    /// Whether `op` may extend the run: the run is empty, or `op` consumes
    /// at least one output of the last buffered operation.
    fn continues_with(&self, op: &Operation) -> bool {
        let Some(last) = self.ops.last() else {
            return true;
        };
        let produced: HashSet<&str> = last.outputs.iter().map(String::as_str).collect();
        op.inputs.iter().any(|input| produced.contains(input.as_str()))
    }

    fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    fn flush_into(&mut self, out: &mut Vec<Operation>) {
        match self.ops.len() {
            0 => {}
            1 => out.extend(self.ops.drain(..)),
            _ => out.push(self.merge()),
        }
    }

    /// Replace the buffered run with one batch operation.
    fn merge(&mut self) -> Operation {
        let ops = std::mem::take(&mut self.ops);
        let first = &ops[0];
        let last = &ops[ops.len() - 1];

        let id = format!("batch_{}", first.id);
        let inputs = first.inputs.clone();
        let outputs = last.outputs.clone();
        debug!(
            batch = %id,
            merged = ops.len(),
            first = %first.id,
            last = %last.id,
            "merged compute run"
        );

        let computes: Vec<ComputeParams> = ops
            .into_iter()
            .filter_map(|op| match op.kind {
                OpKind::Compute(params) => Some(params),
                _ => None,
            })
            .collect();

        Operation {
            id,
            kind: OpKind::BatchCompute(BatchParams::new(computes)),
            inputs,
            outputs,
        }
    }
}

/// Keep only the datasets referenced as input or output by some operation.
///
/// Order of the surviving datasets is preserved.
pub fn collect_garbage(operations: &[Operation], datasets: Vec<Dataset>) -> Vec<Dataset> {
    let active: HashSet<&str> = operations
        .iter()
        .flat_map(|op| op.inputs.iter().chain(op.outputs.iter()))
        .map(String::as_str)
        .collect();

    datasets
        .into_iter()
        .filter(|ds| {
            let keep = active.contains(ds.id.as_str());
            if !keep {
                debug!(dataset = %ds.id, "collected orphaned dataset");
            }
            keep
        })
        .collect()
}
