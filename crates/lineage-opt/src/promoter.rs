//! Semantic promotion of generic trace commands.
//!
//! Generic operations are either promoted to a structural kind, dropped as
//! syntactic noise, or kept untouched. Dropping a pass-through node records
//! an alias from its output to its input so that later consumers are
//! rewired to the upstream source.

use std::collections::HashMap;

use lineage_ir::{FilterParams, GenericParams, OpKind, Pipeline, SortParams};
use tracing::{debug, info};

use crate::pass::Pass;

/// Commands that carry no dataflow meaning.
const NOISE_COMMANDS: [&str; 6] = ["DO", "END", "FORMATS", "LIST", "STRING", "EXECUTE"];

/// Placeholder used when neither `args` nor `raw_content` is available.
const UNKNOWN_ARGS: &str = "unknown";

/// Semantic promotion pass.
pub struct SemanticPromoter;

impl Pass for SemanticPromoter {
    fn name(&self) -> &str {
        "semantic-promotion"
    }

    fn run(&self, pipeline: Pipeline) -> Pipeline {
        let (metadata, datasets, operations) = pipeline.into_parts();
        let before = operations.len();

        let mut aliases = AliasMap::default();
        let mut kept = Vec::with_capacity(before);
        let mut promoted = 0usize;

        for mut op in operations {
            op.inputs = op.inputs.iter().map(|id| aliases.resolve(id)).collect();

            let promotion = match &op.kind {
                OpKind::Generic(params) => classify(params),
                _ => Promotion::Keep,
            };

            match promotion {
                Promotion::Drop => {
                    if let ([input], [output]) = (op.inputs.as_slice(), op.outputs.as_slice()) {
                        debug!(op = %op.id, %output, %input, "dropped noise operation, rewiring");
                        aliases.insert(output.clone(), input.clone());
                    } else {
                        debug!(op = %op.id, "dropped noise operation without rewiring");
                    }
                }
                Promotion::Promote(kind) => {
                    debug!(op = %op.id, to = %kind.op_type(), "promoted generic operation");
                    op.kind = kind;
                    promoted += 1;
                    kept.push(op);
                }
                Promotion::Keep => kept.push(op),
            }
        }

        info!(
            before,
            after = kept.len(),
            promoted,
            aliases = aliases.len(),
            "semantic promotion complete"
        );
        Pipeline::from_parts(metadata, datasets, kept)
    }
}

/// Rename table from a dropped node's output to its effective source.
#[derive(Debug, Default)]
struct AliasMap {
    renames: HashMap<String, String>,
}

impl AliasMap {
    /// Resolve an id through the table.
    ///
    /// Each recorded source was itself resolved when recorded, so one
    /// lookup yields the end of the chain.
    fn resolve(&self, id: &str) -> String {
        self.renames.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn insert(&mut self, from: String, to: String) {
        self.renames.insert(from, to);
    }

    fn len(&self) -> usize {
        self.renames.len()
    }
}

/// What to do with a generic operation.
#[derive(Debug, PartialEq)]
enum Promotion {
    Drop,
    Promote(OpKind),
    /// Unrecognized commands stay generic.
    Keep,
}

fn classify(params: &GenericParams) -> Promotion {
    let command = params.command().unwrap_or_default().trim().to_uppercase();
    let root = command.split_whitespace().next().unwrap_or("");

    if NOISE_COMMANDS.contains(&root) || NOISE_COMMANDS.contains(&command.as_str()) {
        return Promotion::Drop;
    }

    if command.contains("SORT") {
        return Promotion::Promote(OpKind::Sort(SortParams::new(promoted_args(params))));
    }

    if command.contains("SELECT IF") || command.contains("FILTER") || command == "IF" {
        return Promotion::Promote(OpKind::Filter(FilterParams::new(promoted_args(params))));
    }

    Promotion::Keep
}

/// The command's arguments, falling back to its raw text.
fn promoted_args(params: &GenericParams) -> String {
    match params.args() {
        Some(args) if !args.is_empty() => args.into_owned(),
        _ => params
            .raw_content()
            .map(|raw| raw.into_owned())
            .unwrap_or_else(|| UNKNOWN_ARGS.to_string()),
    }
}
