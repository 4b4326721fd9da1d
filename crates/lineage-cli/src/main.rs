//! Lineage CLI

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lineage_export::{Exporter, MermaidExporter};
use lineage_ir::Pipeline;
use lineage_opt::{GraphValidator, OptimizationCoordinator, OptimizeError};
use miette::Report;
use tracing::info;

use logging::{setup_logging, LogFormat};

#[derive(Parser)]
#[command(name = "lineage")]
#[command(version)]
#[command(about = "Optimizer and validator for traced ETL pipelines")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Promote, collapse and validate a pipeline
    Optimize {
        /// Pipeline YAML file
        file: PathBuf,
        /// Write a Mermaid diagram of the optimized pipeline
        #[arg(long)]
        visualize: Option<PathBuf>,
        /// Write the optimized pipeline as YAML
        #[arg(long)]
        dump_yaml: Option<PathBuf>,
        /// Skip the validation gate
        #[arg(long)]
        no_validate: bool,
    },
    /// Validate a pipeline without optimizing it
    Check {
        /// Pipeline YAML file
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet, cli.log_format);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Optimize { file, visualize, dump_yaml, no_validate } => cmd_optimize(
            &file,
            visualize.as_deref(),
            dump_yaml.as_deref(),
            !no_validate,
        ),
        Command::Check { file } => cmd_check(&file),
    }
}

fn load(file: &Path) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(file)
        .map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
    let pipeline = lineage_ir::from_yaml_str(&source)?;
    info!(
        file = %file.display(),
        operations = pipeline.operations().len(),
        datasets = pipeline.datasets().len(),
        "loaded pipeline"
    );
    Ok(pipeline)
}

fn cmd_optimize(
    file: &Path,
    visualize: Option<&Path>,
    dump_yaml: Option<&Path>,
    validate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = load(file)?;

    let coordinator = OptimizationCoordinator::new().with_validation(validate);
    let (optimized, summary) = match coordinator.optimize_with_summary(pipeline) {
        Ok(result) => result,
        Err(err @ OptimizeError::Rejected { .. }) => {
            eprintln!("{:?}", Report::new(err));
            return Err("optimization rejected".into());
        }
    };

    println!(
        "{} ops -> {} ops (-{:.1}%)",
        summary.operations_before,
        summary.operations_after,
        summary.reduction_percent()
    );

    if let Some(path) = dump_yaml {
        std::fs::write(path, lineage_ir::to_yaml_string(&optimized)?)?;
        println!("Wrote optimized IR to {}", path.display());
    }

    if let Some(path) = visualize {
        let diagram = MermaidExporter::new().fenced(true).export(&optimized)?;
        std::fs::write(path, diagram)?;
        println!("Wrote diagram to {}", path.display());
    }

    Ok(())
}

fn cmd_check(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = load(file)?;
    let errors = GraphValidator::new(&pipeline).validate();

    if errors.is_empty() {
        println!(
            "OK: {} operations, {} datasets",
            pipeline.operations().len(),
            pipeline.datasets().len()
        );
        return Ok(());
    }

    let count = errors.len();
    for error in errors {
        eprintln!("{:?}", Report::new(error));
    }
    Err(format!("{} validation error(s)", count).into())
}
