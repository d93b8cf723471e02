//! Segmentation benchmark CLI
//!
//! Evaluates an exported ONNX segmentation model on a labelled dataset and
//! reports mIoU, accuracy, kappa and average inference time.

use super::config::CliConfigBuilder;
use crate::{
    dataset::{DatasetKind, SegmentationDataset},
    evaluator::DatasetEvaluator,
    services::{create_cli_progress_reporter, ProgressTracker},
    tracing_config::{init_cli_tracing, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;
use tracing::debug;

/// Segmentation model benchmark
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "segeval-bench")]
pub struct Cli {
    /// Deploy config (deploy.yaml) naming the ONNX model and its transforms
    #[arg(long, value_name = "DEPLOY_YAML", required_unless_present = "list_datasets")]
    pub config: Option<PathBuf>,

    /// Dataset type: Cityscapes, PascalVOC, ADE20K or Dataset
    #[arg(long, alias = "dataset_type", value_name = "NAME")]
    pub dataset_type: Option<String>,

    /// Dataset root directory
    #[arg(long, alias = "dataset_path", value_name = "DIR")]
    pub dataset_path: Option<PathBuf>,

    /// Dataset split, such as train or val
    #[arg(long, alias = "dataset_mode", default_value = "val")]
    pub dataset_mode: String,

    /// Number of classes (required for the generic Dataset type)
    #[arg(long, alias = "num_classes")]
    pub num_classes: Option<usize>,

    /// Ground-truth value excluded from all metrics
    #[arg(long, alias = "ignore_index", default_value_t = crate::metrics::DEFAULT_IGNORE_INDEX)]
    pub ignore_index: u32,

    /// Perform argmax over the class channels of the model output
    #[arg(long, alias = "with_argmax")]
    pub with_argmax: bool,

    /// Inference backend (tract, tract:cpu)
    #[arg(short, long, default_value = "tract")]
    pub backend: String,

    /// Evaluate at most N samples
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Write the evaluation report as JSON
    #[arg(long, value_name = "PATH")]
    pub report_json: Option<PathBuf>,

    /// Show a progress bar while evaluating
    #[arg(long)]
    pub progress: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// List supported dataset types and exit
    #[arg(long)]
    pub list_datasets: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

/// Main entry point for the CLI application
///
/// # Errors
/// - Invalid arguments or deploy config
/// - Dataset discovery, model loading or evaluation failures
pub fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format)?;
    debug!("Parsed CLI arguments: {:?}", cli);
    run(&cli)
}

/// Run the benchmark described by already parsed arguments
///
/// # Errors
/// See [`main`].
pub fn run(cli: &Cli) -> Result<()> {
    if cli.list_datasets {
        show_dataset_kinds();
        return Ok(());
    }

    CliConfigBuilder::validate_cli(cli)?;
    let plan = CliConfigBuilder::from_cli(cli)?;

    let dataset = plan
        .dataset_kind
        .open(&plan.dataset_options)
        .with_context(|| {
            format!(
                "Failed to open {} dataset at {}",
                plan.dataset_kind,
                plan.dataset_options.root.display()
            )
        })?;

    let total = plan
        .evaluator
        .limit
        .map_or(dataset.len(), |limit| limit.min(dataset.len()));
    let reporter = create_cli_progress_reporter(cli.progress, cli.verbose > 0, total);

    let mut evaluator = DatasetEvaluator::from_config(plan.evaluator)
        .context("Failed to create evaluator")?
        .with_progress(ProgressTracker::new(reporter));

    info!(
        "🔧 Backend: {} | Model: {}",
        evaluator.backend_name(),
        evaluator.config().deploy.model_path.display()
    );

    let report = evaluator
        .evaluate(&dataset)
        .with_context(|| format!("Evaluation of {} failed", dataset.name()))?;
    report.log_summary();

    if let Some(path) = &cli.report_json {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    Ok(())
}

fn init_tracing(verbose_count: u8, format: CliLogFormat) -> Result<()> {
    init_cli_tracing(verbose_count, format.into())
        .context("Failed to initialize tracing subscriber")?;

    debug!(verbosity = %verbose_count, "Tracing initialized");
    Ok(())
}

/// Print the supported dataset types
fn show_dataset_kinds() {
    println!("📚 Supported dataset types");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for kind in DatasetKind::all() {
        let classes = kind
            .default_num_classes()
            .map_or_else(|| "--num-classes".to_string(), |n| n.to_string());
        let modes = if kind.supported_modes().is_empty() {
            "<mode>.txt list files".to_string()
        } else {
            kind.supported_modes().join(", ")
        };
        println!("  • {kind}: classes {classes}, modes {modes}");
    }

    println!("\n💡 Usage Example:");
    println!("  segeval-bench --config output/deploy.yaml --dataset-type Cityscapes --dataset-path data/cityscapes");
}
