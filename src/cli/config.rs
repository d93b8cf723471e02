//! Conversion of CLI arguments into evaluation configuration

use crate::backends::BackendType;
use crate::cli::main_impl::Cli;
use crate::{
    config::{DeployConfig, EvaluatorConfig},
    dataset::{DatasetKind, DatasetOptions},
};
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

/// Everything needed to run one benchmark
#[derive(Debug, Clone)]
pub struct EvaluationPlan {
    pub evaluator: EvaluatorConfig,
    pub dataset_kind: DatasetKind,
    pub dataset_options: DatasetOptions,
}

/// Convert CLI arguments to evaluation configuration
pub struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the evaluation plan from CLI arguments
    ///
    /// Reads and validates the deploy config named by `--config`.
    ///
    /// # Errors
    /// - Missing or invalid arguments
    /// - Unreadable or invalid deploy config
    pub fn from_cli(cli: &Cli) -> Result<EvaluationPlan> {
        let (dataset_kind, dataset_path) = Self::dataset_target(cli)?;
        let config_path = cli
            .config
            .as_ref()
            .ok_or_else(|| anyhow!("Please set --config to the model's deploy.yaml"))?;

        let deploy = DeployConfig::from_file(config_path).with_context(|| {
            format!("Failed to load deploy config {}", config_path.display())
        })?;
        let transforms = deploy.pipeline().context("Invalid transforms in deploy config")?;

        let backend_type: BackendType = cli
            .backend
            .parse()
            .context("Invalid backend")?;

        let evaluator = EvaluatorConfig::builder(deploy)
            .backend_type(backend_type)
            .with_argmax(cli.with_argmax)
            .limit(cli.limit)
            .debug(cli.verbose >= 1)
            .build()
            .context("Invalid configuration")?;

        let dataset_options = DatasetOptions::new(dataset_path)
            .with_mode(cli.dataset_mode.clone())
            .with_num_classes(cli.num_classes)
            .with_ignore_index(cli.ignore_index)
            .with_transforms(transforms);

        Ok(EvaluationPlan {
            evaluator,
            dataset_kind,
            dataset_options,
        })
    }

    /// Validate CLI arguments for consistency before touching the filesystem
    ///
    /// # Errors
    /// - Dataset type or path missing
    /// - Unknown dataset type or backend
    /// - Zero `--limit` or `--num-classes`
    /// - `--num-classes` missing for the generic dataset type
    pub fn validate_cli(cli: &Cli) -> Result<()> {
        let (kind, _) = Self::dataset_target(cli)?;

        cli.backend
            .parse::<BackendType>()
            .context("Invalid backend")?;

        if cli.limit == Some(0) {
            anyhow::bail!("--limit must be at least 1");
        }

        match (kind.default_num_classes(), cli.num_classes) {
            (_, Some(0)) => anyhow::bail!("--num-classes must be at least 1"),
            (None, None) => {
                anyhow::bail!("--num-classes is required for the {kind} dataset type")
            },
            _ => {},
        }

        Ok(())
    }

    fn dataset_target(cli: &Cli) -> Result<(DatasetKind, PathBuf)> {
        let (Some(dataset_type), Some(dataset_path)) = (&cli.dataset_type, &cli.dataset_path)
        else {
            anyhow::bail!("Please set dataset_type and dataset_path.");
        };

        let kind = dataset_type
            .parse::<DatasetKind>()
            .context("The dataset is not supported")?;
        Ok((kind, dataset_path.clone()))
    }
}
