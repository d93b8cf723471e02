//! Configuration types for evaluation runs
//!
//! Two layers of configuration exist:
//! - [`DeployConfig`]: the exported model's deploy file (`deploy.yaml`), naming
//!   the model and the transforms used at evaluation time.
//! - [`EvaluatorConfig`]: run options for the [`DatasetEvaluator`](crate::evaluator::DatasetEvaluator),
//!   built through [`EvaluatorConfigBuilder`].

use crate::backends::BackendType;
use crate::error::{Result, SegEvalError};
use crate::transforms::{TransformConfig, TransformPipeline};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct DeployFile {
    #[serde(rename = "Deploy")]
    deploy: DeploySection,
}

#[derive(Debug, Deserialize)]
struct DeploySection {
    model: PathBuf,
    #[serde(default)]
    transforms: Vec<TransformConfig>,
}

/// Parsed deploy configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployConfig {
    /// Model file, resolved against the deploy file's directory
    pub model_path: PathBuf,
    /// Evaluation transforms in declaration order
    pub transforms: Vec<TransformConfig>,
}

impl DeployConfig {
    /// Load a deploy config from a YAML file
    ///
    /// Relative model paths are resolved against the directory containing the
    /// deploy file.
    ///
    /// # Errors
    /// - File cannot be read
    /// - YAML is malformed or lacks the `Deploy.model` key
    /// - Invalid transforms or a non-ONNX model file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SegEvalError::file_io_error("read deploy config", path, &e))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml_str(&content, base_dir)
    }

    /// Parse a deploy config from YAML text
    ///
    /// # Errors
    /// See [`from_file`](Self::from_file).
    pub fn from_yaml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let file: DeployFile = serde_yaml::from_str(content)?;
        let model_path = if file.deploy.model.is_absolute() {
            file.deploy.model
        } else {
            base_dir.join(file.deploy.model)
        };

        let config = Self {
            model_path,
            transforms: file.deploy.transforms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate model format and transforms
    ///
    /// # Errors
    /// - Model file is not an `.onnx` file
    /// - Any transform is invalid
    pub fn validate(&self) -> Result<()> {
        let is_onnx = self
            .model_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("onnx"));
        if !is_onnx {
            return Err(SegEvalError::invalid_config(format!(
                "Model '{}' is not an ONNX file. Export the model to ONNX and point Deploy.model at it",
                self.model_path.display()
            )));
        }

        for transform in &self.transforms {
            transform.validate()?;
        }
        Ok(())
    }

    /// Build the transform pipeline applied to dataset samples
    ///
    /// # Errors
    /// See [`TransformPipeline::new`].
    pub fn pipeline(&self) -> Result<TransformPipeline> {
        TransformPipeline::new(self.transforms.clone())
    }
}

/// Options for a single evaluation run
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Deploy config of the model under test
    pub deploy: DeployConfig,
    /// Backend used to run the model
    pub backend_type: BackendType,
    /// Take the argmax over the channel axis of `[1, C, H, W]` outputs
    pub with_argmax: bool,
    /// Evaluate at most this many samples
    pub limit: Option<usize>,
    /// Enable debug logging of per-sample details
    pub debug: bool,
}

impl EvaluatorConfig {
    #[must_use]
    pub fn builder(deploy: DeployConfig) -> EvaluatorConfigBuilder {
        EvaluatorConfigBuilder::new(deploy)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - `limit` is zero
    /// - Invalid deploy config
    pub fn validate(&self) -> Result<()> {
        if self.limit == Some(0) {
            return Err(SegEvalError::config_value_error("sample limit", 0, ">= 1"));
        }
        self.deploy.validate()
    }
}

/// Builder for [`EvaluatorConfig`]
pub struct EvaluatorConfigBuilder {
    config: EvaluatorConfig,
}

impl EvaluatorConfigBuilder {
    #[must_use]
    pub fn new(deploy: DeployConfig) -> Self {
        Self {
            config: EvaluatorConfig {
                deploy,
                backend_type: BackendType::default(),
                with_argmax: false,
                limit: None,
                debug: false,
            },
        }
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    /// Reduce model scores with argmax before scoring
    ///
    /// Multi-channel outputs are reduced either way; the flag also applies
    /// argmax to single-channel score maps.
    #[must_use]
    pub fn with_argmax(mut self, with_argmax: bool) -> Self {
        self.config.with_argmax = with_argmax;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.config.limit = limit;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// See [`EvaluatorConfig::validate`].
    pub fn build(self) -> Result<EvaluatorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
