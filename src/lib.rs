#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

//! # segeval
//!
//! Semantic segmentation evaluation for exported ONNX models.
//!
//! The crate loads a labelled dataset, runs every sample through an inference
//! backend, and accumulates per-class pixel areas into mean IoU, pixel
//! accuracy and Cohen's kappa, together with the average inference time.
//!
//! ## Features
//!
//! - **Streaming metrics**: [`ConfusionAreaAccumulator`] keeps per-class
//!   intersect, predicted and label areas; metrics are derived once at the end
//! - **Dataset layouts**: Cityscapes, PascalVOC, ADE20K and generic list-file
//!   datasets through the closed [`DatasetKind`] factory
//! - **Deploy configs**: `deploy.yaml` naming the model and its evaluation
//!   transforms
//! - **Pure Rust inference**: Tract backend, no native runtime required
//! - **CLI**: `segeval-bench` (enable with the `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use segeval::{
//!     DatasetEvaluator, DatasetKind, DatasetOptions, DeployConfig, EvaluatorConfig,
//! };
//!
//! # fn main() -> segeval::Result<()> {
//! let deploy = DeployConfig::from_file("output/deploy.yaml")?;
//! let options = DatasetOptions::new("data/cityscapes").with_transforms(deploy.pipeline()?);
//! let dataset = DatasetKind::Cityscapes.open(&options)?;
//!
//! let config = EvaluatorConfig::builder(deploy).build()?;
//! let mut evaluator = DatasetEvaluator::from_config(config)?;
//! let report = evaluator.evaluate(&dataset)?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): Tract ONNX backend
//! - `cli` (default): command-line interface, progress bar and tracing subscriber
//! - `tracing-json`: JSON log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! segeval = { version = "0.1", default-features = false, features = ["tract"] }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod inference;
pub mod metrics;
pub mod postprocess;
pub mod report;
pub mod services;
pub mod tracing_config;
pub mod transforms;

pub use backends::{available_backends, create_backend, BackendType};
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use config::{DeployConfig, EvaluatorConfig, EvaluatorConfigBuilder};
pub use dataset::{
    DatasetKind, DatasetOptions, FileDataset, InMemoryDataset, LabelDecoding, Sample,
    SampleEntry, SegmentationDataset,
};
pub use error::{Result, SegEvalError};
pub use evaluator::DatasetEvaluator;
pub use inference::InferenceBackend;
pub use metrics::{
    accuracy, calculate_area, class_measurement, dice, kappa, mean_iou,
    ConfusionAreaAccumulator, LabelMap, MetricSummary, PixelAreaCounts, DEFAULT_IGNORE_INDEX,
};
pub use postprocess::to_label_map;
pub use report::EvaluationReport;
pub use services::{
    ConsoleProgressReporter, EvaluationStage, NoOpProgressReporter, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
pub use transforms::{TransformConfig, TransformPipeline};
