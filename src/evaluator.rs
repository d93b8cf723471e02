//! Dataset evaluation driver
//!
//! [`DatasetEvaluator`] owns an inference backend and runs every sample of a
//! dataset through it, feeding predictions into a
//! [`ConfusionAreaAccumulator`]. Any failure aborts the run; samples are never
//! skipped, so the reported metrics always cover exactly `image_count`
//! samples.

use crate::{
    backends::create_backend,
    config::EvaluatorConfig,
    dataset::SegmentationDataset,
    error::{Result, SegEvalError},
    inference::InferenceBackend,
    metrics::ConfusionAreaAccumulator,
    postprocess::to_label_map,
    report::EvaluationReport,
    services::{EvaluationStage, ProgressTracker},
    tracing_config::{events, spans},
};
use instant::Instant;
use log::{debug, info};
use tracing::instrument;

/// Evaluates a segmentation model over a dataset
pub struct DatasetEvaluator {
    config: EvaluatorConfig,
    backend: Box<dyn InferenceBackend>,
    progress: ProgressTracker,
}

impl std::fmt::Debug for DatasetEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetEvaluator")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl DatasetEvaluator {
    /// Create an evaluator around an existing backend
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: EvaluatorConfig, backend: Box<dyn InferenceBackend>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend,
            progress: ProgressTracker::no_op(),
        })
    }

    /// Create an evaluator with the backend selected in the configuration
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Backend not compiled in
    pub fn from_config(config: EvaluatorConfig) -> Result<Self> {
        let backend = create_backend(config.backend_type)?;
        Self::new(config, backend)
    }

    /// Replace the progress tracker
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Evaluate the model over `dataset`
    ///
    /// At most `config.limit` samples are evaluated, in dataset order.
    ///
    /// # Errors
    /// - `EmptyDataset` when there is nothing to evaluate
    /// - Backend initialization or inference failures
    /// - Sample loading failures
    /// - Prediction shape differing from the ground truth
    /// - Class indices outside `[0, num_classes)` that are not the ignore index
    #[instrument(
        skip(self, dataset),
        fields(
            dataset = %dataset.name(),
            backend = %self.backend.name(),
            num_classes = %dataset.num_classes()
        )
    )]
    pub fn evaluate(&mut self, dataset: &dyn SegmentationDataset) -> Result<EvaluationReport> {
        let result = self.run(dataset);
        if let Err(ref e) = result {
            self.progress.report_error(&e.to_string());
            events::error_with_context(e, "dataset evaluation");
        }
        result
    }

    fn run(&mut self, dataset: &dyn SegmentationDataset) -> Result<EvaluationReport> {
        let image_count = self
            .config
            .limit
            .map_or(dataset.len(), |limit| limit.min(dataset.len()));
        if image_count == 0 {
            return Err(SegEvalError::EmptyDataset(dataset.name().to_string()));
        }

        let mut accumulator =
            ConfusionAreaAccumulator::new(dataset.num_classes(), dataset.ignore_index())?;

        self.progress.start(image_count);
        self.progress.enter_stage(EvaluationStage::Initialization);
        let model_load = {
            let _span =
                spans::model_loading(&self.config.deploy.model_path, self.backend.name()).entered();
            self.backend.initialize(&self.config)?
        };
        let model_load_ms = model_load.map(|d| d.as_millis() as u64);

        let _span = spans::evaluation(dataset.name(), self.backend.name(), image_count).entered();
        info!(
            "🎯 Start evaluating {} (total_samples: {image_count})",
            dataset.name()
        );

        let mut total_inference_secs = 0.0;
        for index in 0..image_count {
            self.progress.enter_stage(EvaluationStage::SampleLoading);
            let sample = dataset.sample(index)?;
            let _sample_span = spans::sample(index, &sample.id).entered();

            self.progress.enter_stage(EvaluationStage::Inference);
            let output = {
                let _span = spans::inference(sample.image.shape()).entered();
                if let Some(setup) = self.backend.prepare(sample.image.shape())? {
                    debug!(
                        "Backend prepared for {:?} in {}ms (not timed)",
                        sample.image.shape(),
                        setup.as_millis()
                    );
                }
                let start = Instant::now();
                let output = self.backend.infer(&sample.image)?;
                let elapsed = start.elapsed().as_secs_f64();
                total_inference_secs += elapsed;
                events::sample_inference(&sample.id, elapsed * 1000.0);
                output
            };

            self.progress.enter_stage(EvaluationStage::Accumulation);
            let prediction = to_label_map(&output, self.config.with_argmax)?;
            accumulator.accumulate(prediction.view(), sample.label.view())?;

            if self.config.debug {
                debug!(
                    "Sample {}/{} '{}': running mIoU {:.4}",
                    index + 1,
                    image_count,
                    sample.id,
                    accumulator.summary().miou
                );
            }
            self.progress.report_sample(index + 1, &sample.id);
        }

        self.progress
            .report_completion(accumulator.samples(), total_inference_secs);

        Ok(EvaluationReport::from_accumulator(
            dataset.name(),
            self.backend.name(),
            accumulator,
            total_inference_secs,
            model_load_ms,
        ))
    }
}
