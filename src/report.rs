//! Evaluation report

use crate::error::{Result, SegEvalError};
use crate::metrics::{ConfusionAreaAccumulator, MetricSummary, PixelAreaCounts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Outcome of one dataset evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub dataset: String,
    pub backend: String,
    /// Samples that contributed to the metrics
    pub image_count: usize,
    pub num_classes: usize,
    pub ignore_index: u32,
    pub metrics: MetricSummary,
    /// Final per-class areas the metrics were derived from
    pub counts: PixelAreaCounts,
    /// Summed inference time over all samples
    pub total_inference_secs: f64,
    pub average_inference_secs: f64,
    /// Model load time, when the backend was initialized by this run
    pub model_load_ms: Option<u64>,
    pub completed_at: DateTime<Utc>,
}

impl EvaluationReport {
    /// Derive the report from the final accumulator state
    #[must_use]
    pub fn from_accumulator(
        dataset: impl Into<String>,
        backend: impl Into<String>,
        accumulator: ConfusionAreaAccumulator,
        total_inference_secs: f64,
        model_load_ms: Option<u64>,
    ) -> Self {
        let image_count = accumulator.samples();
        let metrics = accumulator.summary();
        let average_inference_secs = if image_count == 0 {
            0.0
        } else {
            total_inference_secs / image_count as f64
        };

        Self {
            dataset: dataset.into(),
            backend: backend.into(),
            image_count,
            num_classes: accumulator.num_classes(),
            ignore_index: accumulator.ignore_index(),
            metrics,
            counts: accumulator.into_counts(),
            total_inference_secs,
            average_inference_secs,
            model_load_ms,
            completed_at: Utc::now(),
        }
    }

    /// Report lines in display order
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!(
                "[EVAL] #Images: {} mIoU: {:.4} Acc: {:.4} Kappa: {:.4}",
                self.image_count, self.metrics.miou, self.metrics.accuracy, self.metrics.kappa
            ),
            format!("[EVAL] Class IoU: {}", format_vector(&self.metrics.class_iou)),
            format!("[EVAL] Class Acc: {}", format_vector(&self.metrics.class_accuracy)),
            format!("[EVAL] Average time: {:.3} second/img", self.average_inference_secs),
        ]
    }

    /// Emit the report through `tracing`
    pub fn log_summary(&self) {
        for line in self.summary_lines() {
            tracing::info!("{line}");
        }
        tracing::debug!(
            dataset = %self.dataset,
            backend = %self.backend,
            mean_dice = %self.metrics.mean_dice,
            total_inference_secs = %self.total_inference_secs,
            "📊 Evaluation details"
        );
    }

    /// Pretty-printed JSON representation
    ///
    /// # Errors
    /// - Serialization failure
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON representation to `path`
    ///
    /// # Errors
    /// - Serialization or write failure
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| SegEvalError::file_io_error("write", path, &e))?;
        log::info!("💾 Report written to {}", path.display());
        Ok(())
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.summary_lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn format_vector(values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(|v| format!("{v:.4}")).collect();
    format!("[{}]", items.join(" "))
}
