//! Inference backend abstraction

use crate::{config::EvaluatorConfig, error::Result};
use ndarray::{Array4, ArrayD};

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Capability to load a segmentation model and run it on one image tensor
pub trait InferenceBackend {
    /// Load the model named by the configuration
    ///
    /// Returns the model load time, or `None` when the backend was already
    /// initialized.
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Model cannot be parsed by the backend
    fn initialize(&mut self, config: &EvaluatorConfig) -> Result<Option<Duration>>;

    /// Get ready to run inputs of `input_shape`
    ///
    /// Called before each timed [`infer`](Self::infer) so that per-shape setup
    /// such as plan compilation stays out of the measured latency. Returns the
    /// time spent, or `None` when nothing had to be done.
    ///
    /// # Errors
    /// - Backend not initialized
    /// - The model cannot be specialized to `input_shape`
    fn prepare(&mut self, input_shape: &[usize]) -> Result<Option<Duration>> {
        let _ = input_shape;
        Ok(None)
    }

    /// Run inference on an NCHW image tensor
    ///
    /// The output is either per-class logits (`[N, C, H, W]`) or class indices
    /// (`[N, H, W]`, `[N, 1, H, W]`), depending on how the model was exported.
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    fn infer(&mut self, input: &Array4<f32>) -> Result<ArrayD<f32>>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;

    /// Short backend name used in logs and reports
    fn name(&self) -> &'static str;
}
