//! Tract backend implementation for segmentation models
//!
//! Tract is a pure Rust neural network inference library. ONNX segmentation
//! exports usually declare symbolic height/width, so the parsed model is kept
//! around and a concrete plan is compiled for the shape of the incoming
//! tensor. Datasets with a fixed resize transform therefore compile once;
//! variable-size datasets recompile when the shape changes.

use crate::config::EvaluatorConfig;
use crate::error::{Result, SegEvalError};
use crate::inference::InferenceBackend;
use ndarray::{Array4, ArrayD, IxDyn};
use std::path::PathBuf;
use tract_onnx::prelude::*;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

type TractPlan = TypedRunnableModel<TypedModel>;

/// Tract backend running ONNX models on the CPU
#[derive(Debug, Default)]
pub struct TractBackend {
    model: Option<InferenceModel>,
    plan: Option<(Vec<usize>, TractPlan)>,
    model_path: Option<PathBuf>,
}

impl TractBackend {
    /// Create a new uninitialized Tract backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Model file loaded by [`initialize`](InferenceBackend::initialize)
    #[must_use]
    pub fn model_path(&self) -> Option<&PathBuf> {
        self.model_path.as_ref()
    }

    fn load_model(&mut self, config: &EvaluatorConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let path = &config.deploy.model_path;

        if !path.is_file() {
            return Err(SegEvalError::model(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        log::info!("🚀 Initializing Tract Backend");
        log::info!("🧠 Model: {}", path.display());

        let model = onnx().model_for_path(path).map_err(|e| {
            SegEvalError::model(format!("Failed to load ONNX model '{}': {e}", path.display()))
        })?;

        self.model = Some(model);
        self.plan = None;
        self.model_path = Some(path.clone());

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {:.2}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }

    /// Compile a runnable plan for `shape` unless the cached one matches
    fn compile_plan(&mut self, shape: &[usize]) -> Result<Option<Duration>> {
        if matches!(&self.plan, Some((plan_shape, _)) if plan_shape.as_slice() == shape) {
            return Ok(None);
        }

        let mut model = self
            .model
            .clone()
            .ok_or_else(|| SegEvalError::inference("Tract model not initialized"))?;

        log::debug!("Compiling Tract plan for input shape {shape:?}");
        let compile_start = Instant::now();

        let fact = InferenceFact::dt_shape(
            f32::datum_type(),
            shape.iter().map(|&d| d.to_dim()).collect::<TVec<_>>(),
        );
        model
            .set_input_fact(0, fact)
            .map_err(|e| SegEvalError::model(format!("Failed to set input shape: {e}")))?;

        let plan = model
            .into_optimized()
            .map_err(|e| SegEvalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                SegEvalError::model(format!("Failed to create runnable model: {e}"))
            })?;

        let compile_time = compile_start.elapsed();
        log::debug!("Plan compiled in {:.2}ms", compile_time.as_millis());
        self.plan = Some((shape.to_vec(), plan));
        Ok(Some(compile_time))
    }

    /// Return a runnable plan for `shape`, compiling one when the shape changed
    fn plan_for(&mut self, shape: &[usize]) -> Result<&TractPlan> {
        self.compile_plan(shape)?;
        self.plan
            .as_ref()
            .map(|(_, plan)| plan)
            .ok_or_else(|| SegEvalError::inference("Tract plan unavailable"))
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &EvaluatorConfig) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn prepare(&mut self, input_shape: &[usize]) -> Result<Option<Duration>> {
        self.compile_plan(input_shape)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let shape = input.shape().to_vec();
        let contiguous = input.as_standard_layout();
        let data = contiguous
            .as_slice()
            .ok_or_else(|| SegEvalError::inference("Input tensor is not contiguous"))?;

        let input_tensor = Tensor::from_shape::<f32>(&shape, data).map_err(|e| {
            SegEvalError::inference(format!("Failed to build input tensor: {e}"))
        })?;

        let plan = self.plan_for(&shape)?;
        let outputs = plan
            .run(tvec![input_tensor.into()])
            .map_err(|e| SegEvalError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| SegEvalError::inference("No output tensor found"))?
            .into_arc_tensor();

        // Argmax-exported models emit integer class indices
        let output_f32 = output_tensor.cast_to::<f32>().map_err(|e| {
            SegEvalError::inference(format!("Failed to convert output tensor: {e}"))
        })?;
        let values = output_f32.as_slice::<f32>().map_err(|e| {
            SegEvalError::inference(format!("Failed to read output tensor: {e}"))
        })?;

        ArrayD::from_shape_vec(IxDyn(output_f32.shape()), values.to_vec()).map_err(|e| {
            SegEvalError::inference(format!("Failed to reshape output tensor: {e}"))
        })
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    fn name(&self) -> &'static str {
        "tract"
    }
}
