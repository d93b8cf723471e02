//! Conversion of raw model output into label maps

use crate::error::{Result, SegEvalError};
use crate::metrics::LabelMap;
use ndarray::{Array2, ArrayD, ArrayView2, Axis, Ix2, Ix3, Ix4};

/// Turn a model output into a label map of class indices
///
/// Accepted layouts:
/// - `[1, C, H, W]`: per-class scores, reduced with argmax over the channel
///   axis (the first maximal channel wins) when `with_argmax` is set or
///   `C > 1`; a single channel without `with_argmax` holds class indices
/// - `[1, H, W]`, `[H, W]`: class indices, already reduced by the model
///
/// # Errors
/// - Batch size other than one or unsupported rank
/// - Class-index outputs holding negative or non-finite values
pub fn to_label_map(output: &ArrayD<f32>, with_argmax: bool) -> Result<LabelMap> {
    match output.ndim() {
        4 => {
            let logits = output
                .view()
                .into_dimensionality::<Ix4>()
                .map_err(|e| SegEvalError::processing(format!("Invalid 4D output: {e}")))?;
            let (batch, channels, _, _) = logits.dim();
            check_batch(batch)?;

            let first = logits.index_axis(Axis(0), 0);
            if channels == 1 && !with_argmax {
                return indices_to_labels(first.index_axis(Axis(0), 0));
            }
            Ok(argmax_channels(&first.into_owned().into_dyn()))
        },
        3 => {
            let labels = output
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(|e| SegEvalError::processing(format!("Invalid 3D output: {e}")))?;
            check_batch(labels.dim().0)?;
            indices_to_labels(labels.index_axis(Axis(0), 0))
        },
        2 => {
            let labels = output
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|e| SegEvalError::processing(format!("Invalid 2D output: {e}")))?;
            indices_to_labels(labels)
        },
        rank => Err(SegEvalError::processing(format!(
            "Unsupported model output rank {rank} (shape {:?})",
            output.shape()
        ))),
    }
}

fn check_batch(batch: usize) -> Result<()> {
    if batch != 1 {
        return Err(SegEvalError::processing(format!(
            "Expected batch size 1 in model output, got {batch}"
        )));
    }
    Ok(())
}

fn indices_to_labels(values: ArrayView2<'_, f32>) -> Result<LabelMap> {
    if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(SegEvalError::processing(format!(
            "Model output holds invalid class index {bad}"
        )));
    }
    Ok(values.mapv(|v| v.round() as u32))
}

/// Argmax over the leading axis of a `[C, H, W]` array
fn argmax_channels(logits: &ArrayD<f32>) -> LabelMap {
    let shape = logits.shape();
    let (height, width) = (
        shape.get(1).copied().unwrap_or(0),
        shape.get(2).copied().unwrap_or(0),
    );

    let mut best_value = Array2::from_elem((height, width), f32::NEG_INFINITY);
    let mut best_class = LabelMap::zeros((height, width));

    for (class, channel) in logits.axis_iter(Axis(0)).enumerate() {
        for ((value, best), label) in channel
            .iter()
            .zip(best_value.iter_mut())
            .zip(best_class.iter_mut())
        {
            if *value > *best {
                *best = *value;
                *label = class as u32;
            }
        }
    }

    best_class
}
