//! Evaluation-time sample transforms
//!
//! Transforms are declared in the deploy config and applied to every dataset
//! sample. Geometric transforms resize the image with bilinear filtering and
//! the label map with nearest-neighbour sampling so class indices survive.
//! Normalization runs on the float tensor after all geometric transforms.

use crate::error::{Result, SegEvalError};
use crate::metrics::LabelMap;
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};

fn default_mean() -> [f32; 3] {
    [0.5, 0.5, 0.5]
}

fn default_std() -> [f32; 3] {
    [0.5, 0.5, 0.5]
}

fn default_target_size() -> [u32; 2] {
    [512, 512]
}

/// A single transform entry of the deploy config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransformConfig {
    /// Scale to [0, 1] then apply `(x - mean) / std` per channel
    Normalize {
        #[serde(default = "default_mean")]
        mean: [f32; 3],
        #[serde(default = "default_std")]
        std: [f32; 3],
    },
    /// Resize to a fixed `[width, height]`
    Resize {
        #[serde(default = "default_target_size")]
        target_size: [u32; 2],
    },
    /// Resize so the short side equals `short_size`, keeping aspect ratio
    ResizeByShort { short_size: u32 },
    /// Resize so the long side equals `long_size`, keeping aspect ratio
    ResizeByLong { long_size: u32 },
}

impl TransformConfig {
    /// Validate transform parameters
    ///
    /// # Errors
    /// - Zero target sizes or zero/non-finite normalization std
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Normalize { mean, std } => {
                if mean.iter().any(|m| !m.is_finite()) {
                    return Err(SegEvalError::invalid_config(
                        "Normalize mean must be finite",
                    ));
                }
                if std.iter().any(|s| !s.is_finite() || *s == 0.0) {
                    return Err(SegEvalError::config_value_error(
                        "Normalize std",
                        format!("{std:?}"),
                        "finite and non-zero",
                    ));
                }
            },
            Self::Resize { target_size } => {
                if target_size.contains(&0) {
                    return Err(SegEvalError::config_value_error(
                        "Resize target_size",
                        format!("{target_size:?}"),
                        "both dimensions >= 1",
                    ));
                }
            },
            Self::ResizeByShort { short_size: size } | Self::ResizeByLong { long_size: size } => {
                if *size == 0 {
                    return Err(SegEvalError::config_value_error("resize size", size, ">= 1"));
                }
            },
        }
        Ok(())
    }

    /// Output size for an input of `(width, height)`, `None` for non-geometric transforms
    #[must_use]
    pub fn output_size(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        match self {
            Self::Normalize { .. } => None,
            Self::Resize { target_size } => Some((target_size[0], target_size[1])),
            Self::ResizeByShort { short_size } => {
                Some(scale_to_side(width, height, *short_size, width.min(height)))
            },
            Self::ResizeByLong { long_size } => {
                Some(scale_to_side(width, height, *long_size, width.max(height)))
            },
        }
    }
}

fn scale_to_side(width: u32, height: u32, target: u32, side: u32) -> (u32, u32) {
    if side == 0 {
        return (width, height);
    }
    let scale = f64::from(target) / f64::from(side);
    let scaled = |v: u32| ((f64::from(v) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Ordered list of transforms applied to each sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformPipeline {
    transforms: Vec<TransformConfig>,
}

impl TransformPipeline {
    /// Build a pipeline, validating every transform
    ///
    /// # Errors
    /// See [`TransformConfig::validate`].
    pub fn new(transforms: Vec<TransformConfig>) -> Result<Self> {
        for transform in &transforms {
            transform.validate()?;
        }
        Ok(Self { transforms })
    }

    #[must_use]
    pub fn transforms(&self) -> &[TransformConfig] {
        &self.transforms
    }

    /// Apply the pipeline to an image and its label map
    ///
    /// Returns the NCHW tensor (batch of one) and the label map at the final
    /// spatial size.
    ///
    /// # Errors
    /// - Image and label sizes differ before transformation
    pub fn apply(&self, image: RgbImage, label: LabelMap) -> Result<(Array4<f32>, LabelMap)> {
        let (width, height) = image.dimensions();
        let (label_rows, label_cols) = label.dim();
        if (label_rows, label_cols) != (height as usize, width as usize) {
            return Err(SegEvalError::ShapeMismatch {
                expected: (label_rows, label_cols),
                actual: (height as usize, width as usize),
            });
        }

        let mut image = image;
        let mut label = label;
        for transform in &self.transforms {
            let (w, h) = image.dimensions();
            if let Some((new_w, new_h)) = transform.output_size(w, h) {
                if (new_w, new_h) != (w, h) {
                    image = image::imageops::resize(&image, new_w, new_h, FilterType::Triangle);
                    label = resize_nearest(&label, new_h as usize, new_w as usize);
                }
            }
        }

        let mut tensor = to_tensor(&image);
        for transform in &self.transforms {
            if let TransformConfig::Normalize { mean, std } = transform {
                normalize(&mut tensor, mean, std);
            }
        }

        Ok((tensor, label))
    }
}

/// Nearest-neighbour resize of a label map
#[allow(clippy::indexing_slicing)] // source indices are clamped to the input bounds
#[must_use]
pub fn resize_nearest(label: &LabelMap, rows: usize, cols: usize) -> LabelMap {
    let (src_rows, src_cols) = label.dim();
    if src_rows == 0 || src_cols == 0 {
        return Array2::zeros((rows, cols));
    }

    Array2::from_shape_fn((rows, cols), |(y, x)| {
        let sy = (y * src_rows / rows).min(src_rows - 1);
        let sx = (x * src_cols / cols).min(src_cols - 1);
        label[[sy, sx]]
    })
}

/// Convert an RGB image into a `[1, 3, H, W]` tensor of raw 0-255 values
#[must_use]
pub fn to_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    Array4::from_shape_fn((1, 3, height as usize, width as usize), |(_, c, y, x)| {
        f32::from(image.get_pixel(x as u32, y as u32)[c])
    })
}

fn normalize(tensor: &mut Array4<f32>, mean: &[f32; 3], std: &[f32; 3]) {
    for ((_, c, _, _), value) in tensor.indexed_iter_mut() {
        let (m, s) = (mean.get(c).copied().unwrap_or(0.0), std.get(c).copied().unwrap_or(1.0));
        *value = (*value / 255.0 - m) / s;
    }
}
