//! Shared fixtures for integration tests

#![allow(dead_code)]

use image::{GrayImage, Luma, Rgb, RgbImage};
use instant::Duration;
use ndarray::{Array2, Array4, ArrayD, Axis};
use segeval::{EvaluatorConfig, InferenceBackend, Result, SegEvalError};
use std::fs;
use std::path::Path;

/// Write an RGB image whose red channel holds `classes`
///
/// With no Normalize transform the tensor carries raw channel values, so
/// [`EchoBackend`] turns the red channel back into these class indices.
pub fn write_class_image(path: &Path, classes: &Array2<u8>) {
    let (rows, cols) = classes.dim();
    let image = RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        Rgb([classes[[y as usize, x as usize]], 0, 0])
    });
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    image.save(path).unwrap();
}

/// Write a single-channel label image
pub fn write_gray_label(path: &Path, labels: &Array2<u8>) {
    let (rows, cols) = labels.dim();
    let image = GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([labels[[y as usize, x as usize]]])
    });
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    image.save(path).unwrap();
}

/// Write an RGB label image using explicit colors
pub fn write_color_label(path: &Path, colors: &[[u8; 3]], cols: u32) {
    let rows = colors.len() as u32 / cols;
    let image = RgbImage::from_fn(cols, rows, |x, y| Rgb(colors[(y * cols + x) as usize]));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    image.save(path).unwrap();
}

/// Write an 8-bit palette PNG whose pixels are the given indices
///
/// Each index is drawn in a distinct non-gray color, as pseudo-color label
/// tools do.
pub fn write_palette_label(path: &Path, labels: &Array2<u8>) {
    let (rows, cols) = labels.dim();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = fs::File::create(path).unwrap();
    let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), cols as u32, rows as u32);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    let palette: Vec<u8> = (0..=255u8).flat_map(|i| [i, 255 - i, 64]).collect();
    encoder.set_palette(palette);
    let mut writer = encoder.write_header().unwrap();
    let data: Vec<u8> = labels.iter().copied().collect();
    writer.write_image_data(&data).unwrap();
}

/// Backend that echoes the red channel of the input as class indices
#[derive(Debug, Default)]
pub struct EchoBackend {
    pub initialized: bool,
    pub calls: usize,
    /// Emit one-hot logits over this many classes instead of indices
    pub logits_classes: Option<usize>,
    /// Fail on the call with this (zero-based) index
    pub fail_on_call: Option<usize>,
}

impl EchoBackend {
    pub fn logits(num_classes: usize) -> Self {
        Self {
            logits_classes: Some(num_classes),
            ..Self::default()
        }
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }
}

impl InferenceBackend for EchoBackend {
    fn initialize(&mut self, _config: &EvaluatorConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on_call == Some(call) {
            return Err(SegEvalError::inference(format!("echo failure on call {call}")));
        }

        let red = input.index_axis(Axis(0), 0).index_axis(Axis(0), 0).to_owned();
        match self.logits_classes {
            None => Ok(red.insert_axis(Axis(0)).into_dyn()),
            Some(classes) => {
                let (h, w) = red.dim();
                let logits = Array4::from_shape_fn((1, classes, h, w), |(_, c, y, x)| {
                    if red[[y, x]].round() as usize == c {
                        1.0
                    } else {
                        0.0
                    }
                });
                Ok(logits.into_dyn())
            },
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

/// Backend returning a fixed-size output regardless of input
#[derive(Debug, Default)]
pub struct FixedShapeBackend {
    pub rows: usize,
    pub cols: usize,
}

impl InferenceBackend for FixedShapeBackend {
    fn initialize(&mut self, _config: &EvaluatorConfig) -> Result<Option<Duration>> {
        Ok(None)
    }

    fn infer(&mut self, _input: &Array4<f32>) -> Result<ArrayD<f32>> {
        Ok(ArrayD::zeros(vec![1, self.rows, self.cols]))
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
