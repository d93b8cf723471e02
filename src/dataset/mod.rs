//! Segmentation datasets
//!
//! A dataset is a finite, ordered sequence of [`Sample`]s with a declared
//! class count and ignore index. Built-in layouts are selected through the
//! closed [`DatasetKind`] enumeration and opened with [`DatasetKind::open`].

mod kinds;
mod labels;
mod memory;

pub use kinds::{DatasetKind, DatasetOptions};
pub use labels::{read_palette_indices, voc_colormap, LabelDecoding};
pub use memory::InMemoryDataset;

use crate::error::{Result, SegEvalError};
use crate::metrics::LabelMap;
use crate::transforms::TransformPipeline;
use ndarray::Array4;
use std::path::PathBuf;

/// One evaluation sample after transforms
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Identifier used in logs (usually the image file stem)
    pub id: String,
    /// NCHW image tensor with a batch of one
    pub image: Array4<f32>,
    /// Ground-truth label map at the tensor's spatial size
    pub label: LabelMap,
}

/// Source of evaluation samples
pub trait SegmentationDataset {
    /// Dataset name used in logs and reports
    fn name(&self) -> &str;

    fn num_classes(&self) -> usize;

    fn ignore_index(&self) -> u32;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load and transform the sample at `index`
    ///
    /// # Errors
    /// - Index out of bounds
    /// - Image or label file cannot be decoded
    fn sample(&self, index: usize) -> Result<Sample>;
}

/// Image and label file of one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleEntry {
    pub image: PathBuf,
    pub label: PathBuf,
}

impl SampleEntry {
    fn id(&self) -> String {
        self.image
            .file_stem()
            .map_or_else(|| self.image.display().to_string(), |s| s.to_string_lossy().into_owned())
    }
}

/// Dataset backed by image/label files on disk
#[derive(Debug, Clone)]
pub struct FileDataset {
    name: String,
    entries: Vec<SampleEntry>,
    num_classes: usize,
    ignore_index: u32,
    decoding: LabelDecoding,
    transforms: TransformPipeline,
}

impl FileDataset {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        entries: Vec<SampleEntry>,
        num_classes: usize,
        ignore_index: u32,
        decoding: LabelDecoding,
        transforms: TransformPipeline,
    ) -> Self {
        Self {
            name: name.into(),
            entries,
            num_classes,
            ignore_index,
            decoding,
            transforms,
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[SampleEntry] {
        &self.entries
    }

    #[must_use]
    pub fn decoding(&self) -> LabelDecoding {
        self.decoding
    }

    /// Decode the label file of `entry` without applying transforms
    ///
    /// # Errors
    /// - Label file cannot be decoded
    pub fn load_label(&self, entry: &SampleEntry) -> Result<LabelMap> {
        if let Some(indices) = labels::read_palette_indices(&entry.label)? {
            return Ok(self.decoding.decode_indices(indices, self.ignore_index));
        }

        let raw = image::open(&entry.label)
            .map_err(|e| SegEvalError::image_load_error(&entry.label, e))?;
        self.decoding.decode(&raw, self.ignore_index)
    }
}

impl SegmentationDataset for FileDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn ignore_index(&self) -> u32 {
        self.ignore_index
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn sample(&self, index: usize) -> Result<Sample> {
        let entry = self.entries.get(index).ok_or_else(|| {
            SegEvalError::processing(format!(
                "Sample index {index} out of bounds for dataset of {} samples",
                self.entries.len()
            ))
        })?;

        let image = image::open(&entry.image)
            .map_err(|e| SegEvalError::image_load_error(&entry.image, e))?
            .to_rgb8();
        let label = self.load_label(entry)?;

        let (image, label) = self.transforms.apply(image, label).map_err(|e| match e {
            SegEvalError::ShapeMismatch { .. } => SegEvalError::processing(format!(
                "Image '{}' and label '{}' differ in size: {e}",
                entry.image.display(),
                entry.label.display()
            )),
            other => other,
        })?;

        Ok(Sample {
            id: entry.id(),
            image,
            label,
        })
    }
}
