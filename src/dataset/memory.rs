use super::{Sample, SegmentationDataset};
use crate::error::{Result, SegEvalError};

/// Dataset of already prepared samples held in memory
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    name: String,
    num_classes: usize,
    ignore_index: u32,
    samples: Vec<Sample>,
}

impl InMemoryDataset {
    #[must_use]
    pub fn new(name: impl Into<String>, num_classes: usize, ignore_index: u32) -> Self {
        Self {
            name: name.into(),
            num_classes,
            ignore_index,
            samples: Vec::new(),
        }
    }

    /// Append a sample, returning the dataset for chaining
    #[must_use]
    pub fn with_sample(mut self, sample: Sample) -> Self {
        self.samples.push(sample);
        self
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }
}

impl SegmentationDataset for InMemoryDataset {
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
        self.samples.len()
    }

    fn sample(&self, index: usize) -> Result<Sample> {
        self.samples.get(index).cloned().ok_or_else(|| {
            SegEvalError::processing(format!(
                "Sample index {index} out of bounds for dataset of {} samples",
                self.samples.len()
            ))
        })
    }
}
