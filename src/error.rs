//! Error types for segmentation evaluation

use thiserror::Error;

/// Result type alias for evaluation operations
pub type Result<T> = std::result::Result<T, SegEvalError>;

/// Error types for dataset loading, inference and metric accumulation
#[derive(Error, Debug)]
pub enum SegEvalError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image or label file that could not be decoded
    #[error("Failed to load '{}': {source}", .path.display())]
    Image {
        path: std::path::PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Deploy configuration parse errors
    #[error("Deploy config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Report serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dataset type has no registered kind
    #[error("Unsupported dataset: '{0}'. Supported: Cityscapes, PascalVOC, ADE20K, Dataset")]
    UnsupportedDataset(String),

    /// Prediction and ground truth grids differ in spatial size
    #[error("Shape mismatch: ground truth is {expected:?} but prediction is {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A class index that is neither in range nor the ignore index
    #[error("Class index {value} out of range for {num_classes} classes")]
    ClassIndexOutOfRange { value: u32, num_classes: usize },

    /// Dataset contains no samples
    #[error("Dataset '{0}' contains no samples")]
    EmptyDataset(String),

    /// Model loading errors
    #[error("Model error: {0}")]
    Model(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Sample preparation or post-processing errors
    #[error("Processing error: {0}")]
    Processing(String),
}

impl SegEvalError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new unsupported dataset error
    pub fn unsupported_dataset<S: Into<String>>(name: S) -> Self {
        Self::UnsupportedDataset(name.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create image loading error with sample context
    pub fn image_load_error<P: AsRef<std::path::Path>>(path: P, error: image::ImageError) -> Self {
        Self::Image {
            path: path.as_ref().to_path_buf(),
            source: error,
        }
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid: {})",
            parameter, value, valid_range
        ))
    }

    /// Whether the error indicates a misconfigured run rather than bad data
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::UnsupportedDataset(_)
                | Self::EmptyDataset(_)
                | Self::Yaml(_)
        )
    }
}
