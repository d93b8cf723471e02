//! Backend implementations for different inference engines
//!
//! - Tract backend (pure Rust ONNX inference, no external dependencies)

#[cfg(feature = "tract")]
pub mod tract;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

use crate::error::{Result, SegEvalError};
use crate::inference::InferenceBackend;
use serde::{Deserialize, Serialize};

/// Backend type enumeration for runtime selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendType {
    /// Tract backend (pure Rust, CPU)
    #[default]
    Tract,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tract => write!(f, "tract"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = SegEvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tract" | "tract:cpu" | "cpu" => Ok(Self::Tract),
            other => Err(SegEvalError::invalid_config(format!(
                "Unknown backend '{other}'. Available: tract"
            ))),
        }
    }
}

/// Create an uninitialized backend of the requested type
///
/// # Errors
/// - The backend was not compiled in
pub fn create_backend(backend_type: BackendType) -> Result<Box<dyn InferenceBackend>> {
    match backend_type {
        BackendType::Tract => {
            #[cfg(feature = "tract")]
            {
                Ok(Box::new(TractBackend::new()))
            }
            #[cfg(not(feature = "tract"))]
            {
                Err(SegEvalError::invalid_config(
                    "Tract backend not available. Rebuild with --features tract",
                ))
            }
        },
    }
}

/// List compiled-in backends
#[must_use]
pub fn available_backends() -> Vec<BackendType> {
    let mut backends = Vec::new();
    if cfg!(feature = "tract") {
        backends.push(BackendType::Tract);
    }
    backends
}
