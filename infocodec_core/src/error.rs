//! Error types shared by every codec, the container, and the metrics engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error kinds.
///
/// Every kind is fatal for the call that raised it: the engine never retries
/// and never hands back a partially decoded image.
#[derive(Debug, Error)]
pub enum Error {
    /// Container framing or metadata could not be parsed, or the metadata
    /// disagrees with the payload it travels with.
    #[error("corrupt container: {message}")]
    ContainerCorrupt {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The `method` named in metadata (or on the command line) is not one of
    /// the bundled codecs.
    #[error("unsupported method '{0}'")]
    UnsupportedMethod(String),

    /// A codec or selector parameter is out of range.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// A reconstruction produced a different element count than the shape
    /// recorded in metadata.
    #[error("reconstruction shape mismatch: expected {expected} elements, got {actual}")]
    ReconstructionShapeMismatch { expected: usize, actual: usize },

    /// The payload ended, or stopped making sense, before decoding finished.
    #[error("{method} decode error: {message}")]
    Decode {
        method: &'static str,
        message: String,
    },

    /// The buffer handed to a codec is not a valid 8-bit image.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Two images compared by a metric do not share a shape.
    #[error("dimension mismatch: {left:?} vs {right:?}")]
    DimensionMismatch { left: Vec<usize>, right: Vec<usize> },
}

impl Error {
    /// Create a container corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Error::ContainerCorrupt {
            message: message.into(),
            source: None,
        }
    }

    /// Create a container corruption error wrapping its cause.
    pub fn corrupt_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::ContainerCorrupt {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// Create a method-specific decode error.
    pub fn decode(method: &'static str, message: impl Into<String>) -> Self {
        Error::Decode {
            method,
            message: message.into(),
        }
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: usize, actual: usize) -> Self {
        Error::ReconstructionShapeMismatch { expected, actual }
    }

    /// Get error category for logs and CLI exit reporting.
    pub fn category(&self) -> &'static str {
        match self {
            Error::ContainerCorrupt { .. } => "container_corrupt",
            Error::UnsupportedMethod(_) => "unsupported_method",
            Error::InvalidParameter { .. } => "invalid_parameter",
            Error::ReconstructionShapeMismatch { .. } => "reconstruction_shape_mismatch",
            Error::Decode { .. } => "decode_error",
            Error::InvalidImage(_) => "invalid_image",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
        }
    }
}
