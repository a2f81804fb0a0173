use ort::Error as OrtError;
use std::fmt;

/// Represents the different types of errors that can occur while classifying an upload.
#[derive(Debug)]
pub enum ClassifierError {
    /// The presented credential was missing or did not match
    AuthenticationError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
    /// The upload is not an accepted image format or could not be decoded
    UnsupportedFormat(String),
    /// The tabular upload had no rows or no usable numeric columns
    MalformedInput(String),
    /// The tensor handed to the model does not match its input contract
    ShapeMismatch { expected: String, actual: Vec<usize> },
    /// Error occurred while loading or running the ONNX model
    ModelError(String),
    /// Error occurred while running the forward pass
    InferenceError(String),
    /// The model produced a class index the label catalog does not know
    UnknownClass { index: usize, num_classes: usize },
    /// No usable model is loaded, or degraded predictions are refused
    ModelUnavailable(String),
    /// Error occurred during the build phase
    BuildError(String),
}

impl ClassifierError {
    /// True for failures caused by the caller's upload rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::UnsupportedFormat(_)
                | Self::MalformedInput(_)
                | Self::ShapeMismatch { .. }
        )
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationError(msg) => write!(f, "Authentication error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            Self::MalformedInput(msg) => write!(f, "Malformed input: {}", msg),
            Self::ShapeMismatch { expected, actual } => write!(
                f,
                "Shape mismatch: model expects {}, got {:?}",
                expected, actual
            ),
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::InferenceError(msg) => write!(f, "Inference error: {}", msg),
            Self::UnknownClass { index, num_classes } => write!(
                f,
                "Unknown class index {} (catalog has {} classes)",
                index, num_classes
            ),
            Self::ModelUnavailable(msg) => write!(f, "Model unavailable: {}", msg),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::ModelError(err.to_string())
    }
}
