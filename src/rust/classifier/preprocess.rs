use std::fmt;

use bytes::Bytes;
use ndarray::ArrayD;

use super::error::ClassifierError;

/// Raw upload handed to a classifier: bytes plus whatever the client declared about them.
#[derive(Debug, Clone)]
pub struct InferenceInput {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl InferenceInput {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: None,
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Lower-cased extension of the declared file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Tensor shape a model accepts. `None` marks a dynamic dimension such as the batch axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputContract {
    dims: Vec<Option<usize>>,
}

impl InputContract {
    pub fn new(dims: Vec<Option<usize>>) -> Self {
        Self { dims }
    }

    /// Builds a contract from ONNX dimensions, where negative values are symbolic.
    pub fn from_onnx_dims(dims: &[i64]) -> Self {
        Self {
            dims: dims
                .iter()
                .map(|&d| if d > 0 { Some(d as usize) } else { None })
                .collect(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Option<usize>] {
        &self.dims
    }

    /// Fixed size of the trailing dimensions, when all of them are known.
    pub fn feature_len(&self) -> Option<usize> {
        self.dims.iter().skip(1).try_fold(1usize, |acc, d| d.map(|d| acc * d))
    }

    /// Fails fast when `shape` disagrees with any fixed dimension.
    pub fn check(&self, shape: &[usize]) -> Result<(), ClassifierError> {
        let matches = shape.len() == self.dims.len()
            && self
                .dims
                .iter()
                .zip(shape)
                .all(|(expected, &actual)| expected.map_or(true, |e| e == actual));
        if matches {
            Ok(())
        } else {
            Err(ClassifierError::ShapeMismatch {
                expected: self.to_string(),
                actual: shape.to_vec(),
            })
        }
    }

    /// Merges the contract a session reports with the one the preprocessor produces.
    /// Dimensions the session leaves dynamic are taken from the preprocessor.
    pub fn refine(&self, declared: &InputContract) -> Result<InputContract, ClassifierError> {
        if self.rank() != declared.rank() {
            return Err(ClassifierError::ModelError(format!(
                "Model input rank {} does not match preprocessor output {}",
                self, declared
            )));
        }
        let mut dims = Vec::with_capacity(self.rank());
        for (model, ours) in self.dims.iter().zip(&declared.dims) {
            match (model, ours) {
                (Some(m), Some(o)) if m != o => {
                    return Err(ClassifierError::ModelError(format!(
                        "Model input {} does not match preprocessor output {}",
                        self, declared
                    )));
                }
                (Some(m), _) => dims.push(Some(*m)),
                (None, o) => dims.push(*o),
            }
        }
        Ok(InputContract { dims })
    }
}

impl fmt::Display for InputContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .dims
            .iter()
            .map(|d| d.map_or_else(|| "?".to_string(), |d| d.to_string()))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Turns raw upload bytes into the tensor a model expects.
pub trait Preprocessor: Send + Sync + fmt::Debug {
    /// Cheap checks on the declared upload, run before any decoding.
    fn validate(&self, input: &InferenceInput) -> Result<(), ClassifierError>;

    /// Decodes and transforms the upload into a model-ready tensor.
    fn preprocess(&self, input: &InferenceInput) -> Result<ArrayD<f32>, ClassifierError>;

    /// Shape of every tensor `preprocess` returns.
    fn input_contract(&self) -> InputContract;
}
