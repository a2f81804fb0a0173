use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use log::{info, warn};
use ndarray::{Array2, ArrayD, Axis};
use ort::session::Session;
use ort::value::Tensor;
use serde::Serialize;

use super::error::ClassifierError;
use super::fallback::FallbackModel;
use super::preprocess::InputContract;
use super::utils::argmax;
use crate::model_store::{verify_file, ModelArtifact};
use crate::runtime::{create_session_builder, ExecutionPolicy, RuntimeConfig};

/// Whether a classifier can be trusted to produce real predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    /// Trained weights loaded and validated
    Ready,
    /// Serving an untrained fallback network; predictions are meaningless
    Degraded,
    /// Nothing usable is loaded
    Unavailable,
}

impl ModelStatus {
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "READY"),
            Self::Degraded => write!(f, "DEGRADED"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
        }
    }
}

/// Raw model output for one batch row.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub scores: Vec<f32>,
}

/// A network that maps an input tensor to `[batch, num_classes]` scores.
///
/// Implementations must be pure in their weights: `forward` never mutates
/// model state, so one instance can serve concurrent requests.
pub trait InferenceModel: Send + Sync + fmt::Debug {
    fn forward(&self, input: ArrayD<f32>) -> Result<Array2<f32>, ClassifierError>;

    fn input_contract(&self) -> &InputContract;

    fn describe(&self) -> String;
}

/// An ONNX graph executed through ONNX Runtime.
#[derive(Debug)]
pub struct OnnxModel {
    session: Session,
    input_name: String,
    contract: InputContract,
    path: String,
}

impl OnnxModel {
    /// Loads a graph and checks it against the preprocessor's output and the catalog size.
    pub fn load(
        artifact: &ModelArtifact,
        runtime: &RuntimeConfig,
        declared: &InputContract,
        num_classes: usize,
    ) -> Result<Self, ClassifierError> {
        if !artifact.exists() {
            return Err(ClassifierError::ModelError(format!(
                "Model file not found at {:?}",
                artifact.path
            )));
        }
        if let Some(expected) = &artifact.sha256 {
            let verified = verify_file(&artifact.path, expected)
                .map_err(|e| ClassifierError::ModelError(e.to_string()))?;
            if !verified {
                return Err(ClassifierError::ModelError(format!(
                    "Checksum mismatch for {:?}",
                    artifact.path
                )));
            }
        }

        let session = create_session_builder(runtime)?.commit_from_file(&artifact.path)?;
        let (input_name, contract) = Self::validate_model(&session, declared, num_classes)?;
        info!(
            "Loaded '{}' from {:?} with input {} {}",
            artifact.name, artifact.path, input_name, contract
        );

        Ok(Self {
            session,
            input_name,
            contract,
            path: artifact.path.display().to_string(),
        })
    }

    /// Validates that the model has the expected input/output structure
    fn validate_model(
        session: &Session,
        declared: &InputContract,
        num_classes: usize,
    ) -> Result<(String, InputContract), ClassifierError> {
        let input = session.inputs.first().ok_or_else(|| {
            ClassifierError::ModelError("Model must have at least 1 input".to_string())
        })?;
        let output = session.outputs.first().ok_or_else(|| {
            ClassifierError::ModelError("Model must have at least 1 output for class scores".to_string())
        })?;

        let contract = match input.input_type.tensor_dimensions() {
            Some(dims) => InputContract::from_onnx_dims(dims).refine(declared)?,
            None => {
                return Err(ClassifierError::ModelError(format!(
                    "Model input '{}' is not a tensor",
                    input.name
                )))
            }
        };

        if let Some(&width) = output
            .output_type
            .tensor_dimensions()
            .and_then(|dims| dims.last())
        {
            if width > 0 && width as usize != num_classes {
                return Err(ClassifierError::ModelError(format!(
                    "Model produces {} class scores but the label catalog has {}",
                    width, num_classes
                )));
            }
        }

        Ok((input.name.clone(), contract))
    }
}

impl InferenceModel for OnnxModel {
    fn forward(&self, input: ArrayD<f32>) -> Result<Array2<f32>, ClassifierError> {
        let batch = input.shape().first().copied().unwrap_or(0);
        let input = input.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array(&input).map_err(|e| {
                ClassifierError::InferenceError(format!("Failed to create input tensor: {}", e))
            })?,
        );

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| ClassifierError::InferenceError(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            ClassifierError::InferenceError(format!("Failed to extract output tensor: {}", e))
        })?;

        let classes = output_tensor.len() / batch.max(1);
        output_tensor
            .to_owned()
            .into_shape_with_order((batch, classes))
            .map_err(|e| ClassifierError::InferenceError(format!("Unexpected output shape: {}", e)))
    }

    fn input_contract(&self) -> &InputContract {
        &self.contract
    }

    fn describe(&self) -> String {
        format!("onnx graph {}", self.path)
    }
}

/// Options for [`ModelHandle::load`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub runtime: RuntimeConfig,
    /// Shape the preprocessor produces
    pub contract: InputContract,
    pub num_classes: usize,
    /// Serve an untrained network when the weights cannot be loaded
    pub allow_fallback: bool,
    pub fallback_seed: u64,
}

/// The loaded network shared read-only by every request.
#[derive(Debug)]
pub struct ModelHandle {
    name: String,
    status: ModelStatus,
    detail: String,
    model: Option<Box<dyn InferenceModel>>,
    num_classes: usize,
    compute_lock: Option<Mutex<()>>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<ModelHandle>();
    }
};

impl ModelHandle {
    /// Loads trained weights, falling back to an untrained network or to
    /// `Unavailable` when they cannot be used. Never fails outright.
    pub fn load(artifact: &ModelArtifact, options: LoadOptions) -> Self {
        let policy = options.runtime.execution_policy;
        match OnnxModel::load(artifact, &options.runtime, &options.contract, options.num_classes) {
            Ok(model) => {
                let detail = model.describe();
                Self::from_model(&artifact.name, Box::new(model), ModelStatus::Ready, detail, options.num_classes, policy)
            }
            Err(e) if options.allow_fallback => {
                warn!(
                    "DEGRADED: '{}' is serving an untrained network, predictions are unsafe ({})",
                    artifact.name, e
                );
                let model = FallbackModel::new(options.contract, options.num_classes, options.fallback_seed);
                Self::from_model(
                    &artifact.name,
                    Box::new(model),
                    ModelStatus::Degraded,
                    e.to_string(),
                    options.num_classes,
                    policy,
                )
            }
            Err(e) => {
                warn!("UNAVAILABLE: '{}' has no usable model ({})", artifact.name, e);
                Self::unavailable(&artifact.name, e.to_string(), options.num_classes)
            }
        }
    }

    pub fn from_model(
        name: &str,
        model: Box<dyn InferenceModel>,
        status: ModelStatus,
        detail: impl Into<String>,
        num_classes: usize,
        policy: ExecutionPolicy,
    ) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
            model: Some(model),
            num_classes,
            compute_lock: match policy {
                ExecutionPolicy::Concurrent => None,
                ExecutionPolicy::Serialized => Some(Mutex::new(())),
            },
        }
    }

    pub fn unavailable(name: &str, detail: impl Into<String>, num_classes: usize) -> Self {
        Self {
            name: name.to_string(),
            status: ModelStatus::Unavailable,
            detail: detail.into(),
            model: None,
            num_classes,
            compute_lock: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ModelStatus {
        self.status
    }

    /// What was loaded, or why nothing was.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn input_contract(&self) -> Option<&InputContract> {
        self.model.as_ref().map(|m| m.input_contract())
    }

    /// Runs the forward pass and picks the best class for every batch row.
    pub fn predict(&self, tensor: ArrayD<f32>) -> Result<Vec<Prediction>, ClassifierError> {
        let model = self.model.as_ref().ok_or_else(|| {
            ClassifierError::ModelUnavailable(format!("'{}': {}", self.name, self.detail))
        })?;
        model.input_contract().check(tensor.shape())?;
        let batch = tensor.shape()[0];

        let scores = match &self.compute_lock {
            Some(lock) => {
                let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                model.forward(tensor)?
            }
            None => model.forward(tensor)?,
        };

        if scores.nrows() != batch {
            return Err(ClassifierError::InferenceError(format!(
                "Model returned {} score rows for a batch of {}",
                scores.nrows(),
                batch
            )));
        }

        scores
            .axis_iter(Axis(0))
            .map(|row| {
                let class_index = argmax(row).ok_or_else(|| {
                    ClassifierError::InferenceError("Model returned no usable scores".into())
                })?;
                Ok(Prediction {
                    class_index,
                    scores: row.to_vec(),
                })
            })
            .collect()
    }
}
