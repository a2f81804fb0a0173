use std::fmt;
use std::sync::Arc;

use log::debug;

use super::error::ClassifierError;
use super::model::{ModelHandle, ModelStatus};
use super::preprocess::{InferenceInput, Preprocessor};
use crate::catalog::{ClassLabel, LabelCatalog};

/// Progress of a single classification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Received,
    Authenticated,
    Validated,
    Preprocessed,
    Inferred,
    Labeled,
    Responded,
    Rejected,
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Authenticated => "authenticated",
            Self::Validated => "validated",
            Self::Preprocessed => "preprocessed",
            Self::Inferred => "inferred",
            Self::Labeled => "labeled",
            Self::Responded => "responded",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// One labeled prediction, in the order of the input rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub label: ClassLabel,
    pub raw_class_index: usize,
}

/// Snapshot of a classifier's configuration and health.
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    pub name: String,
    pub status: ModelStatus,
    pub detail: String,
    pub num_classes: usize,
    pub class_labels: Vec<String>,
    pub input_shape: Option<String>,
}

/// A model-backed classification pipeline: preprocessor, model, label catalog.
///
/// # Thread Safety
///
/// Every field is immutable after construction and shared through `Arc`, so a
/// single classifier serves concurrent requests without locking (unless the
/// model handle was configured to serialize its compute calls).
#[derive(Debug, Clone)]
pub struct Classifier {
    pub(crate) name: String,
    pub(crate) preprocessor: Arc<dyn Preprocessor>,
    pub(crate) model: Arc<ModelHandle>,
    pub(crate) catalog: Arc<LabelCatalog>,
    pub(crate) reject_degraded: bool,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl Classifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ModelStatus {
        self.model.status()
    }

    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            name: self.name.clone(),
            status: self.model.status(),
            detail: self.model.detail().to_string(),
            num_classes: self.catalog.len(),
            class_labels: self.catalog.labels().iter().map(|l| l.name.clone()).collect(),
            input_shape: self.model.input_contract().map(|c| c.to_string()),
        }
    }

    /// Checks the declared upload without decoding it.
    pub fn validate(&self, input: &InferenceInput) -> Result<(), ClassifierError> {
        self.preprocessor.validate(input)
    }

    /// Preprocesses, infers and labels an upload. Returns one result per input row.
    pub fn classify(&self, input: &InferenceInput) -> Result<Vec<PredictionResult>, ClassifierError> {
        self.preprocessor.validate(input)?;
        self.trace(RequestStage::Validated);

        match self.model.status() {
            ModelStatus::Unavailable => {
                return Err(ClassifierError::ModelUnavailable(format!(
                    "'{}' has no usable model: {}",
                    self.name,
                    self.model.detail()
                )));
            }
            ModelStatus::Degraded if self.reject_degraded => {
                return Err(ClassifierError::ModelUnavailable(format!(
                    "'{}' is running in degraded mode and degraded predictions are refused",
                    self.name
                )));
            }
            _ => {}
        }

        let tensor = self.preprocessor.preprocess(input)?;
        self.trace(RequestStage::Preprocessed);

        let predictions = self.model.predict(tensor).map_err(|e| match e {
            e if e.is_client_error() => e,
            e @ (ClassifierError::ModelUnavailable(_) | ClassifierError::InferenceError(_)) => e,
            other => ClassifierError::InferenceError(other.to_string()),
        })?;
        self.trace(RequestStage::Inferred);

        let results = predictions
            .into_iter()
            .map(|p| {
                let label = self.catalog.lookup(p.class_index)?.clone();
                Ok(PredictionResult {
                    label,
                    raw_class_index: p.class_index,
                })
            })
            .collect::<Result<Vec<_>, ClassifierError>>()?;
        self.trace(RequestStage::Labeled);

        Ok(results)
    }

    fn trace(&self, stage: RequestStage) {
        debug!("[{}] {}", self.name, stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ImagePreprocessor, TabularPreprocessor};

    fn eeg_classifier(reject_degraded: bool) -> Classifier {
        Classifier::builder()
            .with_name("eeg")
            .with_preprocessor(TabularPreprocessor::new())
            .with_catalog(LabelCatalog::eeg_severity())
            .with_model_path(std::env::temp_dir().join("neuropath-missing/eeg.onnx"))
            .unwrap()
            .reject_degraded(reject_degraded)
            .build()
            .expect("Failed to create classifier")
    }

    #[test]
    fn test_class_info() {
        let classifier = eeg_classifier(false);
        let info = classifier.info();
        assert_eq!(info.name, "eeg");
        assert_eq!(info.num_classes, 5);
        assert_eq!(info.status, ModelStatus::Degraded);
        assert!(info.class_labels.contains(&"Seizure".to_string()));
    }

    #[test]
    fn test_rows_keep_their_order() {
        let classifier = eeg_classifier(false);
        let body = "a,b,c\n1,2,3\n4,5,6\n7,8,9\n";
        let input = InferenceInput::new(body.as_bytes().to_vec()).with_file_name("rows.csv");
        let results = classifier.classify(&input).unwrap();
        assert_eq!(results.len(), 3);
        for result in &results {
            assert_eq!(result.label.id, result.raw_class_index as i64 + 1);
        }
    }

    #[test]
    fn test_degraded_predictions_can_be_refused() {
        let classifier = eeg_classifier(true);
        let input = InferenceInput::new(b"a\n1\n".to_vec()).with_file_name("rows.csv");
        assert!(matches!(
            classifier.classify(&input),
            Err(ClassifierError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_validation_runs_before_model() {
        let classifier = Classifier::builder()
            .with_name("alzheimer")
            .with_preprocessor(ImagePreprocessor::new())
            .with_catalog(LabelCatalog::alzheimer_stages())
            .with_model_handle(ModelHandle::unavailable("alzheimer", "not loaded", 4))
            .unwrap()
            .build()
            .unwrap();
        let input = InferenceInput::new(b"GIF89a".to_vec()).with_file_name("scan.gif");
        assert!(matches!(
            classifier.classify(&input),
            Err(ClassifierError::UnsupportedFormat(_))
        ));

        let input = InferenceInput::new(b"not decoded".to_vec()).with_file_name("scan.png");
        assert!(matches!(
            classifier.classify(&input),
            Err(ClassifierError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(RequestStage::Preprocessed.to_string(), "preprocessed");
        assert_eq!(RequestStage::Rejected.to_string(), "rejected");
    }
}
