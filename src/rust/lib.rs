//! Neurological screening service: classifies brain MRI scans into Alzheimer's
//! impairment stages and EEG recordings into severity classes using ONNX models,
//! behind a key-protected HTTP API with a pass-through chat assistant.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use neuropath::{Classifier, InferenceInput, LabelCatalog, TabularPreprocessor};
//!
//! // Without a model file the classifier serves a seeded, untrained network
//! // and reports itself as degraded.
//! let classifier = Classifier::builder()
//!     .with_name("eeg")
//!     .with_preprocessor(TabularPreprocessor::new())
//!     .with_catalog(LabelCatalog::eeg_severity())
//!     .with_model_path(std::env::temp_dir().join("neuropath-doc/eeg.onnx"))?
//!     .build()?;
//!
//! let csv = "X1,X2,X3,y\n1,2,3,1\n4,5,6,2\n";
//! let input = InferenceInput::new(csv.as_bytes().to_vec()).with_file_name("recording.csv");
//! for result in classifier.classify(&input)? {
//!     println!("{} ({})", result.label.id, result.label.description);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Serving
//!
//! [`api::router`] builds the axum application from an [`api::AppState`], which
//! is normally created from a [`ServiceConfig`] read from the environment.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod chat;
pub mod classifier;
pub mod config;
pub mod model_store;
mod runtime;

pub use auth::{CredentialStore, StaticCredentials};
pub use catalog::{ClassLabel, LabelCatalog};
pub use chat::{ChatConfig, ChatError, ChatProxy};
pub use classifier::{
    Classifier, ClassifierBuilder, ClassifierError, ClassifierInfo, ImagePreprocessor, InferenceInput,
    ModelStatus, PredictionResult, ScalingStrategy, TabularPreprocessor,
};
pub use config::{ConfigError, ServiceConfig};
pub use model_store::{ModelArtifact, ModelError, ModelStore};
pub use runtime::{create_session_builder, ExecutionPolicy, RuntimeConfig};

pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
