use std::path::Path;
use std::sync::Arc;

use log::info;

use super::classifier::Classifier;
use super::error::ClassifierError;
use super::fallback::DEFAULT_FALLBACK_SEED;
use super::model::{LoadOptions, ModelHandle};
use super::preprocess::Preprocessor;
use crate::catalog::LabelCatalog;
use crate::model_store::ModelArtifact;
use crate::runtime::RuntimeConfig;

enum ModelSource {
    Artifact(ModelArtifact),
    Handle(ModelHandle),
}

/// A builder for constructing a Classifier with a fluent interface.
pub struct ClassifierBuilder {
    name: Option<String>,
    preprocessor: Option<Arc<dyn Preprocessor>>,
    catalog: Option<LabelCatalog>,
    model: Option<ModelSource>,
    runtime_config: RuntimeConfig,
    allow_fallback: bool,
    fallback_seed: u64,
    reject_degraded: bool,
}

impl Default for ClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration.
    /// Fallback to an untrained network is allowed unless disabled.
    pub fn new() -> Self {
        Self {
            name: None,
            preprocessor: None,
            catalog: None,
            model: None,
            runtime_config: RuntimeConfig::default(),
            allow_fallback: true,
            fallback_seed: DEFAULT_FALLBACK_SEED,
            reject_degraded: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the runtime configuration for ONNX model execution
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.preprocessor = Some(Arc::new(preprocessor));
        self
    }

    pub fn with_catalog(mut self, catalog: LabelCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Loads weights from an ONNX file when the classifier is built.
    pub fn with_model_path(self, path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ClassifierError::BuildError("Model path cannot be empty".to_string()));
        }
        let name = self.name.clone().unwrap_or_else(|| "model".to_string());
        self.with_model_artifact(ModelArtifact::new(name, path))
    }

    /// Loads weights described by an artifact (path and optional checksum) at build time.
    pub fn with_model_artifact(mut self, artifact: ModelArtifact) -> Result<Self, ClassifierError> {
        if self.model.is_some() {
            return Err(ClassifierError::BuildError("Model already set".to_string()));
        }
        self.model = Some(ModelSource::Artifact(artifact));
        Ok(self)
    }

    /// Uses an already constructed model handle.
    pub fn with_model_handle(mut self, handle: ModelHandle) -> Result<Self, ClassifierError> {
        if self.model.is_some() {
            return Err(ClassifierError::BuildError("Model already set".to_string()));
        }
        self.model = Some(ModelSource::Handle(handle));
        Ok(self)
    }

    pub fn allow_fallback(mut self, allow: bool) -> Self {
        self.allow_fallback = allow;
        self
    }

    pub fn with_fallback_seed(mut self, seed: u64) -> Self {
        self.fallback_seed = seed;
        self
    }

    /// Refuse predictions while the model is degraded.
    pub fn reject_degraded(mut self, reject: bool) -> Self {
        self.reject_degraded = reject;
        self
    }

    /// Builds and returns the final Classifier instance
    ///
    /// # Returns
    /// * `Result<Classifier, ClassifierError>` - The constructed Classifier if successful, or an error if:
    ///   - No preprocessor, catalog or model source is set
    ///   - A supplied model handle disagrees with the catalog size
    ///
    /// A model file that is missing or fails to load does not fail the build;
    /// the classifier comes up `Degraded` or `Unavailable` instead.
    pub fn build(self) -> Result<Classifier, ClassifierError> {
        let preprocessor = self
            .preprocessor
            .ok_or_else(|| ClassifierError::BuildError("A preprocessor must be set".to_string()))?;
        let catalog = self
            .catalog
            .ok_or_else(|| ClassifierError::BuildError("A label catalog must be set".to_string()))?;
        let source = self
            .model
            .ok_or_else(|| ClassifierError::BuildError("A model must be set".to_string()))?;
        let name = self.name.unwrap_or_else(|| catalog.name().to_string());

        let handle = match source {
            ModelSource::Artifact(artifact) => {
                info!("Loading model '{}' from {:?}", artifact.name, artifact.path);
                ModelHandle::load(
                    &artifact,
                    LoadOptions {
                        runtime: self.runtime_config,
                        contract: preprocessor.input_contract(),
                        num_classes: catalog.len(),
                        allow_fallback: self.allow_fallback,
                        fallback_seed: self.fallback_seed,
                    },
                )
            }
            ModelSource::Handle(handle) => {
                if handle.num_classes() != catalog.len() {
                    return Err(ClassifierError::BuildError(format!(
                        "Model has {} classes but the label catalog has {}",
                        handle.num_classes(),
                        catalog.len()
                    )));
                }
                handle
            }
        };
        info!("Classifier '{}' is {}", name, handle.status());

        Ok(Classifier {
            name,
            preprocessor,
            model: Arc::new(handle),
            catalog: Arc::new(catalog),
            reject_degraded: self.reject_degraded,
        })
    }
}
