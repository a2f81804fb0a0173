//! HTTP surface: routing, shared state and request handlers.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use log::info;

use crate::auth::{CredentialStore, StaticCredentials};
use crate::catalog::LabelCatalog;
use crate::chat::ChatProxy;
use crate::classifier::{Classifier, ClassifierError, ImagePreprocessor, TabularPreprocessor};
use crate::config::ServiceConfig;

pub use error::ApiError;

/// Header carrying the shared secret on prediction requests.
pub const API_KEY_HEADER: &str = "x-api-key";

/// State shared by every request. Cloning is cheap; all members are behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub alzheimer: Classifier,
    pub eeg: Classifier,
    pub credentials: Arc<dyn CredentialStore>,
    pub chat: Arc<ChatProxy>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Loads both classifiers and prepares the credential store and chat proxy.
    ///
    /// Model files that are missing or broken leave the matching classifier
    /// degraded or unavailable; only configuration mistakes fail here.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ClassifierError> {
        let credentials = StaticCredentials::new(&config.api_keys).map_err(ClassifierError::BuildError)?;
        info!("Accepting {} API key(s)", credentials.len());

        let alzheimer = Classifier::builder()
            .with_name("alzheimer")
            .with_preprocessor(ImagePreprocessor::new())
            .with_catalog(LabelCatalog::alzheimer_stages())
            .with_model_artifact(config.alzheimer_model.clone())?
            .with_runtime_config(config.runtime.clone())
            .allow_fallback(config.allow_degraded)
            .reject_degraded(config.reject_degraded)
            .build()?;

        let eeg = Classifier::builder()
            .with_name("eeg")
            .with_preprocessor(TabularPreprocessor::new().with_scaling(config.eeg_scaling.resolve()?))
            .with_catalog(LabelCatalog::eeg_severity())
            .with_model_artifact(config.eeg_model.clone())?
            .with_runtime_config(config.runtime.clone())
            .allow_fallback(config.allow_degraded)
            .reject_degraded(config.reject_degraded)
            .build()?;

        Ok(Self {
            alzheimer,
            eeg,
            credentials: Arc::new(credentials),
            chat: Arc::new(ChatProxy::new(config.chat.clone())),
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/predict", post(handlers::predict_image))
        .route("/eeg/predict", post(handlers::predict_eeg))
        .route("/api/eeg/predict", post(handlers::predict_eeg))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
