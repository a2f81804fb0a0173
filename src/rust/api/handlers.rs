use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Multipart, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::{AppState, API_KEY_HEADER};
use crate::classifier::{
    Classifier, ClassifierError, InferenceInput, ModelStatus, PredictionResult, RequestStage,
};

const IMAGE_FIELDS: &[&str] = &["file"];
const CSV_FIELDS: &[&str] = &["file", "csvFile"];

#[derive(Serialize)]
pub struct WelcomeResponse {
    pub message: &'static str,
    pub usage: &'static str,
}

#[derive(Serialize)]
pub struct ModelHealth {
    pub status: ModelStatus,
    pub detail: String,
    pub input_shape: Option<String>,
}

#[derive(Serialize)]
pub struct ModelsHealth {
    pub alzheimer: ModelHealth,
    pub eeg: ModelHealth,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub models: ModelsHealth,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub user_message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Serialize)]
pub struct ImagePrediction {
    pub prediction: String,
    pub meaning: String,
}

#[derive(Serialize)]
pub struct RecordPrediction {
    pub prediction: i64,
    pub meaning: String,
}

#[derive(Serialize)]
pub struct EegPredictions {
    pub num_records: usize,
    pub results: Vec<RecordPrediction>,
}

pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the NeuroPath classification API",
        usage: "POST /predict with an MRI image, or POST /eeg/predict with an EEG CSV file. Both require the 'x-api-key' header.",
    })
}

fn model_health(classifier: &Classifier) -> ModelHealth {
    let info = classifier.info();
    ModelHealth {
        status: info.status,
        detail: info.detail,
        input_shape: info.input_shape,
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let statuses = [state.alzheimer.status(), state.eeg.status()];
    let (code, status, message) = if statuses.contains(&ModelStatus::Unavailable) {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "unavailable",
            "NeuroPath AI Assistant is running but a model could not be loaded",
        )
    } else if statuses.contains(&ModelStatus::Degraded) {
        (
            StatusCode::OK,
            "degraded",
            "NeuroPath AI Assistant is running with fallback models",
        )
    } else {
        (StatusCode::OK, "healthy", "NeuroPath AI Assistant is running")
    };

    let body = HealthResponse {
        status,
        message,
        models: ModelsHealth {
            alzheimer: model_health(&state.alzheimer),
            eeg: model_health(&state.eeg),
        },
    };
    (code, Json(body))
}

pub async fn chat(
    State(state): State<AppState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = request?;
    let reply = state.chat.reply(&request.user_message).await?;
    Ok(Json(ChatResponse { reply }))
}

pub async fn predict_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImagePrediction>, ApiError> {
    authenticate(&state, &headers, state.alzheimer.name())?;
    let input = read_upload(multipart?, IMAGE_FIELDS).await?;
    let results = run_classifier(state.alzheimer.clone(), input).await?;

    let result = results
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::internal("The model returned no prediction"))?;
    info!("Image classified as '{}'", result.label.name);
    Ok(Json(ImagePrediction {
        prediction: result.label.name,
        meaning: result.label.description,
    }))
}

pub async fn predict_eeg(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EegPredictions>, ApiError> {
    authenticate(&state, &headers, state.eeg.name())?;
    let input = read_upload(multipart?, CSV_FIELDS).await?;
    let results = run_classifier(state.eeg.clone(), input).await?;

    info!("Classified {} EEG record(s)", results.len());
    Ok(Json(EegPredictions {
        num_records: results.len(),
        results: results
            .into_iter()
            .map(|r| RecordPrediction {
                prediction: r.label.id,
                meaning: r.label.description,
            })
            .collect(),
    }))
}

fn authenticate(state: &AppState, headers: &HeaderMap, classifier: &str) -> Result<(), ApiError> {
    debug!("[{}] {}", classifier, RequestStage::Received);
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented.is_empty() || !state.credentials.verify(presented) {
        debug!("[{}] {}", classifier, RequestStage::Rejected);
        return Err(ClassifierError::AuthenticationError("Invalid or missing API Key.".to_string()).into());
    }
    debug!("[{}] {}", classifier, RequestStage::Authenticated);
    Ok(())
}

/// Takes the first multipart field whose name is in `fields`.
async fn read_upload(mut multipart: Multipart, fields: &[&str]) -> Result<InferenceInput, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let accepted = field.name().map(|n| fields.contains(&n)).unwrap_or(false);
        if !accepted {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let mut input = InferenceInput::new(bytes);
        if let Some(name) = file_name {
            input = input.with_file_name(name);
        }
        if let Some(content_type) = content_type {
            input = input.with_content_type(content_type);
        }
        return Ok(input);
    }
    Err(ApiError::bad_request(format!(
        "Missing file upload (expected field '{}')",
        fields.join("' or '")
    )))
}

fn multipart_error(err: MultipartError) -> ApiError {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        log::warn!("Upload rejected: {}", err.body_text());
        return ApiError::new(status, err.body_text());
    }
    ApiError::bad_request(err.body_text())
}

async fn run_classifier(classifier: Classifier, input: InferenceInput) -> Result<Vec<PredictionResult>, ApiError> {
    let name = classifier.name().to_string();
    let outcome = tokio::task::spawn_blocking(move || classifier.classify(&input))
        .await
        .map_err(|e| ApiError::internal(format!("Inference task failed: {}", e)))?;
    match outcome {
        Ok(results) => {
            debug!("[{}] {}", name, RequestStage::Responded);
            Ok(results)
        }
        Err(err) => {
            debug!("[{}] {}", name, RequestStage::Rejected);
            Err(err.into())
        }
    }
}
