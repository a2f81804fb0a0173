use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::chat::ChatError;
use crate::classifier::ClassifierError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::warn!("Bad request: {}", msg);
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::warn!("Unauthorized: {}", msg);
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("Internal error: {}", msg);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::warn!("Service unavailable: {}", msg);
        Self::new(StatusCode::SERVICE_UNAVAILABLE, msg)
    }

    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("Bad gateway: {}", msg);
        Self::new(StatusCode::BAD_GATEWAY, msg)
    }

    /// Request body the extractor could not read. Keeps the extractor's status.
    pub fn rejected(status: StatusCode, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::warn!("Rejected request body ({}): {}", status, msg);
        Self::new(status, msg)
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody { error: &self.message });
        (self.status, body).into_response()
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::AuthenticationError(msg) => Self::unauthorized(msg),
            // Messages for rejected uploads are shown to the client unchanged.
            ClassifierError::ValidationError(msg)
            | ClassifierError::UnsupportedFormat(msg)
            | ClassifierError::MalformedInput(msg) => Self::bad_request(msg),
            e @ ClassifierError::ShapeMismatch { .. } => Self::bad_request(e.to_string()),
            ClassifierError::ModelUnavailable(msg) => Self::unavailable(msg),
            e @ (ClassifierError::InferenceError(_)
            | ClassifierError::UnknownClass { .. }
            | ClassifierError::ModelError(_)
            | ClassifierError::BuildError(_)) => Self::internal(e.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Upstream { status, body } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                log::warn!("Chat upstream error {}: {}", status, body);
                Self::new(status, body)
            }
            e @ (ChatError::Transport(_) | ChatError::MalformedResponse(_)) => Self::bad_gateway(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_error_status() {
        let cases = [
            (ClassifierError::AuthenticationError("k".into()), StatusCode::UNAUTHORIZED),
            (ClassifierError::UnsupportedFormat("gif".into()), StatusCode::BAD_REQUEST),
            (ClassifierError::MalformedInput("csv".into()), StatusCode::BAD_REQUEST),
            (
                ClassifierError::ShapeMismatch {
                    expected: "[1, 3, 224, 224]".into(),
                    actual: vec![1, 3, 10, 10],
                },
                StatusCode::BAD_REQUEST,
            ),
            (ClassifierError::InferenceError("nan".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ClassifierError::UnknownClass { index: 7, num_classes: 4 },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ClassifierError::ModelUnavailable("none".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_upload_message_is_kept() {
        let msg = "Invalid file type. Please upload an image (jpg/jpeg/png).";
        let err = ApiError::from(ClassifierError::UnsupportedFormat(msg.into()));
        assert_eq!(err.message(), msg);
    }

    #[test]
    fn test_upstream_status_is_kept() {
        let err = ApiError::from(ChatError::Upstream {
            status: 429,
            body: "slow down".into(),
        });
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.message(), "slow down");

        let err = ApiError::from(ChatError::MalformedResponse("no choices".into()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
