use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::providers::ProviderError;
use crate::quality::CanonicalQuality;

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestions: Option<Vec<String>>,
    #[serde(
        rename = "availableQualities",
        skip_serializing_if = "Option::is_none"
    )]
    available_qualities: Option<Vec<CanonicalQuality>>,
}

/// Request-boundary error: every internal failure converts into one of these
/// and then into a structured JSON body. Nothing is fatal to the process.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<&'static str>,
    pub suggestions: Option<Vec<CanonicalQuality>>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>, code: Option<&'static str>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            suggestions: None,
        }
    }

    pub fn missing_url() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "The `url` query parameter is required.",
            Some("MISSING_URL"),
        )
    }

    pub fn invalid_url(raw: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            format!("Could not extract a video id from {raw:?}."),
            Some("INVALID_URL"),
        )
    }

    pub fn quality_not_found(requested: &str, suggestions: Vec<CanonicalQuality>) -> Self {
        let mut error = Self::new(
            StatusCode::NOT_FOUND,
            format!("Quality '{requested}' not found."),
            Some("QUALITY_NOT_FOUND"),
        );
        error.suggestions = Some(suggestions);
        error
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            message,
            Some("UPSTREAM_FAILED"),
        )
    }

    pub fn processing_failed(attempts: u32, detail: &str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Processing failed after {attempts} attempts: {detail}"),
            Some("UPSTREAM_FAILED"),
        )
    }

    pub fn processing_timeout(attempts: u32) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "Processing still in progress after {attempts} attempts; \
                 the asset may complete later. Retry shortly."
            ),
            Some("PROCESSING_TIMEOUT"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, None)
    }
}

impl From<ProviderError> for ApiError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::NoFormats => Self::new(
                StatusCode::NOT_FOUND,
                "The provider reported no usable formats for this video.",
                Some("NO_FORMATS"),
            ),
            ProviderError::Denied(detail) => Self::new(
                StatusCode::BAD_GATEWAY,
                format!("The provider denied the request: {detail}"),
                Some("UPSTREAM_DENIED"),
            ),
            other => Self::upstream(format!("Upstream request failed: {other}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let suggestions = self
            .suggestions
            .as_ref()
            .map(|list| list.iter().map(|q| q.key.clone()).collect());
        let body = Json(ErrorBody {
            success: false,
            error: self.message,
            code: self.code,
            suggestions,
            available_qualities: self.suggestions,
        });
        (self.status, body).into_response()
    }
}
