use axum::{
    Json,
    extract::multipart::MultipartError,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::core::audio::ReferenceAudioError;
use crate::core::cache::{CacheError, DiscoveryError};
use crate::core::stt::TranscriptionError;
use crate::core::tts::{ErrorClass, PipelineError, SUPPORTED_LANGUAGES, SynthesisError};

/// Status used when the client disconnected before a response was produced
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Errors returned by HTTP handlers
///
/// Every variant renders as `{"error": {code, message, valid_options?, request_id}}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    BadRequest {
        code: &'static str,
        message: String,
        valid_options: Option<Vec<String>>,
    },

    #[error("{message}")]
    PayloadTooLarge { code: &'static str, message: String },

    #[error("{0}")]
    ServiceUnavailable(String),

    /// The model worker or discovery failed
    #[error("{message}")]
    Upstream { code: &'static str, message: String },

    #[error("{message}")]
    Timeout { code: &'static str, message: String },

    /// Details are logged where the failure is detected, never returned
    #[error("Internal server error")]
    Internal,

    #[error("Request cancelled")]
    Cancelled,
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_options: Option<&'a [String]>,
    request_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        AppError::BadRequest {
            code,
            message: message.into(),
            valid_options: None,
        }
    }

    pub fn missing_field(name: &str) -> Self {
        Self::bad_request("missing_field", format!("Missing required field: {name}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream { .. } | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Cancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest { code, .. }
            | AppError::PayloadTooLarge { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Timeout { code, .. } => code,
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::Internal => "internal_error",
            AppError::Cancelled => "cancelled",
        }
    }

    /// Map a pipeline failure, using `failure_code` for model errors
    ///
    /// Built-in synthesis reports `synthesis_failed`, cloning `voice_clone_failed`.
    pub fn from_pipeline(err: PipelineError, failure_code: &'static str) -> Self {
        if err.class() == ErrorClass::ContractViolation {
            // Logged by the pipeline when raised
            return AppError::Internal;
        }
        match err {
            PipelineError::EmptyText => Self::bad_request("empty_text", "Empty text input"),
            PipelineError::TextTooLong { .. } => Self::bad_request("text_too_long", err.to_string()),
            PipelineError::UnsupportedLanguage(language)
            | PipelineError::Synthesis {
                source: SynthesisError::UnsupportedLanguage(language),
                ..
            } => AppError::BadRequest {
                code: "unsupported_language",
                message: format!("Unsupported language: {language}"),
                valid_options: Some(SUPPORTED_LANGUAGES.iter().map(|l| l.to_string()).collect()),
            },
            PipelineError::Chunking(e) => Self::bad_request("invalid_request", e.to_string()),
            PipelineError::NoSegments => Self::bad_request("invalid_request", err.to_string()),
            PipelineError::Synthesis {
                source:
                    SynthesisError::InvalidVoice {
                        voice,
                        valid_options,
                    },
                ..
            } => AppError::BadRequest {
                code: "invalid_speaker",
                message: format!("Invalid speaker: {voice}"),
                valid_options: Some(valid_options),
            },
            PipelineError::Synthesis {
                chunk_index,
                source: SynthesisError::Timeout(ms),
            } => AppError::Timeout {
                code: "synthesis_timeout",
                message: format!("Synthesis of chunk {chunk_index} timed out after {ms} ms"),
            },
            PipelineError::Synthesis {
                chunk_index,
                source: SynthesisError::InferenceError(message),
            } => AppError::Upstream {
                code: failure_code,
                message: format!("Synthesis failed at chunk {chunk_index}: {message}"),
            },
            PipelineError::Cancelled => AppError::Cancelled,
            PipelineError::ContractViolation(_) => AppError::Internal,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::from_pipeline(err, "synthesis_failed")
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Discovery(DiscoveryError::Timeout(_)) => AppError::Timeout {
                code: "speaker_list_failed",
                message: format!("Failed to retrieve speaker list: {err}"),
            },
            CacheError::Serialization(ref message) => {
                error!("Speaker cache serialization failed: {}", message);
                AppError::Internal
            }
            _ => AppError::Upstream {
                code: "speaker_list_failed",
                message: format!("Failed to retrieve speaker list: {err}"),
            },
        }
    }
}

impl From<TranscriptionError> for AppError {
    fn from(err: TranscriptionError) -> Self {
        match err {
            TranscriptionError::EmptyAudio => Self::bad_request("empty_audio", err.to_string()),
            TranscriptionError::AudioTooLarge { .. } => AppError::PayloadTooLarge {
                code: "audio_too_large",
                message: err.to_string(),
            },
            TranscriptionError::UnsupportedLanguage(_) => {
                Self::bad_request("unsupported_language", err.to_string())
            }
            TranscriptionError::Timeout(_) => AppError::Timeout {
                code: "transcription_timeout",
                message: err.to_string(),
            },
            TranscriptionError::Failed(_) | TranscriptionError::InvalidResponse(_) => {
                AppError::Upstream {
                    code: "transcription_failed",
                    message: err.to_string(),
                }
            }
        }
    }
}

impl From<ReferenceAudioError> for AppError {
    fn from(err: ReferenceAudioError) -> Self {
        match err {
            ReferenceAudioError::TooLarge { .. } => AppError::PayloadTooLarge {
                code: "reference_audio_too_large",
                message: err.to_string(),
            },
            _ => Self::bad_request("invalid_reference_audio", err.to_string()),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge {
                code: "payload_too_large",
                message: err.body_text(),
            }
        } else {
            Self::bad_request("invalid_multipart", err.body_text())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let request_id = Uuid::new_v4().to_string();

        if status.is_server_error() {
            error!(
                "Request failed - request_id={}, status={}, code={}, error={}",
                request_id,
                status.as_u16(),
                self.code(),
                self
            );
        } else {
            warn!(
                "Request rejected - request_id={}, status={}, code={}, error={}",
                request_id,
                status.as_u16(),
                self.code(),
                self
            );
        }

        let valid_options = match &self {
            AppError::BadRequest { valid_options, .. } => valid_options.as_deref(),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
                valid_options,
                request_id: request_id.clone(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }
        response
    }
}
