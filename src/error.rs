//! Error taxonomy shared by every service function, and its HTTP rendering.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("missing or malformed user identity")]
    Unauthorized,

    #[error("bank has no lesson nodes in its structure")]
    BankNoStructure,

    #[error("lessons not in bank structure: {}", .0.join(", "))]
    LessonNotInStructure(Vec<String>),

    #[error("no questions available for the selected lessons")]
    NoQuestions,

    #[error("attempt was already submitted")]
    AlreadySubmitted,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BankNoStructure => "BANK_NO_STRUCTURE",
            Self::LessonNotInStructure(_) => "LESSON_NOT_IN_STRUCTURE",
            Self::NoQuestions => "NO_QUESTIONS",
            Self::AlreadySubmitted => "ALREADY_SUBMITTED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_)
            | Self::Validation(_)
            | Self::BankNoStructure
            | Self::LessonNotInStructure(_)
            | Self::NoQuestions => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadySubmitted => StatusCode::CONFLICT,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(target: "quizbank", error = %self, "request failed");
        } else {
            tracing::debug!(target: "quizbank", code = self.code(), error = %self, "request rejected");
        }

        let mut error = json!({ "code": self.code(), "message": self.to_string() });
        if let Self::LessonNotInStructure(ids) = &self {
            error["details"] = json!({ "lessonIds": ids });
        }
        (status, Json(json!({ "ok": false, "error": error }))).into_response()
    }
}

/// Unreadable request bodies answer with the usual error envelope.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;
