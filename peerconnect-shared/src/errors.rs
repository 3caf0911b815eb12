use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Session lifecycle errors
/// - E2xxx: Review errors
/// - E3xxx: Gamification errors
/// - E4xxx: Chat and call errors
/// - E5xxx: Profile and skill errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    ServiceUnavailable,
    BadRequest,
    TokenExpired,
    TokenInvalid,

    // Sessions (E1xxx)
    InvalidTransition,
    SessionNotCompleted,
    CannotSessionWithSelf,

    // Reviews (E2xxx)
    InvalidRating,
    DuplicateReview,

    // Gamification (E3xxx)
    AchievementNotFound,

    // Chat / calls (E4xxx)
    EmptyMessage,
    CallRoomClosed,

    // Profiles / skills (E5xxx)
    InvalidDisplayName,
    SkillNotFound,
    ConflictingSkillTypes,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::ServiceUnavailable => "E0006",
            Self::BadRequest => "E0007",
            Self::TokenExpired => "E0008",
            Self::TokenInvalid => "E0009",

            // Sessions
            Self::InvalidTransition => "E1001",
            Self::SessionNotCompleted => "E1002",
            Self::CannotSessionWithSelf => "E1003",

            // Reviews
            Self::InvalidRating => "E2001",
            Self::DuplicateReview => "E2002",

            // Gamification
            Self::AchievementNotFound => "E3001",

            // Chat / calls
            Self::EmptyMessage => "E4001",
            Self::CallRoomClosed => "E4002",

            // Profiles / skills
            Self::InvalidDisplayName => "E5001",
            Self::SkillNotFound => "E5002",
            Self::ConflictingSkillTypes => "E5003",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationError | Self::BadRequest | Self::InvalidRating
            | Self::EmptyMessage | Self::InvalidDisplayName | Self::ConflictingSkillTypes
            | Self::CannotSessionWithSelf => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::AchievementNotFound | Self::SkillNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidTransition | Self::SessionNotCompleted | Self::DuplicateReview
            | Self::CallRoomClosed => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The error code carried by this error, if it is a known one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Known { code, .. } => Some(*code),
            Self::Validation(_) => Some(ErrorCode::ValidationError),
            Self::Database(diesel::result::Error::NotFound) => Some(ErrorCode::NotFound),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::new(ErrorCode::ValidationError, errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn known_error_envelope() {
        let (status, value) = body_json(AppError::new(
            ErrorCode::DuplicateReview,
            "you already reviewed this session",
        ))
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "E2002");
        assert_eq!(value["error"]["message"], "you already reviewed this session");
        assert!(value["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn details_are_serialized() {
        let (_, value) = body_json(AppError::with_details(
            ErrorCode::InvalidTransition,
            "cannot move session",
            serde_json::json!({ "from": "completed", "to": "active" }),
        ))
        .await;

        assert_eq!(value["error"]["details"]["from"], "completed");
        assert_eq!(value["error"]["details"]["to"], "active");
    }

    #[tokio::test]
    async fn internal_errors_hide_cause() {
        let (status, value) = body_json(AppError::Internal(anyhow::anyhow!("pool exhausted"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"]["message"], "internal server error");
    }

    #[tokio::test]
    async fn diesel_not_found_maps_to_404() {
        let (status, value) = body_json(AppError::Database(diesel::result::Error::NotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(value["error"]["code"], "E0003");
    }

    #[test]
    fn lifecycle_codes_are_conflicts() {
        assert_eq!(ErrorCode::InvalidTransition.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::SessionNotCompleted.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::InvalidRating.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn code_accessor() {
        assert_eq!(
            AppError::new(ErrorCode::Forbidden, "no").code(),
            Some(ErrorCode::Forbidden)
        );
        assert_eq!(
            AppError::Validation("bad".into()).code(),
            Some(ErrorCode::ValidationError)
        );
        assert_eq!(AppError::internal("x").code(), Some(ErrorCode::InternalError));
        assert_eq!(AppError::Internal(anyhow::anyhow!("x")).code(), None);
    }
}
