//! Maps [`revisit_types::DomainError`] (and the database/generator errors
//! that don't already speak it) onto HTTP responses (§7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use revisit_core::{ConstraintKind, GeneratorError};
use revisit_db::DbError;
use revisit_types::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error body (§7).
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<ConstraintDetails>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct ConstraintDetails {
    pub constraint: String,
    pub required_count: usize,
    pub available_count: usize,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            constraint: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
            constraint: None,
        }
    }
}

/// The API-facing error type. Most of the taxonomy already lives in
/// [`DomainError`] (§7); this only adds the database and generator-level
/// errors that route handlers see directly.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

fn constraint_kind_str(k: ConstraintKind) -> &'static str {
    match k {
        ConstraintKind::QuickWins => "quick_wins",
        ConstraintKind::Difficulty => "difficulty",
        ConstraintKind::DistinctPatterns => "distinct_patterns",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Domain(DomainError::BadRequest(msg)) => {
                tracing::warn!(message = %msg, "bad request");
                (StatusCode::BAD_REQUEST, ErrorResponse::with_details("bad request", msg.clone()))
            }
            ApiError::Domain(DomainError::Unauthorized) => (StatusCode::UNAUTHORIZED, ErrorResponse::new("unauthorized")),
            ApiError::Domain(DomainError::Forbidden(msg)) => {
                (StatusCode::FORBIDDEN, ErrorResponse::with_details("forbidden", msg.clone()))
            }
            ApiError::Domain(DomainError::NotFound(msg)) => (StatusCode::NOT_FOUND, ErrorResponse::with_details("not found", msg.clone())),
            ApiError::Domain(DomainError::Conflict(msg)) => (StatusCode::CONFLICT, ErrorResponse::with_details("conflict", msg.clone())),
            ApiError::Domain(DomainError::Constraint {
                constraint,
                required,
                available,
            }) => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: "constraint not satisfiable".to_string(),
                    details: None,
                    constraint: Some(ConstraintDetails {
                        constraint: constraint.clone(),
                        required_count: *required,
                        available_count: *available,
                    }),
                },
            ),
            ApiError::Domain(DomainError::InvalidCredentials) => {
                (StatusCode::UNAUTHORIZED, ErrorResponse::new("invalid credentials"))
            }
            ApiError::Domain(DomainError::TokenExpired) => (StatusCode::UNAUTHORIZED, ErrorResponse::new("token expired")),
            ApiError::Domain(DomainError::InvalidToken) => (StatusCode::UNAUTHORIZED, ErrorResponse::new("invalid token")),
            ApiError::Domain(DomainError::Internal(msg)) => {
                tracing::error!(message = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new("internal server error"))
            }
            ApiError::Db(err) => {
                tracing::error!(error = %err, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new("internal server error"))
            }
            ApiError::Generator(GeneratorError { constraint, required, available }) => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: "constraint not satisfiable".to_string(),
                    details: None,
                    constraint: Some(ConstraintDetails {
                        constraint: constraint_kind_str(*constraint).to_string(),
                        required_count: (*required).max(0) as usize,
                        available_count: (*available).max(0) as usize,
                    }),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
