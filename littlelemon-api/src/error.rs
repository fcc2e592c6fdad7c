use std::collections::BTreeMap;

use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use utoipa::ToSchema;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication credentials were not provided.")]
    AuthenticationFailed,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Incorrect username or password")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    Validation {
        message: String,
        fields: FieldErrors,
    },
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn forbidden() -> Self {
        ApiError::Forbidden("You do not have permission to perform this action.".to_string())
    }

    pub fn not_found() -> Self {
        ApiError::NotFound("Not found.".to_string())
    }

    /// Validation failure that is not tied to a single input field.
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.clone()]);
        ApiError::Validation { message, fields }
    }

    /// Collapses collected per-field errors; `Ok` when nothing was collected.
    pub fn from_fields(fields: FieldErrors) -> Result<(), Self> {
        if fields.is_empty() {
            return Ok(());
        }
        let message = fields
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{field}: {m}")))
            .collect::<Vec<_>>()
            .join(" ");
        Err(ApiError::Validation { message, fields })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::AuthenticationFailed
            | ApiError::InvalidToken
            | ApiError::InvalidCredentials => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Validation { .. } => "validation_error",
            ApiError::InternalError(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationFailed
            | ApiError::InvalidToken
            | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub(crate) fn push_field(fields: &mut FieldErrors, field: &str, message: impl Into<String>) {
    fields
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    /// One of `unauthenticated`, `forbidden`, `not_found`, `conflict`,
    /// `validation_error`, `internal`
    pub kind: String,
    pub message: String,
    /// Messages per offending input field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let kind = self.kind().to_string();
        // Internal details stay in the log.
        let (message, fields) = match self {
            ApiError::InternalError(detail) => {
                tracing::error!(error = %detail, "request failed");
                ("Internal server error".to_string(), None)
            }
            ApiError::Validation { message, fields } => {
                (message, (!fields.is_empty()).then_some(fields))
            }
            other => (other.to_string(), None),
        };

        let body = ApiErrorResponse {
            error: ErrorDetail {
                kind,
                message,
                fields,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ApiError::not_found(),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                tracing::warn!(
                    constraint = info.constraint_name(),
                    detail = info.message(),
                    "unique constraint violated"
                );
                ApiError::Conflict("A record with these values already exists.".to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                tracing::warn!(
                    constraint = info.constraint_name(),
                    detail = info.message(),
                    "foreign key constraint violated"
                );
                ApiError::Conflict("The record is still referenced by other records.".to_string())
            }
            other => ApiError::InternalError(format!("database error: {other}")),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        ApiError::InternalError(format!("connection pool error: {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}
