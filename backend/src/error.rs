//! Error handling for the Dance Studio Management Platform
//!
//! Every error renders as `{"error": {"code", "message", "field"}}`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::RuleError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Tenancy errors
    #[error("Unknown studio: {0}")]
    UnknownStudio(String),

    #[error("Studio context required")]
    StudioRequired,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Class is full: {0}")]
    ClassFull(String),

    #[error("Payment rejected: {0}")]
    PaymentRejected(String),

    // External service errors
    #[error("Invalid webhook signature")]
    WebhookSignatureInvalid,

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Notification service error: {0}")]
    NotificationService(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

impl AppError {
    /// Shorthand for a field validation error
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// HTTP status and response body for this error
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_CREDENTIALS", "Invalid email or password"),
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token"),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                ),
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone()),
            ),
            AppError::UnknownStudio(slug) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("UNKNOWN_STUDIO", format!("No studio is registered as '{}'", slug)),
            ),
            AppError::StudioRequired => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new(
                    "STUDIO_REQUIRED",
                    "This request must be made on a studio subdomain",
                ),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg.clone()),
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message: message.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("INVALID_STATE_TRANSITION", msg.clone()),
            ),
            AppError::ClassFull(msg) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CLASS_FULL", msg.clone()),
            ),
            AppError::PaymentRejected(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("PAYMENT_REJECTED", msg.clone()),
            ),
            AppError::WebhookSignatureInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_SIGNATURE", "Webhook signature verification failed"),
            ),
            AppError::PaymentProvider(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new("PAYMENT_PROVIDER_ERROR", format!("Payment provider error: {}", msg)),
            ),
            AppError::NotificationService(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new("NOTIFICATION_ERROR", format!("Notification service error: {}", msg)),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("CONFIGURATION_ERROR", format!("Configuration error: {}", msg)),
            ),
            AppError::DatabaseError(sqlx::Error::RowNotFound) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", "Record not found"),
            ),
            AppError::DatabaseError(sqlx::Error::Database(db)) if db.is_unique_violation() => (
                StatusCode::CONFLICT,
                ErrorDetail::new("DUPLICATE_ENTRY", "A record with these values already exists"),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!(error = ?self, code = %error_detail.code, "Request failed");
        } else {
            tracing::debug!(error = %self, code = %error_detail.code, "Request rejected");
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

impl From<RuleError> for AppError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::InvalidTransition { .. } => AppError::InvalidStateTransition(err.to_string()),
            RuleError::ClassFull { .. } => AppError::ClassFull(err.to_string()),
            RuleError::Overpayment { .. } => AppError::PaymentRejected(err.to_string()),
            RuleError::Invalid(msg) => AppError::ValidationError(msg.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Report the first failing field; the rest are usually consequences
        let first = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            });

        match first {
            Some((field, message)) => AppError::Validation { field, message },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::InvalidCredentials.status_and_detail().0, StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InsufficientPermissions.status_and_detail().0, StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("Class".into()).status_and_detail().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::ClassFull("full".into()).status_and_detail().0, StatusCode::CONFLICT);
        assert_eq!(
            AppError::DatabaseError(sqlx::Error::RowNotFound).status_and_detail().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::DatabaseError(sqlx::Error::PoolTimedOut).status_and_detail().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rule_error_mapping() {
        let err: AppError = RuleError::ClassFull { capacity: 10 }.into();
        assert!(matches!(err, AppError::ClassFull(_)));

        let err: AppError = RuleError::Overpayment {
            amount: "10".into(),
            balance: "5".into(),
        }
        .into();
        assert!(matches!(err, AppError::PaymentRejected(_)));
    }

    #[test]
    fn test_validation_detail_carries_field() {
        let (status, detail) = AppError::validation("email", "Invalid email format").status_and_detail();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail.field.as_deref(), Some("email"));
        assert_eq!(detail.code, "VALIDATION_ERROR");
    }
}
