/// Error Handling Module
///
/// Unified error handling for the authentication service:
/// 1. Domain-specific error types (validation, auth protocol, store, config)
/// 2. A unified application error used by request handlers
/// 3. HTTP response mapping with structured, non-leaking bodies
/// 4. Structured error logging keyed by the error id

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request input
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
    SuspiciousContent(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} bytes)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Errors raised by a user store implementation.
///
/// These never cross the orchestrator boundary as-is; `AuthService` wraps
/// them into an [`AuthError`] kind.
#[derive(Debug)]
pub enum StoreError {
    /// A user with the same email already exists
    UniqueConstraintViolation,
    /// The backing store could not be reached or the query failed
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UniqueConstraintViolation => write!(f, "Duplicate entry"),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl StdError for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::UniqueConstraintViolation
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Authentication protocol errors.
///
/// `AccessDenied` deliberately covers unknown email, wrong password, unknown
/// user, missing session and stale refresh token alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    AccessDenied,
    DuplicateEmail,
    CreationFailed,
    InvalidToken,
    SessionPersistFailed,
    StoreUnavailable,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::AccessDenied => write!(f, "Access denied"),
            AuthError::DuplicateEmail => write!(f, "Email already registered"),
            AuthError::CreationFailed => write!(f, "Unable to create account"),
            AuthError::InvalidToken => write!(f, "Invalid or expired token"),
            AuthError::SessionPersistFailed => write!(f, "Unable to persist session"),
            AuthError::StoreUnavailable => write!(f, "User store unavailable"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type returned by request handlers
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error body returned to clients
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for correlating with server logs
    pub error_id: String,
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn describe(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Auth(e) => match e {
                AuthError::AccessDenied => (
                    StatusCode::UNAUTHORIZED,
                    "ACCESS_DENIED",
                    "Access denied".to_string(),
                ),
                AuthError::InvalidToken => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_INVALID",
                    "Invalid or expired token".to_string(),
                ),
                AuthError::DuplicateEmail => (
                    StatusCode::CONFLICT,
                    "DUPLICATE_EMAIL",
                    "Email already registered".to_string(),
                ),
                AuthError::StoreUnavailable => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                ),
                AuthError::CreationFailed | AuthError::SessionPersistFailed => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                ),
            },
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.describe();
        let body = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );
        (status, body)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Auth(e @ (AuthError::AccessDenied | AuthError::InvalidToken)) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication rejected");
            }
            AppError::Auth(AuthError::DuplicateEmail) => {
                tracing::warn!(
                    request_id = request_id,
                    error = %self,
                    "Duplicate sign-up attempt"
                );
            }
            AppError::Auth(e) => {
                tracing::error!(
                    request_id = request_id,
                    error = %e,
                    "Authentication backend failure"
                );
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self, &request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.describe().0
    }
}
