//! Error types for Shelfmark server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Machine-checkable error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    Unauthorized = 2,
    Forbidden = 3,
    DbFailure = 4,
    NotFound = 5,
    BadValue = 6,
    Duplicate = 7,
    HasOverdue = 10,
    LimitReached = 11,
    AlreadyBorrowed = 12,
    OutOfStock = 13,
    NotBorrowed = 14,
}

/// Reasons the loan ledger refuses a borrow or a return
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoanRejection {
    #[error("You have overdue books; return them before borrowing again")]
    HasOverdue,

    #[error("Maximum number of loans reached ({max})")]
    LimitReached { max: i64 },

    #[error("You have already borrowed this book and not returned it")]
    AlreadyBorrowed,

    #[error("This book is out of stock")]
    OutOfStock,

    #[error("You have not borrowed this book")]
    NotBorrowed,
}

impl LoanRejection {
    pub fn code(&self) -> ErrorCode {
        match self {
            LoanRejection::HasOverdue => ErrorCode::HasOverdue,
            LoanRejection::LimitReached { .. } => ErrorCode::LimitReached,
            LoanRejection::AlreadyBorrowed => ErrorCode::AlreadyBorrowed,
            LoanRejection::OutOfStock => ErrorCode::OutOfStock,
            LoanRejection::NotBorrowed => ErrorCode::NotBorrowed,
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Loan rejected: {0}")]
    Loan(#[from] LoanRejection),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Always "error"
    pub status: String,
    pub code: u32,
    /// Error kind, e.g. "OutOfStock"
    pub error: String,
    pub message: String,
}

impl AppError {
    fn parts(&self) -> (StatusCode, ErrorCode, String) {
        match self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::Forbidden, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg.clone()),
            AppError::Validation(msg) | AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::Loan(rejection) => {
                (StatusCode::BAD_REQUEST, rejection.code(), rejection.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(ErrorResponse {
            status: "error".to_string(),
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// True when the error is a unique constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_rejection_is_bad_request() {
        let (status, code, message) = AppError::from(LoanRejection::OutOfStock).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, ErrorCode::OutOfStock);
        assert_eq!(format!("{:?}", code), "OutOfStock");
        assert_eq!(message, "This book is out of stock");
    }

    #[test]
    fn test_limit_message_includes_max() {
        let rejection = LoanRejection::LimitReached { max: 5 };
        assert_eq!(rejection.code(), ErrorCode::LimitReached);
        assert!(rejection.to_string().contains('5'));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::NotFound("x".into()).parts().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Authentication("x".into()).parts().0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Authorization("x".into()).parts().0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::Conflict("x".into()).parts().0, StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_hides_details() {
        let (status, _, message) = AppError::Internal("secret detail".into()).parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }
}
