//! API error type shared by every handler.
//!
//! Handlers return `Result<HttpResponse, ApiError>`; the `ResponseError` impl
//! renders each variant as `{"message": ...}` with the matching status code.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal Server Error")]
    Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    /// Maps a unique-key violation to 409 with `msg`; anything else is a 500.
    pub fn on_insert(err: sqlx::Error, msg: &str) -> Self {
        if is_unique_violation(&err) {
            return ApiError::Conflict(msg.to_string());
        }
        err.into()
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "Database error");
        ApiError::Internal
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::error::Error as StdError;

    #[derive(Debug, Error)]
    #[error("{message}")]
    struct MySqlKeyError {
        message: String,
        unique: bool,
    }

    impl DatabaseError for MySqlKeyError {
        fn message(&self) -> &str {
            &self.message
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::ForeignKeyViolation
            }
        }
    }

    fn db_error(unique: bool) -> sqlx::Error {
        sqlx::Error::Database(Box::new(MySqlKeyError {
            message: "Duplicate entry '7-3-2026' for key 'uq_payroll_period'".into(),
            unique,
        }))
    }

    #[actix_web::test]
    async fn renders_message_body_with_status() {
        let err = ApiError::conflict("Payroll already generated for this period");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let resp = err.error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["message"], "Payroll already generated for this period");
    }

    #[test]
    fn internal_hides_details() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal Server Error");
    }

    #[test]
    fn duplicate_key_on_insert_is_a_conflict() {
        let err = db_error(true);
        assert!(is_unique_violation(&err));

        let err = ApiError::on_insert(err, "Payroll already generated for this period");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(
            matches!(err, ApiError::Conflict(ref m) if m == "Payroll already generated for this period")
        );
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let err = db_error(false);
        assert!(!is_unique_violation(&err));
        assert!(matches!(ApiError::on_insert(err, "taken"), ApiError::Internal));
    }

    #[test]
    fn non_database_errors_are_not_conflicts() {
        let err = ApiError::on_insert(sqlx::Error::PoolTimedOut, "taken");
        assert!(matches!(err, ApiError::Internal));
    }
}
