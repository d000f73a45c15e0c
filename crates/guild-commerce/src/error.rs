//! # Service Errors
//!
//! Services return `ApiResult<T>`. Lower-layer errors convert with `?`:
//!
//! ```text
//!   ValidationError ─────────────► VALIDATION
//!   CoreError (sold out, ...) ───► BUSINESS_RULE, message kept
//!   DbError::SlugTaken / UNIQUE ─► CONFLICT
//!   DbError (infrastructure) ────► INTERNAL, detail logged, message masked
//!   GatewayError ────────────────► GATEWAY
//! ```
//!
//! ## Status Mapping
//! | Code            | HTTP |
//! |-----------------|------|
//! | VALIDATION      | 400  |
//! | UNAUTHENTICATED | 401  |
//! | PERMISSION      | 403  |
//! | NOT_FOUND       | 404  |
//! | CONFLICT        | 409  |
//! | BUSINESS_RULE   | 422  |
//! | INTERNAL        | 500  |
//! | GATEWAY         | 502  |

use serde::Serialize;

use guild_core::{CoreError, ValidationError};
use guild_db::DbError;

use crate::gateway::GatewayError;

/// Result type alias for service operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// `{ "code": "NOT_FOUND", "message": "Artifact not found: 5b0c..." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

/// Error kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Missing or malformed input
    Validation,

    /// Caller lacks ownership, membership or age verification
    Permission,

    /// No valid bearer credential
    Unauthenticated,

    /// Referenced entity does not exist (or is not visible to the caller)
    NotFound,

    /// QR slug or unique resource already taken
    Conflict,

    /// Sold out, already used, self review and friends
    BusinessRule,

    /// Payment gateway failed or timed out
    Gateway,

    /// Anything the caller cannot act on
    Internal,
}

impl ErrorCode {
    /// Status code an HTTP boundary should answer with.
    pub const fn http_status(&self) -> u16 {
        match self {
            ErrorCode::Validation => 400,
            ErrorCode::Unauthenticated => 401,
            ErrorCode::Permission => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::BusinessRule => 422,
            ErrorCode::Internal => 500,
            ErrorCode::Gateway => 502,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Validation, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Permission, message)
    }

    pub fn unauthenticated() -> Self {
        ApiError::new(ErrorCode::Unauthenticated, "Authentication required")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// Shorthand for `self.code.http_status()`.
    #[inline]
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

/// Infrastructure failures are logged with their detail and reach the
/// caller as a generic INTERNAL error.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        if let DbError::Core(rule) = err {
            return ApiError::from(rule);
        }

        let public = match &err {
            DbError::NotFound { entity, id } => return ApiError::not_found(entity, id),
            DbError::UniqueViolation { field, value } => {
                return ApiError::new(ErrorCode::Conflict, format!("{field} '{value}' already exists"));
            }
            DbError::SlugTaken(slug) => {
                return ApiError::new(ErrorCode::Conflict, format!("QR slug '{slug}' already in use"));
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!(detail = %message, "Write referenced a missing row");
                return ApiError::validation("Invalid reference");
            }
            DbError::PoolExhausted => "Database busy",
            DbError::ConnectionFailed(_) => "Database connection failed",
            DbError::MigrationFailed(_) => "Database migration failed",
            DbError::TransactionFailed(_) => "Database transaction failed",
            DbError::QueryFailed(_) | DbError::Internal(_) | DbError::Core(_) => "Database operation failed",
        };

        tracing::error!(error = %err, "Storage failure");
        ApiError::internal(public)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => ApiError::from(e),
            other => ApiError::new(ErrorCode::BusinessRule, other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        tracing::error!(error = %err, "Payment gateway call failed");
        ApiError::new(ErrorCode::Gateway, "Payment provider unavailable")
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_errors_map_to_codes() {
        let err = ApiError::from(DbError::SlugTaken("aurora".into()));
        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(err.http_status(), 409);

        let err = ApiError::from(DbError::not_found("Order", "o-1"));
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Order not found: o-1");

        let err = ApiError::from(DbError::QueryFailed("syntax error near SELEC".into()));
        assert_eq!(err.code, ErrorCode::Internal);
        assert!(!err.message.contains("SELEC"));
    }

    #[test]
    fn test_core_errors_are_business_rules() {
        let err = ApiError::from(DbError::Core(CoreError::EventSoldOut {
            event_id: "evt-1".into(),
        }));
        assert_eq!(err.code, ErrorCode::BusinessRule);
        assert_eq!(err.message, "Event is sold out");

        let err = ApiError::from(CoreError::Validation(ValidationError::required("title")));
        assert_eq!(err.code, ErrorCode::Validation);
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_serializes_screaming_code() {
        let json = serde_json::to_value(ApiError::unauthenticated()).unwrap();
        assert_eq!(json["code"], "UNAUTHENTICATED");
        assert_eq!(json["message"], "Authentication required");
    }
}
